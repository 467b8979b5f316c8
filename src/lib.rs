pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod ops;
pub mod prepare;
pub mod remote;
pub mod report;
pub mod secrets;
pub mod summary;
pub mod timestamp;
pub mod upload;
pub mod util;

pub use error::ConfigError;
pub use error::UploadError;

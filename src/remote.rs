// remote module: the contract the uploader needs from a VPS, plus transports
mod openssh;
mod script;
mod session;

use std::path::Path;

pub use openssh::OpenSshTransport;
pub use script::{ImportJob, shell_quote};
pub use session::Ssh2Transport;

use crate::error::UploadError;
use crate::secrets::SshSecrets;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// -1 when the process was killed or the exit status is unknown
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    /// Invalid UTF-8 in either stream is replaced, never dropped.
    pub fn from_bytes(status: i32, stdout: &[u8], stderr: &[u8]) -> Self {
        Self {
            status,
            stdout: String::from_utf8_lossy(stdout).to_string(),
            stderr: String::from_utf8_lossy(stderr).to_string(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Operations performed against one remote host while processing one archive.
pub trait RemoteHost {
    /// `mkdir -p` semantics.
    fn make_dir(&mut self, dir: &str) -> Result<(), UploadError>;
    fn copy_file(&mut self, local: &Path, remote: &str) -> Result<(), UploadError>;
    fn exec(&mut self, command: &str) -> Result<ExecOutput, UploadError>;

    fn remove_dir(&mut self, dir: &str) -> Result<(), UploadError> {
        let cmd = format!("rm -rf {}", shell_quote(dir));
        let out = self.exec(&cmd)?;
        if out.success() {
            Ok(())
        } else {
            Err(UploadError::ExecFailed(cmd, out.stderr.trim().to_string()))
        }
    }
}

/// Opens a `RemoteHost` for the given credentials and key file.
pub trait Transport {
    fn name(&self) -> &'static str;
    fn open(&self, secrets: &SshSecrets, key: &Path) -> Result<Box<dyn RemoteHost>, UploadError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TransportKind {
    /// external `ssh`/`scp` binaries
    #[default]
    Openssh,
    /// in-process libssh2 session
    Ssh2,
}

impl TransportKind {
    pub fn build(self) -> anyhow::Result<Box<dyn Transport>> {
        Ok(match self {
            TransportKind::Openssh => Box::new(OpenSshTransport::from_env()?),
            TransportKind::Ssh2 => Box::new(Ssh2Transport::default()),
        })
    }
}

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{CUMULATIVE_LOG, DEFAULT_SITES_FILE};
use crate::remote::TransportKind;
use crate::upload::DEFAULT_DELAY;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(short, long, global = true, help = "Print debug-level logs")]
    pub verbose: bool,
    #[clap(long, global = true, help = "Write logs to this file instead of stderr")]
    pub log_file: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[clap(
        about = "Upload new archives of one site (SITE_CONFIG_JSON or --site)",
        name = "upload",
        display_order = 1
    )]
    Upload {
        #[clap(long, help = "Site slug to look up in the sites file instead of SITE_CONFIG_JSON")]
        site: Option<String>,
        #[clap(long, default_value = DEFAULT_SITES_FILE, help = "Sites file used with --site")]
        sites_file: PathBuf,
        #[clap(long, help = "Archive directory (default: $KTB_IMAGE_PATH/OutputImage)")]
        zip_dir: Option<PathBuf>,
        #[clap(long, default_value = ".", help = "Directory holding ledger and report files")]
        work_dir: PathBuf,
        #[clap(long, default_value_t = DEFAULT_DELAY.as_secs(), help = "Seconds to pause between archives")]
        delay_secs: u64,
        #[clap(long, value_enum, default_value_t = TransportKind::Openssh)]
        transport: TransportKind,
    },
    #[clap(about = "Merge report files into the cumulative log", name = "report", display_order = 2)]
    Report {
        #[clap(long, default_value = ".", help = "Directory scanned for *_report.txt")]
        dir: PathBuf,
        #[clap(long, default_value = CUMULATIVE_LOG)]
        log: PathBuf,
        #[clap(long, help = "Print the totals as a table")]
        show: bool,
    },
    #[clap(about = "Send the cumulative log to the Telegram chat", name = "notify", display_order = 3)]
    Notify {
        #[clap(long, default_value = CUMULATIVE_LOG)]
        log: PathBuf,
    },
    #[clap(about = "Print the current timestamp in UTC+07:00", name = "timestamp", display_order = 4)]
    Timestamp,
    #[clap(about = "Upload all sites, report, notify and clean up", name = "run", display_order = 5)]
    Run {
        #[clap(long, default_value = DEFAULT_SITES_FILE)]
        sites_file: PathBuf,
        #[clap(long, help = "Archive directory (default: $KTB_IMAGE_PATH/OutputImage)")]
        zip_dir: Option<PathBuf>,
        #[clap(long, default_value = ".")]
        work_dir: PathBuf,
        #[clap(long, default_value = CUMULATIVE_LOG)]
        log: PathBuf,
        #[clap(long, default_value_t = DEFAULT_DELAY.as_secs())]
        delay_secs: u64,
        #[clap(long, value_enum, default_value_t = TransportKind::Openssh)]
        transport: TransportKind,
        #[clap(long, help = "Skip the Telegram notification")]
        no_notify: bool,
    },
    #[clap(about = "Zip per-prefix image folders into upload archives", name = "prepare", display_order = 6)]
    Prepare {
        #[clap(long, default_value = DEFAULT_SITES_FILE)]
        sites_file: PathBuf,
        #[clap(long, help = "Image folders (default: $KTB_IMAGE_PATH/OutputImage)")]
        source_dir: Option<PathBuf>,
        #[clap(long, default_value = "InputZip")]
        out_dir: PathBuf,
    },
    #[clap(about = "Remove report files (and ledgers with --ledgers)", name = "clean", display_order = 7)]
    Clean {
        #[clap(long, default_value = ".")]
        dir: PathBuf,
        #[clap(long, help = "Also remove uploaded_files_*.log ledgers")]
        ledgers: bool,
    },
}

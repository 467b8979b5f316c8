use clap::Parser;

use imgpilot::cli::{Cli, Commands};
use imgpilot::commands::{self, HandleRunArgs, HandleUploadArgs};
use imgpilot::config::ProcessEnv;
use imgpilot::util;

fn main() {
    let cli = Cli::parse();
    util::try_enable_ansi_on_windows();

    let guard = match util::init_logging(cli.verbose, cli.log_file.clone()) {
        Ok(guard) => guard,
        Err(e) => {
            util::print_err(&format!("Cannot initialize logging: {:#}", e));
            std::process::exit(1);
        }
    };

    let env = ProcessEnv;
    let result = match cli.command {
        Commands::Upload { site, sites_file, zip_dir, work_dir, delay_secs, transport } => {
            commands::handle_upload(
                &env,
                HandleUploadArgs { site, sites_file, zip_dir, work_dir, delay_secs, transport },
            )
        }
        Commands::Report { dir, log, show } => commands::handle_report(dir, log, show),
        Commands::Notify { log } => commands::handle_notify(&env, log),
        Commands::Timestamp => commands::handle_timestamp(),
        Commands::Run { sites_file, zip_dir, work_dir, log, delay_secs, transport, no_notify } => {
            commands::handle_run(
                &env,
                HandleRunArgs { sites_file, zip_dir, work_dir, log, delay_secs, transport, no_notify },
            )
        }
        Commands::Prepare { sites_file, source_dir, out_dir } => {
            commands::handle_prepare(&env, sites_file, source_dir, out_dir)
        }
        Commands::Clean { dir, ledgers } => commands::handle_clean(dir, ledgers),
    };

    if let Err(e) = result {
        tracing::error!("{:#}", e);
        util::print_err(&format!("{:#}", e));
        drop(guard);
        std::process::exit(1);
    }
}

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::fs::OpenOptions;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Try to enable ANSI escape sequence support on Windows consoles.
/// Returns true if enabling succeeded, false otherwise.
#[cfg(windows)]
pub fn try_enable_ansi_on_windows() -> bool {
    enable_ansi_support::enable_ansi_support().is_ok()
}

// Non-Windows terminals handle ANSI natively.
#[cfg(not(windows))]
pub fn try_enable_ansi_on_windows() -> bool {
    true
}

fn colors_enabled() -> bool {
    std::io::stdout().is_terminal() && try_enable_ansi_on_windows()
}

/// Spinner shown while one archive is being processed. Hidden when stdout
/// is not a terminal (CI logs).
pub fn spinner(msg: String) -> ProgressBar {
    if !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{elapsed}]").expect("valid spinner template"),
    );
    pb.set_message(msg);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

pub fn print_ok(msg: &str) {
    if colors_enabled() {
        println!("✅ {}", msg.green());
    } else {
        println!("✅ {}", msg);
    }
}

pub fn print_err(msg: &str) {
    if colors_enabled() {
        eprintln!("❌ {}", msg.red());
    } else {
        eprintln!("❌ {}", msg);
    }
}

/// Append `key=value` to a CI step-output file.
pub fn append_github_output(path: &Path, key: &str, value: impl std::fmt::Display) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open GITHUB_OUTPUT {}", path.display()))?;
    writeln!(f, "{}={}", key, value)
        .with_context(|| format!("cannot write GITHUB_OUTPUT {}", path.display()))?;
    Ok(())
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `verbose`.
/// With `log_file`, output goes to that file through a non-blocking writer
/// whose guard must be held until exit.
pub fn init_logging(
    verbose: bool,
    log_file: Option<PathBuf>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "imgpilot=debug" } else { "imgpilot=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("cannot create log dir {}", dir.display()))?;
            let file_name = path
                .file_name()
                .map(|s| s.to_os_string())
                .unwrap_or_else(|| "imgpilot.log".into());
            let appender = tracing_appender::rolling::never(&dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
            Ok(None)
        }
    }
}

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::config::{EnvSource, LEDGER_PREFIX, REPORT_SUFFIX, SitesFile};
use crate::notify::{Delivery, TelegramTarget};
use crate::remote::Transport;
use crate::secrets::SshSecrets;
use crate::summary::{Aggregation, PreviousLog, aggregate};
use crate::timestamp::{date_string, format_timestamp};
use crate::upload::{UploadOptions, upload_site};

/// Merge every report file in `dir` into the cumulative log at `log_path`
/// and overwrite it. `now` decides both the stamp and the reset day.
pub fn generate_report(dir: &Path, log_path: &Path, now: DateTime<Utc>) -> Result<Aggregation> {
    let previous = PreviousLog::load(log_path)?;
    let new_counts = crate::report::collect_new_counts(dir)?;
    let today = date_string(&now);

    let agg = aggregate(&previous, &new_counts, &today, format_timestamp(&now));
    match (&previous.date, agg.reset) {
        (Some(d), true) => {
            tracing::info!("Log date ({}) differs from today ({}), totals reset", d, today)
        }
        (None, _) => tracing::info!("No previous log date, starting fresh for {}", today),
        (Some(d), false) => tracing::info!("Log date ({}) matches today, accumulating", d),
    }
    agg.log.write(log_path)?;
    tracing::info!("Cumulative log written to {}", log_path.display());
    Ok(agg)
}

/// Delete `*_report.txt` files in `dir` (and ledgers when asked). Returns
/// the removed paths.
pub fn clean(dir: &Path, include_ledgers: bool) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("cannot list {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let is_report = name.ends_with(REPORT_SUFFIX);
        let is_ledger = name.starts_with(LEDGER_PREFIX) && name.ends_with(".log");
        if is_report || (include_ledgers && is_ledger) {
            std::fs::remove_file(entry.path())
                .with_context(|| format!("cannot remove {}", entry.path().display()))?;
            tracing::debug!("removed {}", entry.path().display());
            removed.push(entry.into_path());
        }
    }
    Ok(removed)
}

/// Knobs of the whole pipeline (`run`).
pub struct PipelineArgs<'a> {
    pub sites: &'a SitesFile,
    pub upload: UploadOptions,
    pub log_path: PathBuf,
    pub notify: bool,
}

#[derive(Debug, Default)]
pub struct PipelineSummary {
    pub sites_done: Vec<String>,
    pub sites_skipped: Vec<(String, String)>,
    pub uploaded: usize,
    pub delivery: Option<Delivery>,
}

/// Upload every site, aggregate, notify, then drop the report files.
/// A site with broken secrets is skipped; the others still run.
pub fn run_pipeline(
    args: PipelineArgs<'_>,
    env: &dyn EnvSource,
    transport: &dyn Transport,
) -> Result<PipelineSummary> {
    let mut summary = PipelineSummary::default();
    // reports left by an interrupted run must not be counted
    clean(&args.upload.work_dir, false)?;

    for site in &args.sites.sites {
        tracing::info!("==== site {} ====", site.slug);
        let secrets = match SshSecrets::resolve(&site.vps_secret_prefix, env) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("SSH configuration error for {}: {}", site.slug, e);
                crate::util::print_err(&format!("{}: {}", site.slug, e));
                summary.sites_skipped.push((site.slug.clone(), e.to_string()));
                continue;
            }
        };
        let outcome = upload_site(site, &secrets, transport, &args.upload)?;
        summary.uploaded += outcome.uploaded.len();
        summary.sites_done.push(site.slug.clone());
    }

    generate_report(&args.upload.work_dir, &args.log_path, Utc::now())?;

    if args.notify {
        match TelegramTarget::from_env(env) {
            Ok(target) => {
                summary.delivery = Some(crate::notify::notify_from_log(&target, &args.log_path)?);
            }
            Err(e) => tracing::error!("Skipping notification: {}", e),
        }
    }

    clean(&args.upload.work_dir, false)?;
    Ok(summary)
}

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;

use crate::config::{EnvSource, SiteConfig, SitesFile, archive_dir};
use crate::notify::{Delivery, TelegramTarget};
use crate::ops::{PipelineArgs, clean, generate_report, run_pipeline};
use crate::remote::TransportKind;
use crate::secrets::SshSecrets;
use crate::upload::{UploadOptions, upload_site};

/// Arguments for `handle_upload` grouped to avoid too-many-arguments lint.
pub struct HandleUploadArgs {
    pub site: Option<String>,
    pub sites_file: PathBuf,
    pub zip_dir: Option<PathBuf>,
    pub work_dir: PathBuf,
    pub delay_secs: u64,
    pub transport: TransportKind,
}

fn upload_options(
    env: &dyn EnvSource,
    zip_dir: Option<PathBuf>,
    work_dir: PathBuf,
    delay_secs: u64,
) -> UploadOptions {
    UploadOptions {
        archive_dir: zip_dir.unwrap_or_else(|| archive_dir(env)),
        work_dir,
        delay: Duration::from_secs(delay_secs),
        github_output: env.non_empty("GITHUB_OUTPUT").map(PathBuf::from),
    }
}

pub fn handle_upload(env: &dyn EnvSource, args: HandleUploadArgs) -> Result<()> {
    let site = match &args.site {
        Some(slug) => SitesFile::load(&args.sites_file)?.find(slug)?.clone(),
        None => SiteConfig::from_env(env)?,
    };
    let opts = upload_options(env, args.zip_dir, args.work_dir, args.delay_secs);
    let secrets = SshSecrets::resolve(&site.vps_secret_prefix, env)?;
    let transport = args.transport.build()?;

    let outcome = upload_site(&site, &secrets, transport.as_ref(), &opts)?;
    println!(
        "Total files uploaded for {}: {} ({} images, {} skipped, {} failed)",
        site.slug,
        outcome.uploaded.len(),
        outcome.images(),
        outcome.skipped.len(),
        outcome.failed.len()
    );
    Ok(())
}

pub fn handle_report(dir: PathBuf, log: PathBuf, show: bool) -> Result<()> {
    let agg = generate_report(&dir, &log, Utc::now())?;
    if show {
        agg.log.show_table()?;
    } else {
        println!("{}", agg.log.render());
    }
    Ok(())
}

pub fn handle_notify(env: &dyn EnvSource, log: PathBuf) -> Result<()> {
    let target = TelegramTarget::from_env(env)?;
    match crate::notify::notify_from_log(&target, &log)? {
        Delivery::Delivered => crate::util::print_ok("Telegram message sent"),
        Delivery::Rejected(reason) | Delivery::NetworkError(reason) => {
            crate::util::print_err(&format!("Telegram message failed: {}", reason))
        }
    }
    Ok(())
}

pub fn handle_timestamp() -> Result<()> {
    println!("{}", crate::timestamp::now_timestamp());
    Ok(())
}

/// Arguments for `handle_run`.
pub struct HandleRunArgs {
    pub sites_file: PathBuf,
    pub zip_dir: Option<PathBuf>,
    pub work_dir: PathBuf,
    pub log: PathBuf,
    pub delay_secs: u64,
    pub transport: TransportKind,
    pub no_notify: bool,
}

pub fn handle_run(env: &dyn EnvSource, args: HandleRunArgs) -> Result<()> {
    let sites = SitesFile::load(&args.sites_file)?;
    let transport = args.transport.build()?;
    let upload = upload_options(env, args.zip_dir, args.work_dir, args.delay_secs);
    let summary = run_pipeline(
        PipelineArgs { sites: &sites, upload, log_path: args.log, notify: !args.no_notify },
        env,
        transport.as_ref(),
    )?;
    println!(
        "Sites processed: {} | skipped: {} | files uploaded: {}",
        summary.sites_done.len(),
        summary.sites_skipped.len(),
        summary.uploaded
    );
    Ok(())
}

pub fn handle_prepare(
    env: &dyn EnvSource,
    sites_file: PathBuf,
    source_dir: Option<PathBuf>,
    out_dir: PathBuf,
) -> Result<()> {
    let sites = SitesFile::load(&sites_file)?;
    let source = source_dir.unwrap_or_else(|| archive_dir(env));
    let created = crate::prepare::prepare_archives(&source, &out_dir, &sites.sites, sites.author())?;
    println!("Created {} new archives in {}", created.len(), out_dir.display());
    Ok(())
}

pub fn handle_clean(dir: PathBuf, ledgers: bool) -> Result<()> {
    let removed = clean(&dir, ledgers)?;
    println!("Removed {} files", removed.len());
    Ok(())
}

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::config::SiteConfig;
use crate::error::{ConfigError, UploadError};
use crate::ledger::Ledger;
use crate::remote::{ImportJob, RemoteHost, Transport};
use crate::report::RunReport;
use crate::secrets::SshSecrets;

pub const ARCHIVE_EXT: &str = ".zip";
pub const IMAGE_EXTS: [&str; 3] = [".webp", ".jpg", ".png"];
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// Where one uploader run reads archives from and writes its files to.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub archive_dir: PathBuf,
    /// holds the ledger and the report file
    pub work_dir: PathBuf,
    /// pause between attempted archives
    pub delay: Duration,
    /// `GITHUB_OUTPUT` file; receives `uploaded_count=<n>`
    pub github_output: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub uploaded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, UploadError)>,
    pub report: RunReport,
    pub report_path: Option<PathBuf>,
}

impl UploadOutcome {
    pub fn images(&self) -> u64 {
        self.report.lines().iter().map(|l| l.count).sum()
    }
}

/// Names of `*.zip` files directly in `dir` that start with `prefix`, sorted.
pub fn candidate_archives(dir: &Path, prefix: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("cannot list {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(ARCHIVE_EXT) && name.starts_with(prefix) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Number of entries in the archive whose name ends in an image extension
/// (case-insensitive). Directory entries never count.
pub fn count_images(archive: &Path) -> Result<u64, UploadError> {
    let name = archive.display().to_string();
    let file = std::fs::File::open(archive)
        .map_err(|e| UploadError::ArchiveUnreadable(name.clone(), e.to_string()))?;
    let reader = zip::ZipArchive::new(file)
        .map_err(|e| UploadError::ArchiveUnreadable(name.clone(), e.to_string()))?;
    let count = reader
        .file_names()
        .filter(|n| !n.ends_with('/'))
        .map(|n| n.to_ascii_lowercase())
        .filter(|n| IMAGE_EXTS.iter().any(|ext| n.ends_with(ext)))
        .count();
    Ok(count as u64)
}

/// Unique scratch directory on the remote side for one archive.
pub fn remote_temp_dir(slug: &str, seq: usize) -> String {
    format!(
        "/tmp/upload_{}_{}_{}_{}",
        slug,
        Utc::now().timestamp_millis(),
        std::process::id(),
        seq
    )
}

/// Upload every not-yet-ledgered archive of `site`. Per-archive failures are
/// logged and collected; only configuration problems and ledger write
/// failures end the batch early. Once archives are attempted, the report file
/// is rewritten before any error is returned.
pub fn upload_site(
    site: &SiteConfig,
    secrets: &SshSecrets,
    transport: &dyn Transport,
    opts: &UploadOptions,
) -> Result<UploadOutcome> {
    if !opts.archive_dir.is_dir() {
        return Err(ConfigError::MissingDirectory(opts.archive_dir.clone()).into());
    }
    let candidates = candidate_archives(&opts.archive_dir, &site.prefix)?;
    let mut ledger = Ledger::open(&opts.work_dir, &site.slug)?;
    let mut outcome = UploadOutcome::default();
    tracing::info!(
        "[upload] site={} prefix={} candidates={} transport={}",
        site.slug,
        site.prefix,
        candidates.len(),
        transport.name()
    );

    let mut attempted = 0usize;
    let mut fatal: Option<UploadError> = None;
    for name in candidates {
        if ledger.contains(&name) {
            tracing::info!("Skipping {} for {}, already uploaded.", name, site.slug);
            outcome.skipped.push(name);
            continue;
        }
        if attempted > 0 && !opts.delay.is_zero() {
            tracing::debug!("pausing {:?} before next archive", opts.delay);
            std::thread::sleep(opts.delay);
        }
        attempted += 1;

        let pb = crate::util::spinner(format!("Uploading {} to {}", name, site.slug));
        let local = opts.archive_dir.join(&name);
        let result = process_archive(site, secrets, transport, &local, &name, attempted)
            .and_then(|images| ledger.record(&name).map(|_| images));
        pb.finish_and_clear();

        match result {
            Ok(images) => {
                if images > 0 {
                    outcome.report.push(&site.prefix, images);
                }
                crate::util::print_ok(&format!(
                    "Finished importing {} to {} ({} images)",
                    name, site.slug, images
                ));
                outcome.uploaded.push(name);
            }
            Err(e) if e.is_per_item() => {
                tracing::error!("Failed to upload {} to {}: {}", name, site.slug, e);
                crate::util::print_err(&format!("Failed to upload {}: {}", name, e));
                outcome.failed.push((name, e));
            }
            Err(e) => {
                tracing::error!("Stopping batch for {} at {}: {}", site.slug, name, e);
                fatal = Some(e);
                break;
            }
        }
    }

    // the report is rewritten even when the batch stops early
    finish_batch(site, opts, &mut outcome)?;
    match fatal {
        Some(e) => Err(e.into()),
        None => Ok(outcome),
    }
}

fn finish_batch(site: &SiteConfig, opts: &UploadOptions, outcome: &mut UploadOutcome) -> Result<()> {
    outcome.report_path = Some(outcome.report.write(&opts.work_dir, &site.slug)?);
    tracing::info!(
        "Total files uploaded for {}: {} (skipped {}, failed {})",
        site.slug,
        outcome.uploaded.len(),
        outcome.skipped.len(),
        outcome.failed.len()
    );
    if let Some(path) = &opts.github_output {
        crate::util::append_github_output(path, "uploaded_count", outcome.uploaded.len())?;
    }
    Ok(())
}

/// One archive end to end. The key file lives exactly as long as this call.
fn process_archive(
    site: &SiteConfig,
    secrets: &SshSecrets,
    transport: &dyn Transport,
    local: &Path,
    name: &str,
    seq: usize,
) -> Result<u64, UploadError> {
    let key = secrets.materialize_key()?;
    let mut host = transport.open(secrets, key.path())?;
    let job = ImportJob::for_site(site, remote_temp_dir(&site.slug, seq), name);

    let result = transfer_and_import(host.as_mut(), &job, local);
    if let Err(e) = host.remove_dir(&job.temp_dir) {
        if result.is_err() {
            tracing::warn!("cleanup of {} after failure did not succeed: {}", job.temp_dir, e);
        } else {
            tracing::debug!("cleanup of {}: {}", job.temp_dir, e);
        }
    }
    drop(key);
    result
}

fn transfer_and_import(
    host: &mut dyn RemoteHost,
    job: &ImportJob,
    local: &Path,
) -> Result<u64, UploadError> {
    host.make_dir(&job.temp_dir)?;
    host.copy_file(local, &job.archive_path())?;
    tracing::info!("archive copied to {}", job.archive_path());

    let images = count_images(local)?;
    tracing::info!("{} contains {} images", job.archive_name, images);

    let mut script = tempfile::Builder::new()
        .prefix("remote_script_")
        .suffix(".sh")
        .tempfile()
        .map_err(|e| UploadError::CopyFailed(job.script_path(), e.to_string()))?;
    script
        .write_all(job.render().as_bytes())
        .and_then(|_| script.flush())
        .map_err(|e| UploadError::CopyFailed(job.script_path(), e.to_string()))?;
    host.copy_file(script.path(), &job.script_path())?;

    let command = job.run_command();
    let out = host.exec(&command)?;
    for line in out.stdout.lines().filter(|l| !l.trim().is_empty()) {
        tracing::info!("[remote] {}", line);
    }
    for line in out.stderr.lines().filter(|l| !l.trim().is_empty()) {
        tracing::warn!("[remote] {}", line);
    }
    if !out.success() {
        return Err(UploadError::RemoteScriptFailed(job.script_path(), out.status));
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_zip(path: &Path, entries: &[&str]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zw = zip::ZipWriter::new(file);
        let opts = zip::write::SimpleFileOptions::default();
        for e in entries {
            if e.ends_with('/') {
                zw.add_directory(e.trim_end_matches('/'), opts).unwrap();
            } else {
                zw.start_file(*e, opts).unwrap();
                zw.write_all(b"x").unwrap();
            }
        }
        zw.finish().unwrap();
    }

    #[test]
    fn counts_images_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("KTB_1.zip");
        write_zip(&path, &["a.webp", "b.JPG", "c.Png", "d.jpeg", "notes.txt", "pics/", "pics/e.png"]);
        assert_eq!(count_images(&path).unwrap(), 4);
    }

    #[test]
    fn corrupt_archive_is_per_item_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("KTB_bad.zip");
        std::fs::write(&path, b"not a zip").unwrap();
        let err = count_images(&path).unwrap_err();
        assert!(matches!(err, UploadError::ArchiveUnreadable(..)));
        assert!(err.is_per_item());
    }

    #[test]
    fn candidates_filtered_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for n in ["KTB_2.zip", "KTB_1.zip", "AMER_1.zip", "KTB_3.txt", "xKTB.zip"] {
            std::fs::write(dir.path().join(n), "").unwrap();
        }
        std::fs::create_dir(dir.path().join("KTB_dir.zip")).unwrap();
        assert_eq!(candidate_archives(dir.path(), "KTB").unwrap(), ["KTB_1.zip", "KTB_2.zip"]);
    }

    #[test]
    fn temp_dirs_are_distinct_per_sequence() {
        let a = remote_temp_dir("s", 1);
        let b = remote_temp_dir("s", 2);
        assert!(a.starts_with("/tmp/upload_s_"));
        assert_ne!(a, b);
    }
}

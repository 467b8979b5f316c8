use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;

use crate::config::SiteConfig;
use crate::error::ConfigError;

pub const SOURCE_IMAGE_EXTS: [&str; 6] = [".jpg", ".jpeg", ".png", ".webp", ".gif", ".bmp"];

fn is_image(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SOURCE_IMAGE_EXTS.iter().any(|ext| lower.ends_with(ext))
}

/// `{prefix}.{author}.zip`, then `{prefix}.{author}2.zip`, `3`, ... until unused.
pub fn next_archive_path(out_dir: &Path, prefix: &str, author: &str) -> PathBuf {
    let base = format!("{}.{}", prefix, author);
    let mut candidate = out_dir.join(format!("{}.zip", base));
    let mut n = 1;
    while candidate.exists() {
        n += 1;
        candidate = out_dir.join(format!("{}{}.zip", base, n));
    }
    candidate
}

/// Zip every file under `folder` (paths relative to it) into `dest`.
pub fn zip_folder(folder: &Path, dest: &Path) -> Result<usize> {
    let file = File::create(dest).with_context(|| format!("cannot create {}", dest.display()))?;
    let mut writer = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    let mut added = 0;
    for entry in walkdir::WalkDir::new(folder).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let rel = entry.path().strip_prefix(folder)?;
        let name = rel.to_string_lossy().replace('\\', "/");
        if entry.file_type().is_dir() {
            writer.add_directory(name, options)?;
        } else if entry.file_type().is_file() {
            writer.start_file(name, options)?;
            let mut src = File::open(entry.path())?;
            std::io::copy(&mut src, &mut writer)?;
            added += 1;
        }
    }
    writer.finish()?;
    Ok(added)
}

/// Turn each image folder whose name starts with a site prefix into an
/// archive in `out_dir`, deleting the folder once its archive is written.
/// Returns the archives created.
pub fn prepare_archives(
    source_dir: &Path,
    out_dir: &Path,
    sites: &[SiteConfig],
    author: &str,
) -> Result<Vec<PathBuf>> {
    if !source_dir.is_dir() {
        return Err(ConfigError::MissingDirectory(source_dir.to_path_buf()).into());
    }
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("cannot create {}", out_dir.display()))?;

    let mut created = Vec::new();
    for entry in walkdir::WalkDir::new(source_dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let folder_name = entry.file_name().to_string_lossy().to_string();
        let Some(site) = sites.iter().find(|s| folder_name.starts_with(&s.prefix)) else {
            continue;
        };

        let has_image = std::fs::read_dir(entry.path())?
            .filter_map(|e| e.ok())
            .any(|e| e.path().is_file() && is_image(&e.file_name().to_string_lossy()));
        if !has_image {
            tracing::warn!("Skipping {} (no images)", folder_name);
            continue;
        }

        let dest = next_archive_path(out_dir, &site.prefix, author);
        tracing::info!("Zipping {} -> {}", folder_name, dest.display());
        match zip_folder(entry.path(), &dest)
            .and_then(|_| std::fs::remove_dir_all(entry.path()).map_err(anyhow::Error::from))
        {
            Ok(()) => {
                crate::util::print_ok(&format!("Zipped and removed {}", folder_name));
                created.push(dest);
            }
            Err(e) => {
                tracing::error!("Failed to zip {}: {:#}", folder_name, e);
                crate::util::print_err(&format!("Failed to zip {}: {}", folder_name, e));
            }
        }
    }
    tracing::info!("Created {} new archives", created.len());
    Ok(created)
}

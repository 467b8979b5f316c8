// Per-run report files: `{slug}_report.txt`, one `prefix:count` per line.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::{REPORT_SUFFIX, report_file_name};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub prefix: String,
    pub count: u64,
}

impl ReportLine {
    /// Parse `prefix:count`. Blank lines, lines without a colon, an empty
    /// prefix or a non-numeric count yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let (prefix, count) = line.trim().split_once(':')?;
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return None;
        }
        let count = count.trim().parse::<u64>().ok()?;
        Some(Self { prefix: prefix.to_string(), count })
    }

    pub fn render(&self) -> String {
        format!("{}:{}", self.prefix, self.count)
    }
}

/// Counts recorded by one uploader run, in the order they happened.
#[derive(Debug, Default, Clone)]
pub struct RunReport {
    lines: Vec<ReportLine>,
}

impl RunReport {
    pub fn push(&mut self, prefix: &str, count: u64) {
        self.lines.push(ReportLine { prefix: prefix.to_string(), count });
    }

    pub fn lines(&self) -> &[ReportLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn render(&self) -> String {
        self.lines.iter().map(ReportLine::render).collect::<Vec<_>>().join("\n")
    }

    /// Overwrite `{slug}_report.txt` in `dir` with this run's lines.
    pub fn write(&self, dir: &Path, slug: &str) -> Result<PathBuf> {
        let path = dir.join(report_file_name(slug));
        std::fs::write(&path, self.render())
            .with_context(|| format!("cannot write report {}", path.display()))?;
        Ok(path)
    }
}

/// Sum counts per prefix across every line of `text`; malformed lines are skipped.
pub fn accumulate(text: &str, into: &mut BTreeMap<String, u64>) {
    for raw in text.lines() {
        match ReportLine::parse(raw) {
            Some(line) => {
                let total = into.entry(line.prefix).or_insert(0);
                *total = total.saturating_add(line.count);
            }
            None if raw.trim().is_empty() => {}
            None => tracing::warn!("skipping malformed report line: {:?}", raw),
        }
    }
}

/// All `*_report.txt` files directly inside `dir`, sorted by name.
pub fn report_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("cannot list {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().ends_with(REPORT_SUFFIX) {
            out.push(entry.into_path());
        }
    }
    out.sort();
    Ok(out)
}

/// New counts per prefix from every report file in `dir`.
pub fn collect_new_counts(dir: &Path) -> Result<BTreeMap<String, u64>> {
    let mut counts = BTreeMap::new();
    for path in report_files(dir)? {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read report {}", path.display()))?;
        tracing::debug!("reading report {}", path.display());
        accumulate(&text, &mut counts);
    }
    Ok(counts)
}

//! The cumulative log (`upload.log`): a fixed header, a timestamp line, then
//! one `prefix: N images: Total M` row per prefix and a status line.
//!
//! ```text
//! --- Summary of Last Upload ---
//! Timestamp: 2024-01-01 09:15:00 +0700
//!
//! KTB: 4 images: Total 14
//!
//! Upload thành công.
//! ```
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use cli_table::{Cell, CellStruct, Style, Table, format::Justify, print_stdout};
use regex::Regex;

pub const HEADER: &str = "--- Summary of Last Upload ---";
pub const SUCCESS_STATUS: &str = "Upload thành công.";
pub const NO_NEW_FILES_NOTICE: &str = "Upload thất bại hoặc không có file mới.";

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Timestamp: (\d{4}-\d{2}-\d{2})").expect("valid date regex"));
static TOTAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?):.*?Total (\d+)$").expect("valid totals regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalsRow {
    pub prefix: String,
    pub new_count: u64,
    pub total: u64,
}

impl TotalsRow {
    pub fn render(&self) -> String {
        format!("{}: {} images: Total {}", self.prefix, self.new_count, self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryBody {
    /// rows sorted by prefix
    Totals(Vec<TotalsRow>),
    NoNewFiles,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CumulativeLog {
    pub timestamp: String,
    pub body: SummaryBody,
}

impl CumulativeLog {
    pub fn render(&self) -> String {
        let mut out = format!("{}\nTimestamp: {}\n\n", HEADER, self.timestamp);
        match &self.body {
            SummaryBody::Totals(rows) => {
                for row in rows {
                    out.push_str(&row.render());
                    out.push('\n');
                }
                out.push('\n');
                out.push_str(SUCCESS_STATUS);
            }
            SummaryBody::NoNewFiles => out.push_str(NO_NEW_FILES_NOTICE),
        }
        out
    }

    pub fn rows(&self) -> &[TotalsRow] {
        match &self.body {
            SummaryBody::Totals(rows) => rows,
            SummaryBody::NoNewFiles => &[],
        }
    }

    pub fn show_table(&self) -> Result<()> {
        let rows = self.rows();
        if rows.is_empty() {
            println!("{}", NO_NEW_FILES_NOTICE);
            return Ok(());
        }
        let title = vec![
            "Prefix".cell().bold(true),
            "New".cell().bold(true),
            "Total".cell().bold(true),
        ];
        let table: Vec<Vec<CellStruct>> = rows
            .iter()
            .map(|r| {
                vec![
                    r.prefix.as_str().cell(),
                    r.new_count.cell().justify(Justify::Right),
                    r.total.cell().justify(Justify::Right),
                ]
            })
            .collect();
        print_stdout(table.table().title(title)).context("cannot print totals table")?;
        Ok(())
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render())
            .with_context(|| format!("cannot write cumulative log {}", path.display()))
    }
}

/// What survives from the previous cumulative log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviousLog {
    /// `YYYY-MM-DD` from the `Timestamp:` line
    pub date: Option<String>,
    pub totals: BTreeMap<String, u64>,
}

impl PreviousLog {
    pub fn parse(text: &str) -> Self {
        let mut prev = PreviousLog::default();
        for line in text.lines() {
            let line = line.trim_end();
            if let Some(caps) = DATE_RE.captures(line) {
                prev.date = Some(caps[1].to_string());
            }
            if let Some(caps) = TOTAL_RE.captures(line)
                && let Ok(total) = caps[2].parse::<u64>()
            {
                prev.totals.insert(caps[1].trim().to_string(), total);
            }
        }
        prev
    }

    /// A missing file means first run.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read cumulative log {}", path.display()))?;
        Ok(Self::parse(&text))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub log: CumulativeLog,
    /// previous totals were discarded because the stored date is not `today`
    pub reset: bool,
}

/// Merge new counts onto the previous totals. The previous totals are the
/// base only when their date equals `today`; otherwise counting restarts.
pub fn aggregate(
    previous: &PreviousLog,
    new_counts: &BTreeMap<String, u64>,
    today: &str,
    timestamp: String,
) -> Aggregation {
    let reset = previous.date.as_deref() != Some(today);
    let empty = BTreeMap::new();
    let base = if reset { &empty } else { &previous.totals };

    let prefixes: BTreeSet<&String> = base.keys().chain(new_counts.keys()).collect();
    if prefixes.is_empty() {
        return Aggregation {
            log: CumulativeLog { timestamp, body: SummaryBody::NoNewFiles },
            reset,
        };
    }

    let rows = prefixes
        .into_iter()
        .map(|prefix| {
            let new_count = new_counts.get(prefix).copied().unwrap_or(0);
            let total = base.get(prefix).copied().unwrap_or(0).saturating_add(new_count);
            TotalsRow { prefix: prefix.clone(), new_count, total }
        })
        .collect();
    Aggregation { log: CumulativeLog { timestamp, body: SummaryBody::Totals(rows) }, reset }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREV: &str = "--- Summary of Last Upload ---\nTimestamp: 2024-01-01 08:00:00 +0700\n\na: 10 images: Total 10\n\nUpload thành công.";

    fn counts(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn parses_previous_log() {
        let prev = PreviousLog::parse(PREV);
        assert_eq!(prev.date.as_deref(), Some("2024-01-01"));
        assert_eq!(prev.totals, counts(&[("a", 10)]));
    }

    #[test]
    fn new_day_with_nothing_new_is_notice() {
        let prev = PreviousLog::parse(PREV);
        let agg = aggregate(&prev, &BTreeMap::new(), "2024-01-02", "2024-01-02 07:00:00 +0700".into());
        assert!(agg.reset);
        assert_eq!(agg.log.body, SummaryBody::NoNewFiles);
        let text = agg.log.render();
        assert!(text.ends_with(NO_NEW_FILES_NOTICE));
        assert!(!text.contains("Total 10"));
    }

    #[test]
    fn same_day_accumulates() {
        let prev = PreviousLog::parse(PREV);
        let agg = aggregate(&prev, &counts(&[("a", 4)]), "2024-01-01", "ts".into());
        assert!(!agg.reset);
        assert!(agg.log.render().contains("\na: 4 images: Total 14\n"));
    }

    #[test]
    fn new_day_with_uploads_uses_reset_base() {
        let prev = PreviousLog::parse(PREV);
        let agg = aggregate(&prev, &counts(&[("a", 4)]), "2024-01-02", "ts".into());
        assert!(agg.reset);
        assert_eq!(agg.log.rows(), &[TotalsRow { prefix: "a".into(), new_count: 4, total: 4 }]);
    }

    #[test]
    fn carried_totals_without_new_counts_still_listed() {
        let prev = PreviousLog::parse(PREV);
        let agg = aggregate(&prev, &BTreeMap::new(), "2024-01-01", "ts".into());
        assert_eq!(agg.log.rows()[0].render(), "a: 0 images: Total 10");
        assert!(agg.log.render().ends_with(SUCCESS_STATUS));
    }

    #[test]
    fn totals_saturate_at_max() {
        let prev = PreviousLog {
            date: Some("2024-01-01".into()),
            totals: counts(&[("a", u64::MAX - 1)]),
        };
        let agg = aggregate(&prev, &counts(&[("a", 5)]), "2024-01-01", "ts".into());
        assert_eq!(agg.log.rows()[0].total, u64::MAX);
    }

    #[test]
    fn rows_sorted_by_prefix() {
        let agg = aggregate(
            &PreviousLog::default(),
            &counts(&[("zeta", 1), ("Alpha", 2), ("beta", 3)]),
            "2024-01-01",
            "ts".into(),
        );
        let order: Vec<_> = agg.log.rows().iter().map(|r| r.prefix.as_str()).collect();
        assert_eq!(order, ["Alpha", "beta", "zeta"]);
    }

    #[test]
    fn render_then_parse_preserves_totals_and_date() {
        let agg = aggregate(
            &PreviousLog::default(),
            &counts(&[("KTB", 7), ("AMER", 3)]),
            "2024-05-06",
            "2024-05-06 10:11:12 +0700".into(),
        );
        let text = agg.log.render();
        assert_eq!(
            text,
            "--- Summary of Last Upload ---\nTimestamp: 2024-05-06 10:11:12 +0700\n\nAMER: 3 images: Total 3\nKTB: 7 images: Total 7\n\nUpload thành công."
        );
        let back = PreviousLog::parse(&text);
        assert_eq!(back.date.as_deref(), Some("2024-05-06"));
        assert_eq!(back.totals, counts(&[("KTB", 7), ("AMER", 3)]));
    }
}

//! Data models for hunt session analysis.
//!
//! This module contains the core data structures shared by the ingest,
//! aggregation, export and HTTP layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// One of the four fields a session log must carry to be aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RequiredField {
    Vocation,
    Mode,
    Zone,
    Metric,
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequiredField::Vocation => write!(f, "Vocation"),
            RequiredField::Mode => write!(f, "Mode"),
            RequiredField::Zone => write!(f, "Zone"),
            RequiredField::Metric => write!(f, "Metric"),
        }
    }
}

/// Where a record came from: the uploaded file and its 1-based position in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub file: String,
    pub entry: usize,
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.file, self.entry)
    }
}

/// A complete session record, eligible for aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub vocation: String,
    pub mode: String,
    pub zone: String,
    pub metric: f64,
    pub source: SourceRef,
}

/// A session log that failed the completeness check.
///
/// Carries whatever identifying metadata it did have so the pending panel
/// can show the user which hunt needs attention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRecord {
    pub source: SourceRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    /// Required fields that were absent, null or blank.
    pub missing: Vec<RequiredField>,
    /// Required fields that were present but unusable (e.g. a non-numeric metric).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalid: Vec<RequiredField>,
    /// The session object as uploaded, re-checked when the user fills in gaps.
    #[serde(skip)]
    pub raw: Map<String, Value>,
}

impl PendingRecord {
    /// Human-readable list of problems, e.g. `missing Mode, Zone; invalid Metric`.
    pub fn problems(&self) -> String {
        let join = |fields: &[RequiredField]| {
            fields
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing {}", join(&self.missing)));
        }
        if !self.invalid.is_empty() {
            parts.push(format!("invalid {}", join(&self.invalid)));
        }
        parts.join("; ")
    }
}

/// Values a user supplies for a pending hunt. Blank values are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PendingFix {
    pub vocation: Option<String>,
    pub mode: Option<String>,
    pub zone: Option<String>,
    pub metric: Option<String>,
}

/// What became of a pending hunt after a fix was applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PendingResolution {
    /// Complete now; moved into the aggregation pool.
    Resolved { record: Record },
    /// Still incomplete; the entry was updated in place.
    Pending { pending: PendingRecord },
}

/// The active Vocation/Mode filter pair. Both must match exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    pub vocation: String,
    pub mode: String,
}

impl FilterSelection {
    pub fn new(vocation: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            vocation: vocation.into(),
            mode: mode.into(),
        }
    }

    /// Whether a record passes both filters.
    pub fn matches(&self, record: &Record) -> bool {
        record.vocation == self.vocation && record.mode == self.mode
    }
}

impl fmt::Display for FilterSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.vocation, self.mode)
    }
}

/// Distinct filter values observed among complete records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub vocations: Vec<String>,
    pub modes: Vec<String>,
}

/// Mean metric for one zone under the active filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationRow {
    pub zone: String,
    pub average: f64,
    /// Number of hunts averaged.
    pub count: usize,
}

/// Display ordering for aggregation rows.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Zone name, ascending (default)
    #[default]
    Zone,
    /// Average, highest first
    Average,
    /// Hunt count, highest first
    Count,
}

impl SortKey {
    pub const ALL: [SortKey; 3] = [SortKey::Zone, SortKey::Average, SortKey::Count];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Zone => "zone",
            SortKey::Average => "average",
            SortKey::Count => "count",
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortKey::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown sort key: {}", s))
    }
}

/// How a single uploaded file was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Accepted,
    Duplicate,
    Rejected,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Accepted => write!(f, "accepted"),
            FileStatus::Duplicate => write!(f, "duplicate"),
            FileStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Per-file ingest outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub file: String,
    pub status: FileStatus,
    /// Complete records added to the aggregation pool.
    pub records: usize,
    /// Records routed to the pending set.
    pub pending: usize,
    /// Array entries or JSON lines that were not objects or did not parse.
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn rejected(file: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            status: FileStatus::Rejected,
            records: 0,
            pending: 0,
            skipped: 0,
            error: Some(error.into()),
        }
    }

    pub fn duplicate(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            status: FileStatus::Duplicate,
            records: 0,
            pending: 0,
            skipped: 0,
            error: None,
        }
    }
}

/// Outcome of one upload batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub files: Vec<FileOutcome>,
}

impl IngestReport {
    pub fn count(&self, status: FileStatus) -> usize {
        self.files.iter().filter(|f| f.status == status).count()
    }

    pub fn total_records(&self) -> usize {
        self.files.iter().map(|f| f.records).sum()
    }

    pub fn total_pending(&self) -> usize {
        self.files.iter().map(|f| f.pending).sum()
    }

    pub fn rejected(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files
            .iter()
            .filter(|f| f.status == FileStatus::Rejected)
    }
}

/// Records held for one session or one command-line run.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<Record>,
    pub pending: Vec<PendingRecord>,
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.pending.clear();
    }
}

/// Metadata about a generated zone report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub files_read: usize,
    pub files_rejected: usize,
    pub records: usize,
    pub pending: usize,
    pub duration_seconds: f64,
}

/// The complete zone averages report produced by the `report` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneReport {
    pub metadata: ReportMetadata,
    pub filter: FilterSelection,
    pub rows: Vec<AggregationRow>,
    pub pending: Vec<PendingRecord>,
    pub files: Vec<FileOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(vocation: &str, mode: &str) -> Record {
        Record {
            vocation: vocation.to_string(),
            mode: mode.to_string(),
            zone: "Cave".to_string(),
            metric: 1.0,
            source: SourceRef {
                file: "a.json".to_string(),
                entry: 1,
            },
        }
    }

    #[test]
    fn test_filter_matches_exactly() {
        let filter = FilterSelection::new("Knight", "Hunting");
        assert!(filter.matches(&record("Knight", "Hunting")));
        assert!(!filter.matches(&record("knight", "Hunting")));
        assert!(!filter.matches(&record("Knight", "Solo")));
        assert!(!filter.matches(&record("Mage", "Hunting")));
    }

    #[test]
    fn test_pending_problems() {
        let pending = PendingRecord {
            source: SourceRef {
                file: "a.json".to_string(),
                entry: 2,
            },
            vocation: Some("Knight".to_string()),
            mode: None,
            zone: None,
            missing: vec![RequiredField::Mode, RequiredField::Zone],
            invalid: vec![RequiredField::Metric],
            raw: Map::new(),
        };
        assert_eq!(pending.problems(), "missing Mode, Zone; invalid Metric");
        assert_eq!(pending.source.to_string(), "a.json #2");
    }

    #[test]
    fn test_ingest_report_totals() {
        let report = IngestReport {
            files: vec![
                FileOutcome {
                    file: "a.json".to_string(),
                    status: FileStatus::Accepted,
                    records: 3,
                    pending: 1,
                    skipped: 0,
                    error: None,
                },
                FileOutcome::duplicate("a-copy.json"),
                FileOutcome::rejected("broken.json", "invalid JSON"),
            ],
        };
        assert_eq!(report.total_records(), 3);
        assert_eq!(report.total_pending(), 1);
        assert_eq!(report.count(FileStatus::Duplicate), 1);
        assert_eq!(report.rejected().count(), 1);
    }

    #[test]
    fn test_sort_key_serde() {
        let key: SortKey = serde_json::from_str("\"average\"").unwrap();
        assert_eq!(key, SortKey::Average);
        assert_eq!(SortKey::default(), SortKey::Zone);
    }

    #[test]
    fn test_sort_key_from_str() {
        assert_eq!("count".parse::<SortKey>(), Ok(SortKey::Count));
        assert_eq!(" Average ".parse::<SortKey>(), Ok(SortKey::Average));
        assert!("bogus".parse::<SortKey>().is_err());
        assert!("".parse::<SortKey>().is_err());
    }
}

//! Session log ingestion.
//!
//! Turns uploaded file contents into complete records and pending entries.
//! A file that cannot be read as JSON is rejected on its own; it never
//! aborts the rest of the batch.

pub mod fields;

pub use fields::FieldAliases;

use crate::error::IngestError;
use crate::models::{
    Dataset, FileOutcome, FileStatus, IngestReport, PendingFix, PendingRecord, Record, SourceRef,
};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Raw session objects extracted from one document.
#[derive(Debug, Default)]
struct Entries {
    objects: Vec<Map<String, Value>>,
    skipped: usize,
}

/// Stateful ingestor for one session (or one command-line run).
///
/// Remembers the content hash of every file it accepted so that uploading
/// the same log twice does not double-count it.
#[derive(Debug)]
pub struct Ingestor {
    aliases: Arc<FieldAliases>,
    seen: HashSet<String>,
}

impl Ingestor {
    pub fn new(aliases: Arc<FieldAliases>) -> Self {
        Self {
            aliases,
            seen: HashSet::new(),
        }
    }

    /// Forget every file hash seen so far.
    pub fn reset(&mut self) {
        self.seen.clear();
    }

    /// Ingest a batch of `(file name, contents)` pairs into `dataset`.
    pub fn ingest_batch<I>(&mut self, files: I, dataset: &mut Dataset) -> IngestReport
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        let files = files
            .into_iter()
            .map(|(name, bytes)| self.ingest_file(&name, &bytes, dataset))
            .collect();

        IngestReport { files }
    }

    /// Fill the gaps of a pending entry with user-supplied values and check
    /// it again. Each value is stored under the first alias of its field, so
    /// it takes precedence over whatever the upload carried.
    pub fn resolve(&self, pending: &PendingRecord, fix: &PendingFix) -> Result<Record, PendingRecord> {
        let mut object = pending.raw.clone();
        let supplied = [
            (&self.aliases.vocation, &fix.vocation),
            (&self.aliases.mode, &fix.mode),
            (&self.aliases.zone, &fix.zone),
            (&self.aliases.metric, &fix.metric),
        ];

        for (keys, value) in supplied {
            let value = value.as_deref().map(str::trim).filter(|v| !v.is_empty());
            if let (Some(key), Some(value)) = (keys.first(), value) {
                object.insert(key.clone(), Value::String(value.to_string()));
            }
        }

        fields::classify(&object, &self.aliases, pending.source.clone())
    }

    /// Ingest a single file into `dataset`.
    pub fn ingest_file(&mut self, name: &str, bytes: &[u8], dataset: &mut Dataset) -> FileOutcome {
        let hash = content_hash(bytes);
        if self.seen.contains(&hash) {
            debug!("Skipping duplicate upload: {}", name);
            return FileOutcome::duplicate(name);
        }

        let entries = match parse_document(bytes) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Rejected {}: {}", name, e);
                return FileOutcome::rejected(name, e.to_string());
            }
        };
        self.seen.insert(hash);

        let mut outcome = FileOutcome {
            file: name.to_string(),
            status: FileStatus::Accepted,
            records: 0,
            pending: 0,
            skipped: entries.skipped,
            error: None,
        };

        for (index, object) in entries.objects.iter().enumerate() {
            let source = SourceRef {
                file: name.to_string(),
                entry: index + 1,
            };
            match fields::classify(object, &self.aliases, source) {
                Ok(record) => {
                    outcome.records += 1;
                    dataset.records.push(record);
                }
                Err(pending) => {
                    debug!("Pending {}: {}", pending.source, pending.problems());
                    outcome.pending += 1;
                    dataset.pending.push(pending);
                }
            }
        }

        debug!(
            "Ingested {}: {} records, {} pending, {} skipped",
            name, outcome.records, outcome.pending, outcome.skipped
        );

        outcome
    }
}

fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Parse a document into raw session objects.
///
/// Accepts a single object, an array of objects, an object wrapping a
/// `hunts` array, or JSON Lines.
fn parse_document(bytes: &[u8]) -> Result<Entries, IngestError> {
    let text = std::str::from_utf8(bytes)?;
    let text = text.trim_start_matches('\u{feff}');

    if text.trim().is_empty() {
        return Err(IngestError::Empty);
    }

    match serde_json::from_str::<Value>(text) {
        Ok(value) => entries_from_value(value),
        Err(e) => parse_json_lines(text).ok_or(IngestError::Json(e)),
    }
}

fn entries_from_value(value: Value) -> Result<Entries, IngestError> {
    let mut entries = Entries::default();

    let items = match value {
        Value::Object(mut object) => match object.remove("hunts") {
            Some(Value::Array(hunts)) => hunts,
            Some(other) => {
                object.insert("hunts".to_string(), other);
                vec![Value::Object(object)]
            }
            None => vec![Value::Object(object)],
        },
        Value::Array(items) => items,
        Value::Null => return Err(IngestError::UnsupportedShape("null")),
        Value::Bool(_) => return Err(IngestError::UnsupportedShape("boolean")),
        Value::Number(_) => return Err(IngestError::UnsupportedShape("number")),
        Value::String(_) => return Err(IngestError::UnsupportedShape("string")),
    };

    for item in items {
        match item {
            Value::Object(object) => entries.objects.push(object),
            _ => entries.skipped += 1,
        }
    }

    Ok(entries)
}

/// Returns `None` when not a single line holds a JSON object.
fn parse_json_lines(text: &str) -> Option<Entries> {
    let mut entries = Entries::default();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(object)) => entries.objects.push(object),
            _ => entries.skipped += 1,
        }
    }

    if entries.objects.is_empty() {
        None
    } else {
        Some(entries)
    }
}

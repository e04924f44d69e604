//! Import planning: content-hash delta detection and run summaries.
//!
//! Pure logic, decoupled from I/O. The CLI reads the export file, the
//! repository supplies stored hashes keyed by wine id, and this module
//! decides what to write.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

use crate::error::AppError;
use crate::models::{WineId, WineRecord};

/// Stored content hashes by wine id. `None` marks a document edited since
/// its hash was last recorded.
pub type StoredHashes = HashMap<WineId, Option<String>>;

/// Outcome of importing a single wine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// No stored wine has this id
    Created,
    /// Stored wine differs, or its content is unknown
    Replaced,
    /// Content hash matches the stored one; nothing written
    Unchanged,
    /// The write failed
    Failed,
}

/// One normalized wine and what the import will do with it.
#[derive(Debug, Clone)]
pub struct PlannedImport {
    pub record: WineRecord,
    pub hash: String,
    pub outcome: ImportOutcome,
}

impl PlannedImport {
    pub fn id(&self) -> &WineId {
        &self.record.id
    }

    pub fn needs_write(&self) -> bool {
        matches!(
            self.outcome,
            ImportOutcome::Created | ImportOutcome::Replaced
        )
    }
}

/// Compares a record against the stored hash for its id.
pub fn plan_import(record: WineRecord, stored: &StoredHashes) -> PlannedImport {
    let hash = content_hash(&record);
    let outcome = match stored.get(&record.id) {
        None => ImportOutcome::Created,
        Some(Some(existing)) if *existing == hash => ImportOutcome::Unchanged,
        Some(_) => ImportOutcome::Replaced,
    };
    PlannedImport {
        record,
        hash,
        outcome,
    }
}

/// Counts per outcome for an import run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.created + self.replaced + self.unchanged + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl FromIterator<ImportOutcome> for ImportSummary {
    fn from_iter<I: IntoIterator<Item = ImportOutcome>>(outcomes: I) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match outcome {
                ImportOutcome::Created => summary.created += 1,
                ImportOutcome::Replaced => summary.replaced += 1,
                ImportOutcome::Unchanged => summary.unchanged += 1,
                ImportOutcome::Failed => summary.failed += 1,
            }
        }
        summary
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} replaced, {} unchanged, {} failed out of {} total",
            self.created,
            self.replaced,
            self.unchanged,
            self.failed,
            self.total()
        )
    }
}

/// SHA-256 over the user-visible content of a record.
///
/// Timestamps and the id are excluded so re-importing an export is a no-op.
pub fn content_hash(record: &WineRecord) -> String {
    let vintage = record.vintage.to_string();
    let public_rating = record.public_rating.to_string();
    let review_count = record.review_count.to_string();
    let price = record.price.to_string();
    let rating = record.rating.to_string();

    let fields: [&str; 14] = [
        &record.name,
        &vintage,
        &record.varietal,
        &record.country,
        &record.description,
        &record.image_url,
        &public_rating,
        &review_count,
        &record.rating_source,
        &price,
        &rating,
        &record.notes,
        record.wine_type.as_str(),
        if record.in_cellar { "1" } else { "0" },
    ];

    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update(field.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Reads documents from a JSON array or JSON Lines text.
pub fn parse_import_documents(text: &str) -> Result<Vec<Value>, AppError> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        let documents: Vec<Value> = serde_json::from_str(trimmed)?;
        return Ok(documents);
    }

    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(AppError::from))
        .collect()
}

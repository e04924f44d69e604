//! Persistence collaborator seam.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::AppError;
use crate::models::{RawDocument, WineId, WinePatch, WineRecord, SCHEMA_VERSION};

/// Durable document store behind the journal.
pub trait WinePersistence {
    /// Returns every stored document, possibly incomplete.
    fn load_all(&self) -> impl Future<Output = Result<Vec<RawDocument>, AppError>> + Send;

    /// Stores a new record and returns the id it was stored under.
    fn create(&self, record: &WineRecord)
        -> impl Future<Output = Result<WineId, AppError>> + Send;

    /// Merges `patch` into the stored document, sets `lastUpdated` and marks
    /// the document with the current `schemaVersion`.
    fn update(
        &self,
        id: &WineId,
        patch: &WinePatch,
        last_updated: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn delete(&self, id: &WineId) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Document store kept in process memory.
///
/// Writes can be made to fail with [`InMemoryPersistence::set_fail_writes`]
/// to exercise the optimistic-update path.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    documents: Mutex<Vec<RawDocument>>,
    fail_writes: AtomicBool,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store. Documents without a creation time are stamped with
    /// the current time, as a database default would.
    pub fn with_documents(documents: Vec<RawDocument>) -> Self {
        let now = Utc::now();
        let documents = documents
            .into_iter()
            .map(|doc| RawDocument {
                created_at: doc.created_at.or(Some(now)),
                ..doc
            })
            .collect();
        Self {
            documents: Mutex::new(documents),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Copy of the stored documents.
    pub fn documents(&self) -> Vec<RawDocument> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RawDocument>> {
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(AppError::NetworkError("store unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl WinePersistence for InMemoryPersistence {
    async fn load_all(&self) -> Result<Vec<RawDocument>, AppError> {
        Ok(self.documents())
    }

    async fn create(&self, record: &WineRecord) -> Result<WineId, AppError> {
        self.check_writable()?;
        let data = serde_json::to_value(record)?;
        self.lock().push(RawDocument {
            id: record.id.to_string(),
            data,
            created_at: Some(Utc::now()),
        });
        Ok(record.id.clone())
    }

    async fn update(
        &self,
        id: &WineId,
        patch: &WinePatch,
        last_updated: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.check_writable()?;
        let changes = serde_json::to_value(patch)?;
        let mut documents = self.lock();
        let document = documents
            .iter_mut()
            .find(|d| d.id == id.as_str())
            .ok_or_else(|| AppError::WineNotFound(id.to_string()))?;

        if let (Some(target), Some(changes)) = (document.data.as_object_mut(), changes.as_object())
        {
            for (key, value) in changes {
                target.insert(key.clone(), value.clone());
            }
            target.insert("lastUpdated".to_string(), serde_json::to_value(last_updated)?);
            target.insert("schemaVersion".to_string(), SCHEMA_VERSION.into());
        }
        Ok(())
    }

    async fn delete(&self, id: &WineId) -> Result<(), AppError> {
        self.check_writable()?;
        self.lock().retain(|d| d.id != id.as_str());
        Ok(())
    }
}

//! Journal service: the collection store plus its persistence collaborator.
//!
//! Writes are optimistic. The in-memory collection changes first and the
//! remote write follows; if the remote write fails the caller gets
//! `PersistenceFailure` and the in-memory change stays. Memory and store can
//! therefore disagree until the next successful write or reload.

use chrono::Utc;
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::{PersonalEntry, ResearchedData, WineId, WinePatch, WineRecord};
use crate::persistence::WinePersistence;
use crate::store::CollectionStore;

pub struct Journal<P> {
    store: CollectionStore,
    persistence: P,
}

impl<P: WinePersistence> Journal<P> {
    pub fn new(persistence: P) -> Self {
        Self {
            store: CollectionStore::new(),
            persistence,
        }
    }

    pub fn store(&self) -> &CollectionStore {
        &self.store
    }

    pub fn records(&self) -> &[WineRecord] {
        self.store.records()
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    /// Seeds the collection from every stored document.
    pub async fn load(&mut self) -> Result<usize, AppError> {
        let documents = self.persistence.load_all().await?;
        let now = Utc::now();
        let records = documents
            .iter()
            .map(|doc| doc.to_record(now))
            .collect();

        let kept = self.store.replace_all(records);
        info!("Loaded {} wines ({} documents)", kept, documents.len());
        Ok(kept)
    }

    /// Confirms a draft into a new record and stores it.
    ///
    /// On `PersistenceFailure` the record is still in the collection under its
    /// local id. That includes the case where the store assigned an id that is
    /// already taken locally.
    pub async fn add(
        &mut self,
        draft: ResearchedData,
        personal: PersonalEntry,
    ) -> Result<WineId, AppError> {
        let record = WineRecord::from_draft(WineId::generate(), draft, personal, Utc::now());
        let local_id = record.id.clone();
        self.store.insert(record.clone())?;

        match self.persistence.create(&record).await {
            Ok(remote_id) => {
                if remote_id != local_id {
                    // The remote document exists either way; a failed rekey
                    // leaves memory and store disagreeing on the id.
                    if let Err(e) = self.store.rekey(&local_id, remote_id.clone()) {
                        return Err(self.persistence_failure(&local_id, e));
                    }
                }
                info!("Added wine '{}' ({})", record.name, remote_id);
                Ok(remote_id)
            }
            Err(e) => Err(self.persistence_failure(&local_id, e)),
        }
    }

    /// Applies `patch` to the record with `id`.
    ///
    /// # Errors
    ///
    /// `WineNotFound` before anything changes; `PersistenceFailure` after the
    /// in-memory update.
    pub async fn update(&mut self, id: &WineId, patch: &WinePatch) -> Result<(), AppError> {
        let now = Utc::now();
        let rating = self.store.update(id, patch, now)?.rating;

        // The stored document is rewritten at the current schema version, so
        // a legacy rating must be sent on the current scale too.
        let stored = WinePatch {
            rating: Some(rating),
            ..patch.clone()
        };
        self.persistence
            .update(id, &stored, now)
            .await
            .map_err(|e| self.persistence_failure(id, e))
    }

    /// Removes the record with `id`. Unknown ids are a no-op.
    pub async fn delete(&mut self, id: &WineId) -> Result<Option<WineRecord>, AppError> {
        let Some(removed) = self.store.delete(id) else {
            return Ok(None);
        };

        match self.persistence.delete(id).await {
            Ok(()) => Ok(Some(removed)),
            Err(e) => Err(self.persistence_failure(id, e)),
        }
    }

    fn persistence_failure(&self, id: &WineId, cause: AppError) -> AppError {
        warn!(
            "Write for wine {} failed, keeping in-memory change: {}",
            id, cause
        );
        AppError::PersistenceFailure {
            id: id.to_string(),
            reason: cause.to_string(),
        }
    }
}

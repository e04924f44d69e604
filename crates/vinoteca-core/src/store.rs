//! In-memory collection of wine records.
//!
//! [`CollectionStore`] is the single owner of the session's records. Other
//! components read snapshots through [`CollectionStore::records`] and mutate
//! only through the methods here.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::warn;

use crate::error::AppError;
use crate::models::{WineId, WinePatch, WineRecord};
use crate::normalize;

/// Ordered set of records, newest insert first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionStore {
    records: Vec<WineRecord>,
}

impl CollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole collection in one step.
    ///
    /// Later duplicates of an id are dropped so ids stay unique. Returns the
    /// number of records kept.
    pub fn replace_all(&mut self, records: Vec<WineRecord>) -> usize {
        let mut seen = HashSet::with_capacity(records.len());
        let mut kept = Vec::with_capacity(records.len());

        for record in records {
            if seen.insert(record.id.clone()) {
                kept.push(record);
            } else {
                warn!("Dropping duplicate wine id {} during load", record.id);
            }
        }

        self.records = kept;
        self.records.len()
    }

    /// Adds a record at the head of the collection.
    ///
    /// # Errors
    ///
    /// `DuplicateWine` if the id is already present.
    pub fn insert(&mut self, record: WineRecord) -> Result<(), AppError> {
        if self.contains(&record.id) {
            return Err(AppError::DuplicateWine(record.id.to_string()));
        }
        self.records.insert(0, record);
        Ok(())
    }

    /// Merges `patch` onto the record with `id` and refreshes `last_updated`.
    ///
    /// # Errors
    ///
    /// `WineNotFound` if no record has this id.
    pub fn update(
        &mut self,
        id: &WineId,
        patch: &WinePatch,
        now: DateTime<Utc>,
    ) -> Result<&WineRecord, AppError> {
        let record = self
            .records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| AppError::WineNotFound(id.to_string()))?;

        normalize::apply_patch(record, patch, now);
        Ok(record)
    }

    /// Removes the record with `id`. Unknown ids are a no-op.
    pub fn delete(&mut self, id: &WineId) -> Option<WineRecord> {
        let index = self.records.iter().position(|r| &r.id == id)?;
        Some(self.records.remove(index))
    }

    /// Changes a record's id in place, keeping its position.
    ///
    /// Used when the store assigns a different id than the local one.
    pub fn rekey(&mut self, from: &WineId, to: WineId) -> Result<(), AppError> {
        if from == &to {
            return Ok(());
        }
        if self.contains(&to) {
            return Err(AppError::DuplicateWine(to.to_string()));
        }
        let record = self
            .records
            .iter_mut()
            .find(|r| &r.id == from)
            .ok_or_else(|| AppError::WineNotFound(from.to_string()))?;
        record.id = to;
        Ok(())
    }

    pub fn get(&self, id: &WineId) -> Option<&WineRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    pub fn contains(&self, id: &WineId) -> bool {
        self.get(id).is_some()
    }

    /// Read snapshot in collection order.
    pub fn records(&self) -> &[WineRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PersonalEntry, ResearchedData};
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn wine(id: &str, name: &str, day: u32) -> WineRecord {
        WineRecord::from_draft(
            WineId::new(id),
            ResearchedData::manual(name),
            PersonalEntry::default(),
            at(day),
        )
    }

    fn seeded() -> CollectionStore {
        let mut store = CollectionStore::new();
        store.replace_all(vec![wine("a", "Chablis", 1), wine("b", "Malbec", 2)]);
        store
    }

    #[test]
    fn test_replace_all_drops_duplicate_ids() {
        let mut store = CollectionStore::new();
        let kept = store.replace_all(vec![
            wine("a", "First", 1),
            wine("a", "Second", 2),
            wine("b", "Third", 3),
        ]);
        assert_eq!(kept, 2);
        assert_eq!(store.get(&WineId::new("a")).unwrap().name, "First");
    }

    #[test]
    fn test_replace_all_discards_previous_records() {
        let mut store = seeded();
        store.replace_all(vec![wine("z", "Zinfandel", 9)]);
        assert_eq!(store.len(), 1);
        assert!(!store.contains(&WineId::new("a")));
    }

    #[test]
    fn test_insert_goes_to_head() {
        let mut store = seeded();
        store.insert(wine("c", "Rioja", 3)).unwrap();
        assert_eq!(store.records()[0].id, WineId::new("c"));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_insert_duplicate_is_rejected() {
        let mut store = seeded();
        let result = store.insert(wine("a", "Again", 5));
        assert!(matches!(result, Err(AppError::DuplicateWine(_))));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_update_merges_patch() {
        let mut store = seeded();
        let patch = WinePatch {
            notes: Some("flinty".to_string()),
            in_cellar: Some(true),
            ..WinePatch::default()
        };
        let updated = store.update(&WineId::new("a"), &patch, at(20)).unwrap();
        assert_eq!(updated.notes, "flinty");
        assert!(updated.in_cellar);
        assert_eq!(updated.name, "Chablis");
        assert_eq!(updated.date_added, at(1));
        assert_eq!(updated.last_updated, at(20));
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let mut store = seeded();
        let result = store.update(&WineId::new("nope"), &WinePatch::default(), at(3));
        assert!(matches!(result, Err(AppError::WineNotFound(_))));
    }

    #[test]
    fn test_delete_nonexistent_is_noop() {
        let mut store = seeded();
        let before = store.clone();
        assert!(store.delete(&WineId::new("ghost")).is_none());
        assert_eq!(store, before);
    }

    #[test]
    fn test_insert_then_delete_restores_state() {
        let mut store = seeded();
        let before = store.clone();
        store.insert(wine("new", "Barolo", 4)).unwrap();
        let removed = store.delete(&WineId::new("new")).unwrap();
        assert_eq!(removed.name, "Barolo");
        assert_eq!(store, before);
    }

    #[test]
    fn test_rekey_keeps_position() {
        let mut store = seeded();
        store.rekey(&WineId::new("b"), WineId::new("remote-b")).unwrap();
        assert_eq!(store.records()[1].id, WineId::new("remote-b"));
        assert!(matches!(
            store.rekey(&WineId::new("a"), WineId::new("remote-b")),
            Err(AppError::DuplicateWine(_))
        ));
    }
}

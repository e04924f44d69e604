//! Vinoteca DB - PostgreSQL persistence for wine documents.
//!
//! [`WineRepository`] implements `vinoteca_core::WinePersistence` and adds
//! the statistics, hash lookup and bulk upsert used by the CLI.

pub mod repository;

pub use repository::WineRepository;

//! Vinoteca Core - Domain types, normalization, querying and error handling.

pub mod config;
pub mod error;
pub mod flow;
pub mod import;
pub mod journal;
pub mod models;
pub mod normalize;
pub mod persistence;
pub mod query;
pub mod recommend;
pub mod research;
pub mod store;

pub use config::{
    default_config_path, load_journal_config, DbConfig, HttpConfig, JournalConfig,
    ResearchConfig,
};
pub use error::AppError;
pub use flow::{FlowState, ResearchFlow, ResearchTicket, SaveRequest};
pub use import::{
    content_hash, parse_import_documents, plan_import, ImportOutcome, ImportSummary,
    PlannedImport, StoredHashes,
};
pub use journal::Journal;
pub use models::{
    JournalStats, PersonalEntry, RawDocument, ResearchedData, WineId, WinePatch, WineRecord,
    WineType, PLACEHOLDER_IMAGE_URL, SCHEMA_VERSION,
};
pub use persistence::{InMemoryPersistence, WinePersistence};
pub use query::{filter_wines, CellarFilter, FilterOptions, SortOption, TypeFilter, WineQuery};
pub use recommend::RecommendationContext;
pub use research::{parse_research_response, ResearchService, WineResearcher};
pub use store::CollectionStore;

//! Wine document repository for PostgreSQL.
//!
//! Each wine is one row: the id in its own column and the camelCase record
//! as JSONB. Documents written by older versions of the journal may lack
//! fields; they are normalized on load, not here.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Pool, Postgres};
use tracing::debug;

use vinoteca_core::error::AppError;
use vinoteca_core::import::StoredHashes;
use vinoteca_core::models::{
    JournalStats, RawDocument, WineId, WinePatch, WineRecord, SCHEMA_VERSION,
};
use vinoteca_core::persistence::WinePersistence;

/// Repository for wine documents in PostgreSQL.
///
/// # Examples
///
/// ```no_run
/// use sqlx::postgres::PgPoolOptions;
/// use vinoteca_db::WineRepository;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PgPoolOptions::new()
///     .max_connections(5)
///     .connect("postgresql://localhost/vinoteca")
///     .await?;
///
/// let repo = WineRepository::new(pool);
/// repo.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WineRepository {
    pool: Pool<Postgres>,
}

impl WineRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the `wines` table if it does not exist.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wines (
                id TEXT PRIMARY KEY,
                data JSONB NOT NULL,
                content_hash TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS wines_created_at_idx ON wines (created_at DESC)")
            .execute(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(())
    }

    /// Inserts or replaces a whole document, recording its content hash.
    pub async fn upsert_document(&self, record: &WineRecord, hash: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO wines (id, data, content_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT (id)
            DO UPDATE SET
                data = EXCLUDED.data,
                content_hash = EXCLUDED.content_hash,
                updated_at = NOW()
            "#,
        )
        .bind(record.id.as_str())
        .bind(Json(record_document(record)?))
        .bind(hash)
        .execute(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(())
    }

    /// Returns the stored content hash of every wine, keyed by id.
    pub async fn get_hashes(&self) -> Result<StoredHashes, AppError> {
        let rows: Vec<HashRow> = sqlx::query_as("SELECT id, content_hash FROM wines")
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(rows
            .into_iter()
            .map(|row| (WineId::new(row.id), row.content_hash))
            .collect())
    }

    /// Lists stored documents, newest first.
    pub async fn list_all(&self, limit: Option<usize>) -> Result<Vec<RawDocument>, AppError> {
        let limit_val = limit.map(|l| l as i64).unwrap_or(i64::MAX);

        let rows: Vec<DocumentRow> = sqlx::query_as(
            "SELECT id, data, created_at FROM wines ORDER BY created_at DESC, id LIMIT $1",
        )
        .bind(limit_val)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(rows.into_iter().map(RawDocument::from).collect())
    }

    /// Returns aggregated journal statistics.
    ///
    /// Computed from the JSONB fields; values with the wrong JSON type count
    /// as absent.
    pub async fn get_stats(&self) -> Result<JournalStats, AppError> {
        let row: StatsRow = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE data->'inCellar' = 'true'::jsonb) AS in_cellar,
                COUNT(*) FILTER (
                    WHERE jsonb_typeof(data->'rating') = 'number'
                      AND (data->>'rating')::float8 > 0
                ) AS rated,
                COUNT(DISTINCT NULLIF(TRIM(data->>'country'), '')) AS countries,
                MAX(updated_at) AS last_update
            FROM wines
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(JournalStats {
            total_wines: row.total.unwrap_or(0),
            in_cellar: row.in_cellar.unwrap_or(0),
            rated: row.rated.unwrap_or(0),
            countries: row.countries.unwrap_or(0),
            last_update: row.last_update,
        })
    }
}

impl WinePersistence for WineRepository {
    async fn load_all(&self) -> Result<Vec<RawDocument>, AppError> {
        self.list_all(None).await
    }

    async fn create(&self, record: &WineRecord) -> Result<WineId, AppError> {
        let data = record_document(record)?;
        let hash = vinoteca_core::import::content_hash(record);

        let rec: (String,) = sqlx::query_as(
            "INSERT INTO wines (id, data, content_hash) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(record.id.as_str())
        .bind(Json(data))
        .bind(hash)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(WineId::new(rec.0))
    }

    async fn update(
        &self,
        id: &WineId,
        patch: &WinePatch,
        last_updated: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let data = patch_document(patch, last_updated)?;

        // The stored hash no longer describes the merged document.
        let result = sqlx::query(
            r#"
            UPDATE wines
            SET data = data || $2::jsonb,
                content_hash = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .bind(Json(data))
        .execute(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        if result.rows_affected() == 0 {
            return Err(AppError::WineNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: &WineId) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM wines WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        debug!("Deleted {} row(s) for wine {}", result.rows_affected(), id);
        Ok(())
    }
}

/// Stored form of a record. The id lives in its own column.
fn record_document(record: &WineRecord) -> Result<Value, AppError> {
    let mut data = serde_json::to_value(record)?;
    if let Value::Object(map) = &mut data {
        map.remove("id");
    }
    Ok(data)
}

/// JSON object merged into a stored document on update.
fn patch_document(patch: &WinePatch, last_updated: DateTime<Utc>) -> Result<Value, AppError> {
    let mut data = serde_json::to_value(patch)?;
    if let Value::Object(map) = &mut data {
        map.insert(
            "lastUpdated".to_string(),
            serde_json::to_value(last_updated)?,
        );
        map.insert("schemaVersion".to_string(), SCHEMA_VERSION.into());
    }
    Ok(data)
}

/// Helper struct for deserializing document rows
#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    data: Json<Value>,
    created_at: DateTime<Utc>,
}

impl From<DocumentRow> for RawDocument {
    fn from(row: DocumentRow) -> Self {
        RawDocument {
            id: row.id,
            data: row.data.0,
            created_at: Some(row.created_at),
        }
    }
}

/// Helper struct for deserializing stats query results
#[derive(sqlx::FromRow)]
struct StatsRow {
    total: Option<i64>,
    in_cellar: Option<i64>,
    rated: Option<i64>,
    countries: Option<i64>,
    last_update: Option<DateTime<Utc>>,
}

/// Helper struct for deserializing hash lookup query results
#[derive(sqlx::FromRow)]
struct HashRow {
    id: String,
    content_hash: Option<String>,
}

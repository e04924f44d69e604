//! Wine journal domain types.
//!
//! [`WineRecord`] is the canonical entity and its camelCase JSON form is the
//! persistence and interchange schema. [`ResearchedData`] is an unconfirmed
//! research result and [`WinePatch`] a partial update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::normalize;

/// Image shown when a wine has no usable bottle picture.
pub const PLACEHOLDER_IMAGE_URL: &str = "https://i.postimg.cc/d1jVZVp1/wine-placeholder.png";

/// Current document schema version.
///
/// Version 1 documents rate wines on a 1-10 integer scale and may lack
/// `wineType`, `inCellar` and `lastUpdated`. Version 2 uses the 1-5 half-star
/// scale.
pub const SCHEMA_VERSION: u32 = 2;

/// Opaque wine identifier, assigned by the store or generated locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WineId(String);

impl WineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random id for records created locally.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WineId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for WineId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Closed set of wine styles.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum WineType {
    Red,
    White,
    #[serde(rename = "rosé", alias = "rose")]
    Rose,
    Sparkling,
    Dessert,
    #[default]
    Unknown,
}

impl WineType {
    /// Every wine type, in display order.
    pub const ALL: [WineType; 6] = [
        WineType::Red,
        WineType::White,
        WineType::Rose,
        WineType::Sparkling,
        WineType::Dessert,
        WineType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WineType::Red => "red",
            WineType::White => "white",
            WineType::Rose => "rosé",
            WineType::Sparkling => "sparkling",
            WineType::Dessert => "dessert",
            WineType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for WineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WineType {
    type Err = String;

    /// Case-insensitive; accepts "rose" for "rosé".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "red" => Ok(WineType::Red),
            "white" => Ok(WineType::White),
            "rosé" | "rose" => Ok(WineType::Rose),
            "sparkling" => Ok(WineType::Sparkling),
            "dessert" => Ok(WineType::Dessert),
            "unknown" => Ok(WineType::Unknown),
            other => Err(format!("unknown wine type: {}", other)),
        }
    }
}

/// A journal entry.
///
/// Every field has a defined default, so a record built by the normalizer is
/// always complete. `id` and `date_added` never change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WineRecord {
    pub id: WineId,
    pub name: String,
    /// Vintage year, `0` for non-vintage.
    pub vintage: u32,
    pub varietal: String,
    pub country: String,
    /// Tasting note sourced from research.
    pub description: String,
    pub image_url: String,
    /// Public rating in `[0, 5]`, `0` when not found.
    pub public_rating: f64,
    pub review_count: u64,
    pub rating_source: String,
    /// Estimated price in USD, `0` when not found.
    pub price: f64,
    /// Personal rating on the 1-5 half-star scale, `0` when not yet rated.
    pub rating: f64,
    pub notes: String,
    pub wine_type: WineType,
    pub in_cellar: bool,
    pub date_added: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub schema_version: u32,
}

impl WineRecord {
    /// Confirms a research draft into a new record.
    pub fn from_draft(
        id: WineId,
        draft: ResearchedData,
        personal: PersonalEntry,
        now: DateTime<Utc>,
    ) -> Self {
        let name = if draft.name.trim().is_empty() {
            normalize::UNTITLED_WINE.to_string()
        } else {
            draft.name.trim().to_string()
        };

        Self {
            id,
            name,
            vintage: draft.vintage,
            varietal: draft.varietal,
            country: draft.country,
            description: draft.description,
            image_url: normalize::sanitize_image_url(Some(&draft.image_url)),
            public_rating: normalize::sanitize_public_rating(draft.public_rating),
            review_count: draft.review_count,
            rating_source: draft.rating_source,
            price: normalize::sanitize_price(draft.price),
            rating: normalize::sanitize_rating(personal.rating),
            notes: personal.notes,
            wine_type: draft.wine_type,
            in_cellar: personal.in_cellar,
            date_added: now,
            last_updated: now,
            schema_version: SCHEMA_VERSION,
        }
    }

    /// Vintage for display: the year, or "N/V" for non-vintage wines.
    pub fn vintage_label(&self) -> String {
        if self.vintage > 0 {
            self.vintage.to_string()
        } else {
            "N/V".to_string()
        }
    }

    pub fn is_rated(&self) -> bool {
        self.rating > 0.0
    }
}

/// Research result awaiting user confirmation.
///
/// All descriptive fields are filled in (with defaults where the source had
/// nothing); the personal fields are supplied at confirmation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchedData {
    pub name: String,
    pub vintage: u32,
    pub varietal: String,
    pub country: String,
    pub description: String,
    pub image_url: String,
    pub public_rating: f64,
    pub review_count: u64,
    pub rating_source: String,
    pub price: f64,
    pub wine_type: WineType,
}

impl Default for ResearchedData {
    fn default() -> Self {
        Self {
            name: String::new(),
            vintage: 0,
            varietal: String::new(),
            country: String::new(),
            description: String::new(),
            image_url: PLACEHOLDER_IMAGE_URL.to_string(),
            public_rating: 0.0,
            review_count: 0,
            rating_source: String::new(),
            price: 0.0,
            wine_type: WineType::Unknown,
        }
    }
}

impl ResearchedData {
    /// Blank draft for manual entry.
    pub fn manual(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            ..Self::default()
        }
    }
}

/// The user's own input when saving a wine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonalEntry {
    pub rating: f64,
    pub notes: String,
    pub in_cellar: bool,
}

/// Partial update of a record. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vintage: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub varietal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wine_type: Option<WineType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_cellar: Option<bool>,
}

impl WinePatch {
    pub fn is_empty(&self) -> bool {
        *self == WinePatch::default()
    }
}

/// A stored document as returned by the persistence collaborator.
///
/// `data` may be missing any field; it is normalized on load.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub id: String,
    pub data: serde_json::Value,
    /// When the store first saw the document, if it tracks that.
    pub created_at: Option<DateTime<Utc>>,
}

impl RawDocument {
    pub fn new(id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            data,
            created_at: None,
        }
    }

    /// Normalizes the document into a record.
    ///
    /// A missing `dateAdded` falls back to `created_at`, so it stays the same
    /// across loads. `now` is used only when the store has no creation time.
    pub fn to_record(&self, now: DateTime<Utc>) -> WineRecord {
        normalize::normalize_document(Some(&self.id), &self.data, self.created_at.unwrap_or(now))
    }
}

/// Aggregated journal statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JournalStats {
    pub total_wines: i64,
    pub in_cellar: i64,
    pub rated: i64,
    pub countries: i64,
    pub last_update: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_wine_type_parsing() {
        assert_eq!("Red".parse::<WineType>(), Ok(WineType::Red));
        assert_eq!("rose".parse::<WineType>(), Ok(WineType::Rose));
        assert_eq!("ROSÉ".parse::<WineType>(), Ok(WineType::Rose));
        assert!("orange".parse::<WineType>().is_err());
    }

    #[test]
    fn test_wine_type_serde() {
        assert_eq!(serde_json::to_string(&WineType::Rose).unwrap(), "\"rosé\"");
        let parsed: WineType = serde_json::from_str("\"rose\"").unwrap();
        assert_eq!(parsed, WineType::Rose);
    }

    #[test]
    fn test_researched_data_default_uses_placeholder() {
        let draft = ResearchedData::default();
        assert_eq!(draft.image_url, PLACEHOLDER_IMAGE_URL);
        assert_eq!(draft.wine_type, WineType::Unknown);
    }

    #[test]
    fn test_from_draft_sets_timestamps_and_personal_fields() {
        let draft = ResearchedData {
            name: "  Cloudy Bay  ".to_string(),
            price: -3.0,
            ..ResearchedData::default()
        };
        let personal = PersonalEntry {
            rating: 4.3,
            notes: "crisp".to_string(),
            in_cellar: true,
        };
        let record = WineRecord::from_draft(WineId::new("w1"), draft, personal, now());

        assert_eq!(record.name, "Cloudy Bay");
        assert_eq!(record.price, 0.0);
        assert_eq!(record.rating, 4.5);
        assert!(record.in_cellar);
        assert_eq!(record.date_added, now());
        assert_eq!(record.last_updated, now());
        assert_eq!(record.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = WineRecord::from_draft(
            WineId::new("w1"),
            ResearchedData::manual("Test"),
            PersonalEntry::default(),
            now(),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("imageUrl").is_some());
        assert!(json.get("dateAdded").is_some());
        assert_eq!(json["wineType"], "unknown");
        assert_eq!(json["inCellar"], false);
    }

    #[test]
    fn test_patch_serialization_skips_none() {
        let patch = WinePatch {
            rating: Some(3.5),
            in_cellar: Some(true),
            ..WinePatch::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({"rating": 3.5, "inCellar": true}));
        assert!(!patch.is_empty());
        assert!(WinePatch::default().is_empty());
    }

    #[test]
    fn test_raw_document_date_falls_back_to_created_at() {
        let created = Utc.with_ymd_and_hms(2023, 7, 14, 9, 0, 0).unwrap();
        let doc = RawDocument {
            created_at: Some(created),
            ..RawDocument::new("x", serde_json::json!({"name": "No date"}))
        };

        let first = doc.to_record(now());
        let second = doc.to_record(now() + chrono::Duration::days(365));
        assert_eq!(first.date_added, created);
        assert_eq!(second.date_added, created);
        assert_eq!(first.last_updated, created);
    }

    #[test]
    fn test_raw_document_keeps_stored_date() {
        let doc = RawDocument {
            created_at: Some(now()),
            ..RawDocument::new("x", serde_json::json!({"name": "Dated", "dateAdded": "2020-02-02"}))
        };
        assert_eq!(
            doc.to_record(now()).date_added,
            Utc.with_ymd_and_hms(2020, 2, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_vintage_label() {
        let mut record = WineRecord::from_draft(
            WineId::new("w1"),
            ResearchedData::manual("Test"),
            PersonalEntry::default(),
            now(),
        );
        assert_eq!(record.vintage_label(), "N/V");
        record.vintage = 2019;
        assert_eq!(record.vintage_label(), "2019");
    }
}

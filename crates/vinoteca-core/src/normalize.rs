//! Record normalizer.
//!
//! Turns loosely-typed JSON (research output or stored documents) into
//! complete [`WineRecord`]s and [`ResearchedData`]. A value is used only when
//! it has the expected JSON type and is non-empty; everything else falls back
//! to the field default. Numbers sent as strings count as missing.
//!
//! Legacy documents (schema version 1) rated wines 1-10; their ratings are
//! halved onto the 1-5 scale here, so the rest of the crate only ever sees
//! the current scale.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use url::Url;

use crate::models::{
    ResearchedData, WineId, WinePatch, WineRecord, WineType, PLACEHOLDER_IMAGE_URL,
    SCHEMA_VERSION,
};

/// Name given to stored documents that lack one.
pub const UNTITLED_WINE: &str = "Untitled wine";

const MAX_PUBLIC_RATING: f64 = 5.0;
const MAX_RATING: f64 = 5.0;

/// Builds a research draft from a parsed JSON payload.
///
/// `fallback_name` (the user's original query) is used when the payload has no
/// usable `name`. Non-object payloads yield an all-default draft.
pub fn normalize_research(raw: &Value, fallback_name: Option<&str>) -> ResearchedData {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);

    let name = text(obj, "name")
        .or_else(|| fallback_name.map(str::trim).filter(|s| !s.is_empty()).map(String::from))
        .unwrap_or_default();

    ResearchedData {
        name,
        vintage: number(obj, "vintage").map(sanitize_vintage).unwrap_or(0),
        varietal: text(obj, "varietal").unwrap_or_default(),
        country: text(obj, "country").unwrap_or_default(),
        description: text(obj, "description").unwrap_or_default(),
        image_url: sanitize_image_url(text(obj, "imageUrl").as_deref()),
        public_rating: number(obj, "publicRating")
            .map(sanitize_public_rating)
            .unwrap_or(0.0),
        review_count: number(obj, "reviewCount").map(sanitize_count).unwrap_or(0),
        rating_source: text(obj, "ratingSource").unwrap_or_default(),
        price: number(obj, "price").map(sanitize_price).unwrap_or(0.0),
        wine_type: wine_type(obj),
    }
}

/// Builds a complete record from a stored document.
///
/// `id` is the document id from the store; when absent the payload's own `id`
/// (string or number) is used, and failing that a fresh one is generated.
/// Missing timestamps default to `now`.
pub fn normalize_document(id: Option<&str>, raw: &Value, now: DateTime<Utc>) -> WineRecord {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);
    let research = normalize_research(raw, None);

    let id = id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(WineId::new)
        .or_else(|| document_id(obj))
        .unwrap_or_else(WineId::generate);

    let schema_version = number(obj, "schemaVersion")
        .filter(|v| *v >= 1.0)
        .map(|v| v as u32)
        .unwrap_or(1);

    let rating = number(obj, "rating")
        .map(|r| {
            if schema_version < SCHEMA_VERSION {
                migrate_legacy_rating(r)
            } else {
                r
            }
        })
        .map(sanitize_rating)
        .unwrap_or(0.0);

    let date_added = timestamp(obj, "dateAdded").unwrap_or(now);
    let last_updated = timestamp(obj, "lastUpdated").unwrap_or(date_added);

    let name = if research.name.is_empty() {
        UNTITLED_WINE.to_string()
    } else {
        research.name
    };

    WineRecord {
        id,
        name,
        vintage: research.vintage,
        varietal: research.varietal,
        country: research.country,
        description: research.description,
        image_url: research.image_url,
        public_rating: research.public_rating,
        review_count: research.review_count,
        rating_source: research.rating_source,
        price: research.price,
        rating,
        notes: text(obj, "notes").unwrap_or_default(),
        wine_type: research.wine_type,
        in_cellar: obj.get("inCellar").and_then(Value::as_bool).unwrap_or(false),
        date_added,
        last_updated,
        schema_version: SCHEMA_VERSION,
    }
}

/// Merges a patch onto a record and refreshes `last_updated`.
///
/// `id` and `date_added` are never touched. A blank name is ignored so the
/// record keeps a display name.
pub fn apply_patch(record: &mut WineRecord, patch: &WinePatch, now: DateTime<Utc>) {
    if let Some(name) = patch.name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        record.name = name.to_string();
    }
    if let Some(vintage) = patch.vintage {
        record.vintage = vintage;
    }
    if let Some(varietal) = &patch.varietal {
        record.varietal = varietal.trim().to_string();
    }
    if let Some(country) = &patch.country {
        record.country = country.trim().to_string();
    }
    if let Some(description) = &patch.description {
        record.description = description.clone();
    }
    if let Some(image_url) = &patch.image_url {
        record.image_url = sanitize_image_url(Some(image_url));
    }
    if let Some(public_rating) = patch.public_rating {
        record.public_rating = sanitize_public_rating(public_rating);
    }
    if let Some(review_count) = patch.review_count {
        record.review_count = review_count;
    }
    if let Some(rating_source) = &patch.rating_source {
        record.rating_source = rating_source.trim().to_string();
    }
    if let Some(price) = patch.price {
        record.price = sanitize_price(price);
    }
    if let Some(rating) = patch.rating {
        record.rating = sanitize_rating(rating);
    }
    if let Some(notes) = &patch.notes {
        record.notes = notes.clone();
    }
    if let Some(wine_type) = patch.wine_type {
        record.wine_type = wine_type;
    }
    if let Some(in_cellar) = patch.in_cellar {
        record.in_cellar = in_cellar;
    }
    record.last_updated = now;
}

/// Vintage years below 1 mean non-vintage.
pub fn sanitize_vintage(value: f64) -> u32 {
    if (1.0..=u32::MAX as f64).contains(&value) {
        value.trunc() as u32
    } else {
        0
    }
}

pub fn sanitize_public_rating(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, MAX_PUBLIC_RATING)
    } else {
        0.0
    }
}

pub fn sanitize_price(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

pub fn sanitize_count(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.trunc() as u64
    } else {
        0
    }
}

/// Clamps to `[0, 5]` and snaps to half stars.
pub fn sanitize_rating(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    ((value * 2.0).round() / 2.0).clamp(0.0, MAX_RATING)
}

/// Maps a 1-10 rating onto the 1-5 scale.
pub fn migrate_legacy_rating(value: f64) -> f64 {
    value / 2.0
}

/// Keeps absolute http(s) URLs, otherwise returns the placeholder.
pub fn sanitize_image_url(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .and_then(|s| Url::parse(s).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|url| url.to_string())
        .unwrap_or_else(|| PLACEHOLDER_IMAGE_URL.to_string())
}

fn text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn number(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
}

fn wine_type(obj: &Map<String, Value>) -> WineType {
    text(obj, "wineType")
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

fn document_id(obj: &Map<String, Value>) -> Option<WineId> {
    match obj.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(WineId::new(s.trim())),
        Value::Number(n) => Some(WineId::new(n.to_string())),
        _ => None,
    }
}

/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates (midnight UTC).
fn timestamp(obj: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    let raw = obj.get(key)?.as_str()?.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

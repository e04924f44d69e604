//! Research response parsing and the research collaborator seam.
//!
//! The research collaborator returns free-form text that should hold a single
//! JSON object, often wrapped in a ```` ```json ```` fence. This module peels
//! the fence, parses the object, checks that `name` and `description` are
//! present and hands the payload to the normalizer.

use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::models::ResearchedData;
use crate::normalize;

/// External text/image lookup service.
pub trait WineResearcher {
    /// Researches `query` (optionally with a bottle photo) and returns the raw
    /// response text.
    fn research(
        &self,
        query: &str,
        image: Option<&[u8]>,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Removes a leading ```` ```json ```` (or bare ```` ``` ````) fence and a
/// trailing ```` ``` ````. Either may be absent.
pub fn strip_code_fences(text: &str) -> &str {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix("```") {
        body = rest.strip_prefix("json").unwrap_or(rest);
    }
    body = body.trim();
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

/// Extracts the JSON object from a research response.
///
/// Falls back to the outermost `{ ... }` span when the model wrapped the
/// object in prose.
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>, AppError> {
    let body = strip_code_fences(text);

    let first_error = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => return Ok(map),
        Ok(_) => {
            return Err(AppError::MalformedResponse(
                "expected a JSON object".to_string(),
            ))
        }
        Err(e) => e,
    };

    if let (Some(start), Some(end)) = (body.find('{'), body.rfind('}')) {
        if start < end {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&body[start..=end]) {
                debug!("Recovered JSON object embedded in research prose");
                return Ok(map);
            }
        }
    }

    Err(AppError::MalformedResponse(first_error.to_string()))
}

/// Parses a research response into a draft.
///
/// # Errors
///
/// - `MalformedResponse` when no JSON object can be extracted.
/// - `IncompleteData` when `name` or `description` is missing or blank. The
///   original query `wine_name` satisfies the `name` requirement.
pub fn parse_research_response(
    text: &str,
    wine_name: Option<&str>,
) -> Result<ResearchedData, AppError> {
    let object = extract_json_object(text)?;

    let has_text = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.trim().is_empty())
    };
    let has_fallback = wine_name.is_some_and(|s| !s.trim().is_empty());

    let mut missing = Vec::new();
    if !has_text("name") && !has_fallback {
        missing.push("name");
    }
    if !has_text("description") {
        missing.push("description");
    }
    if !missing.is_empty() {
        return Err(AppError::IncompleteData { missing });
    }

    Ok(normalize::normalize_research(
        &Value::Object(object),
        wine_name,
    ))
}

/// Runs research lookups with a timeout and maps every failure onto the
/// recoverable research errors.
pub struct ResearchService<R> {
    researcher: R,
    timeout: Duration,
}

impl<R: WineResearcher> ResearchService<R> {
    pub fn new(researcher: R, timeout: Duration) -> Self {
        Self {
            researcher,
            timeout,
        }
    }

    pub fn researcher(&self) -> &R {
        &self.researcher
    }

    /// Looks up a wine and returns the parsed draft.
    ///
    /// Collaborator errors, empty responses and timeouts all become
    /// `ResearchUnavailable`; parse failures keep their own kind.
    pub async fn lookup(
        &self,
        query: &str,
        image: Option<&[u8]>,
    ) -> Result<ResearchedData, AppError> {
        let call = self.researcher.research(query, image);
        let text = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("Research call for '{}' failed: {}", query, e);
                return Err(AppError::ResearchUnavailable(e.to_string()));
            }
            Err(_) => {
                warn!(
                    "Research call for '{}' timed out after {:?}",
                    query, self.timeout
                );
                return Err(AppError::ResearchUnavailable(format!(
                    "no response after {} seconds",
                    self.timeout.as_secs()
                )));
            }
        };

        if text.trim().is_empty() {
            return Err(AppError::ResearchUnavailable(
                "empty response".to_string(),
            ));
        }

        parse_research_response(&text, Some(query))
    }
}

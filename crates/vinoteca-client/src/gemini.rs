use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use vinoteca_core::config::{HttpConfig, ResearchConfig};
use vinoteca_core::error::AppError;
use vinoteca_core::recommend::RecommendationContext;
use vinoteca_core::research::WineResearcher;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Upper bound on attempts per request, whatever the config says.
const MAX_ATTEMPTS: u32 = 10;

/// Longest wait between two attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// HTTP client for Google's Gemini `generateContent` API.
///
/// Used for two things: researching a wine (optionally from a bottle photo),
/// grounded with Google Search, and answering cellar-aware recommendation
/// questions.
///
/// # Examples
///
/// ```no_run
/// use vinoteca_client::GeminiClient;
/// use vinoteca_core::{HttpConfig, ResearchConfig};
/// use vinoteca_core::research::WineResearcher;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = GeminiClient::new("your-api-key", &ResearchConfig::default(), &HttpConfig::default())?;
/// let text = client.research("Cloudy Bay Sauvignon Blanc", None).await?;
/// println!("{}", text);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    timeout_secs: u64,
    max_retries: u32,
    retry_base_delay: Duration,
}

/// Request body for the generateContent API
#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Image { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Serialize)]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Serialize)]
struct GoogleSearch {}

/// Response from the generateContent API
#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Error response from Gemini API
#[derive(Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

impl GeminiClient {
    /// Creates a new Gemini client.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ClientError` if the HTTP client cannot be built.
    pub fn new(
        api_key: &str,
        research: &ResearchConfig,
        http: &HttpConfig,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent("Vinoteca/0.1")
            .timeout(http.timeout())
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: research.model.clone(),
            timeout_secs: http.timeout_secs,
            max_retries: http.max_retries.clamp(1, MAX_ATTEMPTS),
            retry_base_delay: http.retry_base_delay(),
        })
    }

    /// Asks a cellar-aware recommendation question and returns Markdown text.
    pub async fn recommend(
        &self,
        question: &str,
        context: &RecommendationContext<'_>,
    ) -> Result<String, AppError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part::Text {
                    text: context.prompt(question),
                }],
            }],
            tools: Vec::new(),
        };
        self.generate(&request).await
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, AppError> {
        let response = self.post_with_retry(request).await?;

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AppError::ClientError(format!("Failed to parse response: {}", e)))?;

        let text = collect_text(body);
        if text.trim().is_empty() {
            return Err(AppError::EmptyResponse);
        }
        Ok(text)
    }

    /// Sends the request, retrying on transient failures.
    ///
    /// Retries network errors, timeouts, server errors (5xx) and rate limiting
    /// (429) with growing delays. Other 4xx responses fail immediately.
    async fn post_with_retry(
        &self,
        request: &GenerateRequest,
    ) -> Result<reqwest::Response, AppError> {
        let url = format!("{}/{}:generateContent", API_BASE, self.model);
        let mut last_error = AppError::Generic("No attempts made".to_string());

        for attempt in 1..=self.max_retries {
            debug!("Gemini request attempt {}/{}", attempt, self.max_retries);
            let sent = self
                .client
                .post(&url)
                .query(&[("key", self.api_key.as_str())])
                .json(request)
                .send()
                .await;

            match sent {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        last_error = AppError::RateLimitExceeded;
                        if attempt < self.max_retries {
                            sleep(rate_limit_backoff(self.retry_base_delay, attempt)).await;
                            continue;
                        }
                        break;
                    }

                    if status.is_server_error() {
                        last_error = AppError::ClientError(format!(
                            "Server error: HTTP {}",
                            status.as_u16()
                        ));
                        if attempt < self.max_retries {
                            sleep(linear_backoff(self.retry_base_delay, attempt)).await;
                            continue;
                        }
                        break;
                    }

                    let error_text = resp.text().await.unwrap_or_default();
                    return Err(api_error(status, &error_text));
                }
                Err(e) => {
                    let transient = e.is_timeout() || e.is_connect();
                    last_error = if e.is_timeout() {
                        AppError::Timeout(self.timeout_secs)
                    } else if e.is_connect() {
                        AppError::NetworkError(format!("Connection failed: {}", e))
                    } else {
                        AppError::ClientError(e.to_string())
                    };

                    if transient && attempt < self.max_retries {
                        warn!("Gemini request failed ({}), retrying", last_error);
                        sleep(linear_backoff(self.retry_base_delay, attempt)).await;
                        continue;
                    }
                    break;
                }
            }
        }

        Err(last_error)
    }
}

/// Exponential wait after a 429, capped at [`MAX_BACKOFF`].
fn rate_limit_backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2_u32.saturating_pow(attempt)).min(MAX_BACKOFF)
}

/// Linear wait after a server or connection error, capped at [`MAX_BACKOFF`].
fn linear_backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt).min(MAX_BACKOFF)
}

impl WineResearcher for GeminiClient {
    async fn research(&self, query: &str, image: Option<&[u8]>) -> Result<String, AppError> {
        let mut parts = vec![Part::Text {
            text: research_prompt(query),
        }];
        if let Some(bytes) = image {
            parts.push(Part::Image {
                inline_data: InlineData {
                    mime_type: detect_image_mime(bytes),
                    data: STANDARD.encode(bytes),
                },
            });
        }

        let request = GenerateRequest {
            contents: vec![Content { role: "user", parts }],
            tools: vec![Tool {
                google_search: GoogleSearch {},
            }],
        };
        self.generate(&request).await
    }
}

/// Builds the research prompt. The model is asked for a single JSON object in
/// the journal's document shape.
pub fn research_prompt(wine_name: &str) -> String {
    let subject = if wine_name.trim().is_empty() {
        "the wine in the attached photo".to_string()
    } else {
        format!("the wine \"{}\"", wine_name.trim())
    };

    format!(
        "Research {subject}. Use Google Search to find its public rating from a reputable source like Vivino. \
         Provide details in a single, minified JSON object. The JSON must have these keys: \
         \"name\" (string, the full corrected name), \
         \"vintage\" (number, 0 for non-vintage), \
         \"varietal\" (string), \
         \"country\" (string), \
         \"wineType\" (string, one of red, white, rosé, sparkling, dessert, unknown), \
         \"description\" (string, a brief professional tasting note), \
         \"publicRating\" (number, from 1 to 5, can be a float, 0 if not found), \
         \"reviewCount\" (number, total number of reviews), \
         \"ratingSource\" (string, the name of the website providing the rating, e.g., \"Vivino\"), \
         \"price\" (number, the latest estimated price in USD, 0 if not found), \
         \"imageUrl\" (string, a direct, publicly accessible URL to an image of the wine bottle). \
         If a value cannot be found, use an empty string for strings or 0 for numbers."
    )
}

/// Sniffs the MIME type of an image from its magic bytes, defaulting to JPEG.
pub fn detect_image_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

fn collect_text(response: GenerateResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

fn api_error(status: StatusCode, body: &str) -> AppError {
    let message = serde_json::from_str::<GeminiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| format!("HTTP {}", status));

    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || message.contains("API key")
    {
        AppError::GeminiError(format!("401 Unauthorized - {}", message))
    } else {
        AppError::GeminiError(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_client() {
        let client =
            GeminiClient::new("test-api-key", &ResearchConfig::default(), &HttpConfig::default())
                .unwrap();
        assert_eq!(client.model, "gemini-2.5-flash");
        assert_eq!(client.max_retries, 3);
    }

    #[test]
    fn test_zero_retries_still_attempts_once() {
        let http = HttpConfig {
            max_retries: 0,
            ..HttpConfig::default()
        };
        let client = GeminiClient::new("k", &ResearchConfig::default(), &http).unwrap();
        assert_eq!(client.max_retries, 1);
    }

    #[test]
    fn test_large_retry_count_is_clamped() {
        let http = HttpConfig {
            max_retries: u32::MAX,
            ..HttpConfig::default()
        };
        let client = GeminiClient::new("k", &ResearchConfig::default(), &http).unwrap();
        assert_eq!(client.max_retries, MAX_ATTEMPTS);
    }

    #[test]
    fn test_backoff_grows_then_caps() {
        let base = Duration::from_millis(500);
        assert_eq!(rate_limit_backoff(base, 1), Duration::from_secs(1));
        assert_eq!(rate_limit_backoff(base, 3), Duration::from_secs(4));
        assert_eq!(linear_backoff(base, 2), Duration::from_secs(1));

        assert_eq!(rate_limit_backoff(base, 40), MAX_BACKOFF);
        assert_eq!(rate_limit_backoff(Duration::MAX, u32::MAX), MAX_BACKOFF);
        assert_eq!(linear_backoff(Duration::MAX, u32::MAX), MAX_BACKOFF);
    }

    #[test]
    fn test_research_request_serialization() {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text {
                        text: "hello".to_string(),
                    },
                    Part::Image {
                        inline_data: InlineData {
                            mime_type: "image/png",
                            data: "AAAA".to_string(),
                        },
                    },
                ],
            }],
            tools: vec![Tool {
                google_search: GoogleSearch {},
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(
            json["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/png"
        );
        assert!(json["tools"][0]["google_search"].is_object());
    }

    #[test]
    fn test_recommend_request_omits_tools() {
        let request = GenerateRequest {
            contents: vec![],
            tools: Vec::new(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_collect_text_joins_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"```json\n{"},{"text":"}\n```"}]}}]}"#;
        let response: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(collect_text(response), "```json\n{}\n```");
    }

    #[test]
    fn test_collect_text_without_candidates() {
        let response: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(collect_text(response), "");
    }

    #[test]
    fn test_research_prompt_mentions_keys() {
        let prompt = research_prompt("  Cloudy Bay ");
        assert!(prompt.contains("\"Cloudy Bay\""));
        assert!(prompt.contains("\"wineType\""));
        assert!(prompt.contains("\"imageUrl\""));

        assert!(research_prompt("").contains("attached photo"));
    }

    #[test]
    fn test_detect_image_mime() {
        assert_eq!(detect_image_mime(&[0x89, b'P', b'N', b'G', 0x0D]), "image/png");
        assert_eq!(detect_image_mime(b"GIF89a"), "image/gif");
        assert_eq!(detect_image_mime(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(detect_image_mime(&[0xFF, 0xD8, 0xFF]), "image/jpeg");
    }

    #[test]
    fn test_api_error_mapping() {
        let body = r#"{"error":{"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        let err = api_error(StatusCode::BAD_REQUEST, body);
        assert!(err.user_message().contains("Invalid Gemini API key"));

        let err = api_error(StatusCode::NOT_FOUND, "not json");
        assert!(matches!(err, AppError::GeminiError(msg) if msg.contains("404")));
    }
}

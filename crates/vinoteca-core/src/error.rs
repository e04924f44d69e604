use thiserror::Error;

/// Application-wide error types.
///
/// This enum represents all possible errors that can occur in Vinoteca.
/// It uses the `thiserror` crate for ergonomic error handling and automatic
/// conversion from underlying library errors.
///
/// # Error Families
///
/// - Research flow: [`AppError::MalformedResponse`], [`AppError::IncompleteData`]
///   and [`AppError::ResearchUnavailable`]. These are recovered at the research
///   flow boundary (see [`AppError::is_recoverable`]).
/// - Collection: [`AppError::WineNotFound`] and [`AppError::DuplicateWine`].
/// - Persistence: [`AppError::PersistenceFailure`] is reported after an
///   optimistic in-memory change has already been applied.
///
/// # Error Conversion
///
/// - `sqlx::Error` → `AppError::DatabaseError`
/// - `serde_json::Error` → `AppError::SerializationError`
///
/// # Examples
///
/// ```no_run
/// use vinoteca_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::Generic("Something went wrong".to_string()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// HTTP client request failed.
    #[error("API Client error: {0}")]
    ClientError(String),

    /// Gemini API call failed (authentication, quota, API errors).
    #[error("Gemini error: {0}")]
    GeminiError(String),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The research text did not contain an extractable JSON object.
    #[error("Malformed research response: {0}")]
    MalformedResponse(String),

    /// The research JSON parsed but lacked required fields.
    #[error("Incomplete research data: missing {}", .missing.join(", "))]
    IncompleteData { missing: Vec<&'static str> },

    /// The research collaborator could not be reached or returned no text.
    #[error("Research unavailable: {0}")]
    ResearchUnavailable(String),

    /// No wine with this id exists in the collection.
    #[error("Wine not found: {0}")]
    WineNotFound(String),

    /// A wine with this id already exists in the collection.
    #[error("Duplicate wine id: {0}")]
    DuplicateWine(String),

    /// The remote write failed after the in-memory change was applied.
    ///
    /// The collection is intentionally not rolled back.
    #[error("Failed to persist wine {id}: {reason}")]
    PersistenceFailure { id: String, reason: String },

    /// A research flow action was not valid in the current state.
    #[error("Cannot {action} while research flow is {state}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },

    /// Configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// API response contained no data.
    #[error("Empty response from API")]
    EmptyResponse,

    /// Network or connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded. Please wait and try again.")]
    RateLimitExceeded,

    /// Generic application error for cases not covered by specific variants.
    ///
    /// Use this sparingly - prefer creating specific error variants
    /// for better error handling and debugging.
    #[error("Error: {0}")]
    Generic(String),
}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::DatabaseError(e) => {
                if e.to_string().contains("connection") {
                    "Cannot connect to database. Is PostgreSQL running?\n   Check your DATABASE_URL environment variable.".to_string()
                } else {
                    format!("Database error: {}", e)
                }
            }
            AppError::GeminiError(msg) => {
                if msg.contains("401")
                    || msg.contains("Unauthorized")
                    || msg.contains("API key")
                {
                    "Invalid Gemini API key.\n   Check your GEMINI_API_KEY environment variable."
                        .to_string()
                } else if msg.contains("429") || msg.contains("rate") {
                    "Gemini rate limit reached.\n   Wait a moment and try again.".to_string()
                } else {
                    format!("Gemini error: {}", msg)
                }
            }
            AppError::MalformedResponse(_)
            | AppError::IncompleteData { .. }
            | AppError::ResearchUnavailable(_) => {
                "Sorry, I couldn't find that wine. Please check the name or try adding it manually."
                    .to_string()
            }
            AppError::PersistenceFailure { id, .. } => {
                format!(
                    "Saved locally, but wine {} could not be written to the database.\n   Your change is kept for this session; try again later.",
                    id
                )
            }
            AppError::NetworkError(msg) => {
                format!("Network error: {}\n   Check your internet connection.", msg)
            }
            AppError::Timeout(secs) => {
                format!(
                    "Request timed out after {} seconds.\n   The server may be overloaded. Try again later.",
                    secs
                )
            }
            AppError::RateLimitExceeded => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            AppError::EmptyResponse => {
                "The API returned no data. The service may be temporarily unavailable.".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use vinoteca_core::error::AppError;
    ///
    /// let err = AppError::NetworkError("connection reset".to_string());
    /// assert!(err.is_retryable());
    ///
    /// let err = AppError::WineNotFound("abc".to_string());
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NetworkError(_)
                | AppError::Timeout(_)
                | AppError::RateLimitExceeded
                | AppError::ClientError(_)
        )
    }

    /// Returns true for failures that send the research flow back to the
    /// asking state instead of surfacing to the top level.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::MalformedResponse(_)
                | AppError::IncompleteData { .. }
                | AppError::ResearchUnavailable(_)
        )
    }
}

//! Vinoteca Client - HTTP clients for external APIs
//!
//! - [`gemini`] - Google Gemini `generateContent` for wine research and
//!   recommendations
//!
//! The client handles authentication, request building, retries, response
//! parsing and error mapping. Parsing the research text into a draft is left
//! to `vinoteca_core::research`.

pub mod gemini;

pub use gemini::GeminiClient;

//! HTTP backends for remote classification
//!
//! Each backend wraps one provider's generation endpoint behind the same
//! narrow surface: send a prompt, get the raw text completion back. Parsing
//! the completion into a verdict is [`super::normalize`]'s job, so the
//! backends stay interchangeable from the racer's point of view.

use std::time::Duration;

use crate::config::BackendConfig;
use crate::error::Result;

pub mod gemini;
pub mod groq;

pub use gemini::GeminiBackend;
pub use groq::GroqBackend;

/// Build the shared HTTP client for a backend.
///
/// A slow connect is handled separately from a slow response; the racer
/// relies on both timeouts to bound how long a losing backend can hold
/// a task alive.
fn build_http_client(config: &BackendConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| crate::error::Error::Backend(format!("failed to build HTTP client: {}", e)))
}

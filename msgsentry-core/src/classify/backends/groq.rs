//! Groq chat-completions backend

use serde::Deserialize;
use serde_json::json;

use crate::config::BackendConfig;
use crate::error::{Error, Result};

use super::build_http_client;

const DEFAULT_ENDPOINT: &str = "https://api.groq.com";

/// Client for Groq's OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct GroqBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

impl GroqBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
            api_key: config.resolve_api_key("GROQ_API_KEY")?,
        })
    }

    /// Send a prompt and return the raw text completion.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/openai/v1/chat/completions", self.endpoint);
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.0,
            "max_tokens": 256,
        });

        tracing::debug!(model = %self.model, "dispatching Groq request");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Backend(format!("groq request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Backend(format!("groq returned {}: {}", status, body)));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| Error::Backend(format!("groq response parse failed: {}", e)))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::Backend("groq response had no choices".to_string()))?;

        Ok(text)
    }
}

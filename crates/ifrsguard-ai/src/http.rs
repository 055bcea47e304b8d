//! Chat-completions generator over HTTP (OpenAI-compatible endpoints).

use std::time::Duration;

use async_trait::async_trait;
use ifrsguard_core::Passage;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::prompts::{SYSTEM_PROMPT, sources_block};
use crate::{DraftGenerator, GenerateError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpGenerator {
    /// `base_url` should be like `https://api.openai.com/v1` (no trailing slash).
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, GenerateError> {
        let client = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            temperature: 0.0,
            max_tokens: 800,
        })
    }

    /// Sampling temperature, clamped to [0, 0.1] to keep drafts conservative.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 0.1);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn user_message(prompt: &str, passages: &[Passage]) -> String {
        format!("SOURCES:\n{}\n\n{prompt}", sources_block(passages))
    }
}

#[async_trait]
impl DraftGenerator for HttpGenerator {
    async fn generate(&self, prompt: &str, passages: &[Passage]) -> Result<String, GenerateError> {
        let url = format!("{}/chat/completions", self.base_url);
        let user = Self::user_message(prompt, passages);
        let body = ChatRequest {
            model: &self.model,
            messages: [
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        info!(url = %url, model = %self.model, passages = passages.len(), "requesting draft");
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerateError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let text = resp.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&text)?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(GenerateError::Empty)
    }
}

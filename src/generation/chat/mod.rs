
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use super::{GenerationRequest, GenerationService, ImageRequest};
use crate::config::GenerationConfig;

/// Client for an OpenAI-compatible chat-completions endpoint
///
/// Failed calls are reported to the caller as-is; nothing is retried.
#[derive(Clone)]
pub struct ChatClient {
    endpoint: Url,
    api_key: String,
    model: String,
    vision_model: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl ChatClient {
    #[inline]
    pub fn new(config: &GenerationConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            bail!("API key must not be empty");
        }

        let endpoint = config
            .completions_url()
            .context("Failed to build chat-completions URL from config")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            endpoint,
            api_key,
            model: config.model.clone(),
            vision_model: config.vision_model.clone(),
            agent,
        })
    }

    /// Build a client with the API key taken from the configured environment variable
    #[inline]
    pub fn from_env(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).with_context(|| {
            format!(
                "Environment variable {} is not set. Export your API key first.",
                config.api_key_env
            )
        })?;
        Self::new(config, api_key)
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
        let body = serde_json::to_string(request).context("Failed to serialize chat request")?;

        debug!("Calling {} with model {}", self.endpoint, request.model);

        let mut response = self
            .agent
            .post(self.endpoint.as_str())
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send(&body)
            .with_context(|| format!("Request to {} failed", self.endpoint))?;

        let status = response.status();
        let text = response
            .body_mut()
            .read_to_string()
            .context("Failed to read chat response")?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            error!("Generation service returned {}: {}", status, detail);
            bail!("Generation service returned {}: {}", status.as_u16(), detail);
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).context("Failed to parse chat response")?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .context("Generation service returned no message content")
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .field("vision_model", &self.vision_model)
            .finish_non_exhaustive()
    }
}

impl GenerationService for ChatClient {
    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let chat = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(&request.system),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Text(&request.user),
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        self.complete(&chat)
    }

    fn describe_image(&self, request: &ImageRequest) -> Result<String> {
        let chat = ChatRequest {
            model: &self.vision_model,
            messages: vec![ChatMessage {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: &request.instruction,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: request.data_url(),
                        },
                    },
                ]),
            }],
            temperature: None,
            max_tokens: None,
        };
        self.complete(&chat)
    }
}

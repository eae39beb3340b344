use crate::config::{LlmConfig, ModelApi};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Stops generation before the model appends explanations after the code
pub const STOP_SEQUENCE: &str = "###";

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Text completion capability used by the fixer
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Return the model's answer to `prompt`, trimmed and non-empty
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Create the client variant selected in the config
pub fn create_client(config: &LlmConfig, api_key: &str) -> Box<dyn ModelClient> {
    match config.api {
        ModelApi::Chat => Box::new(ChatClient::new(config, api_key)),
        ModelApi::Completion => Box::new(CompletionClient::new(config, api_key)),
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stop: [&'a str; 1],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// OpenAI-compatible `/chat/completions` client
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ChatClient {
    pub fn new(config: &LlmConfig, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl ModelClient for ChatClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: Some(SYSTEM_PROMPT.into()),
                },
                ChatMessage {
                    role: "user".into(),
                    content: Some(prompt.to_string()),
                },
            ],
            temperature: 0.0,
            max_tokens: self.max_tokens,
            stop: [STOP_SEQUENCE],
        };
        debug!("Requesting chat completion from model {}", self.model);

        let url = format!("{}/chat/completions", self.base_url);
        let response: ChatResponse = post_json(&self.client, &url, &self.api_key, &request).await?;
        trace!("Response has {} choices", response.choices.len());

        // First choice is the primary response
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content);
        non_empty(content)
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
    stop: [&'a str; 1],
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: Option<String>,
}

/// Legacy `/completions` client
pub struct CompletionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl CompletionClient {
    pub fn new(config: &LlmConfig, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl ModelClient for CompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            prompt,
            temperature: 0.0,
            max_tokens: self.max_tokens,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            stop: [STOP_SEQUENCE],
        };
        debug!("Requesting completion from model {}", self.model);

        let url = format!("{}/completions", self.base_url);
        let response: CompletionResponse =
            post_json(&self.client, &url, &self.api_key, &request).await?;
        trace!("Response has {} choices", response.choices.len());

        let text = response.choices.into_iter().next().and_then(|c| c.text);
        non_empty(text)
    }
}

async fn post_json<B: Serialize, R: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &B,
) -> Result<R> {
    let response = client
        .post(url)
        .bearer_auth(api_key)
        .json(body)
        .send()
        .await
        .map_err(|e| Error::Model(format!("request to {} failed: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(Error::Model(format!("{} returned {}: {}", url, status, text)));
    }

    response
        .json()
        .await
        .map_err(|e| Error::Model(format!("invalid response from {}: {}", url, e)))
}

fn non_empty(answer: Option<String>) -> Result<String> {
    let answer = answer.unwrap_or_default();
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        return Err(Error::Model("empty completion".to_string()));
    }
    trace!("Completion: {}", trimmed);
    Ok(trimmed.to_string())
}

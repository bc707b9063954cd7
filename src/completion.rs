//! Concrete completion providers for `vsearch ask` and `POST /ask`.
//!
//! Unlike embedding calls, completion calls are never retried: a failure
//! surfaces to the user as an answer-generation error.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use vaultsearch_core::embedding::CompletionProvider;

use crate::config::LlmConfig;
use crate::embedding::http_client;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

pub struct DisabledCompletion;

#[async_trait]
impl CompletionProvider for DisabledCompletion {
    async fn complete(&self, _prompt: &str, _model_id: &str) -> Result<String> {
        bail!("LLM provider is disabled. Set [llm] provider in config.")
    }
}

/// `POST {url}/api/generate` with `stream: false`.
pub struct OllamaCompletion {
    url: String,
    client: reqwest::Client,
}

impl OllamaCompletion {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl CompletionProvider for OllamaCompletion {
    async fn complete(&self, prompt: &str, model_id: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": model_id,
            "prompt": prompt,
            "stream": false,
        });
        let response = self
            .client
            .post(format!("{}/api/generate", self.url.trim_end_matches('/')))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Ollama connection error (is Ollama running at {}?)", self.url))?;
        let json = read_json("Ollama", response).await?;
        json.get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Invalid Ollama response: missing response field"))
    }
}

/// `POST /v1/chat/completions`. Requires `OPENAI_API_KEY`.
pub struct OpenAICompletion {
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAICompletion {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            api_key,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompletion {
    async fn complete(&self, prompt: &str, model_id: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": model_id,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("OpenAI connection error")?;
        let json = read_json("OpenAI", response).await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

async fn read_json(label: &str, response: reqwest::Response) -> Result<serde_json::Value> {
    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("{} API error {}: {}", label, status, body_text);
    }
    response
        .json()
        .await
        .with_context(|| format!("Invalid {} response body", label))
}

pub fn create_completion_provider(config: &LlmConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledCompletion)),
        "ollama" => Ok(Arc::new(OllamaCompletion::new(config)?)),
        "openai" => Ok(Arc::new(OpenAICompletion::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

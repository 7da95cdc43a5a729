//! OpenAI-compatible chat-completions client used as the answer generator.

use anyhow::{Context, Result};
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use docrag_core::config::GeneratorConfig;
use docrag_core::RankedPassage;
use docrag_hybrid::{build_context, AnswerGenerator};

const SYSTEM_PROMPT: &str = "You answer questions about a document using only the numbered references provided. \
If the references do not contain the answer, say so. Cite references as [#n].";

pub struct ChatCompletionsGenerator {
    url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    api_key: Option<String>,
    http: HttpClient,
}

impl ChatCompletionsGenerator {
    pub fn new(api_url: &str, cfg: &GeneratorConfig) -> Result<Self> {
        let base = api_url.trim_end_matches('/');
        let url = if base.ends_with("/chat/completions") { base.to_string() } else { format!("{base}/chat/completions") };
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;
        let api_key = std::env::var(&cfg.api_key_env).ok().filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!("{} is not set, calling {} without credentials", cfg.api_key_env, url);
        }
        Ok(Self { url, model: cfg.model.clone(), temperature: cfg.temperature, max_tokens: cfg.max_tokens, api_key, http })
    }
}

impl AnswerGenerator for ChatCompletionsGenerator {
    fn generate(&self, question: &str, passages: &[RankedPassage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT.to_string() },
                ChatMessage { role: "user", content: format!("{}\nQuestion: {}", build_context(passages), question) },
            ],
        };
        let mut builder = self.http.post(&self.url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().with_context(|| format!("Failed to reach {}", self.url))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            anyhow::bail!("Generation failed ({}): {}", status, body);
        }
        let parsed: ChatResponse = response.json().context("Failed to parse chat completion")?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|c| !c.is_empty())
            .context("Chat completion contained no answer")?;
        tracing::debug!(model = %self.model, chars = answer.len(), "generated answer");
        Ok(answer)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

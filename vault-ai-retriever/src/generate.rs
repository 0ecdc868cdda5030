//! Answer generation against an external text-generation backend.
//!
//! The backend is best-effort: possibly slow, possibly failing. Requests
//! carry a bounded timeout so a hung backend cannot stall the gateway
//! forever. Failures propagate to the gateway, which drops the request.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Settings for the HTTP generation backend (OpenAI-compatible chat
/// completions endpoint).
#[derive(Debug, Clone, serde::Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Full URL of the chat completions endpoint
    pub endpoint: String,
    /// Bearer token, if the endpoint requires one
    pub api_key: Option<String>,
    /// Model identifier passed through to the backend
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1/chat/completions".to_string(),
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            timeout_secs: 60,
        }
    }
}

/// External answer-generation capability: question plus retrieved context in,
/// free-text answer out.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, question: &str, context: &str) -> Result<String>;
}

/// Chat-completions response shape (only the fields we read).
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// [`AnswerGenerator`] backed by an OpenAI-compatible HTTP endpoint.
pub struct HttpAnswerGenerator {
    client: reqwest::Client,
    config: GeneratorConfig,
}

impl HttpAnswerGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client for answer generation")?;
        Ok(Self { client, config })
    }

    fn build_prompt(question: &str, context: &str) -> String {
        format!(
            "You are a highly knowledgeable AI assistant with access to a personal \
knowledge base. Your task is to provide a concise, accurate, and informative \
response to the user's question based on the given context. Follow these guidelines:

1. Be descriptive but concise, focusing on the most relevant information.
2. Use a confident and authoritative tone.
3. Use proper Markdown formatting for enhanced readability.
4. Include relevant facts, figures, or brief examples if they enhance the answer.
5. If the context doesn't contain relevant information to answer the question, state that clearly.
6. Reference the source files when providing information, using the format [File Name].
7. Start your response immediately without any prefix or formatting.
8. IMPORTANT: DO NOT start your answer with ```. Only use ``` for inline code snippets if absolutely necessary.

Question: {question}

Context:
{context}

Response:\n"
        )
    }

    /// Some backends wrap the whole answer in a code fence despite the
    /// prompt; strip it so the published answer is plain prose.
    fn clean_answer(text: &str) -> String {
        let mut cleaned = text.trim();
        if cleaned.starts_with("```") {
            cleaned = cleaned
                .split_once('\n')
                .map(|(_, rest)| rest)
                .unwrap_or("")
                .trim();
            cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();
        }
        cleaned.to_string()
    }
}

#[async_trait]
impl AnswerGenerator for HttpAnswerGenerator {
    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        let prompt = Self::build_prompt(question, context);

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.7,
            "top_p": 0.95,
            "max_tokens": 500,
        });

        let mut request = self.client.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .context("Answer generation request failed")?
            .error_for_status()
            .context("Answer generation backend returned an error status")?;

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to decode answer generation response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("Answer generation response contained no choices"))?;

        Ok(Self::clean_answer(&content))
    }
}

/// A canned generator for testing. Records every (question, context) pair it
/// was asked to answer; can be switched to fail to exercise the gateway's
/// drop-on-error path.
pub struct MockAnswerGenerator {
    pub calls: Arc<Mutex<Vec<(String, String)>>>,
    fail: bool,
}

impl MockAnswerGenerator {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }
}

impl Default for MockAnswerGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnswerGenerator for MockAnswerGenerator {
    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        let mut calls = self.calls.lock().unwrap();
        calls.push((question.to_string(), context.to_string()));
        if self.fail {
            return Err(anyhow!("mock generation failure"));
        }
        Ok(format!("Answer to: {question}"))
    }
}

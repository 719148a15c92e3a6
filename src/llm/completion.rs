use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

/// Generates a reply to a single prompt.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Chat model served by the configured HTTP provider.
pub struct HttpChatModel {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpChatModel {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        complete(&self.client, &self.config, prompt).await
    }
}

/// Send a single-turn prompt to the chat model with deterministic sampling
/// and return the reply text.
pub async fn complete(client: &reqwest::Client, config: &LlmConfig, prompt: &str) -> Result<String> {
    match config.provider.as_str() {
        "ollama" => call_ollama(client, config, prompt).await,
        "openai" => call_openai(client, config, prompt).await,
        other => anyhow::bail!("Unknown LLM provider: {other}"),
    }
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

fn user_message(prompt: &str) -> Vec<Message> {
    vec![Message {
        role: "user".to_string(),
        content: prompt.to_string(),
    }]
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Message,
}

async fn call_ollama(client: &reqwest::Client, config: &LlmConfig, prompt: &str) -> Result<String> {
    let url = format!("{}/api/chat", config.base_url);

    let req = OllamaChatRequest {
        model: config.chat_model.clone(),
        messages: user_message(prompt),
        stream: false,
        options: OllamaOptions { temperature: 0.0 },
    };

    let resp = client
        .post(&url)
        .json(&req)
        .send()
        .await
        .context("Failed to call Ollama chat API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Ollama chat API returned {status}: {body}");
    }

    let body: OllamaChatResponse = resp
        .json()
        .await
        .context("Failed to parse Ollama chat response")?;
    Ok(body.message.content)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiReply,
}

#[derive(Deserialize)]
struct OpenAiReply {
    content: Option<String>,
}

async fn call_openai(client: &reqwest::Client, config: &LlmConfig, prompt: &str) -> Result<String> {
    let url = format!("{}/v1/chat/completions", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let req = OpenAiChatRequest {
        model: config.chat_model.clone(),
        messages: user_message(prompt),
        temperature: 0.0,
    };

    let resp = client
        .post(&url)
        .bearer_auth(api_key)
        .json(&req)
        .send()
        .await
        .context("Failed to call OpenAI chat API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("OpenAI chat API returned {status}: {body}");
    }

    let body: OpenAiChatResponse = resp
        .json()
        .await
        .context("Failed to parse OpenAI chat response")?;

    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .context("OpenAI chat API returned no content")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap};
    use axum::routing::post;
    use axum::{Json, Router};
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::sync::Arc;

    #[test]
    fn test_openai_request_is_deterministic() {
        let req = OpenAiChatRequest {
            model: "gpt-4".into(),
            messages: user_message("hello"),
            temperature: 0.0,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hello");
    }

    #[test]
    fn test_openai_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"It parses CSV."}}]}"#;
        let body: OpenAiChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            body.choices[0].message.content.as_deref(),
            Some("It parses CSV.")
        );
    }

    #[tokio::test]
    async fn test_unknown_provider_is_rejected() {
        let client = reqwest::Client::new();
        let config = LlmConfig {
            provider: "mystery".into(),
            ..LlmConfig::default()
        };
        let err = complete(&client, &config, "q").await.unwrap_err();
        assert!(err.to_string().contains("mystery"));
    }

    /// Serve a canned OpenAI reply on an ephemeral port and capture the request.
    async fn fake_openai() -> (String, Arc<Mutex<Vec<(Option<String>, Value)>>>) {
        let seen: Arc<Mutex<Vec<(Option<String>, Value)>>> = Arc::default();
        let recorder = seen.clone();
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let recorder = recorder.clone();
                async move {
                    let auth = headers
                        .get(header::AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    recorder.lock().push((auth, body));
                    Json(json!({
                        "choices": [{"message": {"role": "assistant", "content": "It parses CSV."}}]
                    }))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), seen)
    }

    #[tokio::test]
    async fn test_http_chat_model_sends_prompt_at_temperature_zero() {
        let (base_url, seen) = fake_openai().await;
        let model = HttpChatModel::new(
            reqwest::Client::new(),
            LlmConfig {
                base_url,
                chat_model: "gpt-4".into(),
                api_key: Some("sk-test".into()),
                ..LlmConfig::default()
            },
        );

        let reply = model.complete("Context:\nx = 1\n\nQuestion: q").await.unwrap();
        assert_eq!(reply, "It parses CSV.");

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        let (auth, body) = &seen[0];
        assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["messages"][0]["content"], "Context:\nx = 1\n\nQuestion: q");
    }
}

//! Chat-completion client used to write the digest.
//!
//! [`OpenRouterClient`] speaks the OpenAI-compatible
//! `POST {base_url}/chat/completions` API. Rate limits (429) and server
//! errors (5xx) are retried with exponential backoff (1s, 2s, 4s, ...);
//! other client errors fail immediately.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::config::LlmConfig;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send `prompt` as a single user message and return the reply text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f64,
    max_retries: u32,
    site_url: Option<String>,
    site_name: Option<String>,
    backoff_base: Duration,
}

impl OpenRouterClient {
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
            site_url: config.site_url.clone(),
            site_name: config.site_name.clone(),
            backoff_base: Duration::from_secs(1),
        })
    }

    /// Reads the key from the environment variable named by
    /// `[llm].api_key_env`.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("{} not set", config.api_key_env))?;
        Self::new(config, api_key)
    }

    #[cfg(test)]
    fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.backoff_base * (1u32 << (attempt - 1).min(5));
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying completion");
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body);
            if let Some(url) = &self.site_url {
                request = request.header("HTTP-Referer", url);
            }
            if let Some(name) = &self.site_name {
                request = request.header("X-Title", name);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        let text = parse_completion(&json)?;
                        tracing::info!(model = %self.model, chars = text.len(), "completion received");
                        return Ok(text);
                    }

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        tracing::warn!(%status, attempt, "completion request failed");
                        last_err = Some(anyhow!("LLM API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("LLM API error {}: {}", status, body_text);
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "completion request failed");
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("LLM completion failed after retries")))
    }
}

/// `choices[0].message.content` of a chat-completion response.
pub fn parse_completion(json: &serde_json::Value) -> Result<String> {
    if let Some(err) = json.get("error") {
        bail!("LLM API returned an error: {}", err);
    }
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid LLM response: missing choices[0].message.content"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn config(base_url: String) -> LlmConfig {
        LlmConfig {
            base_url,
            max_retries: 2,
            site_name: Some("Plant 4".to_string()),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_parse_completion() {
        let ok = json!({"choices": [{"message": {"role": "assistant", "content": "Component ID: 9.3.4"}}]});
        assert_eq!(parse_completion(&ok).unwrap(), "Component ID: 9.3.4");
        assert!(parse_completion(&json!({"choices": []})).is_err());
        assert!(parse_completion(&json!({"error": {"message": "bad key"}})).is_err());
    }

    #[tokio::test]
    async fn test_complete_sends_prompt_and_headers() {
        let app = Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(
                    headers.get("authorization").and_then(|v| v.to_str().ok()),
                    Some("Bearer sk-test")
                );
                assert_eq!(
                    headers.get("x-title").and_then(|v| v.to_str().ok()),
                    Some("Plant 4")
                );
                assert!(headers.get("http-referer").is_none());
                assert_eq!(body["model"], json!("tngtech/deepseek-r1t2-chimera:free"));
                assert_eq!(body["messages"][0]["role"], json!("user"));
                let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
                Json(json!({"choices": [{"message": {"content": format!("echo: {}", prompt)}}]}))
            }),
        );
        let base = serve(app).await;
        let client = OpenRouterClient::new(&config(base), "sk-test").unwrap();
        assert_eq!(client.complete("hello").await.unwrap(), "echo: hello");
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/chat/completions",
            post(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        (StatusCode::TOO_MANY_REQUESTS, Json(json!({"error": "slow down"})))
                    } else {
                        (
                            StatusCode::OK,
                            Json(json!({"choices": [{"message": {"content": "done"}}]})),
                        )
                    }
                }
            }),
        );
        let base = serve(app).await;
        let client = OpenRouterClient::new(&config(base), "k")
            .unwrap()
            .with_backoff_base(Duration::from_millis(1));
        assert_eq!(client.complete("x").await.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/chat/completions",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::UNAUTHORIZED, "bad key")
                }
            }),
        );
        let base = serve(app).await;
        let client = OpenRouterClient::new(&config(base), "k")
            .unwrap()
            .with_backoff_base(Duration::from_millis(1));
        let err = client.complete("x").await.unwrap_err();
        assert!(err.to_string().contains("401"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

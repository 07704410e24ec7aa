//! Completion provider implementations.
//!
//! - **[`DisabledProvider`]**: fails every call; used when
//!   `completion.provider = "disabled"`.
//! - **[`GeminiProvider`]**: calls the Gemini `generateContent` REST endpoint.
//!
//! Use [`create_provider`] to pick one from configuration.
//!
//! # Retry Strategy
//!
//! Only upstream failures are retried, never a reply that fails to parse:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, ... (capped at 2^5) plus up to 500ms of jitter

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use bidvault_core::completion::CompletionProvider;
use bidvault_core::error::{Error, Result};

use crate::config::CompletionConfig;

/// Instantiate the provider named in `config.provider`.
pub fn create_provider(config: &CompletionConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiProvider::new(config.clone())?)),
        "disabled" => Ok(Arc::new(DisabledProvider)),
        other => Err(Error::UpstreamError(format!(
            "unknown completion provider: {}",
            other
        ))),
    }
}

// ============ Disabled Provider ============

/// A provider that refuses every request.
pub struct DisabledProvider;

#[async_trait]
impl CompletionProvider for DisabledProvider {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _system_instruction: &str, _prompt: &str) -> Result<String> {
        Err(Error::UpstreamError(
            "completion provider is disabled".to_string(),
        ))
    }
}

// ============ Gemini Provider ============

/// Provider backed by the Gemini REST API.
///
/// The API key is read from the environment variable named by
/// `api_key_env` on every call, so a key exported after start-up is picked
/// up without a restart.
pub struct GeminiProvider {
    config: CompletionConfig,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::UpstreamError(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn api_key(&self) -> Result<String> {
        match std::env::var(&self.config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(Error::MissingCredential {
                env_var: self.config.api_key_env.clone(),
            }),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

/// Whether an HTTP status is worth another attempt.
pub(crate) fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

fn backoff(attempt: u32) -> Duration {
    let base = Duration::from_secs(1 << (attempt - 1).min(5));
    let jitter = rand::thread_rng().gen_range(0..=500u64);
    base + Duration::from_millis(jitter)
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, system_instruction: &str, prompt: &str) -> Result<String> {
        let api_key = self.api_key()?;

        let body = serde_json::json!({
            "systemInstruction": { "parts": [{ "text": system_instruction }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "responseMimeType": "application/json" },
        });
        let url = self.endpoint();

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = backoff(attempt);
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying completion");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("x-goog-api-key", &api_key)
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        // A body cut off mid-read is a transport failure and is retried;
                        // a complete body that is not JSON is not.
                        let text = match response.text().await {
                            Ok(text) => text,
                            Err(e) => {
                                last_err =
                                    Some(Error::UpstreamError(format!("reading reply body: {}", e)));
                                continue;
                            }
                        };
                        let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
                            Error::MalformedResponse(format!("reply body is not JSON: {}", e))
                        })?;
                        return parse_generate_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = Error::UpstreamError(format!("Gemini API error {}: {}", status, body_text));

                    // Rate limited or server error: retry
                    if is_retryable_status(status) {
                        last_err = Some(err);
                        continue;
                    }

                    // Client error (not 429): fail now
                    return Err(err);
                }
                Err(e) => {
                    last_err = Some(Error::UpstreamError(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::UpstreamError("completion failed after retries".to_string())))
    }
}

/// Concatenate the text parts of the first candidate.
///
/// A reply with no candidate text yields an empty string, which the
/// sanitizer reports as an empty response. A blocked prompt is an upstream
/// error.
pub(crate) fn parse_generate_response(json: &serde_json::Value) -> Result<String> {
    if let Some(reason) = json
        .pointer("/promptFeedback/blockReason")
        .and_then(|r| r.as_str())
    {
        return Err(Error::UpstreamError(format!(
            "prompt blocked by the service: {}",
            reason
        )));
    }

    let text = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect::<String>()
        })
        .unwrap_or_default();
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_with_env(var: &str) -> CompletionConfig {
        CompletionConfig {
            api_key_env: var.to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            max_retries: 0,
            ..CompletionConfig::default()
        }
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let provider =
            GeminiProvider::new(config_with_env("BIDVAULT_TEST_KEY_THAT_IS_NEVER_SET")).unwrap();
        let err = provider.generate("sys", "prompt").await.unwrap_err();
        assert!(
            matches!(err, Error::MissingCredential { ref env_var } if env_var == "BIDVAULT_TEST_KEY_THAT_IS_NEVER_SET")
        );
    }

    #[tokio::test]
    async fn disabled_provider_always_fails() {
        let err = DisabledProvider.generate("s", "p").await.unwrap_err();
        assert!(matches!(err, Error::UpstreamError(_)));
    }

    #[test]
    fn endpoint_joins_base_and_model() {
        let provider = GeminiProvider::new(CompletionConfig {
            base_url: "https://example.test/v1beta/".into(),
            model: "gemini-x".into(),
            ..CompletionConfig::default()
        })
        .unwrap();
        assert_eq!(
            provider.endpoint(),
            "https://example.test/v1beta/models/gemini-x:generateContent"
        );
    }

    #[test]
    fn retry_classification() {
        use reqwest::StatusCode;
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        assert!(backoff(1) >= Duration::from_secs(1));
        assert!(backoff(1) <= Duration::from_millis(1500));
        assert!(backoff(10) >= Duration::from_secs(32));
        assert!(backoff(10) <= Duration::from_millis(32_500));
    }

    #[test]
    fn parses_concatenated_parts() {
        let reply = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "[{\"question\":" }, { "text": "\"Q\",\"answer\":\"A\"}]" }] }
            }]
        });
        assert_eq!(
            parse_generate_response(&reply).unwrap(),
            r#"[{"question":"Q","answer":"A"}]"#
        );
    }

    #[test]
    fn no_candidates_is_empty_text() {
        assert_eq!(parse_generate_response(&json!({})).unwrap(), "");
    }

    #[test]
    fn blocked_prompt_is_upstream_error() {
        let reply = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = parse_generate_response(&reply).unwrap_err();
        assert!(matches!(err, Error::UpstreamError(ref m) if m.contains("SAFETY")));
    }
}

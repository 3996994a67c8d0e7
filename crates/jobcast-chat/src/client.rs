// Upstream proxy client (HTTP direct, no SDK)

use jobcast_events::JobContext;
use serde_json::Value;
use tracing::{error, info};

use crate::config::ChatRelayConfig;
use crate::error::{truncate_message, ChatRelayError, Result, EVENT_MESSAGE_LIMIT};
use crate::session::ChatRequest;

/// Response header carrying the proxy's call-correlation id, kept on HTTP
/// errors to make 4xx/5xx debugging actionable
pub const CALL_ID_HEADER: &str = "x-litellm-call-id";

/// Streaming HTTP client for the chat-completion proxy
pub struct ProxyClient {
    http: reqwest::Client,
    base_url: String,
}

impl ProxyClient {
    pub fn new(config: &ChatRelayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()
            .map_err(|e| ChatRelayError::Unexpected(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.proxy_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve the bearer token for proxy auth, checked before any network
    /// call
    ///
    /// Order: the explicit config override, else the job-provided
    /// authorization with any `Bearer ` prefix stripped.
    pub fn resolve_bearer_token(config: &ChatRelayConfig, job: &JobContext) -> Result<String> {
        if let Some(token) = config
            .auth_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            info!("using proxy auth token source: explicit config override");
            return Ok(token.to_string());
        }

        if let Some(job_auth) = job
            .job_authorization
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
        {
            info!("using proxy auth token source: job authorization");
            // Byte-wise prefix check: indexing the str directly could land
            // mid-character on non-ASCII input.
            let has_bearer_prefix = job_auth
                .as_bytes()
                .get(..7)
                .is_some_and(|p| p.eq_ignore_ascii_case(b"bearer "));
            let token = if has_bearer_prefix {
                job_auth[7..].trim()
            } else {
                job_auth
            };
            return Ok(token.to_string());
        }

        error!("no proxy auth token source available: missing config override and job authorization");
        Err(ChatRelayError::Configuration(
            "no bearer token available for upstream proxy auth; \
             set an explicit auth token (local) or ensure job authorization is present (deployed)"
                .to_string(),
        ))
    }

    /// Build the streaming chat-completion payload
    pub fn build_chat_payload(request: &ChatRequest) -> Result<Value> {
        let mut payload = serde_json::json!({
            "model": request.model,
            "messages": serde_json::to_value(&request.messages)
                .map_err(|e| ChatRelayError::Unexpected(format!("failed to encode messages: {e}")))?,
            "stream": true,
        });

        if let Some(obj) = payload.as_object_mut() {
            if let Some(temperature) = request.temperature {
                obj.insert("temperature".to_string(), serde_json::json!(temperature));
            }
            if let Some(max_tokens) = request.max_tokens {
                obj.insert("max_tokens".to_string(), serde_json::json!(max_tokens));
            }
        }

        Ok(payload)
    }

    /// POST the payload and hand back the accepted streaming response
    ///
    /// A non-success status is classified as `UpstreamHttp`, carrying the
    /// truncated body and the proxy's call-correlation id when present.
    pub async fn open_chat_stream(&self, token: &str, payload: &Value) -> Result<reqwest::Response> {
        let endpoint = format!("{}/v1/chat/completions", self.base_url);
        info!(endpoint = %endpoint, "submitting streaming chat request");

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(token)
            .json(payload)
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let call_id = response
                .headers()
                .get(CALL_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());

            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable>".to_string());
            let body = truncate_message(&body, EVENT_MESSAGE_LIMIT);
            let body = if body.is_empty() {
                "<empty body>".to_string()
            } else {
                body
            };

            return Err(ChatRelayError::UpstreamHttp {
                status,
                body,
                call_id,
            });
        }

        Ok(response)
    }
}

/// Map a transport failure into the session taxonomy
pub(crate) fn classify_transport_error(err: reqwest::Error) -> ChatRelayError {
    if err.is_timeout() {
        ChatRelayError::UpstreamTimeout(err.to_string())
    } else {
        ChatRelayError::Unexpected(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use jobcast_events::MemorySink;
    use std::sync::Arc;

    fn job_context() -> JobContext {
        JobContext::new(Arc::new(MemorySink::new()))
    }

    #[test]
    fn test_explicit_token_wins_over_job_authorization() {
        let config = ChatRelayConfig::new().auth_token("local-token");
        let job = job_context().with_job_authorization("Bearer deployed-token");

        let token = ProxyClient::resolve_bearer_token(&config, &job).unwrap();
        assert_eq!(token, "local-token");
    }

    #[test]
    fn test_job_authorization_bearer_prefix_stripped() {
        let config = ChatRelayConfig::new();
        let job = job_context().with_job_authorization("Bearer deployed-token");

        let token = ProxyClient::resolve_bearer_token(&config, &job).unwrap();
        assert_eq!(token, "deployed-token");

        // Prefix match is case-insensitive.
        let job = job_context().with_job_authorization("bearer other-token");
        let token = ProxyClient::resolve_bearer_token(&config, &job).unwrap();
        assert_eq!(token, "other-token");
    }

    #[test]
    fn test_job_authorization_without_prefix_used_verbatim() {
        let config = ChatRelayConfig::new();
        let job = job_context().with_job_authorization("raw-token");

        let token = ProxyClient::resolve_bearer_token(&config, &job).unwrap();
        assert_eq!(token, "raw-token");
    }

    #[test]
    fn test_non_ascii_job_authorization_used_verbatim() {
        let config = ChatRelayConfig::new();

        // Multi-byte characters straddle byte offset 7; the prefix check
        // must not slice there.
        let job = job_context().with_job_authorization("αβγδ");
        let token = ProxyClient::resolve_bearer_token(&config, &job).unwrap();
        assert_eq!(token, "αβγδ");

        let job = job_context().with_job_authorization("Bearér café-token");
        let token = ProxyClient::resolve_bearer_token(&config, &job).unwrap();
        assert_eq!(token, "Bearér café-token");

        // A real bearer prefix followed by a non-ASCII token still strips.
        let job = job_context().with_job_authorization("Bearer jetón-désu");
        let token = ProxyClient::resolve_bearer_token(&config, &job).unwrap();
        assert_eq!(token, "jetón-désu");
    }

    #[test]
    fn test_missing_credentials_is_configuration_error() {
        let config = ChatRelayConfig::new();
        let job = job_context();

        let err = ProxyClient::resolve_bearer_token(&config, &job).unwrap_err();
        assert_eq!(err.code(), "CONFIGURATION_ERROR");

        // Whitespace-only sources count as absent.
        let config = ChatRelayConfig::new().auth_token("   ");
        let job = job_context().with_job_authorization("  ");
        let err = ProxyClient::resolve_bearer_token(&config, &job).unwrap_err();
        assert_eq!(err.code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_chat_payload_shape() {
        let request = ChatRequest::new("gpt-4o", vec![Message::human("hi")])
            .temperature(0.5)
            .max_tokens(128);

        let payload = ProxyClient::build_chat_payload(&request).unwrap();
        assert_eq!(payload["model"], "gpt-4o");
        assert_eq!(payload["stream"], true);
        assert_eq!(payload["messages"][0]["role"], "user");
        assert_eq!(payload["temperature"], 0.5);
        assert_eq!(payload["max_tokens"], 128);
    }

    #[test]
    fn test_chat_payload_omits_unset_sampling() {
        let request = ChatRequest::new("gpt-4o", vec![Message::human("hi")]);
        let payload = ProxyClient::build_chat_payload(&request).unwrap();
        assert!(payload.get("temperature").is_none());
        assert!(payload.get("max_tokens").is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = ChatRelayConfig::new().proxy_base_url("http://proxy:4000/");
        let client = ProxyClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://proxy:4000");
    }
}

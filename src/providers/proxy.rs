//! Chat proxy provider
//!
//! Talks to the chat proxy's completion endpoint. The proxy takes a list of
//! role/parts messages plus request settings and answers with a plain-text
//! body.

use crate::config::ProviderConfig;
use crate::error::{ChatloomError, Result};
use crate::graph::{ChatMessage, MessagePart, Role};
use crate::providers::{is_proxy_error, Provider};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Provider backed by the chat proxy HTTP endpoint
///
/// # Examples
///
/// ```
/// use chatloom::config::ProviderConfig;
/// use chatloom::providers::ProxyProvider;
///
/// let provider = ProxyProvider::new(ProviderConfig::default()).unwrap();
/// assert_eq!(provider.endpoint(), "http://localhost:5173/api/chat/completions");
/// ```
#[derive(Debug, Clone)]
pub struct ProxyProvider {
    client: Client,
    config: ProviderConfig,
}

#[derive(Debug, Serialize)]
struct ProxyRequest {
    messages: Vec<ProxyMessage>,
    settings: ProxySettings,
}

#[derive(Debug, Serialize)]
struct ProxyMessage {
    role: Role,
    parts: Vec<ProxyPart>,
}

#[derive(Debug, Serialize)]
struct ProxyPart {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

#[derive(Debug, Serialize)]
struct ProxySettings {
    model: String,
}

impl ProxyProvider {
    /// Create a provider for the configured proxy
    ///
    /// # Errors
    ///
    /// Returns `ChatloomError::Provider` if the HTTP client cannot be built
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("chatloom/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChatloomError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized chat proxy provider: base_url={}, model={}",
            config.base_url,
            config.model
        );

        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Full URL of the completion endpoint
    pub fn endpoint(&self) -> String {
        format!(
            "{}/api/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn convert_messages(&self, messages: &[ChatMessage]) -> Vec<ProxyMessage> {
        messages
            .iter()
            .map(|message| ProxyMessage {
                role: message.role,
                parts: message
                    .parts
                    .iter()
                    .filter_map(|part| match part {
                        MessagePart::Text { text } => Some(ProxyPart {
                            kind: "text",
                            text: text.clone(),
                        }),
                        MessagePart::Reasoning { .. } => None,
                    })
                    .collect(),
            })
            .collect()
    }
}

#[async_trait]
impl Provider for ProxyProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ProxyRequest {
            messages: self.convert_messages(messages),
            settings: ProxySettings {
                model: self.config.model.clone(),
            },
        };

        tracing::debug!(
            "Sending proxy request: {} messages to {}",
            request.messages.len(),
            self.endpoint()
        );

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Proxy request failed: {}", e);
                ChatloomError::Provider(format!("Proxy request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Proxy returned error {}: {}", status, error_text);
            return Err(ChatloomError::Provider(format!(
                "Proxy returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let body = response.text().await.map_err(|e| {
            tracing::error!("Failed to read proxy response body: {}", e);
            ChatloomError::Provider(format!("Failed to read proxy response: {}", e))
        })?;

        if is_proxy_error(&body) {
            tracing::warn!("Proxy reported an upstream failure");
            return Err(ChatloomError::ProxyError(body).into());
        }

        tracing::debug!("Proxy response: {} bytes", body.len());
        Ok(body)
    }

    fn name(&self) -> &'static str {
        "proxy"
    }
}

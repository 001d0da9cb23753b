//! Chat title generation
//!
//! Titles are best effort: any failure leaves the chat untitled and the next
//! commit tries again.

use crate::config::TitleConfig;
use crate::graph::ChatMessage;
use crate::providers::Provider;
use std::sync::Arc;
use std::time::Duration;

const TITLE_INSTRUCTION: &str = "Create an unexpected, thematic title for this conversation in less than 4 words. Do not merely summarize what's happening:";

/// Progress of a chat's title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TitleState {
    /// No title yet; the next eligible commit asks for one
    #[default]
    Untitled,
    /// A request is in flight
    Pending,
    /// A title was stored; no further requests
    Titled,
}

/// Builds the single system message sent to the provider
pub fn build_title_prompt(messages: &[ChatMessage]) -> ChatMessage {
    let transcript = messages
        .iter()
        .filter_map(|message| {
            message
                .first_text()
                .filter(|text| !text.is_empty())
                .map(|text| format!("{}: {}", message.role, text))
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    ChatMessage::system(format!(
        "{}\n<messages>\n{}\n</messages>",
        TITLE_INSTRUCTION, transcript
    ))
}

/// Cleans up a raw completion into a title
///
/// Strips one surrounding quote on either end, drops markdown emphasis and
/// heading marks, and keeps only the text before the first colon. Returns
/// `None` when nothing is left.
///
/// # Examples
///
/// ```
/// use chatloom::sync::sanitize_title;
///
/// assert_eq!(sanitize_title("\"**Moonlit Detour**\"").as_deref(), Some("Moonlit Detour"));
/// assert_eq!(sanitize_title("Title: subtitle").as_deref(), Some("Title"));
/// assert_eq!(sanitize_title("  ##  "), None);
/// ```
pub fn sanitize_title(raw: &str) -> Option<String> {
    let unquoted = raw.strip_prefix(['"', '\'']).unwrap_or(raw);
    let unquoted = unquoted.strip_suffix(['"', '\'']).unwrap_or(unquoted);

    let cleaned: String = unquoted.chars().filter(|c| *c != '*' && *c != '#').collect();
    let title = cleaned.split(':').next().unwrap_or_default().trim();

    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// Asks a provider for short chat titles
#[derive(Clone)]
pub struct TitleGenerator {
    provider: Arc<dyn Provider>,
    config: TitleConfig,
}

impl std::fmt::Debug for TitleGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TitleGenerator")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish()
    }
}

impl TitleGenerator {
    pub fn new(provider: Arc<dyn Provider>, config: TitleConfig) -> Self {
        Self { provider, config }
    }

    /// Whether a chat with `message_count` committed messages may be titled
    pub fn is_eligible(&self, message_count: usize) -> bool {
        self.config.enabled && message_count >= self.config.min_messages
    }

    /// Runs one bounded title request
    ///
    /// Failures, timeouts and empty results are logged and yield `None`.
    pub async fn generate(&self, messages: &[ChatMessage]) -> Option<String> {
        let prompt = build_title_prompt(messages);
        let timeout = Duration::from_secs(self.config.timeout_seconds);

        match tokio::time::timeout(timeout, self.provider.complete(&[prompt])).await {
            Ok(Ok(raw)) => {
                let title = sanitize_title(&raw);
                if title.is_none() {
                    tracing::warn!("Title generation returned an empty title");
                }
                title
            }
            Ok(Err(e)) => {
                tracing::warn!("Title generation failed via {}: {}", self.provider.name(), e);
                None
            }
            Err(_) => {
                tracing::warn!(
                    "Title generation timed out after {}s",
                    self.config.timeout_seconds
                );
                None
            }
        }
    }
}

//! Base provider trait
//!
//! A provider turns a list of chat messages into a single text completion.
//! Chatloom only needs best-effort, non-streaming completions (titles), so
//! the trait is deliberately small.

use crate::error::Result;
use crate::graph::ChatMessage;
use async_trait::async_trait;

/// Marker the chat proxy appends to a body when the upstream call failed
pub const PROXY_ERROR_SENTINEL: &str = "<!-- oai-proxy-error -->";

/// Returns true when a completion body carries the proxy error marker
pub fn is_proxy_error(body: &str) -> bool {
    body.trim_end().ends_with(PROXY_ERROR_SENTINEL)
}

/// Text completion backend
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use chatloom::error::Result;
/// use chatloom::graph::ChatMessage;
/// use chatloom::providers::Provider;
///
/// struct Echo;
///
/// #[async_trait]
/// impl Provider for Echo {
///     async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
///         Ok(messages.last().map(|m| m.text()).unwrap_or_default())
///     }
///
///     fn name(&self) -> &'static str {
///         "echo"
///     }
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Completes a conversation
    ///
    /// # Arguments
    ///
    /// * `messages` - Conversation so far, oldest first
    ///
    /// # Errors
    ///
    /// Returns `ChatloomError::Provider` if the request fails and
    /// `ChatloomError::ProxyError` if the proxy reports an upstream failure
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

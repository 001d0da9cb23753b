//! Chat transport abstraction
//!
//! The transport owns the linear message list the user sees and reports
//! whether a reply is in flight. The sync adapter only observes the list and
//! status, and replaces the list wholesale after navigation.

use crate::graph::{ChatMessage, Role};
use serde::{Deserialize, Serialize};

/// Lifecycle state of the transport's current request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportStatus {
    /// Idle; the message list is settled
    #[default]
    Ready,
    /// A request was sent and no reply tokens have arrived yet
    Submitted,
    /// Reply tokens are arriving
    Streaming,
    /// The last request failed
    Error,
}

/// Linear view of a chat owned by the streaming engine
pub trait ChatTransport {
    /// Current linear message list
    fn messages(&self) -> &[ChatMessage];

    /// Current request status
    fn status(&self) -> TransportStatus;

    /// Replaces the message list wholesale
    fn replace_messages(&mut self, messages: Vec<ChatMessage>);
}

/// In-process transport used by the CLI and tests
///
/// # Examples
///
/// ```
/// use chatloom::graph::{ChatMessage, Role};
/// use chatloom::transport::{ChatTransport, LocalTransport, TransportStatus};
///
/// let mut transport = LocalTransport::new();
/// transport.submit(ChatMessage::user("Hi"));
/// assert_eq!(transport.status(), TransportStatus::Submitted);
///
/// transport.begin_reply(Role::Assistant);
/// transport.append_reply_text("Hello!");
/// transport.finish();
/// assert_eq!(transport.status(), TransportStatus::Ready);
/// assert_eq!(transport.messages().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LocalTransport {
    messages: Vec<ChatMessage>,
    status: TransportStatus,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            status: TransportStatus::Ready,
        }
    }

    /// Appends a user message and marks the request as submitted
    pub fn submit(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.status = TransportStatus::Submitted;
    }

    /// Appends an empty reply that streamed text will fill
    ///
    /// Returns the id of the new reply message.
    pub fn begin_reply(&mut self, role: Role) -> String {
        let reply = ChatMessage::empty(role);
        let id = reply.id.clone();
        self.messages.push(reply);
        self.status = TransportStatus::Streaming;
        id
    }

    /// Appends streamed text to the last message
    pub fn append_reply_text(&mut self, delta: &str) {
        if let Some(last) = self.messages.last_mut() {
            last.push_text(delta);
        }
        self.status = TransportStatus::Streaming;
    }

    /// Marks the request as complete
    pub fn finish(&mut self) {
        self.status = TransportStatus::Ready;
    }

    /// Marks the request as failed, dropping a reply that never got content
    pub fn fail(&mut self) {
        if self
            .messages
            .last()
            .map(|m| m.role == Role::Assistant && m.is_empty())
            .unwrap_or(false)
        {
            self.messages.pop();
        }
        self.status = TransportStatus::Error;
    }

    /// Keeps only the first `len` messages
    ///
    /// Used before an edit or regenerate so the next reply continues from the
    /// divergence point.
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
        self.status = TransportStatus::Ready;
    }

    /// Most recent message, if any
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

impl ChatTransport for LocalTransport {
    fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    fn status(&self) -> TransportStatus {
        self.status
    }

    fn replace_messages(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
    }
}

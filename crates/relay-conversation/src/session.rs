use chrono::{DateTime, Utc};
use relay_core::{Message, Reply, Turn, UsageStats};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::aggregator::UsageAggregator;

/// Ordered history and cumulative usage for one ongoing chat.
///
/// History is append-only; `reset` is the only way to shrink it and clears
/// the totals in the same step.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    history: Vec<Message>,
    usage: UsageAggregator,
}

/// Snapshot of a session for status displays
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub message_count: usize,
    pub totals: UsageStats,
}

impl ConversationSession {
    pub fn new() -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            history: Vec::new(),
            usage: UsageAggregator::new(),
        };
        debug!("Started conversation session {}", session.id);
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn append_user(&mut self, content: impl Into<String>) {
        self.history.push(Message::user(content));
    }

    /// Record a successful backend reply and fold its usage into the totals.
    ///
    /// Takes the reply by value, so a single reply cannot be folded twice.
    pub fn append_assistant(&mut self, reply: Reply) {
        let (text, usage) = reply.into_parts();
        self.usage.fold(usage);
        self.history.push(Message::assistant(text, Some(usage)));
    }

    /// Record a failed turn as an assistant message without usage.
    pub fn append_failure(&mut self, text: impl Into<String>) {
        self.history.push(Message::assistant(text, None));
    }

    pub fn reset(&mut self) {
        let cleared = self.history.len();
        self.history.clear();
        self.usage.clear();
        info!("Cleared {} messages from session {}", cleared, self.id);
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn totals(&self) -> UsageStats {
        self.usage.totals()
    }

    /// Role/content pairs in history order, as sent upstream.
    pub fn turns(&self) -> Vec<Turn> {
        self.history.iter().map(Turn::from).collect()
    }

    pub fn last(&self) -> Option<&Message> {
        self.history.last()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            started_at: self.started_at,
            message_count: self.history.len(),
            totals: self.totals(),
        }
    }
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

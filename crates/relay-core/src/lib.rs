use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};
use std::pin::Pin;
use thiserror::Error;

pub mod wire;

pub use wire::{ErrorBody, ErrorKind, InvocationPayload, InvocationRequest, InvocationResponse};

/// Token counts reported by a provider for one exchange.
///
/// Missing or `null` counters deserialize as 0. `total_tokens` is carried as
/// reported and is not recomputed from the other two.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    #[serde(default, deserialize_with = "zero_if_null")]
    pub prompt_tokens: u64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub completion_tokens: u64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub total_tokens: u64,
}

impl UsageStats {
    pub const ZERO: Self = Self {
        prompt_tokens: 0,
        completion_tokens: 0,
        total_tokens: 0,
    };

    pub fn new(prompt_tokens: u64, completion_tokens: u64, total_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl Add for UsageStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            prompt_tokens: self.prompt_tokens.saturating_add(rhs.prompt_tokens),
            completion_tokens: self.completion_tokens.saturating_add(rhs.completion_tokens),
            total_tokens: self.total_tokens.saturating_add(rhs.total_tokens),
        }
    }
}

impl AddAssign for UsageStats {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl fmt::Display for UsageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} prompt + {} completion = {} total",
            self.prompt_tokens, self.completion_tokens, self.total_tokens
        )
    }
}

fn zero_if_null<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a conversation's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Present only on assistant messages produced by a successful backend call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageStats>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            usage: None,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, usage: Option<UsageStats>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            usage,
            timestamp: Utc::now(),
        }
    }

    /// Caption shown under an assistant reply that carries non-zero usage.
    pub fn usage_caption(&self) -> Option<String> {
        match (self.role, self.usage) {
            (Role::Assistant, Some(usage)) if !usage.is_zero() => {
                Some(format!("💰 Token: {usage}"))
            }
            _ => None,
        }
    }
}

/// The role/content pair sent across the transport. Usage never travels upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&Message> for Turn {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// A successful backend reply, consumed exactly once by the session that
/// requested it. Deliberately not `Clone`.
#[derive(Debug, PartialEq, Eq)]
pub struct Reply {
    text: String,
    usage: UsageStats,
}

impl Reply {
    pub fn new(text: impl Into<String>, usage: UsageStats) -> Self {
        Self {
            text: text.into(),
            usage,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn usage(&self) -> UsageStats {
        self.usage
    }

    pub fn into_parts(self) -> (String, UsageStats) {
        (self.text, self.usage)
    }
}

/// Normalized output of a single-shot adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub usage: UsageStats,
}

/// Ordered, finite text fragments from a streaming call.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RelayError {
    /// Whether the failure belongs to a single turn and the conversation can go on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RelayError::Transport(_) | RelayError::MalformedResponse(_) | RelayError::Provider(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

/// A provider realization behind the common invocation contract.
///
/// Adapters are stateless: every call receives the full ordered history and
/// owns translating canonical roles into the provider's own labels.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Provider-specific usage object as returned by the upstream API.
    type RawUsage: Send + Sync;

    fn name(&self) -> &'static str;

    async fn invoke(&self, model_id: &str, turns: &[Turn]) -> Result<Completion>;

    /// Streams reply fragments in order. No usage is accounted for this path.
    async fn invoke_stream(&self, model_id: &str, turns: &[Turn]) -> Result<TextStream>;

    fn token_accounting(&self, raw_usage: &Self::RawUsage) -> UsageStats;
}

use relay_client::BackendGateway;
use relay_config::AgentConfig;
use relay_conversation::ConversationSession;
use relay_core::{RelayError, Reply, Result, UsageStats};
use tracing::{error, info, instrument, warn};

/// What became of one submitted user turn.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The backend answered; its usage is already folded into the session totals.
    Replied { text: String, usage: UsageStats },
    /// The call failed; `text` is the error-marked reply recorded in history.
    Failed { text: String, error: RelayError },
}

impl TurnOutcome {
    pub fn text(&self) -> &str {
        match self {
            TurnOutcome::Replied { text, .. } | TurnOutcome::Failed { text, .. } => text,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TurnOutcome::Failed { .. })
    }
}

/// Runs chat turns against one backend endpoint and model.
pub struct ChatAgent {
    gateway: BackendGateway,
    model_id: String,
    error_prefix: String,
}

impl ChatAgent {
    pub fn new(
        gateway: BackendGateway,
        model_id: impl Into<String>,
        error_prefix: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            model_id: model_id.into(),
            error_prefix: error_prefix.into(),
        }
    }

    /// Build an agent from configuration, picking the endpoint and model
    /// among the configured candidates (first of each when not given).
    pub fn from_config(
        config: &AgentConfig,
        endpoint: Option<&str>,
        model: Option<&str>,
    ) -> Result<Self> {
        let gateway = BackendGateway::from_settings(&config.gateway, endpoint)?;
        let model_id = config.gateway.select_model(model)?;
        info!("Chat agent using model {}", model_id);

        Ok(Self::new(gateway, model_id, config.ui.error_prefix.clone()))
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn gateway(&self) -> &BackendGateway {
        &self.gateway
    }

    /// Submit one user turn and record its outcome in `session`.
    ///
    /// Transport, malformed-reply and provider failures are recorded as an
    /// error-marked assistant message and returned as [`TurnOutcome::Failed`];
    /// the session stays usable. Any other error is recorded the same way
    /// and then returned.
    #[instrument(skip(self, session, input), fields(session = %session.id(), model = %self.model_id))]
    pub async fn send(
        &self,
        session: &mut ConversationSession,
        input: impl Into<String>,
    ) -> Result<TurnOutcome> {
        session.append_user(input);
        let result = self.gateway.invoke(session, &self.model_id).await;
        self.record(session, result)
    }

    /// Append the outcome of the call for the user turn just added, so every
    /// user message is followed by exactly one assistant message.
    fn record(
        &self,
        session: &mut ConversationSession,
        result: Result<Reply>,
    ) -> Result<TurnOutcome> {
        let outcome = match result {
            Ok(reply) => {
                let text = reply.text().to_string();
                let usage = reply.usage();
                session.append_assistant(reply);
                TurnOutcome::Replied { text, usage }
            }
            Err(error) => {
                let text = format!("{}: {}", self.error_prefix, error);
                session.append_failure(text.clone());
                if !error.is_recoverable() {
                    error!("Turn aborted: {}", error);
                    return Err(error);
                }
                warn!("Turn failed: {}", error);
                TurnOutcome::Failed { text, error }
            }
        };

        info!(
            "Session now holds {} messages ({})",
            session.len(),
            session.totals()
        );
        Ok(outcome)
    }
}

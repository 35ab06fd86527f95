use relay_config::GatewaySettings;
use relay_conversation::ConversationSession;
use relay_core::{
    ErrorBody, ErrorKind, InvocationRequest, InvocationResponse, RelayError, Reply, Result,
};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub mod ui;

pub use ui::{display_message, display_totals, format_message, format_totals};

const PREVIEW_CHARS: usize = 100;

/// Client side of the invocation transport.
///
/// Serializes a session's history into an [`InvocationRequest`], posts it to
/// one configured endpoint and turns the reply into a [`Reply`]. Never
/// mutates the session; recording the outcome is the caller's job.
#[derive(Debug, Clone)]
pub struct BackendGateway {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl BackendGateway {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.into();
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(RelayError::Config(format!(
                "Endpoint '{}' must start with http:// or https://",
                endpoint
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint,
            timeout,
        })
    }

    /// Build a gateway for one of the configured candidate endpoints.
    pub fn from_settings(settings: &GatewaySettings, endpoint: Option<&str>) -> Result<Self> {
        let endpoint = settings.select_endpoint(endpoint)?;
        info!("Using backend endpoint: {}", endpoint);
        Self::new(endpoint, settings.timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[instrument(skip(self, session), fields(session = %session.id()))]
    pub async fn invoke(&self, session: &ConversationSession, model_id: &str) -> Result<Reply> {
        let request = InvocationRequest {
            model: model_id.to_string(),
            messages: session.turns(),
        };
        info!("Sending {} messages to backend", request.messages.len());

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            warn!("Backend returned HTTP {}", status);
            return Err(classify_failure(status, &body));
        }

        let parsed = parse_reply(&body)?;
        info!("Received response: {}...", preview(&parsed.response));
        if parsed.usage.is_none() {
            debug!("Backend reply carried no usage; counting it as zero");
        }

        let usage = parsed.usage_or_zero();
        Ok(Reply::new(parsed.response, usage))
    }

    fn transport_error(&self, e: reqwest::Error) -> RelayError {
        if e.is_timeout() {
            RelayError::Transport(format!(
                "request to {} timed out after {}s",
                self.endpoint,
                self.timeout.as_secs_f32()
            ))
        } else if e.is_connect() {
            RelayError::Transport(format!("could not connect to {}: {e}", self.endpoint))
        } else {
            RelayError::Transport(e.to_string())
        }
    }
}

fn parse_reply(body: &str) -> Result<InvocationResponse> {
    serde_json::from_str(body).map_err(|e| RelayError::MalformedResponse(e.to_string()))
}

fn classify_failure(status: reqwest::StatusCode, body: &str) -> RelayError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error,
            kind: Some(ErrorKind::Provider),
        }) => RelayError::Provider(error),
        Ok(ErrorBody { error, .. }) => RelayError::Transport(format!("HTTP {status}: {error}")),
        Err(_) => RelayError::Transport(format!("HTTP {status}: {}", preview(body))),
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

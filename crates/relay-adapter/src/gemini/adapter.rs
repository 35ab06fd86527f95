use async_trait::async_trait;
use futures::StreamExt;
use relay_config::AdapterSettings;
use relay_core::{Completion, ModelAdapter, RelayError, Result, TextStream, Turn, UsageStats};
use reqwest_eventsource::{Event, EventSource};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::types::{ApiErrorEnvelope, GenerateContentRequest, GenerateContentResponse, UsageMetadata};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct GeminiAdapter {
    settings: AdapterSettings,
    http: reqwest::Client,
}

impl GeminiAdapter {
    pub fn new(settings: AdapterSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(RelayError::Config(
                "Gemini API key is not set (adapter.api_key or GEMINI_API_KEY)".into(),
            ));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { settings, http })
    }

    pub fn settings(&self) -> &AdapterSettings {
        &self.settings
    }

    fn api_url(&self, model_id: &str, stream: bool) -> String {
        let base = self.settings.base_url.trim_end_matches('/');
        if stream {
            format!("{base}/{model_id}:streamGenerateContent?alt=sse")
        } else {
            format!("{base}/{model_id}:generateContent")
        }
    }

    fn request(&self, model_id: &str, turns: &[Turn], stream: bool) -> Result<reqwest::RequestBuilder> {
        if turns.is_empty() {
            return Err(RelayError::Provider("No messages to send to Gemini".into()));
        }

        let body = GenerateContentRequest::new(turns, &self.settings);
        Ok(self
            .http
            .post(self.api_url(model_id, stream))
            .header("x-goog-api-key", &self.settings.api_key)
            .json(&body))
    }
}

#[async_trait]
impl ModelAdapter for GeminiAdapter {
    type RawUsage = UsageMetadata;

    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn invoke(&self, model_id: &str, turns: &[Turn]) -> Result<Completion> {
        debug!(model = %model_id, turns = turns.len(), "Gemini generateContent request");

        let response = self
            .request(model_id, turns, false)?
            .timeout(self.settings.timeout())
            .send()
            .await
            .map_err(|e| RelayError::Provider(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(api_error(status, &text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| RelayError::Provider(format!("Failed to decode Gemini response: {e}")))?;

        if parsed.candidates.is_empty() {
            let reason = parsed.block_reason().unwrap_or("no candidates returned");
            return Err(RelayError::Provider(format!("Gemini returned no reply: {reason}")));
        }

        let usage = parsed
            .usage_metadata
            .as_ref()
            .map(|raw| self.token_accounting(raw))
            .unwrap_or_default();
        let text = parsed.text();

        info!(model = %model_id, tokens = usage.total_tokens, "Gemini reply received");
        Ok(Completion { text, usage })
    }

    async fn invoke_stream(&self, model_id: &str, turns: &[Turn]) -> Result<TextStream> {
        debug!(model = %model_id, turns = turns.len(), "Gemini streamGenerateContent request");

        let request = self.request(model_id, turns, true)?;
        let mut source = EventSource::new(request)
            .map_err(|e| RelayError::Provider(format!("Failed to open Gemini stream: {e}")))?;

        let stream = async_stream::stream! {
            while let Some(event) = source.next().await {
                match event {
                    Ok(Event::Open) => debug!("Gemini stream opened"),
                    Ok(Event::Message(message)) => {
                        match serde_json::from_str::<GenerateContentResponse>(&message.data) {
                            Ok(chunk) => {
                                // usageMetadata on chunks is not accounted for
                                let text = chunk.text();
                                if !text.is_empty() {
                                    yield Ok(text);
                                }
                            }
                            Err(e) => {
                                warn!("Undecodable Gemini stream chunk: {}", e);
                                yield Err(RelayError::Provider(format!("Bad Gemini stream chunk: {e}")));
                                break;
                            }
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                        let text = response.text().await.unwrap_or_default();
                        yield Err(api_error(status, &text));
                        break;
                    }
                    Err(e) => {
                        yield Err(RelayError::Provider(format!("Gemini stream error: {e}")));
                        break;
                    }
                }
            }
            source.close();
        };

        Ok(Box::pin(stream))
    }

    fn token_accounting(&self, raw_usage: &UsageMetadata) -> UsageStats {
        UsageStats::new(
            raw_usage.prompt_token_count.unwrap_or(0),
            raw_usage.candidates_token_count.unwrap_or(0),
            raw_usage.total_token_count.unwrap_or(0),
        )
    }
}

fn api_error(status: reqwest::StatusCode, body: &str) -> RelayError {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => {
            let label = envelope.error.status.unwrap_or_else(|| status.to_string());
            RelayError::Provider(format!("Gemini {label}: {}", envelope.error.message))
        }
        Err(_) => RelayError::Provider(format!("Gemini HTTP {status}: {body}")),
    }
}

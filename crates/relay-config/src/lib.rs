use relay_core::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub mod env_substitution;

pub use env_substitution::substitute_env_vars;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub ui: UiSettings,
    #[serde(default)]
    pub adapter: AdapterSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

/// Client-side candidates: backend endpoints, model ids and the request timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiSettings {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_input_placeholder")]
    pub input_placeholder: String,
    #[serde(default = "default_thinking_message")]
    pub thinking_message: String,
    #[serde(default = "default_error_prefix")]
    pub error_prefix: String,
    #[serde(default = "default_user_avatar")]
    pub user_avatar: String,
    #[serde(default = "default_assistant_avatar")]
    pub assistant_avatar: String,
}

/// Provider-side settings used by the model adapter behind the invocation server.
#[derive(Clone, Serialize, Deserialize)]
pub struct AdapterSettings {
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub thinking_budget: i32,
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_adapter_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl AgentConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| RelayError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        // An empty document is a valid "all defaults" config
        let mut raw: serde_json::Value = if yaml.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_yaml::from_str(yaml)
                .map_err(|e| RelayError::Config(format!("Failed to parse YAML: {}", e)))?
        };
        if raw.is_null() {
            raw = serde_json::Value::Object(Default::default());
        }

        substitute_env_vars(&mut raw)?;

        let config: AgentConfig = serde_json::from_value(raw)
            .map_err(|e| RelayError::Config(format!("Invalid configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.gateway.validate()?;
        self.adapter.validate()?;

        if self.server.bind.trim().is_empty() {
            return Err(RelayError::Config("Server bind address cannot be empty".into()));
        }
        Ok(())
    }
}

impl GatewaySettings {
    fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(RelayError::Config("At least one backend endpoint is required".into()));
        }
        if let Some(bad) = self
            .endpoints
            .iter()
            .find(|url| !url.starts_with("http://") && !url.starts_with("https://"))
        {
            return Err(RelayError::Config(format!(
                "Endpoint '{}' must start with http:// or https://",
                bad
            )));
        }
        if self.models.is_empty() {
            return Err(RelayError::Config("At least one model is required".into()));
        }
        if self.models.iter().any(|m| m.trim().is_empty()) {
            return Err(RelayError::Config("Model identifiers cannot be empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(RelayError::Config("Request timeout must be greater than zero".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Pick a backend endpoint by value or zero-based index; `None` picks the first.
    pub fn select_endpoint(&self, choice: Option<&str>) -> Result<&str> {
        select("endpoint", &self.endpoints, choice)
    }

    /// Pick a model id by value or zero-based index; `None` picks the first.
    pub fn select_model(&self, choice: Option<&str>) -> Result<&str> {
        select("model", &self.models, choice)
    }
}

fn select<'a>(kind: &str, candidates: &'a [String], choice: Option<&str>) -> Result<&'a str> {
    let Some(choice) = choice else {
        return candidates
            .first()
            .map(String::as_str)
            .ok_or_else(|| RelayError::Config(format!("No {} configured", kind)));
    };

    if let Some(found) = candidates.iter().find(|c| c.as_str() == choice) {
        return Ok(found);
    }
    if let Some(found) = choice.parse::<usize>().ok().and_then(|i| candidates.get(i)) {
        return Ok(found);
    }

    Err(RelayError::Config(format!(
        "Unknown {} '{}'; expected one of: {}",
        kind,
        choice,
        candidates.join(", ")
    )))
}

impl AdapterSettings {
    fn validate(&self) -> Result<()> {
        if self.default_model.trim().is_empty() {
            return Err(RelayError::Config("Default model cannot be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RelayError::Config("Temperature must be between 0.0 and 2.0".into()));
        }
        if self.timeout_secs == 0 {
            return Err(RelayError::Config("Adapter timeout must be greater than zero".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for AdapterSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterSettings")
            .field("default_model", &self.default_model)
            .field("system_instruction", &self.system_instruction)
            .field("temperature", &self.temperature)
            .field("thinking_budget", &self.thinking_budget)
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            models: default_models(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            title: default_title(),
            icon: default_icon(),
            input_placeholder: default_input_placeholder(),
            thinking_message: default_thinking_message(),
            error_prefix: default_error_prefix(),
            user_avatar: default_user_avatar(),
            assistant_avatar: default_assistant_avatar(),
        }
    }
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            system_instruction: default_system_instruction(),
            temperature: default_temperature(),
            thinking_budget: 0,
            api_key: default_api_key(),
            base_url: default_base_url(),
            timeout_secs: default_adapter_timeout_secs(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

fn default_endpoints() -> Vec<String> {
    vec![
        "http://localhost:8080/invocations".to_string(),
        "http://localhost:5000/api/chat".to_string(),
        "http://127.0.0.1:8080/invocations".to_string(),
    ]
}

fn default_models() -> Vec<String> {
    vec![
        "gemini-2.5-flash-lite".to_string(),
        "gemini-2.0-flash-lite".to_string(),
    ]
}

fn default_request_timeout_secs() -> u64 { 30 }
fn default_title() -> String { "AI Chat Assistant".to_string() }
fn default_icon() -> String { "✨".to_string() }
fn default_input_placeholder() -> String { "Type your message here...".to_string() }
fn default_thinking_message() -> String { "Thinking...".to_string() }
fn default_error_prefix() -> String { "❌ Error".to_string() }
fn default_user_avatar() -> String { "👤".to_string() }
fn default_assistant_avatar() -> String { "💡".to_string() }
fn default_model() -> String { "gemini-2.5-flash-lite".to_string() }
fn default_system_instruction() -> String { "You are a helpful assistant".to_string() }
fn default_temperature() -> f32 { 0.1 }
fn default_base_url() -> String { "https://generativelanguage.googleapis.com/v1beta/models".to_string() }
fn default_adapter_timeout_secs() -> u64 { 120 }
fn default_bind() -> String { "0.0.0.0:8080".to_string() }

fn default_api_key() -> String {
    env::var("GEMINI_API_KEY").unwrap_or_default()
}

//! Google Gemini adapter over the Generative Language REST API.

mod adapter;
mod types;

pub use adapter::GeminiAdapter;
pub use types::UsageMetadata;

//! Server side of Relay Chat.
//!
//! - [`GeminiAdapter`]: the Google Gemini realization of [`ModelAdapter`]
//! - [`handle_invocation`]: the entrypoint applied to every invocation payload
//! - [`InvocationServer`]: HTTP front for the entrypoint (`POST /invocations`, `GET /ping`)

pub mod entrypoint;
pub mod gemini;
pub mod server;

pub use entrypoint::handle_invocation;
pub use gemini::{GeminiAdapter, UsageMetadata};
pub use relay_core::ModelAdapter;
pub use server::InvocationServer;

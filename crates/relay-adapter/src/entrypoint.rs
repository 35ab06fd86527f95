use relay_core::{InvocationPayload, InvocationResponse, ModelAdapter, Result};
use tracing::{info, instrument};

/// Run one invocation payload through an adapter.
///
/// A missing `model` falls back to `default_model`; missing `messages` means
/// an empty history, which the adapter is free to reject.
#[instrument(skip(adapter, payload), fields(provider = adapter.name()))]
pub async fn handle_invocation<A>(
    adapter: &A,
    payload: InvocationPayload,
    default_model: &str,
) -> Result<InvocationResponse>
where
    A: ModelAdapter + ?Sized,
{
    let model = payload.model.unwrap_or_else(|| default_model.to_string());
    info!("Invoking {} with {} messages", model, payload.messages.len());

    let completion = adapter.invoke(&model, &payload.messages).await?;

    Ok(InvocationResponse {
        response: completion.text,
        usage: Some(completion.usage),
    })
}

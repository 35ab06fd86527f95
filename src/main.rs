use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use relay_adapter::{GeminiAdapter, InvocationServer, ModelAdapter};
use relay_agent::{ChatAgent, TurnOutcome};
use relay_client::{display_message, display_totals};
use relay_config::AgentConfig;
use relay_conversation::ConversationSession;
use relay_core::{Role, Turn};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "relay-chat")]
#[command(about = "Multi-turn chat relayed to a language-model backend", long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "FILE", default_value = "relay.yaml")]
    config: PathBuf,

    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, action = clap::ArgAction::SetTrue)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List candidate backend endpoints and models
    Options,

    /// Interactive conversation with a backend endpoint
    Chat {
        /// Endpoint URL or index among the configured candidates
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Model id or index among the configured candidates
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Run the invocation server backed by Gemini
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Stream a single reply straight from Gemini
    Stream {
        #[arg(short, long)]
        prompt: String,

        /// Model id (defaults to adapter.default_model)
        #[arg(short, long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    let config = if cli.config.exists() {
        info!("Loading configuration from: {:?}", cli.config);
        AgentConfig::from_yaml(&cli.config)?
    } else {
        info!("Using default configuration");
        AgentConfig::default()
    };

    match cli.command {
        Commands::Options => list_options(&config),
        Commands::Chat { endpoint, model } => {
            interactive_chat(&config, endpoint.as_deref(), model.as_deref()).await?;
        }
        Commands::Serve { bind } => {
            serve(config, bind).await?;
        }
        Commands::Stream { prompt, model } => {
            stream_reply(config, prompt, model).await?;
        }
    }

    Ok(())
}

fn list_options(config: &AgentConfig) {
    println!("\n🔌 Backend endpoints:");
    for (i, endpoint) in config.gateway.endpoints.iter().enumerate() {
        println!("  [{i}] {endpoint}");
    }

    println!("\n🧠 Models:");
    for (i, model) in config.gateway.models.iter().enumerate() {
        println!("  [{i}] {model}");
    }

    println!("\nTimeout: {}s\n", config.gateway.timeout_secs);
}

async fn interactive_chat(
    config: &AgentConfig,
    endpoint: Option<&str>,
    model: Option<&str>,
) -> Result<()> {
    let agent = ChatAgent::from_config(config, endpoint, model)?;
    let ui = &config.ui;
    let mut session = ConversationSession::new();

    println!("{} {}", ui.icon, ui.title);
    println!("Endpoint: {} | Model: {}", agent.gateway().endpoint(), agent.model_id());
    println!("{}", ui.input_placeholder);
    println!("Type 'exit' or 'quit' to end, 'clear' to start over, 'usage' for token totals");
    println!("═══════════════════════════════════════\n");

    loop {
        print!("{}> ", ui.user_avatar);
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            println!("Goodbye!");
            break;
        }
        if input.eq_ignore_ascii_case("clear") {
            session.reset();
            println!("🗑️  Conversation cleared\n");
            continue;
        }
        if input.eq_ignore_ascii_case("usage") {
            let summary = session.summary();
            println!(
                "Session {} (since {}): {} messages",
                summary.id,
                summary.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
                summary.message_count
            );
            display_totals(&summary.totals);
            continue;
        }

        println!("{}", ui.thinking_message);
        let outcome = agent.send(&mut session, input).await?;

        if let Some(message) = session.last() {
            display_message(message, ui);
        }
        if let TurnOutcome::Replied { .. } = outcome {
            display_totals(&session.totals());
        }
        println!();
    }

    Ok(())
}

async fn serve(config: AgentConfig, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let adapter = Arc::new(GeminiAdapter::new(config.adapter)?);
    let default_model = adapter.settings().default_model.clone();

    let server = InvocationServer::bind(&bind, adapter, default_model)?;
    println!("🚀 Invocation server listening on {bind}");

    let handle = server.spawn();
    tokio::task::spawn_blocking(move || handle.join())
        .await
        .context("server task failed")?
        .map_err(|_| anyhow::anyhow!("invocation server thread panicked"))?;

    Ok(())
}

async fn stream_reply(config: AgentConfig, prompt: String, model: Option<String>) -> Result<()> {
    let adapter = GeminiAdapter::new(config.adapter)?;
    let model = model.unwrap_or_else(|| adapter.settings().default_model.clone());
    info!("Streaming from {} ({})", adapter.name(), model);

    let turns = [Turn::new(Role::User, prompt)];
    let mut stream = adapter.invoke_stream(&model, &turns).await?;

    println!("\n{} Streaming response:\n", config.ui.assistant_avatar);
    while let Some(fragment) = stream.next().await {
        print!("{}", fragment?);
        io::stdout().flush()?;
    }
    println!("\n");

    Ok(())
}

fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

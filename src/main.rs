use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use llm_chat::config::default_config_path;
use llm_chat::services::{ChatSession, SessionOptions, YamlConfigStore};
use llm_chat::ui::Repl;

#[derive(Parser, Debug)]
#[command(name = "llm-chat", version)]
#[command(about = "Chat with OpenAI, Grok, Gemini or self-hosted models from the terminal")]
struct Args {
    /// Ask one question, print the answer and exit. Takes every argument after it.
    #[arg(
        short = 'c',
        long = "command",
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "QUESTION"
    )]
    command: Option<Vec<String>>,

    /// Configuration file (default: ~/.config/llm-chat-cli/configs.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Roles file (default: roles.yaml next to the configuration file)
    #[arg(long)]
    roles: Option<PathBuf>,

    /// Start on this model instead of the configured default (provider:model)
    #[arg(short, long)]
    model: Option<String>,

    /// Activate this role before the first turn
    #[arg(short, long)]
    role: Option<String>,

    #[arg(short, long)]
    temperature: Option<f32>,

    #[arg(long)]
    top_p: Option<f32>,

    /// Debug logging for this crate when RUST_LOG is unset
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) if verbose => EnvFilter::new("llm_chat=debug"),
        Err(_) => EnvFilter::new("warn"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path().context("Could not determine the configuration directory")?,
    };
    let store = YamlConfigStore::load(&config_path, args.roles.as_deref())
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    let options = SessionOptions {
        model: args.model,
        temperature: args.temperature,
        top_p: args.top_p,
    };
    let mut session =
        ChatSession::initialize(&store, options).context("Failed to start chat session")?;
    if let Some(role) = args.role.as_deref() {
        session.set_role(role)?;
    }

    let mut repl = Repl::new(session, Box::new(store), io::stdout());
    match args.command {
        Some(words) => repl.one_shot(&words.join(" ")).await,
        None => repl.run().await,
    }
}

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use cbci_chat_gateway::backend::{self, render_raw};
use cbci_chat_gateway::config::AppConfig;
use cbci_chat_gateway::{build_app, run_server, AppState};

const DEFAULT_QUESTION: &str = "서울 2023년 학생수";

#[derive(Parser, Debug)]
#[command(
    name = "cbci-chat",
    about = "Chat gateway for the CBCI education data backend",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the chat page and JSON API (default)
    Serve,
    /// Ask the backend one question and print the raw result
    Ask {
        #[arg(default_value = DEFAULT_QUESTION)]
        question: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level(cli.verbose)));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Ask { question } => ask(config, &question).await,
    }
}

/// Default filter when `RUST_LOG` is unset: info, then debug, then trace.
fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!(mode = config.backend.mode.as_str(), "starting education data chatbot");

    let backend = backend::setup(&config.backend)
        .await
        .context("failed to set up backend")?;
    let app = build_app(AppState::new(backend));

    run_server(app, config.bind_addr())
        .await
        .with_context(|| format!("server failed on {}", config.bind_addr()))
}

async fn ask(config: AppConfig, question: &str) -> anyhow::Result<()> {
    let backend = backend::setup(&config.backend)
        .await
        .context("failed to set up backend")?;

    let answer = backend.ask(question).await?;
    println!("답변: {}", render_raw(&answer));
    Ok(())
}

mod config;
mod error;
mod render;
mod serve;

use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use runtime::{Conversation, ConversationLoop, GeminiBackend, ToolRegistry};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use config::{Config, Secrets};
use error::Result;

#[derive(Parser)]
#[command(name = "toolchat")]
#[command(about = "Chat with a model that can look up live weather and stock prices", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./toolchat.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat in the terminal
    Chat,
    /// List the tools the model can call
    Tools,
    /// Serve the browser chat view
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
        /// Drop conversations idle for this many seconds
        #[arg(long, default_value_t = serve::DEFAULT_IDLE_TIMEOUT.as_secs())]
        idle_timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Before logging so RUST_LOG may come from .env.
    let dotenv = dotenvy::dotenv();
    init_logging(match cli.command {
        Some(Commands::Serve { .. }) => "info",
        _ => "warn",
    });
    if let Some(e) = dotenv.err().filter(|e| !e.not_found()) {
        warn!(error = %e, "failed to load .env");
    }

    let config = Config::discover(cli.config.as_deref())?;
    let secrets = Secrets::from_env();

    match cli.command {
        Some(Commands::Chat) | None => cmd_chat(&config, &secrets).await,
        Some(Commands::Tools) => cmd_tools(&config, &secrets),
        Some(Commands::Serve {
            addr,
            idle_timeout_secs,
        }) => {
            let chat = build_loop(&config, &secrets)?;
            serve::run(addr, chat, Duration::from_secs(idle_timeout_secs)).await
        }
    }
}

fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn registry(config: &Config, secrets: &Secrets) -> ToolRegistry {
    lookup::registry(config.weather(secrets), config.stock(secrets))
}

fn build_loop(config: &Config, secrets: &Secrets) -> Result<ConversationLoop<GeminiBackend>> {
    let backend = config.backend(secrets)?;
    Ok(ConversationLoop::new(backend, registry(config, secrets)))
}

async fn cmd_chat(config: &Config, secrets: &Secrets) -> Result<()> {
    let chat = build_loop(config, secrets)?;
    let mut conversation = Conversation::new();

    println!("{}", render::BANNER);
    println!("Model: {}\n", chat.backend());

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("You: ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            println!();
            break;
        }

        let input = line.trim();
        if render::is_exit(input) {
            break;
        }
        if input.is_empty() {
            println!("{}\n", render::EMPTY_INPUT);
            continue;
        }

        match chat.exchange(&mut conversation, input).await {
            Ok(exchange) => {
                for event in &exchange.events {
                    println!("{}", render::event(event));
                }
                println!("{}\n", render::usage(&exchange.usage));
            }
            Err(e) => {
                println!("An error occurred: {e}\nPlease try again.\n");
            }
        }
    }

    println!("{}", render::GOODBYE);
    Ok(())
}

fn cmd_tools(config: &Config, secrets: &Secrets) -> Result<()> {
    print!("{}", render::tools(&registry(config, secrets).specs()));
    Ok(())
}

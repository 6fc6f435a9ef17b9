//! llama-chat: streaming chat endpoint for llama.cpp server
//!
//! A Rust service that sits in front of llama.cpp's llama-server and
//! provides:
//! - A /chat endpoint streaming replies as they are generated
//! - Context-bounded prompt assembly with configurable formats
//! - Per-request generation stats logging

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

use llama_chat::{backend::LlamaCppBackend, config::AppConfig, run_server};

#[derive(Parser)]
#[command(name = "llama-chat")]
#[command(version = "0.1.0")]
#[command(about = "Streaming chat endpoint for llama.cpp server")]
#[command(long_about = "
llama-chat serves a chat endpoint in front of llama.cpp's llama-server:
  - POST /chat streams the generated reply as plain text
  - Conversation history is trimmed to fit the model's context window
  - Prompt formats: llama2, chatml

Example usage:
  llama-chat run --config config.yaml
  llama-chat check-config
  llama-chat test-backend
")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chat server
    Run {
        /// Override listen port
        #[arg(short, long)]
        port: Option<u16>,
        /// Override backend URL (e.g., "http://localhost:8080")
        #[arg(long)]
        backend_url: Option<String>,
    },

    /// Validate configuration file
    CheckConfig,

    /// Test connection to backend llama-server
    TestBackend,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level_filter = if let Some(level) = cli.log_level {
        level.to_string()
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
            .to_string()
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&level_filter))
        .init();

    match cli.command {
        Commands::Run { port, backend_url } => {
            run_chat(cli.config, port, backend_url).await?;
        }
        Commands::CheckConfig => {
            check_config(cli.config)?;
        }
        Commands::TestBackend => {
            test_backend(cli.config).await?;
        }
    }

    Ok(())
}

/// Run the chat server
async fn run_chat(
    config_path: PathBuf,
    port_override: Option<u16>,
    backend_url_override: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config_or_exit(&config_path);

    // Apply CLI overrides
    if let Some(port) = port_override {
        config.server.port = port;
    }
    if let Some(url) = backend_url_override {
        config.backend.url = url;
    }

    tracing::info!("Loading configuration from {:?}", config_path);

    run_server(config).await?;

    Ok(())
}

/// Validate configuration file
fn check_config(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match AppConfig::from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration file is valid\n");
            println!("Server:");
            println!("  Listen: {}:{}", config.server.host, config.server.port);
            println!("\nBackend:");
            println!("  URL: {}", config.backend.url);
            println!(
                "  TLS: {}",
                if config.backend.is_tls() { "enabled" } else { "disabled" }
            );
            if let Some(ref tls) = config.backend.tls {
                if tls.accept_invalid_certs {
                    println!("  TLS: Accepting invalid certificates");
                }
                if let Some(ref ca) = tls.ca_cert_path {
                    println!("  TLS CA: {}", ca);
                }
                if let Some(ref cert) = tls.client_cert_path {
                    println!("  TLS Client Cert: {}", cert);
                }
            }
            println!("  Timeout: {}s", config.backend.timeout_seconds);
            println!("\nModel:");
            println!("  Context window: {} tokens", config.model.context_window_tokens);
            println!(
                "  Reserved completion: {} tokens",
                config.model.reserved_completion_tokens
            );
            println!("  Usable prompt budget: {} tokens", config.model.budget().usable());
            println!("  Temperature: {}", config.model.temperature);
            println!("  Prompt cache: {}", config.model.cache_prompt);
            println!("  Format: {:?}", config.model.format);
            println!("\nPrompt:");
            println!("  System: {}", config.prompt.system);
            println!("\nStats:");
            println!("  Enabled: {}", config.stats.enabled);
            println!("  Format: {:?}", config.stats.format);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Test connection to backend
async fn test_backend(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_or_exit(&config_path);
    let backend = LlamaCppBackend::from_config(&config.backend)?;

    println!(
        "Testing connection to backend: {}/health",
        config.backend.base_url()
    );

    match backend.health().await {
        Ok(body) => {
            println!("✓ Backend is reachable");
            println!("  Response: {}", body.trim());
        }
        Err(e) => {
            println!("✗ Failed to connect to backend: {}", e);
            std::process::exit(1);
        }
    }

    // Cross-check the configured context window against the loaded model
    println!("\nFetching server properties: {}/props", config.backend.base_url());

    match backend.props().await {
        Ok(props) => {
            if let Some(model_path) = props.model_path {
                println!("  Model: {}", model_path);
            }
            if let Some(template) = props.chat_template {
                println!("  Chat template: {}", template);
            }
            match props.n_ctx {
                Some(n_ctx) => {
                    println!("  Server context size: {} tokens", n_ctx);
                    if (config.model.context_window_tokens as u64) > n_ctx {
                        println!(
                            "✗ Configured context window ({}) exceeds the server's n_ctx ({})",
                            config.model.context_window_tokens, n_ctx
                        );
                    } else {
                        println!("✓ Configured context window fits the server");
                    }
                }
                None => {
                    println!("  Server did not report a context size");
                }
            }
        }
        Err(e) => {
            println!("  /props error: {}", e);
        }
    }

    Ok(())
}

/// Load configuration or exit with error
fn load_config_or_exit(config_path: &PathBuf) -> AppConfig {
    match AppConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            eprintln!("\nMake sure you have a config.yaml file.");
            eprintln!("You can copy config.yaml.default and modify it:");
            eprintln!("  cp config.yaml.default config.yaml");
            std::process::exit(1);
        }
    }
}

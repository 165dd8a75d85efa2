//! tfgen
//!
//! Generates Terraform for a project with a team of LLM agents.
//!
//!   tfgen generate --source ./app --dest ./infra
//!   tfgen generate --source ./app --dest ./app --shared-root --execute-scripts
//!   tfgen serve --bind 127.0.0.1:3000 --cors-origin http://localhost:5173
//!
//! Settings come from `--config <file.toml>` when given, otherwise from the
//! environment (`.env` is loaded first); flags override both.

mod handlers;
mod provider;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use terraform_gen::{DestinationLayout, GeneratorConfig};

use crate::handlers::{generate_handler, health_check, GenerateResponse};
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "tfgen")]
#[command(about = "Multi-agent Terraform generator", version)]
struct Cli {
    /// TOML file with generator settings
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    
    /// LLM backend: ollama or openai
    #[arg(long, global = true, env = "LLM_PROVIDER", default_value = "ollama")]
    provider: String,
    
    /// Model used by every agent
    #[arg(long, global = true)]
    model: Option<String>,
    
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a project and write Terraform for it
    Generate {
        /// Project to analyze (defaults to SOURCE_REPO_DIR)
        #[arg(long)]
        source: Option<PathBuf>,
        
        /// Repository that receives the Terraform tree (defaults to DEST_REPO_DIR)
        #[arg(long)]
        dest: Option<PathBuf>,
        
        /// Replace the default request sent to the agents
        #[arg(long)]
        message: Option<String>,
        
        #[arg(long)]
        max_rounds: Option<usize>,
        
        /// Run terraform against the generated tree and feed errors back
        #[arg(long)]
        execute_scripts: bool,
        
        /// Write into the source repository itself
        #[arg(long)]
        shared_root: bool,
    },
    
    /// Serve the generator over HTTP
    Serve {
        #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3000")]
        bind: String,
        
        /// Browser origins allowed to call the API; none when unset
        #[arg(long = "cors-origin", env = "CORS_ALLOWED_ORIGINS", value_delimiter = ',')]
        cors_origins: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => GeneratorConfig::from_toml_file(path)?,
        None => GeneratorConfig::from_env(),
    };
    if let Some(model) = cli.model {
        config.model = model;
    }

    let provider = provider::build_provider(&cli.provider)?;
    provider::announce(provider.as_ref()).await;

    match cli.command {
        Command::Generate { source, dest, message, max_rounds, execute_scripts, shared_root } => {
            if let Some(source) = source {
                config.source_dir = source;
            }
            if let Some(dest) = dest {
                config.dest_dir = dest;
            }
            if let Some(rounds) = max_rounds {
                config.max_rounds = rounds;
            }
            config.execute_scripts |= execute_scripts;
            if shared_root {
                config.layout = DestinationLayout::Shared;
            }

            let report = terraform_gen::generate(&config, provider, message.as_deref())
                .await
                .context("Terraform generation failed")?;

            if let Some(violation) = report.result.protocol_violation() {
                tracing::warn!(?violation, "Run stopped on a protocol violation");
            }

            let summary = GenerateResponse::from(report);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Serve { bind, cors_origins } => {
            if config.execute_scripts {
                tracing::warn!("Script execution is enabled for every request served");
            }
            let state = AppState {
                provider,
                defaults: Arc::new(config),
            };
            serve(state, &bind, &cors_origins).await?;
        }
    }

    Ok(())
}

fn cors(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) if o != "*" => Some(value),
            _ => {
                tracing::warn!(origin = o, "Ignoring CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

fn app(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/generate", post(generate_handler))
        .layer(cors(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn serve(state: AppState, addr: &str, cors_origins: &[String]) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Cannot bind {}", addr))?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 tfgen server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health        - Health check");
    tracing::info!("  POST /api/generate  - Generate Terraform for a project");

    axum::serve(listener, app(state, cors_origins)).await?;

    Ok(())
}

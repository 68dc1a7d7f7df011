//! Engage application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialise tracing
//! 3. Build the chat backend and prompt generator
//! 4. Start the axum API server

mod cli;

use std::sync::Arc;

use clap::Parser;
use engage_api::routes;
use engage_api::state::AppState;
use engage_chat::{BackendError, ChatBackend, GeminiBackend, PromptGenerator, RemoteChatBackend};
use engage_core::config::{BackendKind, EngageConfig};

use crate::cli::CliArgs;

/// Build the chat backend selected by `config.backend.kind`.
///
/// Example prompts always come from the Generative Language API; without a
/// credential generation fails and the controller uses its built-in list.
fn build_backends(
    config: &EngageConfig,
) -> Result<(Arc<dyn ChatBackend>, Arc<dyn PromptGenerator>), BackendError> {
    let gemini = Arc::new(GeminiBackend::from_config(&config.backend)?);
    if !gemini.has_credential() {
        tracing::warn!("No Gemini API key configured; set GEMINI_API_KEY or backend.api_key");
    }

    let prompts: Arc<dyn PromptGenerator> = gemini.clone();
    let chat: Arc<dyn ChatBackend> = match config.backend.kind {
        BackendKind::Gemini => {
            tracing::info!(model = %config.backend.model, "Using Gemini chat backend");
            gemini
        }
        BackendKind::Remote => {
            tracing::info!(base_url = %config.backend.base_url, "Using remote chat backend");
            Arc::new(RemoteChatBackend::from_config(&config.backend)?)
        }
    };
    Ok((chat, prompts))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    // Tracing is not up yet, so a load failure is reported once it is.
    let (mut config, load_error) = cli::load_config(&config_file);
    config.general.port = args.resolve_port(config.general.port);
    config.general.log_level = args.resolve_log_level(&config.general.log_level);
    config.backend.kind = args.resolve_backend(config.backend.kind);

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Engage v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        None => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Some(_) if !config_file.exists() => {
            tracing::info!(path = %config_file.display(), "No configuration file, using defaults")
        }
        Some(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load configuration, using defaults"
        ),
    }

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    let (backend, prompt_generator) = build_backends(&config)?;
    let state = AppState::new(config.clone(), backend, prompt_generator);

    routes::start_server(&config, state).await?;

    Ok(())
}

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

mod cli;
mod config;
mod db;
mod llm;
mod pipeline;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs, Command};
use crate::llm::LlmManager;
use crate::llm::prompt::PromptComposer;
use crate::pipeline::Pipeline;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = CliArgs::parse();

    // Initialize logging
    init_tracing(args.log_json);

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Ensure scratch directory exists
    let data_dir = PathBuf::from(&config.data_dir);
    if !data_dir.exists() {
        info!("Creating data directory: {}", config.data_dir);
        std::fs::create_dir_all(&data_dir)?;
    }

    // Initialize LLM manager
    info!(
        "Initializing LLM manager with backend: {} (model {})",
        config.llm.backend, config.llm.model
    );
    let llm_manager = LlmManager::new(&config.llm)?;

    let pipeline = Pipeline::new(
        llm_manager,
        PromptComposer::default(),
        config.pipeline.validation,
        data_dir,
    );

    match &args.command {
        Command::Ask(ask) => {
            if let Err(e) = cli::run_ask(&pipeline, ask).await {
                error!("{}", e);
                return Err(e);
            }
        }
        Command::Serve(_) => {
            let web_config = config.web.clone();
            let app_state = Arc::new(AppState::new(config, pipeline));

            // Start the web server
            info!("Starting nl-sqlite server on {}:{}", web_config.host, web_config.port);
            match web::run_server(web_config, app_state).await {
                Ok(_) => info!("Server stopped gracefully"),
                Err(e) => {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}

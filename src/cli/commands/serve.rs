use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{error, info};

use crate::app::App;
use crate::cli::commands::load_config;
use crate::server::{ServerState, serve, shutdown_signal};

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, short = 'b', help = "Address to listen on (default: server.bind)")]
    pub bind: Option<String>,

    #[arg(long, help = "Skip the index rebuild on startup")]
    pub no_init: bool,
}

pub async fn handle_serve(args: ServeArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    let bind = config.server.bind.clone();
    let init_on_start = config.indexing.init_on_start && !args.no_init;

    let app = App::build(config)
        .await
        .context("failed to set up backends")?;

    if init_on_start {
        let manager = app.index_manager.clone();
        tokio::spawn(async move {
            match manager.init().await {
                Ok(count) => info!(count, "startup indexing finished"),
                Err(e) => error!(error = %e, "startup indexing failed"),
            }
        });
    }

    let state = ServerState {
        copilot: app.copilot.clone(),
        index_manager: app.index_manager.clone(),
    };
    serve(state, &bind, shutdown_signal())
        .await
        .with_context(|| format!("server on {bind} failed"))?;

    info!("server stopped");
    Ok(())
}

mod ask;
mod config;
mod init;
mod serve;
mod strategies;

pub use ask::AskArgs;
pub use config::ConfigCommand;
pub use serve::ServeArgs;

pub use ask::handle_ask;
pub use config::handle_config;
pub use init::handle_init;
pub use serve::handle_serve;
pub use strategies::handle_strategies;

use std::path::Path;

use anyhow::{Context, Result};

use crate::app::App;
use crate::models::Config;

pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    Ok(Config::load_with(path)
        .context("failed to load configuration")?
        .config)
}

pub(crate) async fn build_app(path: Option<&Path>) -> Result<App> {
    let config = load_config(path)?;
    App::build(config).await.context("failed to set up backends")
}

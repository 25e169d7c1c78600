use std::path::Path;

use anyhow::Result;

use crate::cli::commands::build_app;
use crate::cli::output::get_formatter;
use crate::models::OutputFormat;

pub async fn handle_strategies(format: OutputFormat, config_path: Option<&Path>) -> Result<()> {
    let app = build_app(config_path).await?;
    print!(
        "{}",
        get_formatter(format).format_strategies(app.copilot.registry())
    );
    Ok(())
}

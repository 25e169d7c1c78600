use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::app::App;
use crate::cli::commands::load_config;
use crate::cli::output::get_formatter;
use crate::models::OutputFormat;

pub async fn handle_init(
    format: OutputFormat,
    verbose: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let app = App::build_with_progress(config, format == OutputFormat::Text)
        .await
        .context("failed to set up backends")?;
    let formatter = get_formatter(format);

    let names = app.index_manager.indexer_names();
    if names.is_empty() {
        eprintln!("No vector or search backends are configured; nothing to index.");
        eprintln!("Hint: set [qdrant] url (or QDRANT_URL) and run again.");
    } else if verbose {
        eprintln!("Indexers: {}", names.join(", "));
    }

    let start = Instant::now();
    let count = app
        .index_manager
        .init()
        .await
        .context("index initialization failed")?;

    if verbose {
        eprintln!("Took: {}ms", start.elapsed().as_millis());
    }
    print!(
        "{}",
        formatter.format_message(&format!("Initialized {count} indexers"))
    );
    Ok(())
}

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use clap::Args;

use crate::cli::commands::build_app;
use crate::cli::output::get_formatter;
use crate::models::OutputFormat;

#[derive(Debug, Args)]
pub struct AskArgs {
    #[arg(required = true, help = "Question to ask")]
    pub question: Vec<String>,

    #[arg(
        long,
        short = 'e',
        help = "Retrieval strategy, e.g. directWiki or qdrantVector (default: directWiki)"
    )]
    pub engine: Option<String>,
}

pub async fn handle_ask(
    args: AskArgs,
    format: OutputFormat,
    verbose: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let question = args.question.join(" ");
    let question = question.trim();
    if question.is_empty() {
        anyhow::bail!("question cannot be empty");
    }

    let app = build_app(config_path).await?;
    let formatter = get_formatter(format);

    if verbose {
        let strategy = app.copilot.registry().resolve(args.engine.as_deref());
        eprintln!("Question: \"{question}\"");
        eprintln!("  Strategy: {}", strategy.name());
    }

    let start = Instant::now();
    let answer = app.copilot.ask(question, args.engine.as_deref()).await?;

    if verbose {
        eprintln!("  Took: {}ms", start.elapsed().as_millis());
        eprintln!();
    }

    print!("{}", formatter.format_answer(&answer));
    Ok(())
}

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wikiai::cli::commands::{
    handle_ask, handle_config, handle_init, handle_serve, handle_strategies,
};
use wikiai::cli::output::get_formatter;
use wikiai::cli::{Cli, Commands};
use wikiai::models::OutputFormat;
use wikiai::server::shutdown_signal;

fn init_tracing(verbose: bool) {
    let default = if verbose { "wikiai=debug" } else { "wikiai=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let format = cli.format.unwrap_or_default();

    // The server installs its own graceful shutdown.
    let result = if matches!(cli.command, Commands::Serve(_)) {
        run_command(cli).await
    } else {
        tokio::select! {
            result = run_command(cli) => result,
            _ = shutdown_signal() => {
                tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprint!("{}", get_formatter(format).format_error(&format!("{e:#}")));
        std::process::exit(1);
    }
}

async fn run_command(cli: Cli) -> Result<()> {
    let format: OutputFormat = cli.format.unwrap_or_default();
    let verbose = cli.verbose;
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Ask(args) => handle_ask(args, format, verbose, config).await,
        Commands::Strategies => handle_strategies(format, config).await,
        Commands::Init => handle_init(format, verbose, config).await,
        Commands::Serve(args) => handle_serve(args, config).await,
        Commands::Config(cmd) => handle_config(cmd, format, config).await,
    }
}

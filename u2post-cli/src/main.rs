use clap::Parser;
use tracing_subscriber::EnvFilter;

use u2post_cli::cli::{Cli, Commands};
use u2post_cli::commands;
use u2post_cli::error::CliError;
use u2post_cli::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let writer = OutputWriter::new(cli.output);
    if let Err(e) = run(cli, &writer).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli, writer: &OutputWriter) -> Result<(), CliError> {
    match cli.command {
        Commands::Dump(args) => commands::dump::execute(args, writer).await,
        Commands::Extract(args) => commands::extract::execute(args, writer).await,
        Commands::Rules(args) => commands::rules::execute(args, &cli.config, writer).await,
        Commands::Registry(args) => commands::registry::execute(args, &cli.config, writer).await,
        Commands::Config(args) => commands::config::execute(args, &cli.config, writer).await,
    }
}

/// Diagnostics go to stderr so JSON output on stdout stays parseable.
fn init_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

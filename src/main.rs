//! Foreman CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use foreman::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => foreman::cli::commands::run::execute(&cli.plan, args, cli.json).await,
        Commands::Validate => foreman::cli::commands::validate::execute(&cli.plan, cli.json).await,
        Commands::Waves => foreman::cli::commands::waves::execute(&cli.plan, cli.json).await,
    };

    if let Err(err) = result {
        foreman::cli::handle_error(&err, cli.json);
    }
}

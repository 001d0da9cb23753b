//! Chatloom - branching AI chat CLI
//!
#![doc = "Main entry point for the Chatloom application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatloom::cli::{Cli, Commands};
use chatloom::commands;
use chatloom::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    if let Some(db_path) = &cli.storage_path {
        tracing::info!("Using storage DB override: {}", db_path);
    }

    // Load and validate configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;
    config.validate()?;

    match cli.command {
        Commands::Chat { resume, characters } => {
            if let Some(id) = &resume {
                tracing::debug!("Resuming chat: {}", id);
            }
            commands::chat::run_chat(config, resume, characters).await?;
            Ok(())
        }
        Commands::History { command } => {
            tracing::info!("Starting history command");
            commands::history::handle_history(command, &config).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins; otherwise `chatloom=info`, or `chatloom=debug` when
/// verbose. Logs go to stderr so command output stays clean.
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "chatloom=debug"
    } else {
        "chatloom=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

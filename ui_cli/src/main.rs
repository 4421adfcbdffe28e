// browserctl
//
// Runs browser containers and manages the profiles they are started for.

mod commands;
mod error;
mod output;

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use commands::profile::ProfileCommand;
use commands::run::RunArgs;
use error::CliError;
use observability::{init_tracing, LogFormat, TracingConfig};
use user_config::{Settings, StorageBackend, CONFIG_ENV};

#[derive(Parser)]
#[command(name = "browserctl")]
#[command(version)]
#[command(about = "Run Chrome browser containers and manage their profiles", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (TOML)
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Output format for listings
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a browser container and keep it until interrupted
    Run(RunArgs),

    /// Profile management commands
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

fn tracing_config(settings: &Settings) -> Result<TracingConfig, CliError> {
    let format = LogFormat::from_str(&settings.logging.format)
        .map_err(|e| CliError::config_error(e.to_string()))?;
    Ok(TracingConfig {
        filter: settings.logging.filter.clone(),
        format,
        ..TracingConfig::default()
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())?;
    init_tracing(&tracing_config(&settings)?)?;
    debug!(?settings, "settings loaded");

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, &settings).await?,
        Commands::Profile { action } => {
            if settings.storage.backend == StorageBackend::Memory {
                output::warn("Memory profile storage is in use; changes are discarded on exit");
            }
            let store = commands::open_store(&settings.storage).await?;
            store.load().await?;
            commands::profile::execute(action, store, cli.output).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "browserctl",
            "run",
            "--chrome-version",
            "90.0",
            "--guid",
            "firstTryContainer",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.chrome_version, "90.0");
                assert_eq!(args.guid.as_deref(), Some("firstTryContainer"));
            }
            _ => panic!("expected run"),
        }
        assert_eq!(cli.output, OutputFormat::Table);
    }

    #[test]
    fn test_parse_profile_list_json() {
        let cli = Cli::try_parse_from(["browserctl", "profile", "list", "-o", "json"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Profile {
                action: ProfileCommand::List
            }
        ));
        assert_eq!(cli.output, OutputFormat::Json);
    }

    #[test]
    fn test_unknown_log_format_is_config_error() {
        let mut settings = Settings::default();
        settings.logging.format = "xml".to_string();

        let err = tracing_config(&settings).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_tracing_config_from_settings() {
        let mut settings = Settings::default();
        settings.logging.format = "json".to_string();
        settings.logging.filter = "browser_runner=debug".to_string();

        let config = tracing_config(&settings).unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter, "browser_runner=debug");
    }
}

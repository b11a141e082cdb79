use crate::{env::EnvVars, error::CliError};
use clap::Parser;
use commands::Commands;
use connectors::{
    adapter::Adapter,
    connector::Connector,
    events::EventSink,
    settings::{ConnectionConfig, ConnectorSettings},
};
use engine_runtime::{
    error::SyncError,
    execution::executor::{self, RunReport},
    settings::SyncConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod env;
mod error;
mod output;

#[derive(Parser)]
#[command(name = "tablesync", version = "0.1.0", about = "Table synchronization tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync {
            config,
            env_file,
            output,
        } => {
            let mut env = EnvVars::from_process();
            if let Some(path) = env_file {
                env.load_file(path)?;
            }

            let config = match config {
                Some(path) => SyncConfig::from_file(&path, env.vars()).await?,
                None => SyncConfig::from_env(env.vars())?,
            };
            info!(
                "Syncing {} -> {} ({} tables)",
                config.source,
                config.destination,
                config
                    .tables
                    .as_ref()
                    .map_or_else(|| "all".to_string(), |t| t.len().to_string())
            );

            match executor::run(&config).await {
                Ok(report) => emit_report(&report, output.as_deref()).await?,
                Err(SyncError::TablesFailed(report)) => {
                    emit_report(&report, output.as_deref()).await?;
                    return Err(SyncError::TablesFailed(report).into());
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Tables { kind, conn_str } => {
            let connector = connect(&kind, &conn_str).await?;
            let tables = connector.list_tables().await;
            connector.disconnect().await?;
            output::print_lines(&tables?);
        }
        Commands::Columns {
            kind,
            conn_str,
            table,
            describe,
        } => {
            let connector = connect(&kind, &conn_str).await?;
            if describe {
                let columns = connector.describe_table(&table).await;
                connector.disconnect().await?;
                output::print_json(&columns?)?;
            } else {
                let columns = connector.list_columns(&table).await;
                connector.disconnect().await?;
                output::print_lines(&columns?);
            }
        }
    }

    Ok(())
}

async fn connect(kind: &str, conn_str: &str) -> Result<Adapter, CliError> {
    let adapter = Adapter::from_config(
        kind,
        &ConnectionConfig::new(kind, conn_str),
        ConnectorSettings::default(),
        EventSink::detached(kind),
    )?;
    adapter.connect().await?;
    Ok(adapter)
}

async fn emit_report(report: &RunReport, path: Option<&str>) -> Result<(), CliError> {
    match path {
        Some(path) => output::write_json(report, path).await,
        None => output::print_json(report),
    }
}

//! Resolves the server configuration from files and flags, validates it, and
//! prints the result as JSON. Exits non-zero if the configuration is invalid.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use queryserver::loader::{self, DEFAULT_PROPERTY_PREFIX};
use queryserver::{init_logging, LogFormat};
use queryserver_core::{HostProcessors, ServerConfig};
use tracing::error;

#[derive(Parser, Debug)]
#[command(
    name = "config-check",
    about = "Validate the query server HTTP configuration"
)]
struct Cli {
    /// JSON configuration document.
    #[arg(short, long, env = "QUERYSERVER_CONFIG")]
    config: Option<PathBuf>,

    /// Properties file; only keys under `--prefix` are read.
    #[arg(long, env = "QUERYSERVER_PROPERTIES")]
    properties: Option<PathBuf>,

    /// Key prefix for the properties file.
    #[arg(long, default_value = DEFAULT_PROPERTY_PREFIX)]
    prefix: String,

    /// Override one key, e.g. `--set numThreads=64`. Applied after the files.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = loader::parse_assignment)]
    assignments: Vec<(String, String)>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Print the defaults for this host and exit.
    #[arg(long)]
    print_defaults: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format).context("failed to initialize logging")?;

    let config = if cli.print_defaults {
        ServerConfig::default()
    } else {
        resolve(&cli).inspect_err(|err| {
            error!(error = %err, "refusing to start with an invalid server configuration");
        })?
    };

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn resolve(cli: &Cli) -> Result<ServerConfig, loader::LoadError> {
    let mut sources = Vec::new();
    if let Some(path) = &cli.config {
        sources.push(loader::load_json_file(path)?);
    }
    if let Some(path) = &cli.properties {
        sources.push(loader::load_properties_file(path, &cli.prefix)?);
    }
    sources.push(loader::from_assignments(&cli.assignments)?);
    loader::resolve(sources, &HostProcessors)
}

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use cfgbroker_core::loader::{FileLoader, DEFAULT_CONFIG_DIR};
use cfgbroker_core::{ConfigBroker, ConfigError, EnvironmentSource, ObjectSource, Source};
use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(name = "cfgbroker")]
#[command(version, about = "Query layered configuration from files, environment and Vault")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory of config files, merged in file-name order
    #[arg(long, conflicts_with = "file")]
    dir: Option<PathBuf>,

    /// Single config file, following its `extends` chain
    #[arg(long)]
    file: Option<PathBuf>,

    /// Directory for bare `extends` references
    #[arg(long, requires = "file")]
    base_dir: Option<PathBuf>,

    /// Prefix of environment variables overriding file values
    #[arg(long, env = "CFGBROKER_ENV_PREFIX", default_value = "")]
    env_prefix: String,

    /// Include Vault when the `vault` section enables it
    #[arg(long)]
    vault: bool,

    /// Vault secret to fetch (repeatable); all secrets when omitted
    #[arg(long = "secret-key", requires = "vault")]
    secret_keys: Vec<String>,

    #[arg(long, short)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a single value
    Get { key: String },

    /// Print the merged mapping at a key
    GetObject { key: String },

    /// Print every source's log-safe contents
    Describe,
}

fn file_data(cli: &Cli) -> anyhow::Result<Value> {
    match (&cli.file, &cli.dir) {
        (Some(file), _) => {
            let mut file_loader = FileLoader::new();
            if let Some(base_dir) = &cli.base_dir {
                file_loader = file_loader.base_dir(base_dir);
            }
            file_loader
                .load(file)
                .with_context(|| format!("loading {}", file.display()))
        }
        (None, dir) => {
            let dir = dir.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR));
            cfgbroker_core::load_directory(&dir)
                .with_context(|| format!("loading directory {}", dir.display()))
        }
    }
}

async fn build_broker(cli: &Cli) -> anyhow::Result<ConfigBroker> {
    let sources: Vec<Box<dyn Source>> = vec![
        Box::new(
            EnvironmentSource::with_prefix(cli.env_prefix.clone())
                .with_sensitive_keys(cli.secret_keys.iter().cloned()),
        ),
        Box::new(ObjectSource::with_name("config", file_data(cli)?)),
    ];
    let mut broker = ConfigBroker::new(sources);

    if cli.vault {
        let allowed = (!cli.secret_keys.is_empty()).then(|| cli.secret_keys.clone());
        broker = broker.with_vault(allowed).context("configuring vault")?;
    }
    broker.initialize().await.context("initializing config sources")?;
    Ok(broker)
}

async fn run(cli: Cli) -> anyhow::Result<String> {
    let broker = build_broker(&cli).await?;
    broker.log_configs();

    let output = match &cli.command {
        Commands::Get { key } => broker.require(key)?,
        Commands::GetObject { key } => broker
            .get_object(key)?
            .ok_or_else(|| ConfigError::MissingKey(key.clone()))?,
        Commands::Describe => Value::Array(broker.describe_for_logging()),
    };
    Ok(serde_json::to_string_pretty(&output)?)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    cfgbroker_core::logging::init(if cli.verbose { "debug" } else { "warn" });

    match run(cli).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {:#}", e);
            ExitCode::FAILURE
        }
    }
}

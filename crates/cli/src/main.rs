//! quiver: store, locate and manage file versions from the command line.
//!
//! Reads `quiver.toml` (or `--config`, or QUIVER_CONFIG). Persisted states
//! are passed as a bare filename or the JSON printed by `store`.

mod definition;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quiver_core::{
    create_storage, load_config, restore, save, validate_config, CommandExecutor, FileState,
    OperationError, Options, OptionsOverride, Orchestrator, SaveFormat, Source, VersionId,
};

use definition::ConfiguredDefinition;

const DEFAULT_CONFIG: &str = "quiver.toml";

#[derive(Parser)]
#[command(name = "quiver", version, about = "Versioned file attachments")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Arguments shared by every command.
#[derive(ClapArgs)]
struct Target {
    /// Attachment type, as named under `[types]`
    #[arg(long = "type")]
    type_name: String,

    /// Scope object (JSON) read by templates
    #[arg(long)]
    scope: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a file and all its versions
    Store {
        #[command(flatten)]
        target: Target,
        /// File to store
        file: PathBuf,
        /// Stored filename; defaults to the file's name
        #[arg(long)]
        filename: Option<String>,
        /// Versions to produce (comma separated)
        #[arg(long, value_delimiter = ',')]
        versions: Vec<String>,
        /// Process versions one stage at a time in a single unit
        #[arg(long)]
        sequential: bool,
        /// Operation deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Print the URL of one version, or of all of them
    Url {
        #[command(flatten)]
        target: Target,
        /// Persisted state
        state: String,
        #[arg(long)]
        version: Option<String>,
    },
    /// Delete every version of a stored file
    Delete {
        #[command(flatten)]
        target: Target,
        /// Persisted state
        state: String,
    },
    /// Download one version
    Retrieve {
        #[command(flatten)]
        target: Target,
        /// Persisted state
        state: String,
        #[arg(long, default_value = VersionId::ORIGINAL)]
        version: String,
        /// Destination path; a temp file when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Rebuild versions from the stored original
    Regenerate {
        #[command(flatten)]
        target: Target,
        /// Persisted state
        state: String,
        /// Versions to rebuild (comma separated)
        #[arg(long, value_delimiter = ',', required = true)]
        versions: Vec<String>,
    },
    /// Copy every version to the locations of another scope
    Copy {
        #[command(flatten)]
        target: Target,
        /// Persisted state
        state: String,
        /// Destination scope object (JSON)
        #[arg(long)]
        to_scope: String,
    },
}

impl Commands {
    fn target(&self) -> &Target {
        match self {
            Self::Store { target, .. }
            | Self::Url { target, .. }
            | Self::Delete { target, .. }
            | Self::Retrieve { target, .. }
            | Self::Regenerate { target, .. }
            | Self::Copy { target, .. } => target,
        }
    }

    /// Call-level option overrides.
    fn overrides(&self) -> OptionsOverride {
        let mut call = OptionsOverride::default();
        if let Self::Store {
            versions,
            sequential,
            timeout_ms,
            ..
        } = self
        {
            if !versions.is_empty() {
                call.versions = Some(versions.iter().map(|v| VersionId::from(v.as_str())).collect());
            }
            if *sequential {
                call.concurrent = Some(false);
            }
            call.timeout_ms = *timeout_ms;
        }
        call
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let json = std::env::var("QUIVER_LOG_JSON").is_ok_and(|v| v == "1" || v == "true");

    // stdout carries command output
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("QUIVER_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let target = cli.command.target();
    let definition = ConfiguredDefinition::from_config(&config, &target.type_name)?;
    let scope = parse_scope(target.scope.as_deref())?;
    let options = config.options_for(&target.type_name, &cli.command.overrides())?;

    let storage = create_storage(options.storage, &config.storage)
        .context("Failed to create storage backend")?;
    let executor = Arc::new(CommandExecutor::new(config.executor.clone()));
    let orchestrator = Orchestrator::new(definition, storage, executor);

    match cli.command {
        Commands::Store { file, filename, .. } => {
            let source = match filename {
                Some(filename) => Source::named(file, filename),
                None => Source::path(file),
            };
            let result = orchestrator.store(source, scope, options).await;
            report(&orchestrator, result).await
        }
        Commands::Url { state, version, .. } => {
            let state = load_state(&state, scope, options)?;
            match version {
                Some(version) => print_json(&orchestrator.url(&state, &version).await?),
                None => print_json(&orchestrator.urls(&state).await?),
            }
        }
        Commands::Delete { state, .. } => {
            let state = load_state(&state, scope, options)?;
            let result = orchestrator.delete(state).await;
            report(&orchestrator, result).await
        }
        Commands::Retrieve {
            state,
            version,
            output,
            ..
        } => {
            let state = load_state(&state, scope, options)?;
            let path = orchestrator.retrieve(&state, &version, output).await?;
            print_json(&json!({ "path": path }))
        }
        Commands::Regenerate {
            state, versions, ..
        } => {
            let state = load_state(&state, scope, options)?;
            let versions: Vec<VersionId> = versions.iter().map(|v| VersionId::from(v.as_str())).collect();
            let result = orchestrator.regenerate(state, &versions).await;
            report(&orchestrator, result).await
        }
        Commands::Copy {
            state, to_scope, ..
        } => {
            let to = load_state(&state, parse_scope(Some(&to_scope))?, options.clone())?;
            let from = load_state(&state, scope, options)?;
            let result = orchestrator.copy(&from, to).await;
            report(&orchestrator, result).await
        }
    }
}

fn parse_scope(scope: Option<&str>) -> Result<Value> {
    match scope {
        Some(text) => serde_json::from_str(text).context("Invalid scope JSON"),
        None => Ok(Value::Object(Default::default())),
    }
}

fn load_state(persisted: &str, scope: Value, options: Options) -> Result<FileState> {
    let state = restore(persisted, options).context("Invalid persisted state")?;
    Ok(state.with_scope(scope))
}

/// Prints the persisted state and URLs, or the per-version errors.
async fn report(
    orchestrator: &Orchestrator<ConfiguredDefinition>,
    result: Result<FileState, OperationError>,
) -> Result<()> {
    match result {
        Ok(state) => {
            let persisted = save(&state, &SaveFormat::default())?;
            let urls = orchestrator.urls(&state).await?;
            print_json(&json!({ "state": persisted, "urls": urls }))
        }
        Err(err) => {
            let message = err.to_string();
            if let Some(state) = err.into_state() {
                print_json(&json!({
                    "state": save(&state, &SaveFormat::default())?,
                    "errors": state.errors(),
                }))?;
            }
            bail!(message)
        }
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

//! Address agent CLI entrypoint.
//!
//! This is the main entrypoint for the address-agent command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use address_agent::address::AddressDefinition;
use address_agent::agent::AddressAgent;
use address_agent::cli::{Cli, Commands, OutputFormatter};
use address_agent::config::{AgentConfig, ConfigParser, ConfigValidator, find_config_file};
use address_agent::error::{AgentError, ConfigError, Result};
use address_agent::readiness::StatsMap;

use clap::Parser;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over the verbosity flag.
fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Watch { max_events } => cmd_watch(config_path, max_events, &formatter).await,
        Commands::Addresses { ready } => cmd_addresses(config_path, ready, &formatter).await,
        Commands::Create {
            address,
            address_type,
            plan,
            topic,
        } => {
            let mut definition = AddressDefinition::new(address, address_type, plan);
            if let Some(topic) = topic {
                definition = definition.with_topic(topic);
            }
            cmd_create(config_path, &definition, &formatter).await
        }
        Commands::Delete { address, name } => {
            let mut definition = AddressDefinition::new(address, "", "");
            if let Some(name) = name {
                definition = definition.with_name(name);
            }
            cmd_delete(config_path, &definition, &formatter).await
        }
        Commands::Types { plan } => cmd_types(config_path, plan, &formatter).await,
        Commands::CheckStatus { stats } => cmd_check_status(config_path, &stats, &formatter).await,
        Commands::Validate { warnings } => cmd_validate(config_path, warnings, &formatter),
    }
}

/// Watch address resources until interrupted.
async fn cmd_watch(config_path: Option<&Path>, max_events: Option<usize>, formatter: &OutputFormatter) -> Result<()> {
    let agent = AddressAgent::connect(load_config(config_path)?)?;
    let mut notifications = agent.subscribe();

    let watcher = agent.watcher();
    let controller = agent.controller();
    let (stop, shutdown) = watch::channel(false);
    let watching = tokio::spawn(async move { watcher.run(&controller, shutdown).await });

    let mut seen = 0usize;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            received = notifications.recv() => match received {
                Ok(notification) => {
                    emit(&formatter.format_notification(&notification))?;
                    seen += 1;
                    if max_events.is_some_and(|max| seen >= max) {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Missed {skipped} notifications");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    if stop.send(true).is_err() {
        debug!("Watcher already stopped");
    }
    match watching.await {
        Ok(result) => result?,
        Err(e) => return Err(AgentError::internal(format!("Watcher task failed: {e}"))),
    }
    agent.shutdown().await
}

/// List the current addresses.
async fn cmd_addresses(config_path: Option<&Path>, ready_only: bool, formatter: &OutputFormatter) -> Result<()> {
    let agent = AddressAgent::connect(load_config(config_path)?)?;

    let listing = agent.watcher().list_once().await?;
    let outcome = agent.on_watch_update(listing).await?;
    if outcome.skipped > 0 {
        warn!("{} resources could not be parsed", outcome.skipped);
    }

    let snapshot = agent.snapshot().await?;
    let addresses = if ready_only { &snapshot.ready } else { &snapshot.defined };
    emit(&formatter.format_addresses(addresses))?;
    agent.shutdown().await
}

/// Create an address.
async fn cmd_create(config_path: Option<&Path>, definition: &AddressDefinition, formatter: &OutputFormatter) -> Result<()> {
    let agent = AddressAgent::connect(load_config(config_path)?)?;
    let result = agent.create_address(definition).await;
    agent.shutdown().await?;

    match result {
        Ok(()) => emit(&formatter.success(&format!("Created address {}", definition.address))),
        Err(e) => {
            emit(&formatter.error(&e.to_string()))?;
            Err(e)
        }
    }
}

/// Delete an address.
async fn cmd_delete(config_path: Option<&Path>, definition: &AddressDefinition, formatter: &OutputFormatter) -> Result<()> {
    let agent = AddressAgent::connect(load_config(config_path)?)?;
    let result = agent.delete_address(definition).await;
    agent.shutdown().await?;

    match result {
        Ok(()) => emit(&formatter.success(&format!("Deleted address {}", definition.address))),
        Err(e) => {
            emit(&formatter.error(&e.to_string()))?;
            Err(e)
        }
    }
}

/// List the address types of the address space plan.
async fn cmd_types(config_path: Option<&Path>, plan: Option<String>, formatter: &OutputFormatter) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(plan) = plan {
        config.address_space_plan = plan;
    }

    let agent = AddressAgent::connect(config)?;
    let types = agent.get_address_types().await;
    agent.shutdown().await?;

    emit(&formatter.format_address_types(&types?))
}

/// Sync once, then apply propagation stats from a file.
async fn cmd_check_status(config_path: Option<&Path>, stats_path: &Path, formatter: &OutputFormatter) -> Result<()> {
    let stats = read_stats(stats_path)?;
    let agent = AddressAgent::connect(load_config(config_path)?)?;

    let listing = agent.watcher().list_once().await?;
    agent.on_watch_update(listing).await?;
    let report = agent.check_status(stats).await?;
    agent.shutdown().await?;

    emit(&formatter.format_status_report(&report))
}

/// Validate configuration.
fn cmd_validate(config_path: Option<&Path>, show_warnings: bool, formatter: &OutputFormatter) -> Result<()> {
    let config = load_config_unchecked(config_path)?;
    let result = ConfigValidator::new().validate(&config)?;
    emit(&formatter.format_validation(&result, show_warnings))
}

/// Loads and validates the configuration.
fn load_config(config_path: Option<&Path>) -> Result<AgentConfig> {
    let config = load_config_unchecked(config_path)?;
    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }
    Ok(config)
}

/// Loads the configuration from the given file, a discovered file, or the
/// environment alone.
fn load_config_unchecked(config_path: Option<&Path>) -> Result<AgentConfig> {
    let config_file = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => std::env::current_dir()
            .ok()
            .and_then(|dir| find_config_file(dir).ok()),
    };

    let base = config_file
        .as_deref()
        .and_then(Path::parent)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let parser = ConfigParser::new().with_base_path(base);
    parser.load_dotenv()?;

    match config_file {
        Some(path) => parser.load_with_env(path),
        None => {
            debug!("No configuration file found, using environment");
            ConfigParser::from_env()
        }
    }
}

/// Reads a propagation stats file.
fn read_stats(path: &Path) -> Result<StatsMap> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        AgentError::Config(ConfigError::ParseError {
            message: format!("Invalid stats file: {e}"),
            location: Some(path.display().to_string()),
        })
    })
}

/// Writes command output to stdout.
fn emit(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", output.trim_end())?;
    Ok(())
}

//! Application Gateway maintenance switch.
//!
//! Moves an environment's request-routing rules to a maintenance redirect and
//! back to their backend pools.
//!
//! # Architecture Overview
//!
//! ```text
//!   appgw-switch maintenance|normal|status|validate
//!        │
//!        ▼
//!   ┌──────────┐   ┌────────────┐   ┌─────────────────────────────────────┐
//!   │  config  │──▶│ validation │──▶│               runner                │
//!   │  loader  │   │ (pre-flight)│  │                                     │
//!   └──────────┘   └────────────┘   │  fetch ──▶ reconcile ──▶ apply once │
//!                                   │    │           │             │      │
//!                                   └────┼───────────┼─────────────┼──────┘
//!                                        ▼           ▼             ▼
//!                                  ┌──────────┐ ┌─────────┐ ┌──────────────┐
//!                                  │ gateway  │ │  state  │ │   summary    │
//!                                  │ ARM/file │ │  (JSON) │ │ text / JSON  │
//!                                  └──────────┘ └─────────┘ └──────────────┘
//! ```
//!
//! Exit codes: 0 success, 1 fatal error, 2 partial failure.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use appgw_switch::config::{
    load_config, resolve_switch, validate_config, ConfigError, Overrides, ResolvedSwitch,
};
use appgw_switch::gateway::{AzureGatewayClient, Credential, GatewayClient, SnapshotGatewayClient};
use appgw_switch::observability::logging;
use appgw_switch::{Action, Runner, SwitchConfig};

#[derive(Parser)]
#[command(name = "appgw-switch")]
#[command(about = "Toggle Application Gateway routing rules between maintenance and normal mode", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config/appgw.toml")]
    config: PathBuf,

    /// Operate on an exported gateway document instead of the Azure API
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// State file for state-based restoration (overrides configuration)
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Log level (overrides configuration; RUST_LOG wins over both)
    #[arg(long)]
    log_level: Option<String>,

    /// Summary format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Redirect the environment's rules to the maintenance page
    Maintenance {
        /// Environment name from the configuration file
        #[arg(short, long)]
        env: String,

        /// Maintenance page URL (overrides configuration)
        #[arg(long)]
        redirect_url: Option<String>,

        /// Plan and report without changing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Route the environment's rules back to their backend pools
    Normal {
        /// Environment name from the configuration file
        #[arg(short, long)]
        env: String,

        /// Plan and report without changing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the current target of the environment's rules
    Status {
        /// Environment name from the configuration file
        #[arg(short, long)]
        env: String,
    },
    /// Validate configuration without contacting the gateway
    Validate {
        /// Only validate this environment
        #[arg(short, long)]
        env: Option<String>,

        /// Redirect URL to assume for environments that do not configure one
        #[arg(long)]
        redirect_url: Option<String>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<u8, Box<dyn std::error::Error>> {
    let config = load_config(&cli.config)?;
    logging::init(
        cli.log_level
            .as_deref()
            .unwrap_or(&config.observability.log_level),
    );

    tracing::debug!(config = %cli.config.display(), "Configuration loaded");

    let (action, env, redirect_url) = match &cli.command {
        Commands::Validate { env, redirect_url } => {
            validate(&config, env.as_deref(), redirect_url.clone(), &cli)?;
            return Ok(0);
        }
        Commands::Maintenance {
            env, redirect_url, ..
        } => (Action::Maintenance, env, redirect_url.clone()),
        Commands::Normal { env, .. } | Commands::Status { env } => (Action::Normal, env, None),
    };

    let overrides = Overrides {
        redirect_url,
        state_path: cli.state_file.clone(),
    };
    let resolved = resolve_switch(&config, env, action, &overrides).map_err(ConfigError::Validation)?;

    match &cli.snapshot {
        Some(path) => dispatch(&SnapshotGatewayClient::new(path), &cli, &resolved).await,
        None => {
            let credential = Credential::from_env()?;
            let client = AzureGatewayClient::new(
                resolved.gateway.clone(),
                credential,
                config.azure.clone(),
                &config.timeouts,
                config.retries.clone(),
            )?;
            dispatch(&client, &cli, &resolved).await
        }
    }
}

async fn dispatch<C: GatewayClient>(
    client: &C,
    cli: &Cli,
    resolved: &ResolvedSwitch,
) -> Result<u8, Box<dyn std::error::Error>> {
    match &cli.command {
        Commands::Status { .. } => {
            let report = Runner::new(client).status(resolved).await?;
            emit(cli.output, &report, report.render_text())?;
            Ok(0)
        }
        Commands::Maintenance { dry_run, .. } | Commands::Normal { dry_run, .. } => {
            let summary = Runner::new(client).dry_run(*dry_run).run(resolved).await?;
            emit(cli.output, &summary, summary.render_text())?;
            Ok(summary.exit_code())
        }
        Commands::Validate { .. } => Ok(0),
    }
}

fn validate(
    config: &SwitchConfig,
    env: Option<&str>,
    redirect_url: Option<String>,
    cli: &Cli,
) -> Result<(), ConfigError> {
    let overrides = Overrides {
        redirect_url,
        state_path: cli.state_file.clone(),
    };

    match env {
        Some(env) => {
            for action in [Action::Maintenance, Action::Normal] {
                resolve_switch(config, env, action, &overrides)?;
            }
            println!("configuration OK: environment '{}'", env);
        }
        None => {
            validate_config(config, &overrides)?;
            println!(
                "configuration OK: {} environment(s)",
                config.environments.len()
            );
        }
    }
    Ok(())
}

fn emit<T: Serialize>(format: OutputFormat, value: &T, text: String) -> Result<(), serde_json::Error> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => print!("{}", text),
    }
    Ok(())
}

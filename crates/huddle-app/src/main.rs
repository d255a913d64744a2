mod cli;
mod commands;
mod demo;

use std::path::Path;
use std::process::ExitCode;

use huddle_common::{ConfigError, HuddleError};
use huddle_config::{HuddleConfig, LoggingConfig};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::cli::Command;

/// Load from the override path when given, else from the platform default.
fn load_config(path: Option<&Path>) -> Result<HuddleConfig, ConfigError> {
    match path {
        Some(path) => {
            let config = huddle_config::toml_loader::load_from_path(path)?;
            huddle_config::validation::validate(&config)?;
            Ok(config)
        }
        None => huddle_config::load_config(),
    }
}

fn init_logging(log_level: Option<&str>, logging: &LoggingConfig) {
    let fallback = logging.level.directive();
    let directive = log_level
        .and_then(|d| d.parse::<Directive>().ok())
        .or_else(|| fallback.parse::<Directive>().ok());

    let mut filter = EnvFilter::from_default_env();
    if let Some(directive) = directive {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(logging.show_target)
        .init();
}

async fn run(args: cli::Args, config: HuddleConfig) -> Result<(), HuddleError> {
    match args.command {
        Command::Keygen => println!("{}", commands::keygen()),
        Command::Token { key, room, user } => {
            println!("{}", commands::issue_token(&config, &key, &room, &user)?);
        }
        Command::Demo(demo) => demo::run(&config, &demo).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    // Logging is configured from the config file, so load it first and
    // report any problem once the subscriber is up.
    let loaded = load_config(args.config.as_deref());
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    init_logging(args.log_level.as_deref(), &logging);

    tracing::info!("Huddle v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(config) => config,
        Err(e) if args.config.is_some() => {
            tracing::error!("Config override unusable: {e}");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            tracing::warn!("Config load failed, using defaults: {e}");
            HuddleConfig::default()
        }
    };
    tracing::debug!(room = %config.room.default_name, "config loaded");

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

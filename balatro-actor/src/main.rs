use anyhow::Result;
use balatro_env::{BalatroEnv, HttpBridge};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod actor;
mod config;
mod policy;

use crate::actor::Actor;
use crate::config::Config;
use crate::policy::{MaskedRandomPolicy, Policy};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize tracing
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Validate configuration
    config.validate()?;
    let settings = config.load_settings()?;

    info!(
        "Starting actor against bridge at {}:{}",
        config.bridge_host, config.bridge_port
    );
    info!(
        "Episodes: {}, max steps: {}, seed: {:?}",
        config.max_episodes, settings.max_steps, config.seed
    );

    let bridge = HttpBridge::new(config.bridge_config())?;
    let env = BalatroEnv::new(bridge, settings);
    let policy: Box<dyn Policy> = match config.seed {
        Some(seed) => Box::new(MaskedRandomPolicy::with_seed(seed)),
        None => Box::new(MaskedRandomPolicy::new()),
    };

    // Create actor instance
    let actor = Arc::new(Actor::new(config, env, policy));
    actor.connect().await?;

    // Setup graceful shutdown
    let shutdown_actor = Arc::clone(&actor);
    let shutdown_handle = tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for ctrl+c: {}", e);
            return;
        }
        info!("Shutdown signal received, stopping actor...");
        shutdown_actor.shutdown();
    });

    // Run the actor
    let run_result = actor.run().await;

    shutdown_handle.abort();

    match run_result {
        Ok(_) => {
            info!("Actor completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Actor failed: {}", e);
            Err(e)
        }
    }
}

//! Trainer registration - Main entry point.

mod config;
mod error;

use crate::config::{Config, LogConfig};
use crate::error::AppResult;
use anyhow::{anyhow, Context};
use clap::Parser;
use points_channel::WsConnector;
use registration_client::{RegistrationClient, RegistrationInput};
use registration_session::RegistrationSession;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Register a trainer and follow their point balance live.
#[derive(Parser, Debug)]
#[command(name = "trainer-register", version)]
struct Args {
    /// Full name
    #[arg(long)]
    name: String,

    /// Email address
    #[arg(long)]
    email: String,

    /// Phone number
    #[arg(long)]
    phone: String,

    /// Registration API base URL (overrides SERVER__BASE_URL)
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(base_url) = args.base_url {
        config.server.base_url = base_url;
    }

    // Initialize logging
    init_logging(&config.log);

    let input = RegistrationInput::new(args.name, args.email, args.phone);
    if !input.is_complete() {
        return Err(anyhow!("Name, email and phone are all required").into());
    }

    let client = RegistrationClient::new(&config.server.base_url, config.server.timeout)
        .context("Failed to create registration client")?;
    let channel_config = config.channel_config()?;

    info!(
        base_url = %config.server.base_url,
        push_url = %channel_config.url,
        "Starting trainer registration"
    );

    let mut session =
        RegistrationSession::new(Arc::new(client), Arc::new(WsConnector), channel_config);

    let result = match session.submit(input).await {
        Ok(result) => result.clone(),
        Err(e) => {
            error!("Registration failed: {}", e);
            return Err(e.into());
        }
    };

    println!("Registration successful!");
    println!("Customer code: {}", result.customer_code);
    println!("Wallet pass:   {}", result.wallet_url);
    println!("Points:        {}", result.total_points);

    let mut points = session
        .watch_points()
        .ok_or_else(|| anyhow!("Session has no point balance after registering"))?;

    info!("Following point updates, press Ctrl-C to stop");

    loop {
        tokio::select! {
            changed = points.changed() => {
                if changed.is_err() {
                    break;
                }
                let balance = *points.borrow_and_update();
                println!("Points:        {}", balance);
            }
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Shutting down...");
    session.shutdown().await;
    Ok(())
}

fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout carries only the registration output
    if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

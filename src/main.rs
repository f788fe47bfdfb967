//! Schulte Mining Client - Main Application
//!
//! Interactive terminal client for the Schulte pool classroom game.

use schulte_mining_client::{
    app::Event,
    client::PoolClient,
    config::Config,
    input::{UserCommand, HELP},
    render::TerminalFrontend,
    runtime::{EventSender, Runtime},
    utils::init_logging,
    Result, APP_DESCRIPTION, APP_NAME, APP_VERSION,
};

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Config::load().await?;

    if config.info {
        print_info();
        return Ok(());
    }

    if config.print_config {
        print_configuration(&config)?;
        return Ok(());
    }

    let log_guard = init_logging(config.log_level, config.log_format, config.log_file.as_deref())?;

    info!("Starting {} v{}", APP_NAME, APP_VERSION);
    info!("Authority: {} ({})", config.server, config.polling_summary());
    if config.session_cookie.is_none() {
        warn!("No session cookie configured; submissions will be refused until you join the pool");
    }

    let client = PoolClient::new(
        config.server_url()?,
        config.http_timeout_duration(),
        config.insecure,
        config.session_cookie.as_deref(),
    )?
    .with_backoff_config(config.backoff_config());

    let runtime = Runtime::new(
        Arc::new(client),
        TerminalFrontend::new(std::io::stdout()),
        config.app_settings(),
        config.intervals(),
    );

    let shutdown = runtime.shutdown_token();
    tokio::spawn(read_commands(runtime.sender(), shutdown.clone()));
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted");
            shutdown.cancel();
        }
    });

    println!("{}", HELP);
    let (app, _) = runtime.run().await?;
    info!("Leaving after {} submission attempt(s)", app.submission().attempts());

    drop(log_guard);
    // The stdin reader may still be parked in a blocking read
    std::process::exit(0)
}

/// Forward stdin lines to the event loop until EOF or shutdown
async fn read_commands(events: EventSender, shutdown: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("stdin closed");
                let _ = events.send(Event::Command(UserCommand::Quit));
                break;
            }
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<UserCommand>() {
            Ok(command) => {
                if events.send(Event::Command(command)).is_err() {
                    break;
                }
            }
            Err(e) => eprintln!("{}", e),
        }
    }
}

/// Print basic program information
fn print_info() {
    println!("{} v{}", APP_NAME, APP_VERSION);
    println!("{}", APP_DESCRIPTION);
}

/// Print current configuration
fn print_configuration(config: &Config) -> Result<()> {
    let config_yaml = serde_yaml::to_string(config)?;
    println!("{}", config_yaml);
    Ok(())
}

//! Smart-cube bridge entry point.
//!
//! Loads the configuration, connects to a cube through the in-memory
//! transport, replays the recorded notifications from `[replay]`, and prints
//! every reconstructed move as a token on stdout.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()               -- TOML file, defaults if missing
//!  └─ ConnectionHandle::connect() -- discovery, GATT setup, handshake
//!  └─ feeder task                 -- pushes recorded notifications
//!  └─ ConnectionHandle::run()     -- decode → reconcile → sink
//! ```
//!
//! # Usage
//!
//! ```text
//! cube-client [config.toml]
//! ```
//!
//! Without an argument the client reads `cube-client.toml` in the current
//! directory.  `RUST_LOG` overrides the configured log level.
//!
//! # Platform transport
//!
//! The `MockTransport` used here plays back captured payloads instead of
//! talking to a radio.  A platform BLE backend only needs to implement
//! [`BleTransport`](cube_client::infrastructure::transport::BleTransport)
//! to replace it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cube_client::application::move_sink::CallbackSink;
use cube_client::infrastructure::config::load_config;
use cube_client::infrastructure::connection::{ConnectOutcome, ConnectionHandle};
use cube_client::infrastructure::transport::mock::MockTransport;

const DEFAULT_CONFIG: &str = "cube-client.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG), PathBuf::from);
    let config = load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.client.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(config = %config_path.display(), "smart-cube bridge starting");

    let notifications = config
        .replay
        .decode_notifications()
        .context("decoding replay notifications")?;

    // ── Transport and sink ────────────────────────────────────────────────────
    let transport = Arc::new(MockTransport::advertising(
        config.replay.device_name.clone(),
        config.device.notification_buffer,
    ));
    let sink = Arc::new(CallbackSink::new(|event| println!("{event}")));

    // ── Connect ───────────────────────────────────────────────────────────────
    let outcome = ConnectionHandle::connect(
        transport.clone(),
        sink,
        &config.device.name_prefixes,
    )
    .await
    .context("connecting to cube")?;

    let mut handle = match outcome {
        ConnectOutcome::Connected(handle) => handle,
        ConnectOutcome::Unsupported { name } => {
            warn!(%name, "device is not a supported smart cube");
            return Ok(());
        }
    };
    info!(name = handle.device_name(), model = %handle.model(), "connected");

    // ── Replay feeder ─────────────────────────────────────────────────────────
    let feeder = {
        let transport = Arc::clone(&transport);
        tokio::spawn(async move {
            for payload in notifications {
                if !transport.notify(payload).await {
                    break;
                }
            }
            transport.close_notifications();
        })
    };

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let interrupt = {
        let transport = Arc::clone(&transport);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                transport.close_notifications();
            }
        })
    };

    // ── Notification loop ─────────────────────────────────────────────────────
    let result = handle.run().await;
    interrupt.abort();
    if let Err(e) = feeder.await {
        warn!(error = %e, "replay feeder panicked");
    }

    if let Some(battery) = handle.battery_level() {
        info!(battery, "last reported battery level");
    }
    if let Some(facelets) = handle.facelets() {
        info!(facelets, "last reported cube state");
    }

    result.context("notification loop failed")?;
    info!("smart-cube bridge stopped");
    Ok(())
}

//! The standalone iWLAN control-plane daemon.

#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser as _;
use iwlan_daemon::config::{self, Cli};
use iwlan_daemon::SelectorPrefetcher;
use iwlan_epdg_selector::{SelectorConfig, SelectorContext};
use iwlan_platform::signals;
use iwlan_surface::SlotConfig;
use iwlan_types::Event;

#[expect(
    clippy::print_stderr,
    reason = "No logger is active when we are printing this error."
)]
fn main() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime");

    if let Err(error) = rt.block_on(run()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let (layer, _guard) = cli
        .log_dir
        .as_deref()
        .map(|dir| iwlan_logging::file::layer(dir, "iwlan-daemon"))
        .unzip();
    iwlan_logging::setup_global_subscriber(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        layer,
        false,
    )
    .context("failed to set up logging")?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting iwlan-daemon");

    let prefetcher: Arc<dyn iwlan_surface::EpdgPrefetcher> = Arc::new(
        SelectorPrefetcher::new(SelectorConfig::default(), SelectorContext::default(), cli.bind_addr)
            .context("failed to construct ePDG prefetcher")?,
    );

    let slot = iwlan_daemon::slot::spawn(
        SlotConfig {
            is_default_data_slot: cli.is_default_data_slot,
            cross_sim_calling_enabled: cli.cross_sim_calling_enabled,
        },
        prefetcher,
        None,
    );

    if let Some(path) = cli.carrier_config_path.clone() {
        let error_policy = slot.error_policy.clone();
        let event_bus = slot.event_bus.clone();
        let poll_interval = cli.carrier_config_poll_interval;

        tokio::spawn(async move {
            config::watch_carrier_config(path, poll_interval, error_policy, event_bus).await;
        });
    } else {
        tracing::warn!("no --carrier-config-path given, running with global default retry policy only");
    }

    if let Some(log_dir) = cli.log_dir.clone() {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
            loop {
                interval.tick().await;
                iwlan_logging::cleanup::enforce_size_cap(&[log_dir.as_path()], 50);
            }
        });
    }

    slot.surface.set_wifi_connected(true);
    slot.event_bus.publish(Event::WifiCallingEnable);

    let mut terminate = signals::Terminate::new().context("failed to install signal handlers")?;
    let mut hangup = signals::Hangup::new().context("failed to install SIGHUP handler")?;

    loop {
        tokio::select! {
            () = terminate.recv() => {
                tracing::info!("caught SIGINT/SIGTERM, shutting down");
                break;
            }
            () = hangup.recv() => {
                tracing::info!("caught SIGHUP, carrier config is re-read on its own poll cycle");
            }
        }
    }

    Ok(())
}

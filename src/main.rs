use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::MissedTickBehavior;
use wetterwarn_core::{Config, ConfigError};
use wetterwarn_geosphere::{WarningClient, WarningCoordinator, ZoneProvider, ZoneState, HOME_ZONE};

#[tokio::main]
async fn main() -> Result<()> {
    wetterwarn_core::init()?;

    let (config, _) = match Config::load_validated() {
        Ok(loaded) => loaded,
        Err(e) => {
            if let Some(config_error) = e.downcast_ref::<ConfigError>() {
                tracing::error!("{}", config_error.user_message());
            }
            return Err(e);
        }
    };

    let client = WarningClient::new(
        &config.service.base_url,
        Duration::from_secs(config.service.request_timeout_secs),
    )
    .context("Failed to build warning service client")?;

    let mut coordinator = WarningCoordinator::new(client, home_zones(&config), config.entry.clone());

    tracing::info!(
        "Polling {} every {:?} (grace period {}s)",
        config.service.base_url,
        coordinator.update_interval(),
        coordinator.settings().grace_period()
    );

    // Cycles run back to back on this task only; a slow cycle delays the next tick.
    let mut ticker = tokio::time::interval(coordinator.update_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }

        match coordinator.refresh().await {
            Ok(result) => tracing::info!("{} warning(s) active", result.warnings().len()),
            Err(e) => tracing::warn!("Update failed: {} ({})", e, e.user_message()),
        }

        if let Some(path) = &config.state_file {
            if let Err(e) = write_state(path, &coordinator).await {
                tracing::warn!("Failed to write state file: {:#}", e);
            }
        }
    }

    Ok(())
}

fn home_zones(config: &Config) -> HashMap<String, ZoneState> {
    config
        .home
        .iter()
        .map(|home| (HOME_ZONE.to_string(), ZoneState::new(home.attributes())))
        .collect()
}

async fn write_state<Z: ZoneProvider>(path: &Path, coordinator: &WarningCoordinator<Z>) -> Result<()> {
    let contents =
        serde_json::to_vec_pretty(&coordinator.report()).context("Failed to serialize state")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

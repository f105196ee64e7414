//! `playhouse run`: the long-lived grid.
//!
//! Loads the saved setup, adds every remembered address concurrently,
//! starts the reachability monitor and writes the setup back whenever the
//! grid changes. Ctrl-C cancels the monitor and saves one last time.

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use playhouse_config::{Settings, persist_snapshot};
use playhouse_core::{LightGrid, ReachabilityMonitor};

use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;

use super::util;

pub async fn handle(args: RunArgs, settings: &Settings, global: &GlobalOpts) -> Result<(), CliError> {
    let path = settings.setup_path();
    let discovery = settings.discovery_config()?;
    let monitor_config = settings.monitor_config()?;
    let (grid, setup) = util::registry_grid(settings);
    grid.set_grid(setup.grid.clone());

    let loaded = grid.load_bridges(setup.ips.iter().cloned()).await;
    for (address, bridge) in &loaded.results {
        info!(
            address,
            serial = bridge.serial(),
            authorized = bridge.is_authorized(),
            "bridge loaded"
        );
    }
    if !global.quiet {
        eprintln!(
            "{} of {} bridges online, grid {}x{}",
            loaded.results.len(),
            loaded.len(),
            grid.width(),
            grid.height()
        );
    }
    persist(&grid, &path);

    let cancel = CancellationToken::new();
    let monitor = if settings.monitor.enabled && !args.no_monitor {
        let monitor = ReachabilityMonitor::new(grid.clone(), monitor_config, discovery);
        Some(monitor.spawn(cancel.clone()))
    } else {
        None
    };

    let mut changes = grid.subscribe_changes();
    loop {
        tokio::select! {
            biased;
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("interrupt received, shutting down");
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                persist(&grid, &path);
            }
        }
    }

    cancel.cancel();
    if let Some(handle) = monitor {
        if let Err(e) = handle.await {
            warn!(error = %e, "monitor task ended abnormally");
        }
    }
    persist(&grid, &path);
    Ok(())
}

/// Save the grid and refresh its registry with the merged usernames.
fn persist(grid: &LightGrid, path: &Path) {
    match persist_snapshot(path, &grid.snapshot()) {
        Ok(merged) => grid.set_credentials(merged.credentials()),
        Err(e) => warn!(path = %path.display(), error = %e, "could not save bridge setup"),
    }
}

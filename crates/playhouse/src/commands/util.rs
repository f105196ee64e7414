//! Shared helpers for command handlers.

use std::path::Path;
use std::sync::Arc;

use playhouse_config::{BridgeSetup, Settings};
use playhouse_core::{Bridge, LightGrid};

use crate::error::CliError;

/// A grid whose credential registry holds the saved usernames.
pub fn registry_grid(settings: &Settings) -> (LightGrid, BridgeSetup) {
    let setup = BridgeSetup::load(&settings.setup_path());
    let grid = LightGrid::new(settings.grid_config());
    grid.set_credentials(setup.credentials());
    (grid, setup)
}

/// Verify `address` and authorize it with its saved username, if any.
pub async fn open_bridge(settings: &Settings, address: &str) -> Result<Arc<Bridge>, CliError> {
    let (grid, _) = registry_grid(settings);
    Ok(grid.add_bridge(address, None).await?)
}

/// Like [`open_bridge`] but fails unless the bridge accepted our username.
pub async fn open_authorized_bridge(
    settings: &Settings,
    address: &str,
) -> Result<Arc<Bridge>, CliError> {
    let bridge = open_bridge(settings, address).await?;
    if !bridge.is_authorized() {
        return Err(CliError::Unauthorized {
            address: address.to_owned(),
        });
    }
    Ok(bridge)
}

pub fn save_setup(setup: &BridgeSetup, path: &Path) -> Result<(), CliError> {
    setup.save(path).map_err(|e| CliError::SetupFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

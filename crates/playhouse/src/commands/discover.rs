//! `playhouse discover`: SSDP + remote lookup, authorized with saved usernames.

use serde::Serialize;
use tabled::Tabled;
use tracing::warn;

use playhouse_config::Settings;
use playhouse_core::Bridge;

use crate::cli::{DiscoverArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct BridgeRow {
    #[tabled(rename = "Serial")]
    pub serial: String,
    #[tabled(rename = "Address")]
    pub address: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Paired")]
    pub paired: bool,
}

impl From<&Bridge> for BridgeRow {
    fn from(bridge: &Bridge) -> Self {
        Self {
            serial: bridge.serial().to_owned(),
            address: bridge.address().to_owned(),
            name: bridge.info().name.unwrap_or_else(|| "-".into()),
            paired: bridge.is_authorized(),
        }
    }
}

pub async fn handle(
    args: DiscoverArgs,
    settings: &Settings,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut config = settings.discovery_config()?;
    if let Some(attempts) = args.attempts {
        config.attempts = attempts;
    }
    if args.no_lookup {
        config.lookup_url = None;
    }

    let found = playhouse_api::discover(&config).await;

    let (grid, _) = util::registry_grid(settings);
    for bridge in found {
        let address = bridge.address().to_owned();
        if let Err(e) = grid.insert_bridge(bridge).await {
            warn!(address, error = %e, "discovered bridge skipped");
        }
    }
    let rows: Vec<BridgeRow> = grid.bridges().iter().map(|b| BridgeRow::from(b.as_ref())).collect();

    if rows.is_empty() && !global.quiet {
        eprintln!("No bridges found");
    }
    let out = output::render_list(&global.output, &rows, BridgeRow::clone, |r| r.address.clone());
    output::print_output(&out, global.quiet);
    Ok(())
}

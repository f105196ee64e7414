//! `playhouse reset-bulb`: Touchlink factory reset through a bridge.

use serde::Serialize;

use playhouse_config::Settings;
use playhouse_core::Bridge;

use crate::cli::{GlobalOpts, ResetBulbArgs};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct ResetRow {
    nwk_addr: String,
    pan: String,
}

pub async fn handle(
    args: ResetBulbArgs,
    settings: &Settings,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let bridge = Bridge::connect(&args.address, None, settings.bridge_options()).await?;
    if !global.quiet {
        eprintln!("Resetting the bulb nearest to {} ...", bridge.serial());
    }

    let reset = bridge.reset_nearby_bulb().await?;

    let row = ResetRow {
        nwk_addr: reset.nwk_addr,
        pan: reset.pan,
    };
    let out = output::render_single(
        &global.output,
        &row,
        |r| format!("Bulb {} on PAN {} was reset", r.nwk_addr, r.pan),
        |r| r.nwk_addr.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

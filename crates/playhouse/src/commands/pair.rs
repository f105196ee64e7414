//! `playhouse pair`: create a username and remember it in the setup file.

use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::info;

use playhouse_config::{BridgeSetup, Settings};
use playhouse_core::Bridge;

use crate::cli::{GlobalOpts, PairArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct Paired {
    serial: String,
    address: String,
    username: String,
}

pub async fn handle(args: PairArgs, settings: &Settings, global: &GlobalOpts) -> Result<(), CliError> {
    let bridge = Bridge::connect(&args.address, None, settings.bridge_options()).await?;
    let username = bridge
        .create_user(&args.devicetype, args.username.as_deref())
        .await?;

    let path = settings.setup_path();
    let mut setup = BridgeSetup::load(&path);
    setup.usernames.insert(
        bridge.serial().to_owned(),
        username.expose_secret().to_owned(),
    );
    if !setup.ips.contains(&args.address) {
        setup.ips.push(args.address.clone());
    }
    util::save_setup(&setup, &path)?;
    info!(serial = bridge.serial(), path = %path.display(), "username saved");

    let paired = Paired {
        serial: bridge.serial().to_owned(),
        address: args.address,
        username: username.expose_secret().to_owned(),
    };
    let out = output::render_single(
        &global.output,
        &paired,
        |p| format!("Paired with {} at {}\nUsername: {}", p.serial, p.address, p.username),
        |p| p.username.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

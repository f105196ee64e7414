//! Command dispatch: CLI args -> grid / bridge calls -> output formatting.

pub mod config_cmd;
pub mod discover;
pub mod lights;
pub mod pair;
pub mod reset_bulb;
pub mod run;
pub mod util;

use playhouse_config::Settings;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a bridge-bound command to its handler.
pub async fn dispatch(
    cmd: Command,
    settings: &Settings,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Discover(args) => discover::handle(args, settings, global).await,
        Command::Pair(args) => pair::handle(args, settings, global).await,
        Command::ResetBulb(args) => reset_bulb::handle(args, settings, global).await,
        Command::Lights(args) => lights::handle(args, settings, global).await,
        Command::Run(args) => run::handle(args, settings, global).await,
        Command::Config(args) => config_cmd::handle(args, settings, global),
    }
}

//! Config subcommand handlers.

use playhouse_config::Settings;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, settings: &Settings, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            output::print_output(settings.to_toml()?.trim_end(), global.quiet);
            Ok(())
        }
        ConfigCommand::Path => {
            let config_path = global
                .config
                .clone()
                .unwrap_or_else(playhouse_config::config_path);
            let out = format!(
                "settings: {}\nsetup:    {}",
                config_path.display(),
                settings.setup_path().display()
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

//! Settings resolution for the CLI: file and environment from
//! `playhouse-config`, then command-line overrides on top.

use playhouse_config::Settings;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub fn load(global: &GlobalOpts) -> Result<Settings, CliError> {
    let path = global
        .config
        .clone()
        .unwrap_or_else(playhouse_config::config_path);
    let mut settings = playhouse_config::load_settings_from(&path)?;
    apply_overrides(&mut settings, global);
    Ok(settings)
}

fn apply_overrides(settings: &mut Settings, global: &GlobalOpts) {
    if let Some(ref setup) = global.setup_file {
        settings.setup_file = Some(setup.clone());
    }
    if let Some(timeout_ms) = global.timeout_ms {
        settings.network.timeout_ms = timeout_ms;
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    #[test]
    fn flags_override_settings() {
        let cli = Cli::parse_from([
            "playhouse",
            "--setup-file",
            "/tmp/setup.json",
            "--timeout-ms",
            "750",
            "config",
            "show",
        ]);
        let mut settings = Settings::default();

        apply_overrides(&mut settings, &cli.global);

        assert_eq!(settings.setup_path(), PathBuf::from("/tmp/setup.json"));
        assert_eq!(settings.network.timeout_ms, 750);
    }
}

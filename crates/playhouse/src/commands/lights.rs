//! `playhouse lights`: inventory and light search on a single bridge.

use serde::Serialize;
use tabled::Tabled;

use playhouse_config::Settings;

use crate::cli::{GlobalOpts, LightsArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct LightEntry {
    id: u32,
    name: Option<String>,
    #[serde(rename = "type")]
    light_type: Option<String>,
    on: Option<bool>,
    bri: Option<u8>,
    reachable: Option<bool>,
}

#[derive(Tabled)]
struct LightRow {
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    light_type: String,
    #[tabled(rename = "On")]
    on: String,
    #[tabled(rename = "Bri")]
    bri: String,
    #[tabled(rename = "Reachable")]
    reachable: String,
}

#[derive(Debug, Serialize, Tabled)]
struct NewLightRow {
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "Name")]
    name: String,
}

fn dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_owned()
}

pub async fn handle(
    args: LightsArgs,
    settings: &Settings,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let bridge = util::open_authorized_bridge(settings, &args.address).await?;

    if args.search {
        bridge.search_lights().await?;
        if !global.quiet {
            eprintln!("Searching for new lights; check back with --new in about a minute");
        }
        return Ok(());
    }

    if args.new {
        let found = bridge.get_new_lights().await?;
        let mut rows: Vec<NewLightRow> = found
            .lights
            .iter()
            .map(|(id, name)| NewLightRow {
                id: *id,
                name: name.clone(),
            })
            .collect();
        rows.sort_by_key(|r| r.id);
        if !global.quiet && found.is_scanning() {
            eprintln!("Search still running");
        }
        let out = output::render_list(
            &global.output,
            &rows,
            |r| NewLightRow {
                id: r.id,
                name: r.name.clone(),
            },
            |r| r.id.to_string(),
        );
        output::print_output(&out, global.quiet);
        return Ok(());
    }

    let mut entries: Vec<LightEntry> = bridge
        .get_lights()
        .await?
        .into_iter()
        .map(|(id, record)| LightEntry {
            id,
            name: record.name,
            light_type: record.light_type,
            on: record.state.on,
            bri: record.state.bri,
            reachable: record.state.reachable,
        })
        .collect();
    entries.sort_by_key(|e| e.id);

    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &entries,
        |e| LightRow {
            id: e.id,
            name: dash(e.name.as_deref()),
            light_type: dash(e.light_type.as_deref()),
            on: output::flag(e.on, color),
            bri: e.bri.map_or_else(|| "-".into(), |b| b.to_string()),
            reachable: output::flag(e.reachable, color),
        },
        |e| e.id.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

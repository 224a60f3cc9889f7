use std::error::Error;
use std::path::Path;

use clap::Subcommand;
use tabled::settings::{Panel, Style};
use tabled::{Table, Tabled};

use crate::config::Settings;
use crate::input::script::Pipeline;

#[derive(Subcommand, Debug, Clone)]
pub enum ScriptsCommand {
    /// Load every script in the scripts directory and show its status
    List,
    /// Show the parameters declared by a script
    Params {
        /// Declared script name
        name: String,
    },
}

#[derive(Tabled)]
struct ScriptRow {
    name: String,
    loaded: bool,
    enabled: bool,
    version: String,
    author: String,
    error: String,
}

#[derive(Tabled)]
struct ParameterRow {
    key: String,
    name: String,
    #[tabled(rename = "type")]
    kind: String,
    value: f32,
    default: f32,
    range: String,
}

pub fn handle_scripts(
    cmd: ScriptsCommand,
    settings: &Settings,
    scripts_dir: &Path,
) -> Result<(), Box<dyn Error>> {
    let mut pipeline = Pipeline::new(scripts_dir);
    pipeline.rescan(settings.scripts());

    match cmd {
        ScriptsCommand::List => {
            let rows: Vec<ScriptRow> = pipeline
                .entries()
                .iter()
                .map(|entry| ScriptRow {
                    name: entry.config.name.clone(),
                    loaded: entry.loaded,
                    enabled: entry.config.enabled,
                    version: entry.config.version.clone(),
                    author: entry.config.author.clone(),
                    error: entry.last_error.clone().unwrap_or_default(),
                })
                .collect();
            let count = rows.len();

            let mut table = Table::new(rows);
            table
                .with(Style::modern_rounded())
                .with(Panel::header(format!("Scripts in {scripts_dir:?}")));
            println!("{table}");
            println!("Found {count} script(s)");
        }
        ScriptsCommand::Params { name } => {
            let Some(entry) = pipeline.entry(&name) else {
                return Err(format!("No script named '{name}'").into());
            };
            let rows: Vec<ParameterRow> = entry
                .config
                .parameters
                .iter()
                .map(|param| ParameterRow {
                    key: param.key.clone(),
                    name: param.name.clone(),
                    kind: param.kind.to_string(),
                    value: param.value,
                    default: param.default,
                    range: if param.choices.is_empty() {
                        format!("{} - {} ({})", param.min, param.max, param.step)
                    } else {
                        param.choices.join(", ")
                    },
                })
                .collect();

            let mut table = Table::new(rows);
            table
                .with(Style::modern_rounded())
                .with(Panel::header(format!("{name} Parameters")));
            println!("{table}");
        }
    }

    Ok(())
}

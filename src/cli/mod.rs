pub mod device;
pub mod run;
pub mod script;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use device::{handle_devices, DevicesCommand};
use run::handle_run;
use script::{handle_scripts, ScriptsCommand};

use crate::config::{path, Settings};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the config file (default: $XDG_CONFIG_HOME/dualscript/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Directory containing Lua scripts (overrides the config)
    #[arg(long, global = true)]
    pub scripts: Option<PathBuf>,
    #[command(subcommand)]
    pub cmd: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the input processor (default)
    Run {
        /// Poll rate in Hz (overrides the config)
        #[arg(long)]
        poll_rate: Option<f64>,
    },
    /// Inspect scripts
    Scripts {
        #[command(subcommand)]
        cmd: ScriptsCommand,
    },
    /// Inspect attached controllers
    Devices {
        #[command(subcommand)]
        cmd: DevicesCommand,
    },
}

pub fn main_cli(args: Args) -> Result<(), Box<dyn Error>> {
    let config_path = args.config.unwrap_or_else(path::get_config_path);
    let mut settings = Settings::load_or_default(&config_path)?;
    let scripts_dir = match args.scripts {
        Some(dir) => dir,
        None => path::get_scripts_path(&PathBuf::from(&settings.scripts_dir)),
    };
    log::debug!("Using config {config_path:?} and scripts {scripts_dir:?}");

    match args.cmd.unwrap_or(Commands::Run { poll_rate: None }) {
        Commands::Run { poll_rate } => {
            if let Some(rate) = poll_rate {
                settings.poll_rate = rate;
            }
            handle_run(settings, &config_path, &scripts_dir)?
        }
        Commands::Scripts { cmd } => handle_scripts(cmd, &settings, &scripts_dir)?,
        Commands::Devices { cmd } => handle_devices(cmd)?,
    }

    Ok(())
}

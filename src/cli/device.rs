use std::error::Error;

use clap::Subcommand;
use tabled::settings::{Panel, Style};
use tabled::{Table, Tabled};

use crate::drivers::dualsense::driver::enumerate;

#[derive(Subcommand, Debug, Clone)]
pub enum DevicesCommand {
    /// List attached DualSense controllers
    List,
}

#[derive(Tabled)]
struct DeviceRow {
    name: String,
    #[tabled(rename = "Product ID")]
    product_id: String,
    connection: String,
    path: String,
}

pub fn handle_devices(cmd: DevicesCommand) -> Result<(), Box<dyn Error>> {
    match cmd {
        DevicesCommand::List => {
            let devices = enumerate()?;
            let count = devices.len();
            let rows: Vec<DeviceRow> = devices
                .into_iter()
                .map(|device| DeviceRow {
                    name: device.name,
                    product_id: format!("{:04x}", device.product_id),
                    connection: device.connection.to_string(),
                    path: device.path,
                })
                .collect();

            let mut table = Table::new(rows);
            table
                .with(Style::modern_rounded())
                .with(Panel::header("DualSense Controllers"));
            println!("{table}");
            println!("Found {count} controller interface(s)");
        }
    }

    Ok(())
}

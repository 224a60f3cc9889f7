use std::error::Error;
use std::io::{self, BufRead};
use std::path::Path;

use crate::config::Settings;
use crate::drivers::dualsense::driver::Driver;
use crate::input::processor::InputProcessor;
use crate::input::script::Pipeline;
use crate::input::target::{default_bus, VirtualGamepad};

/// Run the input processor until stdin is closed or a line is entered, then
/// write the live script state back to the config file.
pub fn handle_run(
    mut settings: Settings,
    config_path: &Path,
    scripts_dir: &Path,
) -> Result<(), Box<dyn Error>> {
    let pipeline = Pipeline::new(scripts_dir);
    let gamepad = VirtualGamepad::new(default_bus());
    let mut processor = InputProcessor::new(Driver::new(), pipeline, gamepad);

    processor.set_poll_rate(settings.poll_rate);
    let [r, g, b] = settings.led_color;
    processor.set_led_color(r, g, b);
    processor.set_active_preset(settings.active_weapon_preset().cloned());
    processor.initialize(settings.scripts())?;

    for config in processor.script_configs() {
        log::info!(
            "Script '{}' ({}): {}",
            config.name,
            config.path.display(),
            if config.enabled { "enabled" } else { "disabled" }
        );
    }

    processor.start()?;
    println!("Running. Press Enter to stop.");
    let mut line = String::new();
    if let Err(e) = io::stdin().lock().read_line(&mut line) {
        log::warn!("Unable to read stdin: {e}");
    }
    processor.stop();

    settings.poll_rate = processor.poll_rate();
    settings.capture_scripts(&processor.script_configs());
    settings.save(config_path)?;
    log::info!("Saved config to {config_path:?}");

    Ok(())
}

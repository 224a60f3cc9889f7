//! ViGEmBus backed Xbox 360 gamepad for Windows hosts.
//!
//! ViGEmBus is a virtual gamepad bus driver that can attach emulated Xbox 360
//! controllers which XInput applications see as real hardware.
//! Reference: https://github.com/nefarius/ViGEmBus
use vigem_client::{Client, TargetId, XButtons, XGamepad, Xbox360Wired};

use crate::drivers::xb360::report::XusbReport;

use super::{GamepadBus, SinkError};

#[derive(Default)]
pub struct ViGEmBus {
    target: Option<Xbox360Wired<Client>>,
}

impl ViGEmBus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GamepadBus for ViGEmBus {
    fn name(&self) -> &str {
        "ViGEmBus"
    }

    fn connect(&mut self) -> Result<(), SinkError> {
        if self.target.is_some() {
            return Ok(());
        }
        let client = Client::connect()
            .map_err(|e| SinkError::DriverUnavailable(format!("ViGEmBus: {e}")))?;
        let mut target = Xbox360Wired::new(client, TargetId::XBOX360_WIRED);
        target
            .plugin()
            .map_err(|e| SinkError::DriverUnavailable(format!("plugin rejected: {e}")))?;
        target
            .wait_ready()
            .map_err(|e| SinkError::DriverUnavailable(format!("target not ready: {e}")))?;
        log::debug!("Plugged in virtual Xbox 360 controller");
        self.target = Some(target);
        Ok(())
    }

    fn disconnect(&mut self) {
        let Some(mut target) = self.target.take() else {
            return;
        };
        if let Err(e) = target.unplug() {
            log::warn!("Failed to unplug virtual controller: {e}");
        }
    }

    fn submit(&mut self, report: &XusbReport) -> Result<(), SinkError> {
        let Some(target) = self.target.as_mut() else {
            return Err(SinkError::NotConnected);
        };
        let gamepad = XGamepad {
            buttons: XButtons {
                raw: report.button_mask(),
            },
            left_trigger: report.left_trigger,
            right_trigger: report.right_trigger,
            thumb_lx: report.thumb_lx,
            thumb_ly: report.thumb_ly,
            thumb_rx: report.thumb_rx,
            thumb_ry: report.thumb_ry,
        };
        target
            .update(&gamepad)
            .map_err(|e| SinkError::Send(e.to_string()))
    }
}

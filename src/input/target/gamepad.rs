//! The VirtualGamepad keeps a virtual Xbox 360 gamepad in sync with the
//! normalized state coming out of the script pipeline.
use crate::{drivers::xb360::report::XusbReport, input::state::NormalizedState};

use super::{GamepadBus, SinkError};

pub struct VirtualGamepad {
    bus: Box<dyn GamepadBus>,
    connected: bool,
    last_error: Option<String>,
    last_report: Option<XusbReport>,
}

impl VirtualGamepad {
    pub fn new(bus: Box<dyn GamepadBus>) -> Self {
        Self {
            bus,
            connected: false,
            last_error: None,
            last_report: None,
        }
    }

    /// Plug in the virtual device. Failure here means the pipeline has no
    /// output at all and is surfaced to the caller as-is.
    pub fn connect(&mut self) -> Result<(), SinkError> {
        if self.connected {
            return Ok(());
        }
        match self.bus.connect() {
            Ok(()) => {
                log::info!("Virtual gamepad connected via {}", self.bus.name());
                self.connected = true;
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                log::error!("Unable to create virtual gamepad: {e}");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn disconnect(&mut self) {
        if self.connected {
            log::info!("Virtual gamepad disconnected");
        }
        self.bus.disconnect();
        self.connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns the last report successfully submitted
    pub fn last_report(&self) -> Option<&XusbReport> {
        self.last_report.as_ref()
    }

    /// Encode and submit the given state
    pub fn update(&mut self, state: &NormalizedState) -> Result<(), SinkError> {
        if !self.connected {
            return Err(SinkError::NotConnected);
        }
        let report = XusbReport::from_state(state);
        log::trace!("Submitting gamepad report: {report:?}");
        if let Err(e) = self.bus.submit(&report) {
            self.last_error = Some(e.to_string());
            return Err(e);
        }
        self.last_report = Some(report);
        Ok(())
    }
}

impl Drop for VirtualGamepad {
    fn drop(&mut self) {
        self.bus.disconnect();
    }
}

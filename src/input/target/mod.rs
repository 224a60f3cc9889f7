//! Virtual Xbox 360 class gamepad that downstream applications observe in
//! place of the physical controller.
use thiserror::Error;

use crate::drivers::xb360::report::XusbReport;

pub mod gamepad;
#[cfg(windows)]
pub mod vigem;
#[cfg(target_os = "linux")]
pub mod xb360;

pub use gamepad::VirtualGamepad;

/// Errors raised by the virtual gamepad. Kept distinct from device errors
/// since they mean output, not input, is broken.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Virtual gamepad driver unavailable: {0}")]
    DriverUnavailable(String),
    #[error("Failed to send gamepad report: {0}")]
    Send(String),
    #[error("Virtual gamepad is not connected")]
    NotConnected,
}

/// A host virtualization backend able to present one Xbox 360 gamepad
pub trait GamepadBus: Send {
    /// Human readable backend name used in logs
    fn name(&self) -> &str;
    /// Allocate and plug in the virtual device
    fn connect(&mut self) -> Result<(), SinkError>;
    /// Unplug the virtual device. Safe to call when not connected.
    fn disconnect(&mut self);
    /// Push a full gamepad report to the virtual device
    fn submit(&mut self, report: &XusbReport) -> Result<(), SinkError>;
}

/// Backend used on platforms without a supported virtualization driver
#[derive(Debug, Default)]
pub struct UnsupportedBus;

impl GamepadBus for UnsupportedBus {
    fn name(&self) -> &str {
        "unsupported"
    }

    fn connect(&mut self) -> Result<(), SinkError> {
        Err(SinkError::DriverUnavailable(
            "no virtual gamepad backend for this platform".to_string(),
        ))
    }

    fn disconnect(&mut self) {}

    fn submit(&mut self, _report: &XusbReport) -> Result<(), SinkError> {
        Err(SinkError::NotConnected)
    }
}

/// Returns the virtualization backend for the current platform: ViGEmBus on
/// Windows, uinput on Linux.
pub fn default_bus() -> Box<dyn GamepadBus> {
    #[cfg(windows)]
    {
        Box::new(vigem::ViGEmBus::new())
    }
    #[cfg(target_os = "linux")]
    {
        Box::new(xb360::UinputBus::new())
    }
    #[cfg(not(any(windows, target_os = "linux")))]
    {
        Box::new(UnsupportedBus)
    }
}

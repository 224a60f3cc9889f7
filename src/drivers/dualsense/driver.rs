use std::{fmt::Display, time::Instant};

use hidapi::{BusType, DeviceInfo, HidApi, HidDevice, HidError};
use packed_struct::PackingError;
use thiserror::Error;

use crate::input::state::RawControllerState;

use super::hid_report::{decode_input_report, encode_output_report, SetStatePackedOutputData};

// Source: https://github.com/torvalds/linux/blob/master/drivers/hid/hid-playstation.c
pub const DS5_EDGE_NAME: &str = "Sony Interactive Entertainment DualSense Edge Wireless Controller";
pub const DS5_EDGE_VID: u16 = 0x054c;
pub const DS5_EDGE_PID: u16 = 0x0df2;

pub const DS5_NAME: &str = "Sony Interactive Entertainment DualSense Wireless Controller";
pub const DS5_VID: u16 = 0x054c;
pub const DS5_PID: u16 = 0x0ce6;

pub const PIDS: [u16; 2] = [DS5_EDGE_PID, DS5_PID];

pub const INPUT_REPORT_USB: u8 = 0x01;
pub const INPUT_REPORT_USB_SIZE: usize = 64;
pub const INPUT_REPORT_BT: u8 = 0x31;
pub const INPUT_REPORT_BT_SIZE: usize = 78;
/// Anything shorter cannot carry sticks and face buttons and is discarded
pub const INPUT_REPORT_MIN_SIZE: usize = 10;
pub const OUTPUT_REPORT_USB: u8 = 0x02;
pub const OUTPUT_REPORT_USB_SHORT_SIZE: usize = 48;
pub const OUTPUT_REPORT_BT: u8 = 0x31;
pub const OUTPUT_REPORT_BT_SIZE: usize = 78;
pub const OUTPUT_REPORT_BT_TAG: u8 = 0x10;
pub const OUTPUT_CRC_SEED_BT: u8 = 0xA2;

/// Lightbar color used until something else is requested
pub const DEFAULT_LED_COLOR: (u8, u8, u8) = (0, 0, 255);

/// Errors raised while talking to the physical controller
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("HID error: {0}")]
    Hid(#[from] HidError),
    #[error("No DualSense controller found")]
    NotFound,
    #[error("Controller is not connected")]
    NotConnected,
    #[error("Failed to pack output report: {0}")]
    Pack(#[from] PackingError),
}

/// How the controller is attached. Determines the output report layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionType {
    #[default]
    Usb,
    Bluetooth,
}

impl Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionType::Usb => write!(f, "USB"),
            ConnectionType::Bluetooth => write!(f, "Bluetooth"),
        }
    }
}

/// Classify a HID interface as USB or Bluetooth. The bus type reported by
/// hidapi wins when it is known, otherwise interface 3 or the generic desktop
/// gamepad usage (page 1, usage 5) indicate USB.
pub fn classify_link(bus: BusType, interface: i32, usage_page: u16, usage: u16) -> ConnectionType {
    match bus {
        BusType::Usb => ConnectionType::Usb,
        BusType::Bluetooth => ConnectionType::Bluetooth,
        _ => {
            if interface == 3 || (usage_page == 1 && usage == 5) {
                ConnectionType::Usb
            } else {
                ConnectionType::Bluetooth
            }
        }
    }
}

/// Returns true if the given HID device is a DualSense or DualSense Edge
pub fn is_dualsense(info: &DeviceInfo) -> bool {
    info.vendor_id() == DS5_VID && PIDS.contains(&info.product_id())
}

/// Summary of a detected controller interface
#[derive(Debug, Clone)]
pub struct DeviceSummary {
    pub name: String,
    pub path: String,
    pub product_id: u16,
    pub connection: ConnectionType,
}

/// Enumerate all attached DualSense interfaces
pub fn enumerate() -> Result<Vec<DeviceSummary>, DeviceError> {
    let api = HidApi::new()?;
    let devices = api
        .device_list()
        .filter(|info| is_dualsense(info))
        .map(|info| DeviceSummary {
            name: if info.product_id() == DS5_EDGE_PID {
                DS5_EDGE_NAME.to_string()
            } else {
                DS5_NAME.to_string()
            },
            path: info.path().to_string_lossy().to_string(),
            product_id: info.product_id(),
            connection: classify_link(
                info.bus_type(),
                info.interface_number(),
                info.usage_page(),
                info.usage(),
            ),
        })
        .collect();

    Ok(devices)
}

/// Byte level access to an opened controller. Implemented for [HidDevice] and
/// by in-memory transports in tests.
pub trait ReportTransport: Send {
    /// Non-blocking read. Returns 0 when no report is pending.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError>;
    fn write(&mut self, buf: &[u8]) -> Result<usize, DeviceError>;
}

impl ReportTransport for HidDevice {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        Ok(HidDevice::read(self, buf)?)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, DeviceError> {
        Ok(HidDevice::write(self, buf)?)
    }
}

/// Result of a single poll of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// A report was decoded and the controller state replaced
    Changed,
    /// Nothing pending, or the report was malformed and discarded
    NoChange,
}

/// PS5 DualSense controller driver. Owns the connection to a single physical
/// controller, decodes its input reports and pushes lightbar changes back.
pub struct Driver {
    api: Option<HidApi>,
    transport: Option<Box<dyn ReportTransport>>,
    connection: ConnectionType,
    path: Option<String>,
    state: RawControllerState,
    led: (u8, u8, u8),
    player_lights: u8,
    output_dirty: bool,
    output_seq: u8,
    epoch: Instant,
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver {
    pub fn new() -> Self {
        Self {
            api: None,
            transport: None,
            connection: ConnectionType::default(),
            path: None,
            state: RawControllerState::default(),
            led: DEFAULT_LED_COLOR,
            player_lights: 0,
            output_dirty: false,
            output_seq: 0,
            epoch: Instant::now(),
        }
    }

    /// Create a driver that is already connected through the given transport
    pub fn with_transport(transport: Box<dyn ReportTransport>, connection: ConnectionType) -> Self {
        let mut driver = Self::new();
        driver.attach(transport, connection, None);
        driver
    }

    /// Find and open the first DualSense controller. Any existing connection
    /// is dropped first.
    pub fn connect(&mut self) -> Result<(), DeviceError> {
        if self.is_connected() {
            self.disconnect();
        }

        match self.api.as_mut() {
            Some(api) => api.refresh_devices()?,
            None => self.api = Some(HidApi::new()?),
        }
        let Some(api) = self.api.as_ref() else {
            return Err(DeviceError::NotFound);
        };

        let mut opened = None;
        for info in api.device_list().filter(|info| is_dualsense(info)) {
            let path = info.path().to_string_lossy().to_string();
            let device = match info.open_device(api) {
                Ok(device) => device,
                Err(e) => {
                    log::debug!("Unable to open {path}: {e}");
                    continue;
                }
            };
            let connection = classify_link(
                info.bus_type(),
                info.interface_number(),
                info.usage_page(),
                info.usage(),
            );
            opened = Some((device, connection, path));
            break;
        }

        let Some((device, connection, path)) = opened else {
            return Err(DeviceError::NotFound);
        };
        device.set_blocking_mode(false)?;
        log::info!("Connected to DualSense at {path} over {connection}");
        self.attach(Box::new(device), connection, Some(path));

        // Push the cached lightbar state to the new connection
        if let Err(e) = self.send_output_report() {
            log::debug!("Initial output report failed, will retry: {e}");
        }

        Ok(())
    }

    fn attach(
        &mut self,
        transport: Box<dyn ReportTransport>,
        connection: ConnectionType,
        path: Option<String>,
    ) {
        self.transport = Some(transport);
        self.connection = connection;
        self.path = path;
        self.output_dirty = true;
    }

    /// Release the device handle. Safe to call when already disconnected.
    pub fn disconnect(&mut self) {
        if self.transport.take().is_some() {
            log::info!("Disconnected from DualSense");
        }
        self.path = None;
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub fn connection_type(&self) -> ConnectionType {
        self.connection
    }

    pub fn device_path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Returns the most recently decoded controller state
    pub fn state(&self) -> &RawControllerState {
        &self.state
    }

    pub fn is_output_dirty(&self) -> bool {
        self.output_dirty
    }

    /// Poll the device for a single input report. A read error means the
    /// device is gone; the driver disconnects and the error is returned.
    pub fn update(&mut self) -> Result<UpdateStatus, DeviceError> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(DeviceError::NotConnected);
        };

        // Read data from the device into a buffer
        let mut buf = [0; INPUT_REPORT_BT_SIZE];
        let bytes_read = match transport.read(&mut buf[..]) {
            Ok(bytes_read) => bytes_read,
            Err(e) => {
                log::warn!("Failed to read from DualSense: {e}");
                self.disconnect();
                return Err(e);
            }
        };

        // Retry pending output while the link is known good
        if self.output_dirty {
            if let Err(e) = self.send_output_report() {
                log::debug!("Deferred output report failed: {e}");
            }
        }

        if bytes_read == 0 {
            return Ok(UpdateStatus::NoChange);
        }

        match decode_input_report(&buf[..bytes_read]) {
            Ok(mut state) => {
                state.timestamp = self.epoch.elapsed().as_micros() as u64;
                self.state = state;
                Ok(UpdateStatus::Changed)
            }
            Err(e) => {
                log::trace!("Discarding input report: {e}");
                Ok(UpdateStatus::NoChange)
            }
        }
    }

    /// Set the color of the lightbar
    pub fn set_led_color(&mut self, r: u8, g: u8, b: u8) {
        if self.led == (r, g, b) {
            return;
        }
        log::debug!("Setting LED color to: {r}, {g}, {b}");
        self.led = (r, g, b);
        self.output_dirty = true;
        if let Err(e) = self.send_output_report() {
            log::debug!("LED update deferred: {e}");
        }
    }

    pub fn led_color(&self) -> (u8, u8, u8) {
        self.led
    }

    /// Set the player indicator pattern (five bits, one per light)
    pub fn set_player_led(&mut self, pattern: u8) {
        if self.player_lights == pattern {
            return;
        }
        self.player_lights = pattern;
        self.output_dirty = true;
        if let Err(e) = self.send_output_report() {
            log::debug!("Player LED update deferred: {e}");
        }
    }

    /// Write the cached output state if it changed. Returns Ok(false) when
    /// there was nothing to send. On failure the state stays dirty so the
    /// next opportunity retries it.
    pub fn send_output_report(&mut self) -> Result<bool, DeviceError> {
        if !self.output_dirty {
            return Ok(false);
        }
        let Some(transport) = self.transport.as_mut() else {
            return Err(DeviceError::NotConnected);
        };

        let (r, g, b) = self.led;
        let state = SetStatePackedOutputData::lights(r, g, b, self.player_lights);
        let buf = encode_output_report(self.connection, state, self.output_seq)?;
        transport.write(&buf)?;

        if self.connection == ConnectionType::Bluetooth {
            self.output_seq = (self.output_seq + 1) & 0x0F;
        }
        self.output_dirty = false;

        Ok(true)
    }
}

//! Structures derived from the great work of the community of the Game Controller
//! Collective Wiki.
//! Source: https://controllers.fandom.com/wiki/Sony_DualSense
use std::fmt::Display;

use packed_struct::prelude::*;
use thiserror::Error;

use crate::input::state::{Buttons, DPad, RawControllerState};

use super::driver::*;

/// Reasons an input report could not be decoded. All of them are treated as
/// "discard this report" by the driver.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Report too short: {0} bytes")]
    TooShort(usize),
    #[error("Unknown report id: {0:#04x}")]
    UnknownReportId(u8),
    #[error("Failed to unpack report: {0}")]
    Unpack(#[from] PackingError),
}

/// DualSense input report for USB and Bluetooth
#[derive(Debug, Copy, Clone)]
pub enum PackedInputDataReport {
    Usb(USBPackedInputDataReport),
    Bluetooth(BluetoothPackedInputDataReport),
}

impl PackedInputDataReport {
    /// Unpack a report read from the device. The leading report id selects the
    /// layout. Reports shorter than the full layout are padded with the bytes of
    /// an idle report so that a truncated read still decodes the fields it
    /// does carry, with lifted fingers and centered sticks for the rest.
    pub fn unpack(buf: &[u8]) -> Result<Self, ReportError> {
        if buf.len() < INPUT_REPORT_MIN_SIZE {
            return Err(ReportError::TooShort(buf.len()));
        }
        let report_id = buf[0];
        match report_id {
            INPUT_REPORT_USB => {
                log::trace!("Got USB input report");
                let mut buffer = USBPackedInputDataReport::default().pack()?;
                let len = buf.len().min(INPUT_REPORT_USB_SIZE);
                buffer[..len].copy_from_slice(&buf[..len]);
                let data = USBPackedInputDataReport::unpack(&buffer)?;
                Ok(Self::Usb(data))
            }
            INPUT_REPORT_BT => {
                log::trace!("Got Bluetooth input report");
                let mut buffer = BluetoothPackedInputDataReport::default().pack()?;
                let len = buf.len().min(INPUT_REPORT_BT_SIZE);
                buffer[..len].copy_from_slice(&buf[..len]);
                let data = BluetoothPackedInputDataReport::unpack(&buffer)?;
                Ok(Self::Bluetooth(data))
            }
            _ => Err(ReportError::UnknownReportId(report_id)),
        }
    }

    /// Return the underlying input state. Both USB and Bluetooth implementations
    /// share the same state block, only its offset differs.
    pub fn state(&self) -> &InputState {
        match self {
            PackedInputDataReport::Usb(report) => &report.state,
            PackedInputDataReport::Bluetooth(report) => &report.state,
        }
    }
}

impl Display for PackedInputDataReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackedInputDataReport::Usb(data) => write!(f, "{}", data),
            PackedInputDataReport::Bluetooth(data) => write!(f, "{}", data),
        }
    }
}

/// Decode a raw input report into a [RawControllerState]. The timestamp is
/// left at zero; the driver stamps it with its own clock.
pub fn decode_input_report(buf: &[u8]) -> Result<RawControllerState, ReportError> {
    let report = PackedInputDataReport::unpack(buf)?;
    Ok(report.state().to_raw_state())
}

#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "4")]
pub struct TouchFingerData {
    // byte 0
    // High bit is set while the finger is lifted, low bits are a touch id.
    #[packed_field(bytes = "0")]
    pub context: u8,
    // byte 1
    #[packed_field(bytes = "1")]
    pub x_lo: u8,
    // byte 2
    #[packed_field(bits = "16..=19")]
    pub y_lo: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bits = "20..=23")]
    pub x_hi: Integer<u8, packed_bits::Bits<4>>,
    // byte 3
    #[packed_field(bytes = "3")]
    pub y_hi: u8,
}

impl Default for TouchFingerData {
    fn default() -> Self {
        Self {
            context: 0x80,
            x_lo: Default::default(),
            y_lo: Default::default(),
            x_hi: Default::default(),
            y_hi: Default::default(),
        }
    }
}

impl TouchFingerData {
    pub fn is_touching(&self) -> bool {
        self.context & 0x80 == 0
    }

    /// 12-bit X coordinate: low byte plus the low nibble of byte 2
    pub fn get_x(&self) -> u16 {
        let x_hi = self.x_hi.to_primitive() as u16;
        (x_hi << 8) | self.x_lo as u16
    }

    /// 12-bit Y coordinate: high nibble of byte 2 plus byte 3
    pub fn get_y(&self) -> u16 {
        let y_lo = self.y_lo.to_primitive() as u16;
        ((self.y_hi as u16) << 4) | y_lo
    }

    pub fn set_x(&mut self, x_raw: u16) {
        self.x_lo = (x_raw & 0x00FF) as u8;
        self.x_hi = Integer::from_primitive(((x_raw & 0x0F00) >> 8) as u8);
    }

    pub fn set_y(&mut self, y_raw: u16) {
        self.y_lo = Integer::from_primitive((y_raw & 0x000F) as u8);
        self.y_hi = ((y_raw & 0x0FF0) >> 4) as u8;
    }
}

#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "9")]
pub struct TouchData {
    #[packed_field(element_size_bytes = "4")]
    pub touch_finger_data: [TouchFingerData; 2],
    pub timestamp: u8,
}

/// Input state block shared by the USB and Bluetooth input reports. Only the
/// regions this crate consumes are broken out into named fields.
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "63")]
pub struct InputState {
    // byte 0-6
    #[packed_field(bytes = "0")]
    pub joystick_l_x: u8,
    #[packed_field(bytes = "1")]
    pub joystick_l_y: u8,
    #[packed_field(bytes = "2")]
    pub joystick_r_x: u8,
    #[packed_field(bytes = "3")]
    pub joystick_r_y: u8,
    #[packed_field(bytes = "4")]
    pub l2_trigger: u8,
    #[packed_field(bytes = "5")]
    pub r2_trigger: u8,
    #[packed_field(bytes = "6")]
    pub seq_number: u8,

    // byte 7
    #[packed_field(bits = "56")]
    pub triangle: bool,
    #[packed_field(bits = "57")]
    pub circle: bool,
    #[packed_field(bits = "58")]
    pub cross: bool,
    #[packed_field(bits = "59")]
    pub square: bool,
    // Hat switch, 0-7 clockwise from north and 8 for released. Kept as a plain
    // nibble so out-of-range values never fail the unpack.
    #[packed_field(bits = "60..=63")]
    pub dpad: Integer<u8, packed_bits::Bits<4>>,

    // byte 8
    #[packed_field(bits = "64")]
    pub r3: bool,
    #[packed_field(bits = "65")]
    pub l3: bool,
    #[packed_field(bits = "66")]
    pub options: bool,
    #[packed_field(bits = "67")]
    pub create: bool,
    #[packed_field(bits = "68")]
    pub r2: bool,
    #[packed_field(bits = "69")]
    pub l2: bool,
    #[packed_field(bits = "70")]
    pub r1: bool,
    #[packed_field(bits = "71")]
    pub l1: bool,

    // byte 9
    #[packed_field(bits = "72")]
    pub right_paddle: bool, // DualSense Edge
    #[packed_field(bits = "73")]
    pub left_paddle: bool, // DualSense Edge
    #[packed_field(bits = "74")]
    pub right_fn: bool, // DualSense Edge
    #[packed_field(bits = "75")]
    pub left_fn: bool, // DualSense Edge
    #[packed_field(bits = "76")]
    pub _unkn_0: bool,
    #[packed_field(bits = "77")]
    pub mute: bool,
    #[packed_field(bits = "78")]
    pub touchpad: bool,
    #[packed_field(bits = "79")]
    pub ps: bool,

    // byte 10-14
    #[packed_field(bytes = "10..=14")]
    pub _unkn_1: [u8; 5],

    // byte 15-26
    #[packed_field(bytes = "15..=16", endian = "lsb")]
    pub gyro_x: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "17..=18", endian = "lsb")]
    pub gyro_y: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "19..=20", endian = "lsb")]
    pub gyro_z: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "21..=22", endian = "lsb")]
    pub accel_x: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "23..=24", endian = "lsb")]
    pub accel_y: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "25..=26", endian = "lsb")]
    pub accel_z: Integer<i16, packed_bits::Bits<16>>,

    // byte 27-31
    #[packed_field(bytes = "27..=30", endian = "lsb")]
    pub sensor_timestamp: Integer<u32, packed_bits::Bits<32>>,
    #[packed_field(bytes = "31")]
    pub temperature: u8,

    // byte 32-40
    #[packed_field(bytes = "32..=40")]
    pub touch_data: TouchData,

    // byte 41-62, trigger feedback, battery and plug status
    #[packed_field(bytes = "41..=52")]
    pub _status_0: [u8; 12],
    #[packed_field(bytes = "53..=62")]
    pub _status_1: [u8; 10],
}

impl Default for InputState {
    fn default() -> Self {
        Self {
            joystick_l_x: 128,
            joystick_l_y: 128,
            joystick_r_x: 128,
            joystick_r_y: 128,
            l2_trigger: Default::default(),
            r2_trigger: Default::default(),
            seq_number: Default::default(),
            triangle: Default::default(),
            circle: Default::default(),
            cross: Default::default(),
            square: Default::default(),
            dpad: Integer::from_primitive(DPad::Released.as_raw()),
            r3: Default::default(),
            l3: Default::default(),
            options: Default::default(),
            create: Default::default(),
            r2: Default::default(),
            l2: Default::default(),
            r1: Default::default(),
            l1: Default::default(),
            right_paddle: Default::default(),
            left_paddle: Default::default(),
            right_fn: Default::default(),
            left_fn: Default::default(),
            _unkn_0: Default::default(),
            mute: Default::default(),
            touchpad: Default::default(),
            ps: Default::default(),
            _unkn_1: Default::default(),
            gyro_x: Default::default(),
            gyro_y: Default::default(),
            gyro_z: Default::default(),
            accel_x: Default::default(),
            accel_y: Default::default(),
            accel_z: Default::default(),
            sensor_timestamp: Default::default(),
            temperature: Default::default(),
            touch_data: Default::default(),
            _status_0: Default::default(),
            _status_1: Default::default(),
        }
    }
}

impl InputState {
    /// Convert the packed state into the crate's raw controller state
    pub fn to_raw_state(&self) -> RawControllerState {
        let finger = self.touch_data.touch_finger_data[0];
        RawControllerState {
            left_stick_x: self.joystick_l_x,
            left_stick_y: self.joystick_l_y,
            right_stick_x: self.joystick_r_x,
            right_stick_y: self.joystick_r_y,
            left_trigger: self.l2_trigger,
            right_trigger: self.r2_trigger,
            dpad: DPad::from_raw(self.dpad.to_primitive()),
            buttons: Buttons {
                square: self.square,
                cross: self.cross,
                circle: self.circle,
                triangle: self.triangle,
                l1: self.l1,
                r1: self.r1,
                l2_button: self.l2,
                r2_button: self.r2,
                share: self.create,
                options: self.options,
                l3: self.l3,
                r3: self.r3,
                ps: self.ps,
                touchpad: self.touchpad,
                mute: self.mute,
            },
            touch_x: finger.get_x(),
            touch_y: finger.get_y(),
            touch_active: finger.is_touching(),
            gyro_x: self.gyro_x.to_primitive(),
            gyro_y: self.gyro_y.to_primitive(),
            gyro_z: self.gyro_z.to_primitive(),
            accel_x: self.accel_x.to_primitive(),
            accel_y: self.accel_y.to_primitive(),
            accel_z: self.accel_z.to_primitive(),
            timestamp: 0,
        }
    }
}

#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "64")]
pub struct USBPackedInputDataReport {
    // byte 0
    #[packed_field(bytes = "0")]
    pub report_id: u8, // Report ID (always 0x01)

    // byte 1-63
    #[packed_field(bytes = "1..=63")]
    pub state: InputState,
}

#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "78")]
pub struct BluetoothPackedInputDataReport {
    // byte 0
    #[packed_field(bytes = "0")]
    pub report_id: u8, // Report ID (always 0x31)

    // byte 1
    #[packed_field(bits = "8..=11")]
    pub seq_number: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bits = "12..=13")]
    pub _unkn_0: Integer<u8, packed_bits::Bits<2>>,
    #[packed_field(bits = "14")]
    pub has_mic: bool,
    #[packed_field(bits = "15")]
    pub has_hid: bool,

    // byte 2-64
    #[packed_field(bytes = "2..=64")]
    pub state: InputState,

    // byte 74-77
    #[packed_field(bytes = "74..=77", endian = "lsb")]
    pub crc32: Integer<u32, packed_bits::Bits<32>>,
}

/// Set-state block carried by both output reports. Only the lightbar and
/// player indicator sections are driven by this crate.
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "47")]
pub struct SetStatePackedOutputData {
    // byte 0, rumble and audio enable flags
    #[packed_field(bytes = "0")]
    pub valid_flag0: u8,

    // byte 1
    #[packed_field(bits = "8..=10")]
    pub _valid_flag1_hi: Integer<u8, packed_bits::Bits<3>>,
    #[packed_field(bits = "11")]
    pub allow_player_indicators: bool,
    #[packed_field(bits = "12")]
    pub reset_lights: bool,
    #[packed_field(bits = "13")]
    pub allow_led_color: bool,
    #[packed_field(bits = "14..=15")]
    pub _valid_flag1_lo: Integer<u8, packed_bits::Bits<2>>,

    // byte 2-42, rumble, audio and adaptive trigger sections
    #[packed_field(bytes = "2..=9")]
    pub _audio: [u8; 8],
    #[packed_field(bytes = "10..=20")]
    pub right_trigger_ffb: [u8; 11],
    #[packed_field(bytes = "21..=31")]
    pub left_trigger_ffb: [u8; 11],
    #[packed_field(bytes = "32..=42")]
    pub _lighting_setup: [u8; 11],

    // byte 43
    #[packed_field(bytes = "43")]
    pub player_lights: u8,

    // byte 44-46
    #[packed_field(bytes = "44")]
    pub led_red: u8,
    #[packed_field(bytes = "45")]
    pub led_green: u8,
    #[packed_field(bytes = "46")]
    pub led_blue: u8,
}

impl SetStatePackedOutputData {
    /// Set-state block that updates the lightbar and player indicators
    pub fn lights(r: u8, g: u8, b: u8, player_lights: u8) -> Self {
        Self {
            allow_led_color: true,
            allow_player_indicators: true,
            player_lights,
            led_red: r,
            led_green: g,
            led_blue: b,
            ..Default::default()
        }
    }
}

#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "48")]
pub struct UsbPackedOutputReportShort {
    // byte 0
    #[packed_field(bytes = "0")]
    pub report_id: u8, // Report ID (always 0x02)

    // byte 1-47
    #[packed_field(bytes = "1..=47")]
    pub state: SetStatePackedOutputData,
}

impl Default for UsbPackedOutputReportShort {
    fn default() -> Self {
        Self {
            report_id: OUTPUT_REPORT_USB,
            state: Default::default(),
        }
    }
}

#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "78")]
pub struct BluetoothPackedOutputReport {
    // byte 0
    #[packed_field(bytes = "0")]
    pub report_id: u8, // Report ID (always 0x31)

    // byte 1
    #[packed_field(bits = "8..=11")]
    pub seq_number: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bits = "12..=15")]
    pub _seq_unkn: Integer<u8, packed_bits::Bits<4>>,

    // byte 2
    #[packed_field(bytes = "2")]
    pub tag: u8,

    // byte 3-49
    #[packed_field(bytes = "3..=49")]
    pub state: SetStatePackedOutputData,

    // byte 74-77
    #[packed_field(bytes = "74..=77", endian = "lsb")]
    pub crc32: Integer<u32, packed_bits::Bits<32>>,
}

impl Default for BluetoothPackedOutputReport {
    fn default() -> Self {
        Self {
            report_id: OUTPUT_REPORT_BT,
            seq_number: Default::default(),
            _seq_unkn: Default::default(),
            tag: OUTPUT_REPORT_BT_TAG,
            state: Default::default(),
            crc32: Default::default(),
        }
    }
}

/// CRC-32 the controller expects in the last four bytes of a Bluetooth output
/// report. The checksum covers a 0xA2 seed byte followed by everything before
/// the checksum itself.
pub fn bluetooth_crc(report: &[u8]) -> u32 {
    let end = report.len().saturating_sub(4);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[OUTPUT_CRC_SEED_BT]);
    hasher.update(&report[..end]);
    hasher.finalize()
}

/// Build the output report for the given connection type
pub fn encode_output_report(
    connection: ConnectionType,
    state: SetStatePackedOutputData,
    seq: u8,
) -> Result<Vec<u8>, PackingError> {
    match connection {
        ConnectionType::Usb => {
            let report = UsbPackedOutputReportShort {
                state,
                ..Default::default()
            };
            Ok(report.pack()?.to_vec())
        }
        ConnectionType::Bluetooth => {
            let mut report = BluetoothPackedOutputReport {
                seq_number: Integer::from_primitive(seq & 0x0F),
                state,
                ..Default::default()
            };
            let unsigned = report.pack()?;
            report.crc32 = Integer::from_primitive(bluetooth_crc(&unsigned));
            Ok(report.pack()?.to_vec())
        }
    }
}

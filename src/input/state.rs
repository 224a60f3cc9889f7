//! Controller state as it flows through the input pipeline.
//!
//! [RawControllerState] is produced by the DualSense driver from a single input
//! report and carries device-native integers. [NormalizedState] is the
//! device-agnostic representation that scripts transform and that the virtual
//! gamepad consumes.

/// Eight-way directional pad value as reported by the DualSense hat switch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DPad {
    North = 0,
    NorthEast = 1,
    East = 2,
    SouthEast = 3,
    South = 4,
    SouthWest = 5,
    West = 6,
    NorthWest = 7,
    #[default]
    Released = 8,
}

impl DPad {
    /// Decode a hat switch value. Anything outside 0-7 is treated as released.
    pub fn from_raw(value: u8) -> Self {
        match value {
            0 => Self::North,
            1 => Self::NorthEast,
            2 => Self::East,
            3 => Self::SouthEast,
            4 => Self::South,
            5 => Self::SouthWest,
            6 => Self::West,
            7 => Self::NorthWest,
            _ => Self::Released,
        }
    }

    /// Returns the hat switch value (0-7, 8 for released)
    pub fn as_raw(&self) -> u8 {
        *self as u8
    }

    pub fn is_up(&self) -> bool {
        matches!(self, Self::North | Self::NorthEast | Self::NorthWest)
    }

    pub fn is_down(&self) -> bool {
        matches!(self, Self::South | Self::SouthEast | Self::SouthWest)
    }

    pub fn is_left(&self) -> bool {
        matches!(self, Self::West | Self::NorthWest | Self::SouthWest)
    }

    pub fn is_right(&self) -> bool {
        matches!(self, Self::East | Self::NorthEast | Self::SouthEast)
    }
}

/// Discrete buttons shared by the raw and normalized states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Buttons {
    pub square: bool,
    pub cross: bool,
    pub circle: bool,
    pub triangle: bool,
    pub l1: bool,
    pub r1: bool,
    /// L2 fully pressed
    pub l2_button: bool,
    /// R2 fully pressed
    pub r2_button: bool,
    /// Create button
    pub share: bool,
    pub options: bool,
    pub l3: bool,
    pub r3: bool,
    pub ps: bool,
    /// Touchpad click
    pub touchpad: bool,
    pub mute: bool,
}

/// Device-native controller state decoded from one input report. A new value
/// replaces the previous one wholesale on every successful read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawControllerState {
    /// Sticks range from 0-255 with 128 being center
    pub left_stick_x: u8,
    pub left_stick_y: u8,
    pub right_stick_x: u8,
    pub right_stick_y: u8,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub dpad: DPad,
    pub buttons: Buttons,
    /// 12-bit touchpad coordinates of the first finger
    pub touch_x: u16,
    pub touch_y: u16,
    pub touch_active: bool,
    pub gyro_x: i16,
    pub gyro_y: i16,
    pub gyro_z: i16,
    pub accel_x: i16,
    pub accel_y: i16,
    pub accel_z: i16,
    /// Monotonic capture time in microseconds since the driver was created
    pub timestamp: u64,
}

impl Default for RawControllerState {
    fn default() -> Self {
        Self {
            left_stick_x: 128,
            left_stick_y: 128,
            right_stick_x: 128,
            right_stick_y: 128,
            left_trigger: 0,
            right_trigger: 0,
            dpad: DPad::Released,
            buttons: Buttons::default(),
            touch_x: 0,
            touch_y: 0,
            touch_active: false,
            gyro_x: 0,
            gyro_y: 0,
            gyro_z: 0,
            accel_x: 0,
            accel_y: 0,
            accel_z: 0,
            timestamp: 0,
        }
    }
}

/// Normalized controller state. Sticks are in [-1.0, 1.0], triggers in
/// [0.0, 1.0] and gyro is scaled to roughly one unit per 2000 raw counts.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NormalizedState {
    pub left_stick_x: f32,
    pub left_stick_y: f32,
    pub right_stick_x: f32,
    pub right_stick_y: f32,
    pub left_trigger: f32,
    pub right_trigger: f32,
    pub buttons: Buttons,
    pub dpad: DPad,
    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,
    /// Seconds elapsed since the previous tick
    pub delta_time: f32,
}

/// Input and output state published together after one pipeline tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StateSnapshot {
    pub input: NormalizedState,
    pub output: NormalizedState,
}

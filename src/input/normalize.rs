//! Conversions between device-native integers and the normalized float ranges
//! used by scripts and the virtual gamepad.
use super::state::{NormalizedState, RawControllerState};

/// Raw value of a centered stick
pub const STICK_CENTER: f32 = 128.0;
/// Distance from center to either rail
pub const STICK_HALF_RANGE: f32 = 127.0;
pub const TRIGGER_MAX: f32 = u8::MAX as f32;
/// Raw gyro counts that map to 1.0. Typical hand movement stays within this.
pub const GYRO_RANGE: f32 = 2000.0;

/// Stick byte to [-1.0, 1.0] with 128 as center
pub fn normalize_stick(value: u8) -> f32 {
    ((value as f32 - STICK_CENTER) / STICK_HALF_RANGE).clamp(-1.0, 1.0)
}

pub fn denormalize_stick(value: f32) -> u8 {
    (value * STICK_HALF_RANGE + STICK_CENTER)
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Trigger byte to [0.0, 1.0]
pub fn normalize_trigger(value: u8) -> f32 {
    value as f32 / TRIGGER_MAX
}

pub fn denormalize_trigger(value: f32) -> u8 {
    (value * TRIGGER_MAX).round().clamp(0.0, TRIGGER_MAX) as u8
}

pub fn normalize_gyro(value: i16) -> f32 {
    value as f32 / GYRO_RANGE
}

/// Build the normalized state for one tick
pub fn normalize_state(raw: &RawControllerState, delta_time: f32) -> NormalizedState {
    NormalizedState {
        left_stick_x: normalize_stick(raw.left_stick_x),
        left_stick_y: normalize_stick(raw.left_stick_y),
        right_stick_x: normalize_stick(raw.right_stick_x),
        right_stick_y: normalize_stick(raw.right_stick_y),
        left_trigger: normalize_trigger(raw.left_trigger),
        right_trigger: normalize_trigger(raw.right_trigger),
        buttons: raw.buttons,
        dpad: raw.dpad,
        gyro_x: normalize_gyro(raw.gyro_x),
        gyro_y: normalize_gyro(raw.gyro_y),
        gyro_z: normalize_gyro(raw.gyro_z),
        delta_time,
    }
}

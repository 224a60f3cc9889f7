//! XUSB gamepad report as consumed by Xbox 360 class virtual devices.
//! Source: https://learn.microsoft.com/en-us/windows/win32/api/xinput/ns-xinput-xinput_gamepad
use packed_struct::prelude::*;

use crate::input::state::{DPad, NormalizedState};

pub const XUSB_REPORT_SIZE: usize = 12;

// wButtons bitmask
pub const DPAD_UP: u16 = 0x0001;
pub const DPAD_DOWN: u16 = 0x0002;
pub const DPAD_LEFT: u16 = 0x0004;
pub const DPAD_RIGHT: u16 = 0x0008;
pub const START: u16 = 0x0010;
pub const BACK: u16 = 0x0020;
pub const LEFT_THUMB: u16 = 0x0040;
pub const RIGHT_THUMB: u16 = 0x0080;
pub const LEFT_SHOULDER: u16 = 0x0100;
pub const RIGHT_SHOULDER: u16 = 0x0200;
pub const GUIDE: u16 = 0x0400;
pub const A: u16 = 0x1000;
pub const B: u16 = 0x2000;
pub const X: u16 = 0x4000;
pub const Y: u16 = 0x8000;

pub const THUMB_MAX: f32 = i16::MAX as f32;
pub const THUMB_MIN: f32 = i16::MIN as f32;
pub const TRIGGER_MAX: f32 = u8::MAX as f32;

#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "12")]
pub struct XusbReport {
    // BYTES 0-1
    #[packed_field(bytes = "0..=1", endian = "lsb")]
    pub buttons: u16,

    // Triggers
    // BYTE 2
    #[packed_field(bytes = "2")]
    pub left_trigger: u8,
    // BYTE 3
    #[packed_field(bytes = "3")]
    pub right_trigger: u8,

    // Axes, positive Y is up
    // BYTES 4-5
    #[packed_field(bytes = "4..=5", endian = "lsb")]
    pub thumb_lx: i16,
    // BYTES 6-7
    #[packed_field(bytes = "6..=7", endian = "lsb")]
    pub thumb_ly: i16,
    // BYTES 8-9
    #[packed_field(bytes = "8..=9", endian = "lsb")]
    pub thumb_rx: i16,
    // BYTES 10-11
    #[packed_field(bytes = "10..=11", endian = "lsb")]
    pub thumb_ry: i16,
}

impl XusbReport {
    /// Map a normalized state onto the XUSB ranges. Stick Y is inverted since
    /// the DualSense reports down as positive.
    pub fn from_state(state: &NormalizedState) -> Self {
        Self {
            buttons: button_bits(state),
            left_trigger: trigger_value(state.left_trigger),
            right_trigger: trigger_value(state.right_trigger),
            thumb_lx: thumb_value(state.left_stick_x),
            thumb_ly: thumb_value(-state.left_stick_y),
            thumb_rx: thumb_value(state.right_stick_x),
            thumb_ry: thumb_value(-state.right_stick_y),
        }
    }

    pub fn button_mask(&self) -> u16 {
        self.buttons
    }

    pub fn is_pressed(&self, button: u16) -> bool {
        self.button_mask() & button != 0
    }
}

fn thumb_value(value: f32) -> i16 {
    (value * THUMB_MAX).clamp(THUMB_MIN, THUMB_MAX) as i16
}

fn trigger_value(value: f32) -> u8 {
    (value * TRIGGER_MAX).clamp(0.0, TRIGGER_MAX) as u8
}

/// Diagonals set both adjacent bits, released sets none
pub fn dpad_bits(dpad: DPad) -> u16 {
    let mut bits = 0;
    if dpad.is_up() {
        bits |= DPAD_UP;
    }
    if dpad.is_down() {
        bits |= DPAD_DOWN;
    }
    if dpad.is_left() {
        bits |= DPAD_LEFT;
    }
    if dpad.is_right() {
        bits |= DPAD_RIGHT;
    }
    bits
}

/// Build the wButtons mask for the given state
pub fn button_bits(state: &NormalizedState) -> u16 {
    let buttons = &state.buttons;
    let table = [
        (buttons.cross, A),
        (buttons.circle, B),
        (buttons.square, X),
        (buttons.triangle, Y),
        (buttons.l1, LEFT_SHOULDER),
        (buttons.r1, RIGHT_SHOULDER),
        (buttons.l3, LEFT_THUMB),
        (buttons.r3, RIGHT_THUMB),
        (buttons.share, BACK),
        (buttons.options, START),
        (buttons.ps, GUIDE),
    ];
    let mask = table
        .iter()
        .filter(|(pressed, _)| *pressed)
        .fold(0, |mask, (_, bit)| mask | bit);

    mask | dpad_bits(state.dpad)
}

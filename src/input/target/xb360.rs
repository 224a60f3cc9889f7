//! uinput backed Xbox 360 gamepad for Linux hosts.
use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AbsInfo, AbsoluteAxisCode, AttributeSet, EventType, InputEvent, KeyCode, SynchronizationCode,
    SynchronizationEvent, UinputAbsSetup,
};

use crate::drivers::xb360::report::{self as xusb, XusbReport};

use super::{GamepadBus, SinkError};

pub const DEVICE_NAME: &str = "Xbox 360 Wireless Receiver (XBOX)";

/// XUSB button bit to the key code the xpad driver reports for it
const BUTTON_MAP: [(u16, KeyCode); 11] = [
    (xusb::A, KeyCode::BTN_SOUTH),
    (xusb::B, KeyCode::BTN_EAST),
    (xusb::X, KeyCode::BTN_NORTH),
    (xusb::Y, KeyCode::BTN_WEST),
    (xusb::LEFT_SHOULDER, KeyCode::BTN_TL),
    (xusb::RIGHT_SHOULDER, KeyCode::BTN_TR),
    (xusb::BACK, KeyCode::BTN_SELECT),
    (xusb::START, KeyCode::BTN_START),
    (xusb::GUIDE, KeyCode::BTN_MODE),
    (xusb::LEFT_THUMB, KeyCode::BTN_THUMBL),
    (xusb::RIGHT_THUMB, KeyCode::BTN_THUMBR),
];

#[derive(Default)]
pub struct UinputBus {
    device: Option<VirtualDevice>,
}

impl UinputBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the virtual device to emulate
    fn create_virtual_device() -> Result<VirtualDevice, std::io::Error> {
        let mut keys = AttributeSet::<KeyCode>::new();
        for (_, key) in BUTTON_MAP.iter() {
            keys.insert(*key);
        }

        let joystick_setup = AbsInfo::new(0, -32768, 32767, 16, 128, 1);
        let abs_x = UinputAbsSetup::new(AbsoluteAxisCode::ABS_X, joystick_setup);
        let abs_y = UinputAbsSetup::new(AbsoluteAxisCode::ABS_Y, joystick_setup);
        let abs_rx = UinputAbsSetup::new(AbsoluteAxisCode::ABS_RX, joystick_setup);
        let abs_ry = UinputAbsSetup::new(AbsoluteAxisCode::ABS_RY, joystick_setup);
        let triggers_setup = AbsInfo::new(0, 0, 255, 0, 0, 1);
        let abs_z = UinputAbsSetup::new(AbsoluteAxisCode::ABS_Z, triggers_setup);
        let abs_rz = UinputAbsSetup::new(AbsoluteAxisCode::ABS_RZ, triggers_setup);
        let dpad_setup = AbsInfo::new(0, -1, 1, 0, 0, 1);
        let abs_hat0x = UinputAbsSetup::new(AbsoluteAxisCode::ABS_HAT0X, dpad_setup);
        let abs_hat0y = UinputAbsSetup::new(AbsoluteAxisCode::ABS_HAT0Y, dpad_setup);

        let device = VirtualDeviceBuilder::new()?
            .name(DEVICE_NAME)
            .with_keys(&keys)?
            .with_absolute_axis(&abs_x)?
            .with_absolute_axis(&abs_y)?
            .with_absolute_axis(&abs_rx)?
            .with_absolute_axis(&abs_ry)?
            .with_absolute_axis(&abs_z)?
            .with_absolute_axis(&abs_rz)?
            .with_absolute_axis(&abs_hat0x)?
            .with_absolute_axis(&abs_hat0y)?
            .build()?;

        Ok(device)
    }

    /// Translate a report into the evdev events that describe it. evdev uses
    /// positive Y for down, so the XUSB Y axes are flipped back.
    fn translate_report(report: &XusbReport) -> Vec<InputEvent> {
        let mask = report.button_mask();
        let mut events: Vec<InputEvent> = BUTTON_MAP
            .iter()
            .map(|(bit, key)| {
                InputEvent::new(EventType::KEY.0, key.0, (mask & bit != 0) as i32)
            })
            .collect();

        let hat_x = match (
            report.is_pressed(xusb::DPAD_LEFT),
            report.is_pressed(xusb::DPAD_RIGHT),
        ) {
            (true, false) => -1,
            (false, true) => 1,
            _ => 0,
        };
        let hat_y = match (
            report.is_pressed(xusb::DPAD_UP),
            report.is_pressed(xusb::DPAD_DOWN),
        ) {
            (true, false) => -1,
            (false, true) => 1,
            _ => 0,
        };

        let axes = [
            (AbsoluteAxisCode::ABS_X, report.thumb_lx as i32),
            (AbsoluteAxisCode::ABS_Y, flip(report.thumb_ly)),
            (AbsoluteAxisCode::ABS_RX, report.thumb_rx as i32),
            (AbsoluteAxisCode::ABS_RY, flip(report.thumb_ry)),
            (AbsoluteAxisCode::ABS_Z, report.left_trigger as i32),
            (AbsoluteAxisCode::ABS_RZ, report.right_trigger as i32),
            (AbsoluteAxisCode::ABS_HAT0X, hat_x),
            (AbsoluteAxisCode::ABS_HAT0Y, hat_y),
        ];
        events.extend(
            axes.iter()
                .map(|(code, value)| InputEvent::new(EventType::ABSOLUTE.0, code.0, *value)),
        );

        events
    }
}

fn flip(value: i16) -> i32 {
    (-(value as i32)).clamp(i16::MIN as i32, i16::MAX as i32)
}

impl GamepadBus for UinputBus {
    fn name(&self) -> &str {
        "uinput"
    }

    fn connect(&mut self) -> Result<(), SinkError> {
        if self.device.is_some() {
            return Ok(());
        }
        log::debug!("Creating virtual gamepad");
        let device = Self::create_virtual_device()
            .map_err(|e| SinkError::DriverUnavailable(format!("uinput: {e}")))?;
        self.device = Some(device);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.device.take().is_some() {
            log::debug!("Destroyed virtual gamepad");
        }
    }

    fn submit(&mut self, report: &XusbReport) -> Result<(), SinkError> {
        let Some(device) = self.device.as_mut() else {
            return Err(SinkError::NotConnected);
        };
        let events = Self::translate_report(report);
        device
            .emit(events.as_slice())
            .map_err(|e| SinkError::Send(e.to_string()))?;
        device
            .emit(&[SynchronizationEvent::new(SynchronizationCode::SYN_REPORT, 0).into()])
            .map_err(|e| SinkError::Send(e.to_string()))?;
        Ok(())
    }
}

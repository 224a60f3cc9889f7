use std::error::Error;

use packed_struct::PackedStructSlice;

use crate::drivers::dualsense::driver::{ConnectionType, INPUT_REPORT_BT};
use crate::drivers::dualsense::hid_report::{
    bluetooth_crc, decode_input_report, encode_output_report, InputState, ReportError,
    SetStatePackedOutputData,
};
use crate::input::normalize::normalize_state;
use crate::input::state::DPad;

/// Logical controller state shared by the USB and Bluetooth fixtures. Offsets
/// are relative to the start of the input state block.
fn state_block() -> [u8; 63] {
    let mut state = [0u8; 63];
    state[0] = 0xFF; // left stick x
    state[1] = 0x00; // left stick y
    state[2] = 0x80; // right stick x
    state[3] = 0xC8; // right stick y
    state[4] = 0xFF; // l2 trigger
    state[5] = 0x40; // r2 trigger
    state[6] = 0x11; // sequence
    state[7] = 0x20 | 0x02; // cross, dpad east
    state[8] = 0x20 | 0x01; // options, l1
    state[9] = 0x01 | 0x04; // ps, mute
    state[15..17].copy_from_slice(&1000i16.to_le_bytes()); // gyro x
    state[17..19].copy_from_slice(&(-2000i16).to_le_bytes()); // gyro y
    state[19..21].copy_from_slice(&0i16.to_le_bytes()); // gyro z
    state[21..23].copy_from_slice(&8192i16.to_le_bytes()); // accel x
    state[32..36].copy_from_slice(&[0x05, 0x7F, 0xC7, 0x42]); // finger 0
    state[36] = 0x80; // finger 1 lifted
    state
}

fn usb_report() -> Vec<u8> {
    let mut report = vec![0u8; 64];
    report[0] = 0x01;
    report[1..64].copy_from_slice(&state_block());
    report
}

fn bluetooth_report() -> Vec<u8> {
    let mut report = vec![0u8; 78];
    report[0] = 0x31;
    report[1] = 0x02;
    report[2..65].copy_from_slice(&state_block());
    report
}

#[test]
fn test_ds_touch_finger() -> Result<(), Box<dyn Error>> {
    let mut report = InputState::default();
    let finger = &mut report.touch_data.touch_finger_data[0];
    assert!(!finger.is_touching());
    finger.set_y(1068);
    finger.set_x(1919);
    assert_eq!(finger.get_y(), 1068);
    assert_eq!(finger.get_x(), 1919);
    println!("Finger: {}", finger);
    assert_eq!(
        finger.pack_to_vec().expect("should pack finger data"),
        vec![0x80, 0x7F, 0xC7, 0x42]
    );

    Ok(())
}

#[test]
fn test_usb_input_report() -> Result<(), Box<dyn Error>> {
    let state = decode_input_report(&usb_report())?;
    println!("USB state: {state:?}");

    assert_eq!(state.left_stick_x, 255);
    assert_eq!(state.left_stick_y, 0);
    assert_eq!(state.right_stick_x, 128);
    assert_eq!(state.right_stick_y, 200);
    assert_eq!(state.left_trigger, 255);
    assert_eq!(state.right_trigger, 64);

    assert!(state.buttons.cross);
    assert!(!state.buttons.square);
    assert!(!state.buttons.circle);
    assert!(!state.buttons.triangle);
    assert!(state.buttons.options);
    assert!(state.buttons.l1);
    assert!(!state.buttons.r1);
    assert!(!state.buttons.share);
    assert!(state.buttons.ps);
    assert!(state.buttons.mute);
    assert!(!state.buttons.touchpad);
    assert_eq!(state.dpad, DPad::East);

    assert_eq!(state.gyro_x, 1000);
    assert_eq!(state.gyro_y, -2000);
    assert_eq!(state.gyro_z, 0);
    assert_eq!(state.accel_x, 8192);

    assert!(state.touch_active);
    assert_eq!(state.touch_x, 1919);
    assert_eq!(state.touch_y, 1068);

    Ok(())
}

#[test]
fn test_bluetooth_input_report_matches_usb() -> Result<(), Box<dyn Error>> {
    let usb = decode_input_report(&usb_report())?;
    let bt = decode_input_report(&bluetooth_report())?;
    assert_eq!(usb, bt);

    let usb_norm = normalize_state(&usb, 0.0);
    let bt_norm = normalize_state(&bt, 0.0);
    assert_eq!(usb_norm, bt_norm);
    assert_eq!(bt_norm.left_stick_x, 1.0);
    assert_eq!(bt_norm.left_trigger, 1.0);
    assert_eq!(bt_norm.gyro_x, 0.5);
    assert_eq!(bt_norm.gyro_y, -1.0);

    Ok(())
}

#[test]
fn test_short_report_discarded() {
    let report = usb_report();
    let result = decode_input_report(&report[..9]);
    assert!(matches!(result, Err(ReportError::TooShort(9))));
}

#[test]
fn test_truncated_report_decodes_leading_fields() -> Result<(), Box<dyn Error>> {
    let report = usb_report();
    let state = decode_input_report(&report[..10])?;
    assert_eq!(state.left_stick_x, 255);
    assert!(state.buttons.l1);
    assert_eq!(state.gyro_x, 0);
    assert!(!state.touch_active);
    assert_eq!(state.touch_x, 0);

    Ok(())
}

#[test]
fn test_truncated_bluetooth_report_has_no_touch() -> Result<(), Box<dyn Error>> {
    let mut report = vec![0u8; 10];
    report[0] = INPUT_REPORT_BT;
    report[2] = 0x40;
    report[9] = 0x08;
    let state = decode_input_report(&report)?;
    assert_eq!(state.left_stick_x, 0x40);
    assert!(!state.touch_active);
    assert_eq!(state.dpad, DPad::Released);

    Ok(())
}

#[test]
fn test_unknown_report_id() {
    let mut report = usb_report();
    report[0] = 0x05;
    let result = decode_input_report(&report);
    assert!(matches!(result, Err(ReportError::UnknownReportId(0x05))));
}

#[test]
fn test_invalid_dpad_is_released() -> Result<(), Box<dyn Error>> {
    let mut report = usb_report();
    report[8] = 0x0C;
    let state = decode_input_report(&report)?;
    assert_eq!(state.dpad, DPad::Released);

    report[8] = 0x08;
    let state = decode_input_report(&report)?;
    assert_eq!(state.dpad, DPad::Released);

    Ok(())
}

#[test]
fn test_usb_output_report() -> Result<(), Box<dyn Error>> {
    let state = SetStatePackedOutputData::lights(0, 255, 128, 0x04);
    let report = encode_output_report(ConnectionType::Usb, state, 0)?;

    assert_eq!(report.len(), 48);
    assert_eq!(report[0], 0x02);
    assert_eq!(report[1], 0x00);
    // Player indicator and lightbar enable flags
    assert_eq!(report[2], 0x14);
    assert_eq!(report[44], 0x04);
    assert_eq!(&report[45..48], &[0, 255, 128]);

    Ok(())
}

#[test]
fn test_bluetooth_output_report() -> Result<(), Box<dyn Error>> {
    let state = SetStatePackedOutputData::lights(10, 20, 30, 0x1F);
    let report = encode_output_report(ConnectionType::Bluetooth, state, 3)?;

    assert_eq!(report.len(), 78);
    assert_eq!(report[0], 0x31);
    assert_eq!(report[1], 0x30);
    assert_eq!(report[2], 0x10);
    assert_eq!(report[4], 0x14);
    assert_eq!(report[46], 0x1F);
    assert_eq!(&report[47..50], &[10, 20, 30]);

    let crc = u32::from_le_bytes([report[74], report[75], report[76], report[77]]);
    assert_eq!(crc, bluetooth_crc(&report));

    let mut seeded = vec![0xA2];
    seeded.extend_from_slice(&report[..74]);
    assert_eq!(crc, crc32fast::hash(&seeded));

    Ok(())
}

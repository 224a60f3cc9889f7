//! Field layout of the state table exchanged with scripts. Scripts receive a
//! flat table and are expected to return one with the same keys.
use mlua::prelude::*;

use crate::input::state::{Buttons, DPad, NormalizedState};

/// Axis fields as (key, getter, setter)
type AxisField = (
    &'static str,
    fn(&NormalizedState) -> f32,
    fn(&mut NormalizedState, f32),
);
type ButtonField = (&'static str, fn(&Buttons) -> bool, fn(&mut Buttons, bool));

const AXES: &[AxisField] = &[
    ("left_x", |s| s.left_stick_x, |s, v| s.left_stick_x = v),
    ("left_y", |s| s.left_stick_y, |s, v| s.left_stick_y = v),
    ("right_x", |s| s.right_stick_x, |s, v| s.right_stick_x = v),
    ("right_y", |s| s.right_stick_y, |s, v| s.right_stick_y = v),
    ("left_trigger", |s| s.left_trigger, |s, v| s.left_trigger = v),
    ("right_trigger", |s| s.right_trigger, |s, v| s.right_trigger = v),
    ("gyro_x", |s| s.gyro_x, |s, v| s.gyro_x = v),
    ("gyro_y", |s| s.gyro_y, |s, v| s.gyro_y = v),
    ("gyro_z", |s| s.gyro_z, |s, v| s.gyro_z = v),
];

const BUTTONS: &[ButtonField] = &[
    ("square", |b| b.square, |b, v| b.square = v),
    ("cross", |b| b.cross, |b, v| b.cross = v),
    ("circle", |b| b.circle, |b, v| b.circle = v),
    ("triangle", |b| b.triangle, |b, v| b.triangle = v),
    ("l1", |b| b.l1, |b, v| b.l1 = v),
    ("r1", |b| b.r1, |b, v| b.r1 = v),
    ("l2_button", |b| b.l2_button, |b, v| b.l2_button = v),
    ("r2_button", |b| b.r2_button, |b, v| b.r2_button = v),
    ("share", |b| b.share, |b, v| b.share = v),
    ("options", |b| b.options, |b, v| b.options = v),
    ("l3", |b| b.l3, |b, v| b.l3 = v),
    ("r3", |b| b.r3, |b, v| b.r3 = v),
    ("ps", |b| b.ps, |b, v| b.ps = v),
    ("touchpad", |b| b.touchpad, |b, v| b.touchpad = v),
    ("mute", |b| b.mute, |b, v| b.mute = v),
];

/// Build the Lua table handed to a script's `process` function
pub fn push_state(lua: &Lua, state: &NormalizedState) -> LuaResult<LuaTable> {
    let table = lua.create_table()?;
    for (key, get, _) in AXES {
        table.set(*key, get(state))?;
    }
    for (key, get, _) in BUTTONS {
        table.set(*key, get(&state.buttons))?;
    }
    table.set("dpad", state.dpad.as_raw())?;
    table.set("dt", state.delta_time)?;
    Ok(table)
}

/// Read a state back from whatever a script returned. Missing or mistyped
/// fields fall back to zero, false, and a released dpad. A value that is not
/// a table yields the default state. The delta time is always carried over
/// from the input.
pub fn read_state(value: &LuaValue, input: &NormalizedState) -> NormalizedState {
    let mut state = NormalizedState {
        delta_time: input.delta_time,
        ..Default::default()
    };
    let LuaValue::Table(table) = value else {
        log::trace!("Script returned {} instead of a table", value.type_name());
        return state;
    };

    for (key, _, set) in AXES {
        set(&mut state, get_number(table, key));
    }
    for (key, _, set) in BUTTONS {
        set(&mut state.buttons, get_bool(table, key));
    }
    state.dpad = match table.get::<LuaValue>("dpad") {
        Ok(LuaValue::Integer(value)) => u8::try_from(value)
            .map(DPad::from_raw)
            .unwrap_or_default(),
        _ => DPad::Released,
    };

    state
}

fn get_number(table: &LuaTable, key: &str) -> f32 {
    match table.get::<LuaValue>(key) {
        Ok(LuaValue::Integer(value)) => value as f32,
        Ok(LuaValue::Number(value)) => value as f32,
        // Lua coerces numeric strings in arithmetic, so accept them here too
        Ok(LuaValue::String(value)) => value
            .to_str()
            .ok()
            .and_then(|value| value.trim().parse::<f32>().ok())
            .unwrap_or_default(),
        _ => 0.0,
    }
}

fn get_bool(table: &LuaTable, key: &str) -> bool {
    matches!(table.get::<LuaValue>(key), Ok(LuaValue::Boolean(true)))
}

use std::error::Error;

use proptest::prelude::*;

use crate::config::WeaponPreset;
use crate::input::script::host::{deadzone, ScriptHost};
use crate::input::script::info::ParameterType;
use crate::input::script::ScriptError;
use crate::input::state::{Buttons, DPad, NormalizedState};

const PASSTHROUGH: &str = r#"
function process(input)
    return input
end
"#;

fn loaded_host(source: &str) -> Result<ScriptHost, ScriptError> {
    let mut host = ScriptHost::new();
    host.initialize()?;
    host.load_script(source, "test")?;
    host.call_init()?;
    Ok(host)
}

#[test]
fn test_passthrough_keeps_state() -> Result<(), Box<dyn Error>> {
    let mut host = loaded_host(PASSTHROUGH)?;
    let input = NormalizedState {
        left_stick_x: 0.5,
        right_stick_y: -0.25,
        right_trigger: 1.0,
        dpad: DPad::SouthWest,
        buttons: Buttons {
            cross: true,
            mute: true,
            ..Default::default()
        },
        gyro_z: 0.125,
        ..Default::default()
    };

    let output = host.process(&input, 0.001)?;
    assert_eq!(
        output,
        NormalizedState {
            delta_time: 0.001,
            ..input
        }
    );

    Ok(())
}

#[test]
fn test_missing_fields_default() -> Result<(), Box<dyn Error>> {
    let source = r#"
function process(input)
    return { left_x = 0.5, cross = 1, dpad = 2.5, right_x = "fast", right_y = " -0.25 " }
end
"#;
    let mut host = loaded_host(source)?;
    let input = NormalizedState {
        left_stick_y: 1.0,
        dpad: DPad::North,
        ..Default::default()
    };

    let output = host.process(&input, 0.002)?;
    assert_eq!(output.left_stick_x, 0.5);
    assert_eq!(output.left_stick_y, 0.0);
    assert_eq!(output.right_stick_x, 0.0);
    assert_eq!(output.right_stick_y, -0.25);
    // Only real booleans count as pressed
    assert!(!output.buttons.cross);
    assert_eq!(output.dpad, DPad::Released);
    assert_eq!(output.delta_time, 0.002);

    Ok(())
}

#[test]
fn test_non_table_return_is_default_state() -> Result<(), Box<dyn Error>> {
    let mut host = loaded_host("function process(input) return 42 end")?;
    let input = NormalizedState {
        left_stick_x: 0.75,
        ..Default::default()
    };

    let output = host.process(&input, 0.004)?;
    assert_eq!(
        output,
        NormalizedState {
            delta_time: 0.004,
            ..Default::default()
        }
    );

    Ok(())
}

#[test]
fn test_dt_is_visible_to_script() -> Result<(), Box<dyn Error>> {
    let source = r#"
function process(input)
    input.left_x = input.dt * 100
    return input
end
"#;
    let mut host = loaded_host(source)?;
    let output = host.process(&NormalizedState::default(), 0.005)?;
    assert!((output.left_stick_x - 0.5).abs() < 1e-6);

    Ok(())
}

#[test]
fn test_missing_process_fails_load() {
    let mut host = ScriptHost::new();
    host.initialize().expect("should create interpreter");

    let result = host.load_script("local x = 1", "empty");
    assert!(matches!(result, Err(ScriptError::MissingProcess)));
    assert!(!host.is_loaded());
    assert_eq!(host.last_error(), Some("Script missing 'process' function"));
}

#[test]
fn test_syntax_error_fails_load() {
    let mut host = ScriptHost::new();
    let result = host.load_script("function process(input", "broken");
    assert!(matches!(result, Err(ScriptError::Lua(_))));
    let error = host.last_error().expect("should record error");
    assert!(error.starts_with("Script load error"));
}

#[test]
fn test_runtime_error_in_top_level() {
    let mut host = ScriptHost::new();
    let result = host.load_script("error('boom')\nfunction process(i) return i end", "boom");
    assert!(result.is_err());
    let error = host.last_error().expect("should record error");
    assert!(error.starts_with("Script execution error"));
}

#[test]
fn test_process_error_is_reported() -> Result<(), Box<dyn Error>> {
    let mut host = loaded_host("function process(input) error('bad input') end")?;
    let result = host.process(&NormalizedState::default(), 0.001);
    assert!(matches!(result, Err(ScriptError::Lua(_))));
    let error = host.last_error().expect("should record error");
    assert!(error.contains("bad input"));

    Ok(())
}

#[test]
fn test_process_without_script() {
    let mut host = ScriptHost::new();
    let result = host.process(&NormalizedState::default(), 0.001);
    assert!(matches!(result, Err(ScriptError::NotLoaded)));
}

#[test]
fn test_init_runs_once_after_load() -> Result<(), Box<dyn Error>> {
    let source = r#"
function init()
    set_param("initialized", get_param("initialized") + 1)
end

function process(input)
    return input
end
"#;
    let mut host = loaded_host(source)?;
    host.process(&NormalizedState::default(), 0.001)?;
    host.process(&NormalizedState::default(), 0.001)?;
    assert_eq!(host.get_parameter("initialized", -1.0), 1.0);

    Ok(())
}

#[test]
fn test_init_error_is_reported() {
    let source = r#"
function init() error('no init for you') end
function process(input) return input end
"#;
    let mut host = ScriptHost::new();
    host.load_script(source, "init").expect("should load");
    let result = host.call_init();
    assert!(result.is_err());
    let error = host.last_error().expect("should record error");
    assert!(error.starts_with("Script init error"));
}

#[test]
fn test_set_param_persists_across_ticks() -> Result<(), Box<dyn Error>> {
    let source = r#"
function process(input)
    local count = get_param("count", 0) + 1
    set_param("count", count)
    input.left_x = count / 10
    return input
end
"#;
    let mut host = loaded_host(source)?;
    host.process(&NormalizedState::default(), 0.001)?;
    let output = host.process(&NormalizedState::default(), 0.001)?;
    assert!((output.left_stick_x - 0.2).abs() < 1e-6);
    assert_eq!(host.get_parameter("count", 0.0), 2.0);

    Ok(())
}

#[test]
fn test_weapon_preset_overrides_parameters() -> Result<(), Box<dyn Error>> {
    let source = r#"
function process(input)
    input.right_y = get_param("strength_ads", 0)
    input.right_x = get_param("smoothing", 0)
    return input
end
"#;
    let mut host = loaded_host(source)?;
    host.set_parameter("strength_ads", 0.1);

    let preset = WeaponPreset {
        name: "AR".to_string(),
        ads_strength: 0.7,
        smoothing: 0.25,
        ..Default::default()
    };
    host.apply_weapon_preset(Some(&preset));
    let output = host.process(&NormalizedState::default(), 0.001)?;
    assert!((output.right_stick_y - 0.7).abs() < 1e-6);
    assert!((output.right_stick_x - 0.25).abs() < 1e-6);

    // No preset leaves the table alone
    host.apply_weapon_preset(None);
    assert!((host.get_parameter("strength_ads", 0.0) - 0.7).abs() < 1e-6);

    Ok(())
}

#[test]
fn test_helper_functions() -> Result<(), Box<dyn Error>> {
    let source = r#"
function process(input)
    input.left_x = clamp(5, -1, 1)
    input.left_y = lerp(0, 1, 0.25)
    input.right_x = deadzone(0.05, 0.1)
    input.right_y = deadzone(-0.55, 0.1)
    print("helpers", 1, true, nil)
    return input
end
"#;
    let mut host = loaded_host(source)?;
    let output = host.process(&NormalizedState::default(), 0.001)?;
    assert_eq!(output.left_stick_x, 1.0);
    assert_eq!(output.left_stick_y, 0.25);
    assert_eq!(output.right_stick_x, 0.0);
    assert!((output.right_stick_y + 0.5).abs() < 1e-6);

    Ok(())
}

#[test]
fn test_sandbox_has_no_filesystem() -> Result<(), Box<dyn Error>> {
    let source = r#"
function process(input)
    input.cross = io == nil and os == nil and dofile == nil and loadfile == nil
    return input
end
"#;
    let mut host = loaded_host(source)?;
    let output = host.process(&NormalizedState::default(), 0.001)?;
    assert!(output.buttons.cross);

    Ok(())
}

#[test]
fn test_script_info() -> Result<(), Box<dyn Error>> {
    let source = r#"
script_info = {
    name = "Anti-Recoil",
    description = "Pulls the right stick down while firing",
    author = "dualscript",
    version = "1.2",
    parameters = {
        { key = "strength_ads", name = "ADS Strength", type = "float",
          default = 0.4, min = 0, max = 1, step = 0.05 },
        { key = "enabled_hipfire", name = "Hip Fire", type = "bool", default = true },
        { key = "mode", type = "choice", default = 1, choices = { "Light", "Heavy" } },
        { name = "No key" },
    },
}

function process(input) return input end
"#;
    let host = loaded_host(source)?;
    let info = host.script_info();

    assert_eq!(info.name, "Anti-Recoil");
    assert_eq!(info.version, "1.2");
    assert!(!info.accepts_weapon_preset);
    assert_eq!(info.parameters.len(), 3);

    let strength = &info.parameters[0];
    assert_eq!(strength.kind, ParameterType::Float);
    assert!((strength.default - 0.4).abs() < 1e-6);
    assert_eq!(strength.value, strength.default);
    assert!((strength.step - 0.05).abs() < 1e-6);

    let hipfire = &info.parameters[1];
    assert_eq!(hipfire.kind, ParameterType::Bool);
    assert_eq!(hipfire.default, 1.0);
    assert_eq!(hipfire.max, 1.0);
    assert!((hipfire.step - 0.01).abs() < 1e-6);

    let mode = &info.parameters[2];
    assert_eq!(mode.kind, ParameterType::Choice);
    assert_eq!(mode.choices, vec!["Light".to_string(), "Heavy".to_string()]);

    Ok(())
}

#[test]
fn test_script_info_bounds_parameters() -> Result<(), Box<dyn Error>> {
    let source = r#"
script_info = {
    parameters = {
        { key = "mode", type = "choice", default = 5, choices = { "A", "B", "C" } },
        { key = "count", type = "int", default = 2.6, min = 0, max = 10 },
        { key = "toggle", type = "bool", default = 4 },
        { key = "gain", default = 3.5, min = -1, max = 2 },
    },
}

function process(input) return input end
"#;
    let host = loaded_host(source)?;
    let info = host.script_info();

    let mode = &info.parameters[0];
    assert_eq!(mode.min, 0.0);
    assert_eq!(mode.max, 2.0);
    assert_eq!(mode.value, 2.0);
    assert_eq!(mode.clamp_value(1.4), 1.0);
    assert_eq!(mode.clamp_value(-1.0), 0.0);

    let count = &info.parameters[1];
    assert_eq!(count.value, 3.0);
    assert_eq!(count.clamp_value(42.0), 10.0);

    let toggle = &info.parameters[2];
    assert_eq!(toggle.max, 1.0);
    assert_eq!(toggle.value, 1.0);
    assert_eq!(toggle.clamp_value(0.2), 0.0);

    let gain = &info.parameters[3];
    assert_eq!(gain.value, 2.0);
    assert_eq!(gain.clamp_value(-0.5), -0.5);
    assert_eq!(gain.clamp_value(f32::NAN), -1.0);

    Ok(())
}

#[test]
fn test_script_info_is_optional() -> Result<(), Box<dyn Error>> {
    let host = loaded_host(PASSTHROUGH)?;
    let info = host.script_info();
    assert_eq!(info.name, "test");
    assert!(info.parameters.is_empty());

    Ok(())
}

#[test]
fn test_deadzone_edges() {
    assert_eq!(deadzone(0.0, 0.0), 0.0);
    assert_eq!(deadzone(1.0, 0.2), 1.0);
    assert_eq!(deadzone(-1.0, 0.2), -1.0);
    assert_eq!(deadzone(0.19, 0.2), 0.0);
    assert_eq!(deadzone(1.0, 1.0), 1.0);
    assert_eq!(deadzone(0.5, 1.0), 0.0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_deadzone_sign_and_range(value in -1.0f32..=1.0, threshold in 0.0f32..1.0) {
        let output = deadzone(value, threshold);
        if value.abs() < threshold {
            prop_assert_eq!(output, 0.0);
        } else {
            prop_assert!(output.abs() <= 1.0);
            if output != 0.0 {
                prop_assert_eq!(output.signum(), value.signum());
            }
        }
    }
}

use std::error::Error;
use std::fs;
use std::path::Path;

use crate::config::{ParameterValue, ScriptSettings, WeaponPreset};
use crate::input::script::Pipeline;
use crate::input::state::NormalizedState;

/// Script that adds `k` to the left stick x axis, clamped
fn adder(k: f32) -> String {
    format!(
        r#"
function process(input)
    input.left_x = clamp(input.left_x + {k}, -100, 100)
    return input
end
"#
    )
}

const FAILING: &str = r#"
function process(input)
    input.left_x = 99
    error("always fails")
end
"#;

const ANTI_RECOIL: &str = r#"
script_info = {
    name = "Anti-Recoil",
    parameters = {
        { key = "strength_ads", name = "ADS Strength", default = 0.2 },
    },
}

function process(input)
    input.right_y = get_param("strength_ads", 0)
    return input
end
"#;

const TUNABLE: &str = r#"
script_info = {
    name = "Tunable",
    parameters = {
        { key = "gain", default = 0.5 },
        { key = "offset", default = 0.0 },
    },
}

function process(input)
    input.left_y = get_param("gain", 0) + get_param("offset", 0)
    return input
end
"#;

fn write_script(dir: &Path, file: &str, source: &str) -> Result<(), Box<dyn Error>> {
    fs::write(dir.join(file), source)?;
    Ok(())
}

fn enable_all(pipeline: &mut Pipeline) {
    let names: Vec<String> = pipeline.configs().into_iter().map(|c| c.name).collect();
    for name in names {
        pipeline.set_enabled(&name, true);
    }
}

#[test]
fn test_empty_pipeline_passes_through() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let mut pipeline = Pipeline::new(dir.path());
    pipeline.rescan(&[]);

    let input = NormalizedState {
        left_stick_x: 0.25,
        ..Default::default()
    };
    assert_eq!(pipeline.process(&input, None), input);

    Ok(())
}

#[test]
fn test_discovery_is_sorted_and_filtered() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    write_script(dir.path(), "b_second.lua", &adder(2.0))?;
    write_script(dir.path(), "a_first.lua", &adder(1.0))?;
    write_script(dir.path(), "notes.txt", "not a script")?;
    fs::create_dir(dir.path().join("folder.lua"))?;

    let mut pipeline = Pipeline::new(dir.path());
    pipeline.rescan(&[]);

    let names: Vec<String> = pipeline.configs().into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["a_first".to_string(), "b_second".to_string()]);
    // New scripts start disabled
    assert!(pipeline.entries().iter().all(|entry| !entry.config.enabled));
    assert!(pipeline.entries().iter().all(|entry| entry.loaded));

    Ok(())
}

#[test]
fn test_scripts_chain_in_order() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    write_script(dir.path(), "1.lua", &adder(1.0))?;
    write_script(dir.path(), "2.lua", &adder(2.0))?;
    write_script(dir.path(), "3.lua", &adder(3.0))?;

    let mut pipeline = Pipeline::new(dir.path());
    pipeline.rescan(&[]);
    enable_all(&mut pipeline);

    let input = NormalizedState {
        left_stick_x: 0.5,
        ..Default::default()
    };
    let output = pipeline.process(&input, None);
    assert_eq!(output.left_stick_x, 6.5);

    assert!(pipeline.set_enabled("2", false));
    let output = pipeline.process(&input, None);
    assert_eq!(output.left_stick_x, 4.5);

    assert!(!pipeline.set_enabled("missing", true));

    Ok(())
}

#[test]
fn test_failing_script_passes_through() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    write_script(dir.path(), "1.lua", &adder(1.0))?;
    write_script(dir.path(), "2.lua", FAILING)?;
    write_script(dir.path(), "3.lua", &adder(3.0))?;

    let mut pipeline = Pipeline::new(dir.path());
    pipeline.rescan(&[]);
    enable_all(&mut pipeline);

    let input = NormalizedState::default();
    for _ in 0..3 {
        let output = pipeline.process(&input, None);
        assert_eq!(output.left_stick_x, 4.0);

        let failing = pipeline.entry("2").expect("should have entry");
        assert!(!failing.loaded);
        let error = failing.last_error.as_deref().expect("should record error");
        assert!(error.contains("always fails"));
    }
    assert!(pipeline.entry("1").map(|e| e.loaded).unwrap_or(false));
    assert!(pipeline.entry("3").map(|e| e.loaded).unwrap_or(false));

    Ok(())
}

#[test]
fn test_broken_script_stays_visible() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    write_script(dir.path(), "broken.lua", "function process(input")?;
    write_script(dir.path(), "good.lua", &adder(1.0))?;

    let mut pipeline = Pipeline::new(dir.path());
    pipeline.rescan(&[]);
    enable_all(&mut pipeline);

    let broken = pipeline.entry("broken").expect("should list broken script");
    assert!(!broken.loaded);
    assert!(broken.host.is_none());
    assert!(broken.last_error.is_some());

    let output = pipeline.process(&NormalizedState::default(), None);
    assert_eq!(output.left_stick_x, 1.0);

    // Fixing the file and reloading brings it back
    write_script(dir.path(), "broken.lua", &adder(2.0))?;
    assert!(pipeline.reload_script("broken"));
    let broken = pipeline.entry("broken").expect("should list broken script");
    assert!(broken.loaded);
    assert!(broken.config.enabled);
    let output = pipeline.process(&NormalizedState::default(), None);
    assert_eq!(output.left_stick_x, 3.0);

    Ok(())
}

#[test]
fn test_rescan_preserves_enabled_and_drops_removed() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    write_script(dir.path(), "keep.lua", &adder(1.0))?;
    write_script(dir.path(), "other.lua", &adder(2.0))?;
    write_script(dir.path(), "remove.lua", &adder(3.0))?;

    let mut pipeline = Pipeline::new(dir.path());
    pipeline.rescan(&[]);
    pipeline.set_enabled("keep", true);
    fs::remove_file(dir.path().join("remove.lua"))?;

    pipeline.rescan(&[]);
    assert_eq!(pipeline.entries().len(), 2);
    assert!(pipeline.entry("remove").is_none());
    assert!(pipeline.entry("keep").map(|e| e.config.enabled).unwrap_or(false));
    assert!(!pipeline.entry("other").map(|e| e.config.enabled).unwrap_or(true));

    Ok(())
}

#[test]
fn test_saved_settings_restore_by_declared_name() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    write_script(dir.path(), "tunable.lua", TUNABLE)?;

    let saved = vec![ScriptSettings {
        name: "Tunable".to_string(),
        enabled: true,
        parameters: vec![
            ParameterValue {
                key: "gain".to_string(),
                value: 0.75,
            },
            ParameterValue {
                key: "dropped".to_string(),
                value: 9.0,
            },
        ],
    }];

    let mut pipeline = Pipeline::new(dir.path());
    pipeline.rescan(&saved);

    let entry = pipeline.entry("Tunable").expect("should use declared name");
    assert!(entry.config.enabled);
    assert_eq!(entry.config.parameter("gain").map(|p| p.value), Some(0.75));
    assert_eq!(entry.config.parameter("offset").map(|p| p.value), Some(0.0));
    assert!(entry.config.parameter("dropped").is_none());

    let output = pipeline.process(&NormalizedState::default(), None);
    assert_eq!(output.left_stick_y, 0.75);

    assert!(pipeline.set_parameter("Tunable", "offset", 0.125));
    let output = pipeline.process(&NormalizedState::default(), None);
    assert_eq!(output.left_stick_y, 0.875);

    Ok(())
}

#[test]
fn test_parameter_edits_are_bounded() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    write_script(dir.path(), "tunable.lua", TUNABLE)?;

    let saved = vec![ScriptSettings {
        name: "Tunable".to_string(),
        enabled: true,
        parameters: vec![ParameterValue {
            key: "gain".to_string(),
            value: 7.0,
        }],
    }];

    let mut pipeline = Pipeline::new(dir.path());
    pipeline.rescan(&saved);
    let entry = pipeline.entry("Tunable").expect("should load tunable");
    assert_eq!(entry.config.parameter("gain").map(|p| p.value), Some(1.0));
    let output = pipeline.process(&NormalizedState::default(), None);
    assert_eq!(output.left_stick_y, 1.0);

    assert!(pipeline.set_parameter("Tunable", "gain", 5.0));
    assert!(pipeline.set_parameter("Tunable", "offset", -2.0));
    let entry = pipeline.entry("Tunable").expect("should load tunable");
    assert_eq!(entry.config.parameter("gain").map(|p| p.value), Some(1.0));
    assert_eq!(entry.config.parameter("offset").map(|p| p.value), Some(0.0));
    let output = pipeline.process(&NormalizedState::default(), None);
    assert_eq!(output.left_stick_y, 1.0);

    // Undeclared keys reach the script unchanged
    assert!(pipeline.set_parameter("Tunable", "extra", 5.0));
    let host = pipeline
        .entry("Tunable")
        .and_then(|entry| entry.host.as_ref())
        .expect("should have host");
    assert_eq!(host.get_parameter("extra", 0.0), 5.0);

    Ok(())
}

#[test]
fn test_weapon_preset_reaches_anti_recoil() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    write_script(dir.path(), "recoil.lua", ANTI_RECOIL)?;

    let mut pipeline = Pipeline::new(dir.path());
    pipeline.rescan(&[]);
    assert!(pipeline.set_enabled("Anti-Recoil", true));

    // Declared default until a preset is supplied
    let output = pipeline.process(&NormalizedState::default(), None);
    assert!((output.right_stick_y - 0.2).abs() < 1e-6);

    let preset = WeaponPreset {
        name: "AR".to_string(),
        ads_strength: 0.7,
        ..Default::default()
    };
    let output = pipeline.process(&NormalizedState::default(), Some(&preset));
    assert!((output.right_stick_y - 0.7).abs() < 1e-6);

    Ok(())
}

#[test]
fn test_weapon_preset_capability_flag() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let source = r#"
script_info = { name = "Spray Control", accepts_weapon_preset = true }
function process(input)
    input.right_x = get_param("horizontal_strength", 0)
    return input
end
"#;
    write_script(dir.path(), "spray.lua", source)?;
    write_script(
        dir.path(),
        "plain.lua",
        "function process(input) input.left_y = get_param('smoothing', 0) return input end",
    )?;

    let mut pipeline = Pipeline::new(dir.path());
    pipeline.rescan(&[]);
    enable_all(&mut pipeline);

    let preset = WeaponPreset {
        name: "SMG".to_string(),
        horizontal_strength: 0.3,
        smoothing: 0.9,
        ..Default::default()
    };
    let output = pipeline.process(&NormalizedState::default(), Some(&preset));
    assert!((output.right_stick_x - 0.3).abs() < 1e-6);
    assert_eq!(output.left_stick_y, 0.0);

    Ok(())
}

#[test]
fn test_reorder_changes_execution_order() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    write_script(
        dir.path(),
        "a.lua",
        "function process(input) input.left_x = 0.25 return input end",
    )?;
    write_script(
        dir.path(),
        "b.lua",
        "function process(input) input.left_x = input.left_x * 2 return input end",
    )?;

    let mut pipeline = Pipeline::new(dir.path());
    pipeline.rescan(&[]);
    enable_all(&mut pipeline);

    let output = pipeline.process(&NormalizedState::default(), None);
    assert_eq!(output.left_stick_x, 0.5);

    pipeline.move_up(1);
    let names: Vec<String> = pipeline.configs().into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["b".to_string(), "a".to_string()]);
    let output = pipeline.process(&NormalizedState::default(), None);
    assert_eq!(output.left_stick_x, 0.25);

    // Out of range moves are ignored
    pipeline.move_up(0);
    pipeline.move_down(1);
    pipeline.move_down(0);
    let names: Vec<String> = pipeline.configs().into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["a".to_string(), "b".to_string()]);

    Ok(())
}

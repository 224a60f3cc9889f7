pub mod path;


use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::input::script::info::ScriptConfig;

/// Name of the profile created when no profiles exist
pub const DEFAULT_PROFILE_NAME: &str = "Default";
/// Poll rate used when none is configured
pub const DEFAULT_POLL_RATE: f64 = 1000.0;
/// LED color applied after a controller connects
pub const DEFAULT_LED_COLOR: [u8; 3] = [0, 255, 128];

/// Represents all possible errors loading or saving [Settings]
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Could not read: {0}")]
    IoError(#[from] io::Error),
    #[error("Unable to deserialize: {0}")]
    DeserializeError(#[from] serde_yaml::Error),
    #[error("Unable to serialize: {0}")]
    SerializeError(serde_yaml::Error),
}

/// Persisted application settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case", default)]
pub struct Settings {
    pub poll_rate: f64,
    pub scripts_dir: String,
    pub active_profile: String,
    pub led_color: [u8; 3],
    pub profiles: Vec<GameProfile>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_rate: DEFAULT_POLL_RATE,
            scripts_dir: "scripts".to_string(),
            active_profile: DEFAULT_PROFILE_NAME.to_string(),
            led_color: DEFAULT_LED_COLOR,
            profiles: vec![GameProfile::new(DEFAULT_PROFILE_NAME)],
        }
    }
}

impl Settings {
    /// Load [Settings] from the given YAML string
    pub fn from_yaml(content: String) -> Result<Settings, LoadError> {
        let settings: Settings = serde_yaml::from_str(content.as_str())?;
        Ok(settings)
    }

    /// Load [Settings] from the given YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Settings, LoadError> {
        let file = fs::File::open(path)?;
        let settings: Settings = serde_yaml::from_reader(file)?;
        Ok(settings)
    }

    /// Load [Settings] from the given path. A missing file yields the
    /// defaults.
    pub fn load_or_default(path: &Path) -> Result<Settings, LoadError> {
        if !path.exists() {
            log::info!("No config found at {path:?}. Using defaults.");
            return Ok(Settings::default());
        }
        let mut settings = Settings::from_yaml_file(path)?;
        if settings.profiles.is_empty() {
            settings.profiles.push(GameProfile::new(DEFAULT_PROFILE_NAME));
        }
        Ok(settings)
    }

    /// Write the settings to the given path, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), LoadError> {
        let content = serde_yaml::to_string(self).map_err(LoadError::SerializeError)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, content)?;
        log::debug!("Saved config to {path:?}");
        Ok(())
    }

    pub fn active_profile(&self) -> Option<&GameProfile> {
        self.profiles
            .iter()
            .find(|profile| profile.name == self.active_profile)
    }

    /// Returns the active profile, creating it if it does not exist
    pub fn active_profile_mut(&mut self) -> &mut GameProfile {
        let idx = match self
            .profiles
            .iter()
            .position(|profile| profile.name == self.active_profile)
        {
            Some(idx) => idx,
            None => {
                self.profiles.push(GameProfile::new(&self.active_profile));
                self.profiles.len() - 1
            }
        };
        &mut self.profiles[idx]
    }

    /// Saved state for the script with the given name in the active profile
    pub fn script_settings(&self, name: &str) -> Option<&ScriptSettings> {
        self.active_profile()?
            .scripts
            .iter()
            .find(|script| script.name == name)
    }

    /// Saved script states of the active profile
    pub fn scripts(&self) -> &[ScriptSettings] {
        self.active_profile()
            .map(|profile| profile.scripts.as_slice())
            .unwrap_or_default()
    }

    /// Replace the saved script states of the active profile with the given
    /// live configs
    pub fn capture_scripts(&mut self, configs: &[ScriptConfig]) {
        let profile = self.active_profile_mut();
        profile.scripts = configs.iter().map(ScriptSettings::from_config).collect();
    }

    pub fn active_weapon_preset(&self) -> Option<&WeaponPreset> {
        self.active_profile()?.active_weapon_preset()
    }

    /// Select the active weapon preset. Returns false if no preset has
    /// that name.
    pub fn set_active_weapon(&mut self, name: &str) -> bool {
        self.active_profile_mut().set_active_weapon(name)
    }

    pub fn create_weapon_preset(&mut self, preset: WeaponPreset) {
        self.active_profile_mut().create_weapon_preset(preset);
    }

    pub fn update_weapon_preset(&mut self, preset: WeaponPreset) -> bool {
        self.active_profile_mut().update_weapon_preset(preset)
    }

    pub fn remove_weapon_preset(&mut self, name: &str) -> bool {
        self.active_profile_mut().remove_weapon_preset(name)
    }
}

/// Per-game set of script states and weapon presets
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(rename_all = "snake_case", default)]
pub struct GameProfile {
    pub name: String,
    pub executable_hint: Option<String>,
    pub scripts: Vec<ScriptSettings>,
    pub weapon_presets: Vec<WeaponPreset>,
    pub active_weapon: Option<String>,
}

impl GameProfile {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn weapon_preset(&self, name: &str) -> Option<&WeaponPreset> {
        self.weapon_presets.iter().find(|preset| preset.name == name)
    }

    pub fn active_weapon_preset(&self) -> Option<&WeaponPreset> {
        let name = self.active_weapon.as_ref()?;
        self.weapon_preset(name)
    }

    pub fn set_active_weapon(&mut self, name: &str) -> bool {
        if self.weapon_preset(name).is_none() {
            log::warn!("No weapon preset named '{name}' in profile '{}'", self.name);
            return false;
        }
        self.active_weapon = Some(name.to_string());
        true
    }

    /// Add a preset. The first preset of a profile becomes the active one.
    pub fn create_weapon_preset(&mut self, preset: WeaponPreset) {
        if self.weapon_presets.is_empty() {
            self.active_weapon = Some(preset.name.clone());
        }
        self.weapon_presets.push(preset);
    }

    /// Replace the preset with the same name. Returns false if there is none.
    pub fn update_weapon_preset(&mut self, preset: WeaponPreset) -> bool {
        match self
            .weapon_presets
            .iter_mut()
            .find(|existing| existing.name == preset.name)
        {
            Some(existing) => {
                *existing = preset;
                true
            }
            None => false,
        }
    }

    /// Remove a preset by name. If it was active, the first remaining preset
    /// becomes active.
    pub fn remove_weapon_preset(&mut self, name: &str) -> bool {
        let before = self.weapon_presets.len();
        self.weapon_presets.retain(|preset| preset.name != name);
        if self.weapon_presets.len() == before {
            return false;
        }
        if self.active_weapon.as_deref() == Some(name) {
            self.active_weapon = self
                .weapon_presets
                .first()
                .map(|preset| preset.name.clone());
        }
        true
    }
}

/// Saved enabled flag and parameter values of one script
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(rename_all = "snake_case", default)]
pub struct ScriptSettings {
    pub name: String,
    pub enabled: bool,
    pub parameters: Vec<ParameterValue>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub struct ParameterValue {
    pub key: String,
    pub value: f32,
}

impl ScriptSettings {
    pub fn from_config(config: &ScriptConfig) -> Self {
        Self {
            name: config.name.clone(),
            enabled: config.enabled,
            parameters: config
                .parameters
                .iter()
                .map(|param| ParameterValue {
                    key: param.key.clone(),
                    value: param.value,
                })
                .collect(),
        }
    }

    /// Restore the enabled flag and parameter values into the given config.
    /// Saved keys the script no longer declares are ignored.
    pub fn restore_into(&self, config: &mut ScriptConfig) {
        config.enabled = self.enabled;
        for saved in self.parameters.iter() {
            if config.set_parameter_value(&saved.key, saved.value).is_none() {
                log::debug!(
                    "Script '{}' no longer declares parameter '{}'",
                    config.name,
                    saved.key
                );
            }
        }
    }
}

/// Named set of anti-recoil tuning values
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(rename_all = "snake_case", default)]
pub struct WeaponPreset {
    pub name: String,
    pub ads_strength: f32,
    pub hip_fire_strength: f32,
    pub horizontal_strength: f32,
    pub ads_threshold: f32,
    pub fire_threshold: f32,
    pub smoothing: f32,
    pub hotkey: Option<String>,
}

impl WeaponPreset {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Parameter keys and values injected into a script before it runs
    pub fn parameters(&self) -> [(&'static str, f32); 6] {
        [
            ("strength_ads", self.ads_strength),
            ("strength_hipfire", self.hip_fire_strength),
            ("horizontal_strength", self.horizontal_strength),
            ("ads_threshold", self.ads_threshold),
            ("fire_threshold", self.fire_threshold),
            ("smoothing", self.smoothing),
        ]
    }
}

//! Metadata a script declares about itself and the tunable parameters it
//! exposes to the operator.
use std::{fmt::Display, path::PathBuf};

/// Declared name of the stock anti-recoil script
pub const ANTI_RECOIL_NAME: &str = "Anti-Recoil";

/// Widget type of a script parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterType {
    #[default]
    Float,
    Int,
    Bool,
    Choice,
}

impl ParameterType {
    /// Parse the `type` field of a parameter declaration. Returns None for
    /// unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "float" => Some(Self::Float),
            "int" => Some(Self::Int),
            "bool" => Some(Self::Bool),
            "choice" => Some(Self::Choice),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Choice => "choice",
        }
    }
}

impl Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tunable value declared by a script. Bool and Choice parameters are still
/// stored as floats (0/1 and the choice index).
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptParameter {
    pub key: String,
    pub name: String,
    pub description: String,
    pub kind: ParameterType,
    pub value: f32,
    pub default: f32,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub choices: Vec<String>,
}

impl Default for ScriptParameter {
    fn default() -> Self {
        Self {
            key: String::new(),
            name: String::new(),
            description: String::new(),
            kind: ParameterType::Float,
            value: 0.0,
            default: 0.0,
            min: 0.0,
            max: 1.0,
            step: 0.01,
            choices: Vec::new(),
        }
    }
}

impl ScriptParameter {
    /// Bound a value to what this parameter accepts. Int and Choice values
    /// are rounded to the nearest whole number, Bool values snap to 0 or 1.
    pub fn clamp_value(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.min;
        }
        let (min, max) = match self.kind {
            ParameterType::Bool => (0.0, 1.0),
            ParameterType::Choice if !self.choices.is_empty() => {
                (0.0, (self.choices.len() - 1) as f32)
            }
            _ => (self.min, self.max.max(self.min)),
        };
        let value = match self.kind {
            ParameterType::Float => value,
            _ => value.round(),
        };
        value.clamp(min, max)
    }

    /// Store a value after bounding it. Returns the stored value.
    pub fn set_value(&mut self, value: f32) -> f32 {
        self.value = self.clamp_value(value);
        self.value
    }
}

/// Contents of a script's optional `script_info` table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptInfo {
    pub name: String,
    pub description: String,
    pub author: String,
    pub version: String,
    pub parameters: Vec<ScriptParameter>,
    /// Script asked for weapon preset values regardless of its name
    pub accepts_weapon_preset: bool,
}

/// Operator facing configuration of one discovered script
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptConfig {
    pub name: String,
    pub path: PathBuf,
    pub description: String,
    pub author: String,
    pub version: String,
    pub enabled: bool,
    pub parameters: Vec<ScriptParameter>,
    pub accepts_weapon_preset: bool,
}

impl ScriptConfig {
    /// Create a config for a script file. The file stem is used as the name
    /// until the script declares its own.
    pub fn from_path(path: PathBuf) -> Self {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            name,
            path,
            ..Default::default()
        }
    }

    /// Overwrite metadata and parameters with what the script declared. The
    /// enabled flag is left alone.
    pub fn apply_info(&mut self, info: ScriptInfo) {
        if !info.name.is_empty() {
            self.name = info.name;
        }
        self.description = info.description;
        self.author = info.author;
        self.version = info.version;
        self.parameters = info.parameters;
        self.accepts_weapon_preset = info.accepts_weapon_preset;
    }

    pub fn parameter(&self, key: &str) -> Option<&ScriptParameter> {
        self.parameters.iter().find(|param| param.key == key)
    }

    /// Set a parameter value by key, bounded to the declared range. Returns
    /// the stored value, or None for unknown keys.
    pub fn set_parameter_value(&mut self, key: &str, value: f32) -> Option<f32> {
        self.parameters
            .iter_mut()
            .find(|param| param.key == key)
            .map(|param| param.set_value(value))
    }

    /// Returns true if weapon preset values should be injected before this
    /// script runs
    pub fn wants_weapon_preset(&self) -> bool {
        self.accepts_weapon_preset || is_anti_recoil_name(&self.name)
    }
}

/// Case sensitive match on the declared script name
pub fn is_anti_recoil_name(name: &str) -> bool {
    name == ANTI_RECOIL_NAME || name.contains("anti") || name.contains("recoil")
}

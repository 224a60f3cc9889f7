use std::{
    collections::HashMap,
    fs,
    path::Path,
    sync::{Arc, Mutex, PoisonError},
};

use mlua::{prelude::*, StdLib, Variadic};

use crate::{config::WeaponPreset, input::state::NormalizedState};

use super::{
    info::{ParameterType, ScriptInfo, ScriptParameter},
    schema, ScriptError,
};

/// Log target used for output of the script `print` function
pub const PRINT_TARGET: &str = "script";

/// Base library functions removed from the sandbox
const BLOCKED_GLOBALS: &[&str] = &["dofile", "loadfile", "require", "collectgarbage"];

type Parameters = Arc<Mutex<HashMap<String, f32>>>;

/// ScriptHost runs a single user script inside its own Lua state. Only the
/// base, math, string and table libraries are available to the script along
/// with a handful of host functions:
///
///   get_param(name, default)  set_param(name, value)
///   clamp(value, min, max)    lerp(a, b, t)
///   deadzone(value, threshold)
///
/// A script must define a global `process(state)` function returning the new
/// state. `init()` and `cleanup()` are optional.
///
/// The host is Send so it can live inside the processor thread, but it must
/// only ever be driven from one thread at a time.
pub struct ScriptHost {
    lua: Option<Lua>,
    name: String,
    params: Parameters,
    has_process: bool,
    last_error: Option<String>,
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptHost {
    pub fn new() -> Self {
        Self {
            lua: None,
            name: String::new(),
            params: Arc::new(Mutex::new(HashMap::new())),
            has_process: false,
            last_error: None,
        }
    }

    /// Create a fresh sandboxed interpreter, dropping any previously loaded
    /// script.
    pub fn initialize(&mut self) -> Result<(), ScriptError> {
        self.call_cleanup();
        self.lua = None;
        self.has_process = false;

        let lua = Lua::new_with(
            StdLib::MATH | StdLib::STRING | StdLib::TABLE,
            LuaOptions::default(),
        )
        .inspect_err(|e| self.last_error = Some(format!("Failed to create Lua state: {e}")))?;

        let globals = lua.globals();
        for name in BLOCKED_GLOBALS {
            globals.set(*name, LuaValue::Nil)?;
        }

        let params = self.params.clone();
        let get_param = lua.create_function(move |_, (name, default): (String, Option<f32>)| {
            let params = params.lock().unwrap_or_else(PoisonError::into_inner);
            Ok(params.get(&name).copied().unwrap_or(default.unwrap_or(0.0)))
        })?;
        globals.set("get_param", get_param)?;

        let params = self.params.clone();
        let set_param = lua.create_function(move |_, (name, value): (String, f32)| {
            let mut params = params.lock().unwrap_or_else(PoisonError::into_inner);
            params.insert(name, value);
            Ok(())
        })?;
        globals.set("set_param", set_param)?;

        let clamp = lua.create_function(|_, (value, min, max): (f32, f32, f32)| {
            Ok(value.max(min).min(max))
        })?;
        globals.set("clamp", clamp)?;

        let lerp = lua.create_function(|_, (a, b, t): (f32, f32, f32)| Ok(lerp(a, b, t)))?;
        globals.set("lerp", lerp)?;

        let deadzone = lua.create_function(|_, (value, threshold): (f32, f32)| {
            Ok(deadzone(value, threshold))
        })?;
        globals.set("deadzone", deadzone)?;

        let print = lua.create_function(|lua, args: Variadic<LuaValue>| {
            let name = lua
                .app_data_ref::<ScriptName>()
                .map(|name| name.0.clone())
                .unwrap_or_default();
            let line = args
                .iter()
                .map(display_value)
                .collect::<Vec<String>>()
                .join("\t");
            log::info!(target: PRINT_TARGET, "[{name}] {line}");
            Ok(())
        })?;
        globals.set("print", print)?;

        self.lua = Some(lua);
        self.last_error = None;
        Ok(())
    }

    /// Compile and run the given source, then verify that it defines a
    /// `process` function. Callers seed parameters and then run
    /// [ScriptHost::call_init].
    pub fn load_script(&mut self, source: &str, name: &str) -> Result<(), ScriptError> {
        if self.lua.is_none() {
            self.initialize()?;
        }
        let Some(lua) = self.lua.as_ref() else {
            return Err(ScriptError::NotLoaded);
        };
        self.name = name.to_string();
        self.has_process = false;
        lua.set_app_data(ScriptName(name.to_string()));

        let chunk = lua.load(source).set_name(format!("@{name}"));
        let function = match chunk.into_function() {
            Ok(function) => function,
            Err(e) => {
                self.last_error = Some(format!("Script load error: {e}"));
                return Err(e.into());
            }
        };
        if let Err(e) = function.call::<()>(()) {
            self.last_error = Some(format!("Script execution error: {e}"));
            return Err(e.into());
        }

        match lua.globals().get::<LuaValue>("process") {
            Ok(LuaValue::Function(_)) => (),
            _ => {
                self.last_error = Some(ScriptError::MissingProcess.to_string());
                return Err(ScriptError::MissingProcess);
            }
        }
        self.has_process = true;
        self.last_error = None;
        log::debug!("Loaded script '{name}'");

        Ok(())
    }

    /// Read and load the script at the given path. The file stem is used as
    /// the chunk name.
    pub fn load_file(&mut self, path: &Path) -> Result<(), ScriptError> {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                self.last_error = Some(format!("Failed to open script file: {path:?}: {e}"));
                return Err(e.into());
            }
        };
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        self.load_script(&source, &name)
    }

    /// Call the optional `init` function of the loaded script
    pub fn call_init(&mut self) -> Result<(), ScriptError> {
        let Some(lua) = self.lua.as_ref() else {
            return Err(ScriptError::NotLoaded);
        };
        let LuaValue::Function(init) = lua.globals().get::<LuaValue>("init")? else {
            return Ok(());
        };
        if let Err(e) = init.call::<()>(()) {
            self.last_error = Some(format!("Script init error: {e}"));
            return Err(e.into());
        }
        Ok(())
    }

    /// Call the optional `cleanup` function. Errors are logged and otherwise
    /// ignored.
    pub fn call_cleanup(&mut self) {
        let Some(lua) = self.lua.as_ref() else {
            return;
        };
        if !self.has_process {
            return;
        }
        let Ok(LuaValue::Function(cleanup)) = lua.globals().get::<LuaValue>("cleanup") else {
            return;
        };
        if let Err(e) = cleanup.call::<()>(()) {
            log::warn!("Script '{}' cleanup failed: {e}", self.name);
        }
    }

    /// Run the script's `process` function on the given state
    pub fn process(
        &mut self,
        input: &NormalizedState,
        delta_time: f32,
    ) -> Result<NormalizedState, ScriptError> {
        let Some(lua) = self.lua.as_ref() else {
            return Err(ScriptError::NotLoaded);
        };
        if !self.has_process {
            return Err(ScriptError::MissingProcess);
        }
        let LuaValue::Function(process) = lua.globals().get::<LuaValue>("process")? else {
            self.last_error = Some(ScriptError::MissingProcess.to_string());
            return Err(ScriptError::MissingProcess);
        };

        let input = NormalizedState {
            delta_time,
            ..*input
        };
        let table = schema::push_state(lua, &input)?;
        match process.call::<LuaValue>(table) {
            Ok(value) => Ok(schema::read_state(&value, &input)),
            Err(e) => {
                self.last_error = Some(format!("Script process error: {e}"));
                Err(e.into())
            }
        }
    }

    /// Returns the parameter value or the given default if unset
    pub fn get_parameter(&self, key: &str, default: f32) -> f32 {
        let params = self.params.lock().unwrap_or_else(PoisonError::into_inner);
        params.get(key).copied().unwrap_or(default)
    }

    pub fn set_parameter(&self, key: &str, value: f32) {
        let mut params = self.params.lock().unwrap_or_else(PoisonError::into_inner);
        params.insert(key.to_string(), value);
    }

    /// Copy the current value of every given parameter into the script's
    /// parameter table
    pub fn sync_parameters(&self, parameters: &[ScriptParameter]) {
        let mut params = self.params.lock().unwrap_or_else(PoisonError::into_inner);
        for param in parameters {
            params.insert(param.key.clone(), param.value);
        }
    }

    /// Override the anti-recoil parameters with the values of the given
    /// preset
    pub fn apply_weapon_preset(&self, preset: Option<&WeaponPreset>) {
        let Some(preset) = preset else {
            return;
        };
        let mut params = self.params.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in preset.parameters() {
            params.insert(key.to_string(), value);
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.lua.is_some() && self.has_process
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Read the optional `script_info` table declared by the script. Returns
    /// info with only the name set if the script does not declare one.
    pub fn script_info(&self) -> ScriptInfo {
        let mut info = ScriptInfo {
            name: self.name.clone(),
            ..Default::default()
        };
        let Some(lua) = self.lua.as_ref() else {
            return info;
        };
        let Ok(LuaValue::Table(table)) = lua.globals().get::<LuaValue>("script_info") else {
            return info;
        };

        if let Some(name) = get_string(&table, "name") {
            info.name = name;
        }
        info.description = get_string(&table, "description").unwrap_or_default();
        info.author = get_string(&table, "author").unwrap_or_default();
        info.version = get_string(&table, "version").unwrap_or_default();
        info.accepts_weapon_preset = matches!(
            table.get::<LuaValue>("accepts_weapon_preset"),
            Ok(LuaValue::Boolean(true))
        );

        let Ok(LuaValue::Table(parameters)) = table.get::<LuaValue>("parameters") else {
            return info;
        };
        for entry in parameters.sequence_values::<LuaValue>() {
            let Ok(LuaValue::Table(entry)) = entry else {
                continue;
            };
            let Some(param) = read_parameter(&entry) else {
                continue;
            };
            info.parameters.push(param);
        }

        info
    }
}

impl Drop for ScriptHost {
    fn drop(&mut self) {
        self.call_cleanup();
    }
}

/// Script name stored with the Lua state for the print function
struct ScriptName(String);

/// Linear interpolation between a and b
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Zero values below the threshold and rescale the rest onto [0, 1] keeping
/// the sign
pub fn deadzone(value: f32, threshold: f32) -> f32 {
    if value.abs() < threshold {
        return 0.0;
    }
    if threshold >= 1.0 {
        return value.signum();
    }
    let threshold = threshold.max(0.0);
    let scaled = ((value.abs() - threshold) / (1.0 - threshold)).min(1.0);
    scaled.copysign(value)
}

/// Strings and numbers are both accepted for text fields
fn get_string(table: &LuaTable, key: &str) -> Option<String> {
    match table.get::<LuaValue>(key).ok()? {
        LuaValue::String(value) => Some(value.to_string_lossy().to_string()),
        LuaValue::Integer(value) => Some(value.to_string()),
        LuaValue::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

fn get_number(table: &LuaTable, key: &str) -> Option<f32> {
    match table.get::<LuaValue>(key).ok()? {
        LuaValue::Integer(value) => Some(value as f32),
        LuaValue::Number(value) => Some(value as f32),
        _ => None,
    }
}

/// Parse one entry of `script_info.parameters`. Entries without a key are
/// skipped.
fn read_parameter(table: &LuaTable) -> Option<ScriptParameter> {
    let key = get_string(table, "key").filter(|key| !key.is_empty())?;
    let mut param = ScriptParameter {
        key,
        ..Default::default()
    };
    if let Some(name) = get_string(table, "name") {
        param.name = name;
    }
    if let Some(description) = get_string(table, "description") {
        param.description = description;
    }
    if let Some(kind) = get_string(table, "type").and_then(|kind| ParameterType::from_name(&kind))
    {
        param.kind = kind;
    }
    match table.get::<LuaValue>("default") {
        Ok(LuaValue::Integer(value)) => param.default = value as f32,
        Ok(LuaValue::Number(value)) => param.default = value as f32,
        Ok(LuaValue::Boolean(value)) => param.default = if value { 1.0 } else { 0.0 },
        _ => (),
    }
    if let Some(min) = get_number(table, "min") {
        param.min = min;
    }
    if let Some(max) = get_number(table, "max") {
        param.max = max;
    }
    if let Some(step) = get_number(table, "step") {
        param.step = step;
    }
    if let Ok(LuaValue::Table(choices)) = table.get::<LuaValue>("choices") {
        param.choices = choices
            .sequence_values::<LuaValue>()
            .filter_map(|choice| match choice {
                Ok(LuaValue::String(choice)) => Some(choice.to_string_lossy().to_string()),
                _ => None,
            })
            .collect();
    }
    match param.kind {
        ParameterType::Bool => {
            param.min = 0.0;
            param.max = 1.0;
        }
        ParameterType::Choice if !param.choices.is_empty() => {
            param.min = 0.0;
            param.max = (param.choices.len() - 1) as f32;
        }
        _ => (),
    }
    param.default = param.clamp_value(param.default);
    param.value = param.default;
    Some(param)
}

fn display_value(value: &LuaValue) -> String {
    match value {
        LuaValue::Nil => "nil".to_string(),
        LuaValue::Boolean(value) => value.to_string(),
        LuaValue::Integer(value) => value.to_string(),
        LuaValue::Number(value) => value.to_string(),
        LuaValue::String(value) => value.to_string_lossy().to_string(),
        other => other.type_name().to_string(),
    }
}

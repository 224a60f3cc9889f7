use std::path::{Path, PathBuf};

use crate::{
    config::{path, ScriptSettings, WeaponPreset},
    input::state::NormalizedState,
};

use super::{info::ScriptConfig, ScriptHost};

/// One discovered script and its runtime status
pub struct LoadedScriptEntry {
    /// Interpreter for the script. None if the script failed to load.
    pub host: Option<ScriptHost>,
    pub config: ScriptConfig,
    /// False when the script failed to load or its last process call failed
    pub loaded: bool,
    pub last_error: Option<String>,
}

impl LoadedScriptEntry {
    /// Load the script at the given path. Load failures still produce an
    /// entry so the script remains visible.
    fn load(path: PathBuf, saved: Option<&ScriptSettings>) -> Self {
        let mut config = ScriptConfig::from_path(path);
        // A script that fails to load keeps its saved enabled flag
        if let Some(saved) = saved {
            config.enabled = saved.enabled;
        }
        let mut entry = Self {
            host: None,
            config,
            loaded: false,
            last_error: None,
        };
        entry.reload(saved);
        entry
    }

    /// (Re)create the interpreter from the script file on disk
    fn reload(&mut self, saved: Option<&ScriptSettings>) {
        // Dropping the old host runs its cleanup
        self.host = None;
        self.loaded = false;

        let mut host = ScriptHost::new();
        let result = host
            .initialize()
            .and_then(|_| host.load_file(&self.config.path));
        if let Err(e) = result {
            let error = host.last_error().map(String::from).unwrap_or_else(|| e.to_string());
            log::error!("Failed to load script {:?}: {error}", self.config.path);
            self.last_error = Some(error);
            return;
        }

        self.config.apply_info(host.script_info());
        if let Some(saved) = saved {
            saved.restore_into(&mut self.config);
        }
        host.sync_parameters(&self.config.parameters);

        if let Err(e) = host.call_init() {
            let error = host.last_error().map(String::from).unwrap_or_else(|| e.to_string());
            log::error!("Failed to initialize script '{}': {error}", self.config.name);
            self.last_error = Some(error);
            return;
        }

        log::info!(
            "Loaded script '{}' from {:?}",
            self.config.name,
            self.config.path
        );
        self.host = Some(host);
        self.loaded = true;
        self.last_error = None;
    }

    pub fn name(&self) -> &str {
        self.config.name.as_str()
    }
}

/// Pipeline owns the ordered list of scripts found in the scripts directory
/// and runs the enabled ones in list order, feeding each script the output of
/// the previous one.
pub struct Pipeline {
    scripts_dir: PathBuf,
    entries: Vec<LoadedScriptEntry>,
}

impl Pipeline {
    pub fn new(scripts_dir: &Path) -> Self {
        Self {
            scripts_dir: scripts_dir.to_path_buf(),
            entries: Vec::new(),
        }
    }

    pub fn scripts_dir(&self) -> &Path {
        self.scripts_dir.as_path()
    }

    /// Rebuild the script list from the scripts directory. Enabled flags and
    /// parameter values are carried over by script name, preferring the
    /// current entries over the given saved settings.
    pub fn rescan(&mut self, saved: &[ScriptSettings]) {
        let mut previous: Vec<ScriptSettings> = self
            .entries
            .iter()
            .map(|entry| ScriptSettings::from_config(&entry.config))
            .collect();
        for settings in saved {
            if !previous.iter().any(|prev| prev.name == settings.name) {
                previous.push(settings.clone());
            }
        }
        let find = |name: &str| previous.iter().find(|settings| settings.name == name);

        self.entries.clear();

        let files = path::get_sorted_files(&self.scripts_dir, path::is_lua_script);
        log::debug!("Found {} script(s) in {:?}", files.len(), self.scripts_dir);
        for file in files {
            // The saved state is keyed by the declared name which is only
            // known after loading, so load once with the file stem match
            // and restore again if the declared name differs.
            let stem = ScriptConfig::from_path(file.clone()).name;
            let mut entry = LoadedScriptEntry::load(file, find(&stem));
            if entry.name() != stem {
                if let Some(settings) = find(entry.name()) {
                    settings.restore_into(&mut entry.config);
                    if let Some(host) = entry.host.as_ref() {
                        host.sync_parameters(&entry.config.parameters);
                    }
                }
            }
            self.entries.push(entry);
        }
    }

    /// Reload a single script from disk. Returns false if no script has
    /// that name.
    pub fn reload_script(&mut self, name: &str) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|entry| entry.name() == name) else {
            return false;
        };
        let settings = ScriptSettings::from_config(&entry.config);
        entry.reload(Some(&settings));
        true
    }

    /// Returns false if no script has that name
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        let Some(entry) = self.entry_mut(name) else {
            return false;
        };
        entry.config.enabled = enabled;
        log::info!(
            "Script '{name}' {}",
            if enabled { "enabled" } else { "disabled" }
        );
        true
    }

    /// Set a parameter value for the named script. Declared parameters are
    /// bounded to their range, then the value is pushed into the running
    /// interpreter.
    pub fn set_parameter(&mut self, name: &str, key: &str, value: f32) -> bool {
        let Some(entry) = self.entry_mut(name) else {
            return false;
        };
        let value = match entry.config.set_parameter_value(key, value) {
            Some(stored) => stored,
            None => {
                log::debug!("Script '{name}' does not declare parameter '{key}'");
                value
            }
        };
        if let Some(host) = entry.host.as_ref() {
            host.set_parameter(key, value);
        }
        true
    }

    /// Swap the script at the given index with the one before it
    pub fn move_up(&mut self, index: usize) {
        if index > 0 && index < self.entries.len() {
            self.entries.swap(index, index - 1);
        }
    }

    /// Swap the script at the given index with the one after it
    pub fn move_down(&mut self, index: usize) {
        if index + 1 < self.entries.len() {
            self.entries.swap(index, index + 1);
        }
    }

    /// Run every enabled script in list order. A failing script passes its
    /// input through unchanged and is retried on the next call.
    pub fn process(
        &mut self,
        input: &NormalizedState,
        preset: Option<&WeaponPreset>,
    ) -> NormalizedState {
        let mut current = *input;
        for entry in self.entries.iter_mut() {
            if !entry.config.enabled {
                continue;
            }
            let Some(host) = entry.host.as_mut() else {
                continue;
            };
            if entry.config.wants_weapon_preset() {
                host.apply_weapon_preset(preset);
            }
            match host.process(&current, input.delta_time) {
                Ok(output) => {
                    if !entry.loaded {
                        log::info!("Script '{}' recovered", entry.config.name);
                    }
                    entry.loaded = true;
                    current = output;
                }
                Err(e) => {
                    if entry.loaded {
                        log::warn!("Script '{}' failed: {e}", entry.config.name);
                    } else {
                        log::trace!("Script '{}' failed: {e}", entry.config.name);
                    }
                    entry.loaded = false;
                    entry.last_error = Some(e.to_string());
                }
            }
        }
        current
    }

    pub fn entries(&self) -> &[LoadedScriptEntry] {
        self.entries.as_slice()
    }

    pub fn entry(&self, name: &str) -> Option<&LoadedScriptEntry> {
        self.entries.iter().find(|entry| entry.name() == name)
    }

    fn entry_mut(&mut self, name: &str) -> Option<&mut LoadedScriptEntry> {
        self.entries.iter_mut().find(|entry| entry.name() == name)
    }

    /// Snapshot of every script config in list order
    pub fn configs(&self) -> Vec<ScriptConfig> {
        self.entries
            .iter()
            .map(|entry| entry.config.clone())
            .collect()
    }
}

//! Module for locating dualscript config and script files

use std::{
    fs::{self, DirEntry},
    path::{Path, PathBuf},
};

/// Name used for the per-user configuration directory
const APP_NAME: &str = "dualscript";
const CONFIG_FILE: &str = "config.yaml";
/// Fallback path to use if one cannot be found with XDG
const FALLBACK_BASE_PATH: &str = ".";

/// Returns the base path for configuration data
#[cfg(unix)]
pub fn get_base_path() -> PathBuf {
    let Ok(base_dirs) = xdg::BaseDirectories::with_prefix(APP_NAME) else {
        log::warn!("Unable to determine config base path. Using fallback path.");
        return PathBuf::from(FALLBACK_BASE_PATH);
    };

    base_dirs.get_config_home()
}

/// Returns the base path for configuration data
#[cfg(not(unix))]
pub fn get_base_path() -> PathBuf {
    let Some(app_data) = std::env::var_os("APPDATA") else {
        log::warn!("Unable to determine config base path. Using fallback path.");
        return PathBuf::from(FALLBACK_BASE_PATH);
    };

    PathBuf::from(app_data).join(APP_NAME)
}

/// Returns the default config file path (e.g. "~/.config/dualscript/config.yaml")
pub fn get_config_path() -> PathBuf {
    get_base_path().join(CONFIG_FILE)
}

/// Resolve the scripts directory. Relative paths are tried against the
/// working directory first and then against the config base path.
pub fn get_scripts_path(scripts_dir: &Path) -> PathBuf {
    if scripts_dir.is_absolute() || scripts_dir.is_dir() {
        return scripts_dir.to_path_buf();
    }
    let user_path = get_base_path().join(scripts_dir);
    if user_path.is_dir() {
        return user_path;
    }
    scripts_dir.to_path_buf()
}

/// Returns a list of file paths in the given directory sorted by filename.
/// The filter argument is a closure that should return `true` for any files
/// that should be included in the final results.
pub fn get_sorted_files<F>(path: &Path, filter: F) -> Vec<PathBuf>
where
    F: Fn(&DirEntry) -> bool,
{
    log::trace!("Checking {path:?} for files");
    let files = match fs::read_dir(path) {
        Ok(files) => files,
        Err(e) => {
            log::debug!("Unable to read directory: {path:?}: {e}");
            return vec![];
        }
    };

    let mut file_entries: Vec<DirEntry> = files
        .filter_map(|r| {
            let Ok(entry) = r else { return None };
            log::trace!("Got entry: {entry:?}");
            if filter(&entry) {
                Some(entry)
            } else {
                None
            }
        })
        .collect();

    file_entries.sort_by_key(|entry| entry.file_name());
    log::trace!("Got sorted entries: {file_entries:?}");

    file_entries.into_iter().map(|entry| entry.path()).collect()
}

/// Filter for regular files with a `.lua` extension
pub fn is_lua_script(entry: &DirEntry) -> bool {
    let is_file = entry.file_type().map(|kind| kind.is_file()).unwrap_or(false);
    let path = entry.path();
    is_file && path.extension().is_some_and(|ext| ext == "lua")
}

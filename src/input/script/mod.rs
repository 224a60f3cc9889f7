//! Sandboxed Lua transformation scripts and the ordered pipeline that runs
//! them every tick.
pub mod host;
#[cfg(test)]
pub mod host_test;
pub mod info;
pub mod pipeline;
#[cfg(test)]
pub mod pipeline_test;
pub mod schema;

use std::io;

use thiserror::Error;

pub use host::ScriptHost;
pub use pipeline::{LoadedScriptEntry, Pipeline};

/// Represents all possible errors loading or running a script
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),
    #[error("Script missing 'process' function")]
    MissingProcess,
    #[error("No script loaded")]
    NotLoaded,
    #[error("Could not read script: {0}")]
    Io(#[from] io::Error),
}

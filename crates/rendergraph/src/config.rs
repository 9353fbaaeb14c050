// Copyright 2026 The MuTate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Configuration
//!
//! Generated code talks to the VAL runtime through a handful of names: the context parameter, its
//! current frame index, command pool and device.  The defaults match VAL.  Other runtimes can
//! rename them in TOML, either in a standalone file:
//!
//! ```toml
//! [rendergraph]
//! frames_in_flight = 3
//! out_dir = "generated"
//! context_param = "engine::Context& ctx"
//! frame_index = "ctx.frame"
//!
//! [rendergraph.calls]
//! recordTiles = 0
//! ```
//!
//! or under `[package.metadata.mutate.rendergraph]` in a crate manifest.

use std::fs;
use std::path::{Path, PathBuf};

use toml::{Table, Value};

/// Names the generated code uses to reach the runtime.
#[derive(Clone, Debug, PartialEq, Eq, bon::Builder)]
pub struct CompileOptions {
    /// First parameter of every generated function.
    #[builder(into, default = "val::VAL_PROC& V_PROC".to_owned())]
    pub context_param: String,
    /// Expression selecting the baked buffer to execute this frame.
    #[builder(into, default = "V_PROC._currentFrame".to_owned())]
    pub frame_index: String,
    #[builder(into, default = "V_PROC._commandPool".to_owned())]
    pub command_pool: String,
    #[builder(into, default = "V_PROC._device".to_owned())]
    pub device: String,
    /// Primary command buffer for a fixed block that contains no recognized call.
    #[builder(into, default = "cmd".to_owned())]
    pub primary_command_buffer: String,
    /// `#include` targets, with their `<>` or `""`.
    #[builder(default = vec![
        "<VAL/lib/system/VAL_PROC.hpp>".to_owned(),
        "<stdexcept>".to_owned(),
    ])]
    pub includes: Vec<String>,
    /// Replace an existing output file.
    #[builder(default = true)]
    pub overwrite: bool,
    /// Extra recording calls and their command buffer argument index.
    #[builder(default)]
    pub calls: Vec<(String, usize)>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions::builder().build()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read failed for {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unknown key `{0}`")]
    UnknownKey(String),
    #[error("`{key}` must be {expected}")]
    InvalidValue { key: String, expected: &'static str },
    #[error("no [rendergraph] table")]
    MissingTable,
}

/// Everything a config file may set.  Frames and output directory are driver arguments rather
/// than emitter options, so callers decide how they combine with their own arguments.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GraphConfig {
    pub frames_in_flight: Option<u8>,
    pub out_dir: Option<PathBuf>,
    pub options: CompileOptions,
}

impl GraphConfig {
    /// Parse a standalone config.  The `[rendergraph]` table is required.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let root: Table = toml::from_str(text)?;
        match root.get("rendergraph") {
            Some(Value::Table(table)) => Self::from_table(table),
            Some(_) => Err(invalid("rendergraph", "a table")),
            None => Err(ConfigError::MissingTable),
        }
    }

    /// Read a standalone config.  A relative `out_dir` is relative to the file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_toml_str(&read(path)?)?;
        config.resolve_out_dir(path);
        Ok(config)
    }

    /// Read `[package.metadata.mutate.rendergraph]` from a crate manifest.  A manifest without the
    /// table gives the defaults.
    pub fn from_manifest(manifest: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let manifest = manifest.as_ref();
        let root: Table = toml::from_str(&read(manifest)?)?;

        let table = ["package", "metadata", "mutate", "rendergraph"]
            .iter()
            .try_fold(&root, |table, key| match table.get(*key) {
                Some(Value::Table(inner)) => Some(inner),
                _ => None,
            });
        let mut config = match table {
            Some(table) => Self::from_table(table)?,
            None => GraphConfig::default(),
        };
        config.resolve_out_dir(manifest);
        Ok(config)
    }

    pub fn from_table(table: &Table) -> Result<Self, ConfigError> {
        let mut config = GraphConfig::default();
        let options = &mut config.options;

        for (key, value) in table {
            match key.as_str() {
                "frames_in_flight" => {
                    let frames = value
                        .as_integer()
                        .and_then(|n| u8::try_from(n).ok())
                        .filter(|&n| n > 0)
                        .ok_or_else(|| invalid(key, "an integer from 1 to 255"))?;
                    config.frames_in_flight = Some(frames);
                }
                "out_dir" => config.out_dir = Some(PathBuf::from(string(key, value)?)),
                "context_param" => options.context_param = string(key, value)?,
                "frame_index" => options.frame_index = string(key, value)?,
                "command_pool" => options.command_pool = string(key, value)?,
                "device" => options.device = string(key, value)?,
                "primary_command_buffer" => options.primary_command_buffer = string(key, value)?,
                "includes" => {
                    options.includes = value
                        .as_array()
                        .and_then(|items| {
                            items
                                .iter()
                                .map(|i| i.as_str().map(str::to_owned))
                                .collect::<Option<Vec<_>>>()
                        })
                        .ok_or_else(|| invalid(key, "an array of strings"))?;
                }
                "overwrite" => {
                    options.overwrite = value.as_bool().ok_or_else(|| invalid(key, "a boolean"))?;
                }
                "calls" => {
                    let calls = value.as_table().ok_or_else(|| invalid(key, "a table"))?;
                    for (name, slot) in calls {
                        let slot = slot
                            .as_integer()
                            .and_then(|n| usize::try_from(n).ok())
                            .ok_or_else(|| {
                                invalid(&format!("calls.{name}"), "a non-negative integer")
                            })?;
                        options.calls.push((name.clone(), slot));
                    }
                }
                _ => return Err(ConfigError::UnknownKey(key.clone())),
            }
        }

        Ok(config)
    }

    fn resolve_out_dir(&mut self, file: &Path) {
        if let (Some(out_dir), Some(parent)) = (&self.out_dir, file.parent()) {
            if out_dir.is_relative() {
                self.out_dir = Some(parent.join(out_dir));
            }
        }
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })
}

fn string(key: &str, value: &Value) -> Result<String, ConfigError> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| invalid(key, "a string"))
}

fn invalid(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_owned(),
        expected,
    }
}

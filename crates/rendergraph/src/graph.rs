// Copyright 2026 The MuTate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Render Graph Driver
//!
//! Load a graph source, preprocess it, write `<stem>__processed.hpp`.  The driver is a thin shell
//! around [`preprocess`], which is pure.
//!
//! Output is only opened after the whole file has been generated, so a parse error never creates
//! or truncates anything.  The first line of the output carries a hash of everything that went into
//! it.  If an existing output has the same hash, it is left alone.

use std::fs;
use std::io::{self, Write};
use std::num::NonZeroU8;
use std::path::{Path, PathBuf};

use log::{debug, info};
use xxhash_rust::xxh3::xxh3_64;

use crate::emit;
use crate::pass;
use crate::prelude::*;

const OUTPUT_SUFFIX: &str = "__processed.hpp";
const BANNER_PREFIX: &str = "// rgc-hash: ";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GraphState {
    #[default]
    Unloaded,
    Loaded,
    Preprocessed,
    Written,
    /// The last transition failed.  Load again to recover.
    Failed,
}

/// One graph source on its way to a generated header.
///
/// ```no_run
/// # use mutate_rendergraph::RenderGraph;
/// let mut graph = RenderGraph::new();
/// graph.load_from_file("shaders/graph.hpp")?;
/// let out = graph.compile(2, None)?;
/// # Ok::<(), mutate_rendergraph::prelude::RenderGraphError>(())
/// ```
#[derive(Debug, Default)]
pub struct RenderGraph {
    options: CompileOptions,
    state: GraphState,
    src_path: Option<PathBuf>,
    source: Option<String>,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CompileOptions) -> Self {
        RenderGraph {
            options,
            ..Default::default()
        }
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Source path of the last load, successful or not.
    pub fn src_path(&self) -> Option<&Path> {
        self.src_path.as_deref()
    }

    /// Read the whole source into memory.  Replaces any previously loaded source.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), RenderGraphError> {
        let path = path.as_ref();
        self.src_path = Some(path.to_owned());
        self.source = None;

        let loaded = fs::read(path)
            .map_err(|source| RenderGraphError::Read {
                path: path.to_owned(),
                source,
            })
            .and_then(|bytes| {
                String::from_utf8(bytes).map_err(|_| RenderGraphError::NotUtf8(path.to_owned()))
            });

        match loaded {
            Ok(text) => {
                debug!("loaded {path:?}, {} bytes", text.len());
                self.source = Some(text);
                self.state = GraphState::Loaded;
                Ok(())
            }
            Err(e) => {
                self.state = GraphState::Failed;
                Err(e)
            }
        }
    }

    /// Preprocess the loaded source and write it to `output_dir`, or next to the source when
    /// `None`.  Returns the output path.
    ///
    /// The loaded source is consumed whether or not this succeeds.  Call
    /// [`RenderGraph::load_from_file`] again before compiling again.
    pub fn compile(
        &mut self,
        frames_in_flight: u8,
        output_dir: Option<&Path>,
    ) -> Result<PathBuf, RenderGraphError> {
        let source = self.source.take();
        let result = self.compile_source(source, frames_in_flight, output_dir);
        if result.is_err() {
            self.state = GraphState::Failed;
        }
        result
    }

    fn compile_source(
        &mut self,
        source: Option<String>,
        frames_in_flight: u8,
        output_dir: Option<&Path>,
    ) -> Result<PathBuf, RenderGraphError> {
        let (Some(source), Some(src_path)) = (source, self.src_path.as_deref()) else {
            return Err(RenderGraphError::NotLoaded);
        };
        let frames = NonZeroU8::new(frames_in_flight).ok_or(RenderGraphError::NoFramesInFlight)?;
        let out_path = output_path(src_path, output_dir)?;

        let output = preprocess(&source, frames, &self.options)?;
        self.state = GraphState::Preprocessed;

        if is_current(&out_path, &output) {
            info!("{out_path:?} is up to date");
        } else {
            write_output(&out_path, &output, self.options.overwrite)?;
            info!("wrote {out_path:?}");
        }
        self.state = GraphState::Written;
        Ok(out_path)
    }
}

/// Parse and emit in memory.  The result starts with the hash banner.
pub fn preprocess(
    source: &str,
    frames: NonZeroU8,
    options: &CompileOptions,
) -> Result<String, RenderGraphError> {
    let graph = pass::parse(source)?;
    let body = emit::emit(&graph, frames, options);
    Ok(format!("{}\n{body}", banner(source, frames, options)))
}

/// `<dir>/<stem>__processed.hpp`, where `<dir>` defaults to the source's directory.
pub fn output_path(src_path: &Path, output_dir: Option<&Path>) -> Result<PathBuf, RenderGraphError> {
    let stem = src_path
        .file_stem()
        .ok_or_else(|| RenderGraphError::NoFileStem(src_path.to_owned()))?;
    let mut name = stem.to_owned();
    name.push(OUTPUT_SUFFIX);

    let dir = match output_dir {
        Some(dir) => dir,
        None => src_path.parent().unwrap_or(Path::new("")),
    };
    Ok(dir.join(name))
}

fn banner(source: &str, frames: NonZeroU8, options: &CompileOptions) -> String {
    let mut input = Vec::with_capacity(source.len() + 256);
    input.extend_from_slice(source.as_bytes());
    input.push(frames.get());
    input.extend_from_slice(format!("{options:?}").as_bytes());
    format!("{BANNER_PREFIX}{:016x}", xxh3_64(&input))
}

// Compares banners only.  An output someone edited by hand below the banner counts as current.
fn is_current(out_path: &Path, output: &str) -> bool {
    let Some(banner) = output.lines().next() else {
        return false;
    };
    fs::read_to_string(out_path).is_ok_and(|existing| existing.lines().next() == Some(banner))
}

fn write_output(out_path: &Path, output: &str, overwrite: bool) -> Result<(), RenderGraphError> {
    let write_err = |source| RenderGraphError::Write {
        path: out_path.to_owned(),
        source,
    };

    if let Some(dir) = out_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(write_err)?;
    }

    let mut file = if overwrite {
        fs::File::create(out_path)
    } else {
        fs::File::create_new(out_path)
    }
    .map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => RenderGraphError::OutputExists(out_path.to_owned()),
        _ => write_err(e),
    })?;

    file.write_all(output.as_bytes()).map_err(write_err)?;
    Ok(())
}

// Copyright 2026 The MuTate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Build Support
//!
//! Preprocess a tree of graph sources from a build script.
//!
//! ```no_run
//! // build.rs
//! fn main() {
//!     let root = std::path::PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap());
//!     mutate_rendergraph::build::compile_graphs(&root.join("graphs"), &root.join("generated"), 2)
//!         .unwrap();
//! }
//! ```

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::pass::PASS_BEGIN;
use crate::prelude::*;
use crate::RenderGraph;

/// Compile every `.hpp` under `src_root` that contains a pass into the mirrored location under
/// `dest_root`, with the default options.  Returns the written outputs.
pub fn compile_graphs(
    src_root: &Path,
    dest_root: &Path,
    frames_in_flight: u8,
) -> Result<Vec<PathBuf>, RenderGraphError> {
    compile_graphs_with(src_root, dest_root, frames_in_flight, &CompileOptions::default(), &["hpp"])
}

/// [`compile_graphs`] with explicit options and source extensions.
pub fn compile_graphs_with(
    src_root: &Path,
    dest_root: &Path,
    frames_in_flight: u8,
    options: &CompileOptions,
    extensions: &[&str],
) -> Result<Vec<PathBuf>, RenderGraphError> {
    println!("cargo:rerun-if-changed={}", src_root.display());

    let mut written = Vec::new();
    if src_root.exists() {
        compile_dir(
            src_root,
            src_root,
            dest_root,
            frames_in_flight,
            options,
            extensions,
            &mut written,
        )?;
    }
    Ok(written)
}

fn compile_dir(
    dir: &Path,
    src_root: &Path,
    dest_root: &Path,
    frames: u8,
    options: &CompileOptions,
    extensions: &[&str],
    written: &mut Vec<PathBuf>,
) -> Result<(), RenderGraphError> {
    // Sorted so outputs and rerun lines come out the same every build.
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();

    let out_dir = match dir.strip_prefix(src_root) {
        Ok(relative) => dest_root.join(relative),
        Err(_) => dest_root.to_owned(),
    };

    for path in entries {
        if path.is_dir() {
            compile_dir(&path, src_root, dest_root, frames, options, extensions, written)?;
            continue;
        }
        let matches_ext = path
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| extensions.contains(&ext));
        // Outputs may live inside the source tree.
        let is_output = path
            .file_name()
            .and_then(OsStr::to_str)
            .is_some_and(|name| name.ends_with("__processed.hpp"));
        if !matches_ext || is_output {
            continue;
        }

        // Headers without passes are plain includes of the graph.
        if !fs::read_to_string(&path).is_ok_and(|text| text.contains(PASS_BEGIN)) {
            continue;
        }

        let mut graph = RenderGraph::with_options(options.clone());
        graph.load_from_file(&path)?;
        written.push(graph.compile(frames, Some(&out_dir))?);
    }
    Ok(())
}

// Copyright 2026 The MuTate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # rgc
//!
//! Render graph compiler.  Turns a graph source into `<stem>__processed.hpp`.
//!
//! ## Usage
//!
//! ```text
//! rgc compile shaders/graph.hpp -f 3 -o generated
//! rgc check shaders/graph.hpp
//! ```
//!
//! `RUST_LOG=debug` shows what the scanner found.  Config comes from `-c`, which may be an
//! `rgc.toml` or a crate manifest, or else an `rgc.toml` beside the source.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::{debug, info};

use mutate_rendergraph::{
    emit,
    pass::{self, PassInfo},
    prelude::*,
    GraphConfig, RenderGraph,
};

const DEFAULT_FRAMES: u8 = 2;
const CONFIG_NAME: &str = "rgc.toml";

#[derive(Parser, Debug)]
#[command(name = "rgc")]
#[command(about = "Preprocess render graph sources into execute and bake functions.", long_about = None)]
#[command(arg_required_else_help = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, thiserror::Error)]
enum RgcError {
    #[error("{0}")]
    Graph(#[from] RenderGraphError),
    #[error("config: {0}")]
    Config(#[from] mutate_rendergraph::ConfigError),
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Preprocess a graph source and write the output
    Compile(CompileArgs),
    /// Parse a graph source and summarize its passes
    Check(CheckArgs),
}

#[derive(clap::Args, Debug)]
struct CompileArgs {
    /// Graph source
    #[arg(index = 1, required = true)]
    src: PathBuf,
    /// Frames in flight, one baked command buffer each [default: config, then 2]
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..))]
    frames: Option<u8>,
    /// Output directory [default: config, then beside the source]
    #[arg(short, long)]
    out_dir: Option<PathBuf>,
    /// rgc.toml or Cargo.toml to read settings from
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct CheckArgs {
    /// Graph source
    #[arg(index = 1, required = true)]
    src: PathBuf,
}

fn main() -> Result<(), RgcError> {
    pretty_env_logger::init();
    let args = Args::parse();

    match args.command {
        None => unreachable!(),
        Some(Command::Compile(a)) => cmd_compile(a),
        Some(Command::Check(a)) => cmd_check(a),
    }
}

fn cmd_compile(args: CompileArgs) -> Result<(), RgcError> {
    let config = load_config(args.config.as_deref(), &args.src)?;
    let (frames, out_dir) = targets(args.frames, args.out_dir, &config);

    let mut graph = RenderGraph::with_options(config.options);
    debug!("{frames} frames in flight, options: {:?}", graph.options());
    graph.load_from_file(&args.src)?;
    let out = graph.compile(frames, out_dir.as_deref())?;

    println!("{}", out.display());
    Ok(())
}

/// Command line first, then config, then the defaults.  No `out_dir` means beside the source.
fn targets(frames: Option<u8>, out_dir: Option<PathBuf>, config: &GraphConfig) -> (u8, Option<PathBuf>) {
    let frames = frames.or(config.frames_in_flight).unwrap_or(DEFAULT_FRAMES);
    (frames, out_dir.or_else(|| config.out_dir.clone()))
}

fn load_config(explicit: Option<&Path>, src: &Path) -> Result<GraphConfig, RgcError> {
    let config = match explicit {
        Some(path) if path.file_name().is_some_and(|n| n == "Cargo.toml") => {
            GraphConfig::from_manifest(path)?
        }
        Some(path) => GraphConfig::from_file(path)?,
        None => {
            let beside = src.with_file_name(CONFIG_NAME);
            if beside.is_file() {
                info!("using {beside:?}");
                GraphConfig::from_file(beside)?
            } else {
                GraphConfig::default()
            }
        }
    };
    Ok(config)
}

const INDENT: usize = 2;
const LABEL_W: usize = 16; // includes colon

macro_rules! header {
    ($($arg:tt)*) => {{
        let title = format!($($arg)*);
        println!("\n{title}");
        println!("{}", "=".repeat(title.len().max(INDENT + LABEL_W + 24)));
    }};
}

macro_rules! row {
    ($label:expr, $fmt:expr, $value:expr) => {{
        let value = format!($fmt, $value);
        println!(
            "{:indent$}{label:<label_w$} {}",
            "",
            value,
            indent = INDENT,
            label = format!("{}:", $label),
            label_w = LABEL_W,
        );
    }};
}

fn cmd_check(args: CheckArgs) -> Result<(), RgcError> {
    let source = fs::read_to_string(&args.src).map_err(|source| RenderGraphError::Read {
        path: args.src.clone(),
        source,
    })?;
    let graph = pass::parse(&source).map_err(RenderGraphError::from)?;

    if graph.passes.is_empty() {
        println!("{}: no passes", args.src.display());
    }
    for pass in &graph.passes {
        print_pass(pass);
    }
    Ok(())
}

fn print_pass(pass: &PassInfo) {
    header!("{}", pass.name);
    row!("Execute", "{}", emit::execute_fn_name(&pass.name));
    for clause in Clause::ALL {
        let args = pass.clause(clause);
        if !args.is_empty() {
            row!(clause, "{}", args.iter().collect::<Vec<_>>().join(", "));
        }
    }
    if pass.fixed_blocks.is_empty() {
        return;
    }

    row!("Bake", "{}", emit::bake_fn_name(&pass.name));
    for (k, block) in pass.fixed_blocks.iter().enumerate() {
        row!(
            format!("Fixed {k}"),
            "{}",
            format!(
                "render pass `{}`, subpass `{}`, {} bytes",
                block.render_pass.declaration, block.subpass.declaration, block.source_length
            )
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Scratch(PathBuf);

    impl Scratch {
        fn new(name: &str) -> Self {
            let dir = std::env::temp_dir().join(format!("rgc-cli-{name}-{}", std::process::id()));
            let _ = fs::remove_dir_all(&dir);
            fs::create_dir_all(&dir).unwrap();
            Scratch(dir)
        }

        fn write(&self, name: &str, text: &str) -> PathBuf {
            let path = self.0.join(name);
            fs::write(&path, text).unwrap();
            path
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn test_targets_precedence() {
        let config = GraphConfig {
            frames_in_flight: Some(3),
            out_dir: Some(PathBuf::from("from-config")),
            ..GraphConfig::default()
        };

        let (frames, out_dir) = targets(Some(5), Some(PathBuf::from("from-args")), &config);
        assert_eq!(frames, 5);
        assert_eq!(out_dir, Some(PathBuf::from("from-args")));

        let (frames, out_dir) = targets(None, None, &config);
        assert_eq!(frames, 3);
        assert_eq!(out_dir, Some(PathBuf::from("from-config")));

        let (frames, out_dir) = targets(None, None, &GraphConfig::default());
        assert_eq!(frames, DEFAULT_FRAMES);
        assert_eq!(out_dir, None);
    }

    #[test]
    fn test_load_config_manifest() {
        let scratch = Scratch::new("manifest");
        let src = scratch.write("graph.hpp", "");
        let manifest = scratch.write(
            "Cargo.toml",
            r#"
            [package]
            name = "shaders"

            [package.metadata.mutate.rendergraph]
            frames_in_flight = 4
            "#,
        );

        let config = load_config(Some(&manifest), &src).unwrap();
        assert_eq!(config.frames_in_flight, Some(4));
    }

    #[test]
    fn test_load_config_explicit_file() {
        let scratch = Scratch::new("explicit");
        let src = scratch.write("graph.hpp", "");
        let file = scratch.write("other.toml", "[rendergraph]\nframes_in_flight = 1\n");

        let config = load_config(Some(&file), &src).unwrap();
        assert_eq!(config.frames_in_flight, Some(1));
    }

    #[test]
    fn test_load_config_beside_source() {
        let scratch = Scratch::new("beside");
        let src = scratch.write("graph.hpp", "");
        assert_eq!(load_config(None, &src).unwrap(), GraphConfig::default());

        scratch.write(CONFIG_NAME, "[rendergraph]\nframes_in_flight = 6\nout_dir = \"gen\"\n");
        let config = load_config(None, &src).unwrap();
        assert_eq!(config.frames_in_flight, Some(6));
        assert_eq!(config.out_dir, Some(scratch.0.join("gen")));
    }
}

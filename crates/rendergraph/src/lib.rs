// Copyright 2026 The MuTate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Render Graph
//!
//! A preprocessor for render graph sources.  A graph source is ordinary C++ with a handful of
//! keywords sprinkled in:
//!
//! ```text
//! PASS_BEGIN(DRAW_RECT)
//! READ(gpu_vector<res::vertex>& vertices, gpu_vector<uint32_t>& indices)
//! INPUT(graphicsPipelineCreateInfo& pipeline, window& wind, VkCommandBuffer& cmd)
//! {
//!     FIXED_BEGIN(VkRenderPass renderPass, uint32_t subpass)
//!         setPipeline(pipeline, V_PROC, cmd);
//!         drawIndexed(indices.size(), cmd);
//!     FIXED_END
//! }
//! PASS_END
//! ```
//!
//! Each pass becomes an *execute* function, called every frame, and if the pass has fixed
//! subroutines, a *bake* function that records one secondary command buffer per frame in flight
//! ahead of time.  The execute function then just replays the baked buffer for the current frame.
//!
//! Data only flows one way:
//!
//! 1. [`pass::parse`] scans the text into [`pass::PassInfo`] records.
//! 2. [`emit::emit`] writes the generated functions.
//! 3. [`graph::RenderGraph`] drives loading, compiling and writing `<stem>__processed.hpp`.
//!
//! The scanner only knows comments, `()` and `{}`.  It is not a C++ parser and does not try to be.

pub mod args;
#[cfg(feature = "build")]
pub mod build;
pub mod config;
pub mod emit;
pub mod graph;
pub mod pass;
pub mod rewrite;
pub mod scan;

use std::path::PathBuf;

pub use config::{CompileOptions, ConfigError, GraphConfig};
pub use graph::{preprocess, GraphState, RenderGraph};

pub mod prelude {
    pub use super::{ParseError, ParseErrorKind, RenderGraphError};
    pub use crate::args::ArgBlock;
    pub use crate::config::CompileOptions;
    pub use crate::pass::{Clause, FixedArg, FixedBlock, ParsedGraph, PassInfo};
}

#[derive(Debug, thiserror::Error)]
pub enum RenderGraphError {
    #[error("render graph source is not loaded, call load_from_file first")]
    NotLoaded,
    #[error("frames in flight must be at least 1")]
    NoFramesInFlight,
    #[error("read failed for {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("write failed for {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{0:?} is not UTF-8 text")]
    NotUtf8(PathBuf),
    #[error("{0:?} has no file stem to name the output after")]
    NoFileStem(PathBuf),
    #[error("output {0:?} already exists")]
    OutputExists(PathBuf),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),
    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

/// A structural error in the graph source.  The offset is in bytes from the start of the file.
/// Line and column are 1-based and count bytes, not characters.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at line {line}, column {column}")]
pub struct ParseError {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(src: &[u8], offset: usize, kind: ParseErrorKind) -> Self {
        let (line, column) = scan::line_col(src, offset);
        ParseError {
            offset,
            line,
            column,
            kind,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("expected PASS_BEGIN")]
    MissingPassBegin,
    #[error("PASS_BEGIN is missing its (name)")]
    MissingPassName,
    #[error("pass name {0:?} is not an identifier")]
    InvalidPassName(String),
    #[error("PASS_BEGIN is missing PASS_END")]
    MissingPassEnd,
    #[error("pass has no {{ body }}")]
    MissingBody,
    #[error("pass body runs past PASS_END")]
    BodyPastPassEnd,
    #[error("only comments may follow the pass body before PASS_END")]
    TrailingTokens,
    #[error("unbalanced '{0}'")]
    Unbalanced(char),
    #[error("{0} is missing its (argument list)")]
    MissingClauseArgs(pass::Clause),
    #[error("{0} declared twice")]
    DuplicateClause(pass::Clause),
    #[error("FIXED_BEGIN is missing its (render pass, subpass) arguments")]
    MissingFixedArgs,
    #[error("FIXED_BEGIN takes 2 arguments (render pass, subpass), found {0}")]
    FixedArgCount(usize),
    #[error("FIXED_BEGIN is missing FIXED_END")]
    MissingFixedEnd,
    #[error("FIXED_BEGIN inside another FIXED_BEGIN")]
    NestedFixed,
}

// Copyright 2026 The MuTate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Compile Tests
//!
//! Drive the file level API against a scratch directory per test.

use std::fs;
use std::path::{Path, PathBuf};

use mutate_rendergraph::prelude::*;
use mutate_rendergraph::{GraphConfig, GraphState, RenderGraph};

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/draw_rect.hpp");

/// Fresh directory, removed on drop.
struct Scratch(PathBuf);

impl Scratch {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("rgc-test-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        Scratch(dir)
    }

    fn write(&self, name: &str, text: &str) -> PathBuf {
        let path = self.0.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

#[test]
fn test_compile_fixture() {
    let scratch = Scratch::new("fixture");
    let mut graph = RenderGraph::new();
    graph.load_from_file(FIXTURE).unwrap();
    assert_eq!(graph.state(), GraphState::Loaded);

    let out = graph.compile(2, Some(scratch.path())).unwrap();
    assert_eq!(graph.state(), GraphState::Written);
    assert_eq!(out, scratch.path().join("draw_rect__processed.hpp"));

    let text = fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("// rgc-hash: "));
    assert!(text.contains("#include <VAL/lib/system/VAL_PROC.hpp>"));
    assert!(text.contains("using namespace val;"));
    assert!(!text.contains("PASS_BEGIN(DRAW_RECT)"));
    assert!(!text.contains("FIXED_BEGIN("));

    assert!(text.contains("static VkCommandBuffer __DRAW_RECT_fixed_cmd_buffers_0[2];"));
    assert!(text.contains(
        "void pass_mainDRAW_RECT(val::VAL_PROC& V_PROC, gpu_vector<res::vertex>& vertices, \
         gpu_vector<uint32_t>& indices, graphicsPipelineCreateInfo& pipeline, window& wind, \
         VkCommandBuffer& cmd) {"
    ));
    assert!(text.contains(
        "vkCmdExecuteCommands(cmd, 1, &__DRAW_RECT_fixed_cmd_buffers_0[V_PROC._currentFrame]);"
    ));
    assert!(text.contains(
        "void pass_bakeDRAW_RECT(val::VAL_PROC& V_PROC, gpu_vector<res::vertex>& vertices, \
         gpu_vector<uint32_t>& indices, graphicsPipelineCreateInfo& pipeline, window& wind, \
         VkCommandBuffer& cmd, VkRenderPass renderPass, uint32_t subpass) {"
    ));
    for i in 0..2 {
        let baked = format!("__DRAW_RECT_fixed_cmd_buffers_0[{i}]");
        assert!(text.contains(&format!("setPipeline(pipeline, V_PROC, {baked});")));
        assert!(text.contains(&format!("setScissor(wind.getSize(), {baked});")));
        assert!(text.contains(&format!("drawIndexed(indices.size(), {baked});")));
    }

    // second pass has no fixed blocks and follows the helper text
    let helper = text.find("static uint32_t overlayCount = 0;").unwrap();
    let overlay = text
        .find("void pass_mainOVERLAY(val::VAL_PROC& V_PROC, image& target, VkCommandBuffer& cmd) {")
        .unwrap();
    assert!(helper < overlay);
    assert!(text.contains("\tdraw(4, cmd);\n"));
    assert!(!text.contains("pass_bakeOVERLAY"));
}

#[test]
fn test_output_next_to_source() {
    let scratch = Scratch::new("beside");
    let src = scratch.write("graph.hpp", "PASS_BEGIN(A) { } PASS_END\n");

    let mut graph = RenderGraph::new();
    graph.load_from_file(&src).unwrap();
    let out = graph.compile(1, None).unwrap();
    assert_eq!(out, scratch.path().join("graph__processed.hpp"));
    assert!(out.exists());
}

#[test]
fn test_missing_pass_end_writes_nothing() {
    let scratch = Scratch::new("no-end");
    let src = scratch.write("broken.hpp", "PASS_BEGIN(X) { draw(4, cmd); }\n");
    let out_dir = scratch.path().join("out");

    let mut graph = RenderGraph::new();
    graph.load_from_file(&src).unwrap();
    let err = graph.compile(2, Some(&out_dir)).unwrap_err();

    match err {
        RenderGraphError::Parse(e) => assert_eq!(e.kind, ParseErrorKind::MissingPassEnd),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(graph.state(), GraphState::Failed);
    assert!(!out_dir.exists());
    assert!(!scratch.path().join("broken__processed.hpp").exists());
}

#[test]
fn test_parse_error_keeps_existing_output() {
    let scratch = Scratch::new("keep");
    let src = scratch.write("g.hpp", "PASS_BEGIN(X) { }\n");
    let previous = scratch.write("g__processed.hpp", "previous\n");

    let mut graph = RenderGraph::new();
    graph.load_from_file(&src).unwrap();
    assert!(graph.compile(2, None).is_err());
    assert_eq!(fs::read_to_string(previous).unwrap(), "previous\n");
}

#[test]
fn test_compile_consumes_source() {
    let scratch = Scratch::new("consume");
    let src = scratch.write("g.hpp", "PASS_BEGIN(A) { } PASS_END\n");

    let mut graph = RenderGraph::new();
    graph.load_from_file(&src).unwrap();
    graph.compile(2, None).unwrap();
    assert!(matches!(graph.compile(2, None), Err(RenderGraphError::NotLoaded)));

    graph.load_from_file(&src).unwrap();
    assert!(graph.compile(2, None).is_ok());
}

#[test]
fn test_zero_frames() {
    let scratch = Scratch::new("zero");
    let src = scratch.write("g.hpp", "PASS_BEGIN(A) { } PASS_END\n");

    let mut graph = RenderGraph::new();
    graph.load_from_file(&src).unwrap();
    assert!(matches!(graph.compile(0, None), Err(RenderGraphError::NoFramesInFlight)));
    assert!(!scratch.path().join("g__processed.hpp").exists());
}

#[test]
fn test_not_utf8() {
    let scratch = Scratch::new("utf8");
    let src = scratch.path().join("bin.hpp");
    fs::write(&src, [0xff, 0xfe, b'P']).unwrap();

    let mut graph = RenderGraph::new();
    assert!(matches!(graph.load_from_file(&src), Err(RenderGraphError::NotUtf8(_))));
    assert_eq!(graph.state(), GraphState::Failed);
}

#[test]
fn test_up_to_date_output_untouched() {
    let scratch = Scratch::new("current");
    let src = scratch.write("g.hpp", "PASS_BEGIN(A) { } PASS_END\n");
    let out = scratch.path().join("g__processed.hpp");

    let mut graph = RenderGraph::new();
    graph.load_from_file(&src).unwrap();
    graph.compile(2, None).unwrap();

    // Mark the output below the banner.  An up to date compile must not rewrite it.
    let marked = fs::read_to_string(&out).unwrap() + "// marker\n";
    fs::write(&out, &marked).unwrap();
    graph.load_from_file(&src).unwrap();
    graph.compile(2, None).unwrap();
    assert_eq!(fs::read_to_string(&out).unwrap(), marked);

    // A different frame count changes the hash.
    graph.load_from_file(&src).unwrap();
    graph.compile(3, None).unwrap();
    let text = fs::read_to_string(&out).unwrap();
    assert!(!text.contains("// marker"));
}

#[test]
fn test_overwrite_disabled() {
    let scratch = Scratch::new("no-overwrite");
    let src = scratch.write("g.hpp", "PASS_BEGIN(A) { } PASS_END\n");
    scratch.write("g__processed.hpp", "someone else's file\n");

    let options = CompileOptions::builder().overwrite(false).build();
    let mut graph = RenderGraph::with_options(options);
    graph.load_from_file(&src).unwrap();
    assert!(matches!(graph.compile(2, None), Err(RenderGraphError::OutputExists(_))));
}

#[test]
fn test_config_file_options() {
    let scratch = Scratch::new("config");
    let config = scratch.write(
        "rgc.toml",
        "[rendergraph]\nframes_in_flight = 4\nout_dir = \"gen\"\ncontext_param = \"Ctx& ctx\"\nframe_index = \"ctx.frame\"\nincludes = [\"\\\"ctx.hpp\\\"\"]\n\n[rendergraph.calls]\nrecordTiles = 0\n",
    );
    let src = scratch.write(
        "g.hpp",
        "PASS_BEGIN(T) { FIXED_BEGIN(rp, 0) recordTiles(cmd, 8); FIXED_END } PASS_END\n",
    );

    let config = GraphConfig::from_file(&config).unwrap();
    assert_eq!(config.out_dir.as_deref(), Some(scratch.path().join("gen").as_path()));

    let mut graph = RenderGraph::with_options(config.options);
    graph.load_from_file(&src).unwrap();
    let out = graph
        .compile(config.frames_in_flight.unwrap(), config.out_dir.as_deref())
        .unwrap();

    let text = fs::read_to_string(out).unwrap();
    assert!(text.contains("#include \"ctx.hpp\"\n"));
    assert!(!text.contains("VAL_PROC"));
    assert!(text.contains("void pass_mainT(Ctx& ctx) {"));
    assert!(text.contains("vkCmdExecuteCommands(cmd, 1, &__T_fixed_cmd_buffers_0[ctx.frame]);"));
    assert!(text.contains("recordTiles(__T_fixed_cmd_buffers_0[3], 8);"));
    assert!(text.contains("allocInfo.commandBufferCount = 4;"));
}

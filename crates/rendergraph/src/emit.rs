// Copyright 2026 The MuTate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Emitter
//!
//! Turns a [`ParsedGraph`] back into C++.  Per pass, in source order:
//!
//! - one `static VkCommandBuffer __<NAME>_fixed_cmd_buffers_<k>[N];` per fixed block
//! - `void pass_main<NAME>(..)`, the body with every fixed block replaced by a
//!   `vkCmdExecuteCommands` of the current frame's baked buffer
//! - `void pass_bake<NAME>(..)` if there were fixed blocks, recording each block `N` times
//! - whatever source text followed `PASS_END`
//!
//! Bake must be called, inside the render pass the fixed blocks inherit, before the first execute.

use std::collections::HashSet;
use std::fmt::Display;
use std::num::NonZeroU8;

use crate::args::declared_name;
use crate::prelude::*;
use crate::rewrite::{self, RewriteTable};

/// Generate the whole output file, less the banner.
pub fn emit(graph: &ParsedGraph, frames: NonZeroU8, options: &CompileOptions) -> String {
    let table = RewriteTable::for_options(options);
    let mut code = Code::default();

    for include in &options.includes {
        code.line(format_args!("#include {include}"));
    }
    code.raw(&graph.prelude);

    for pass in &graph.passes {
        emit_pass(&mut code, pass, frames, options, &table);
        code.raw(&pass.epilogue);
    }

    code.out
}

pub fn execute_fn_name(pass: &str) -> String {
    format!("pass_main{pass}")
}

pub fn bake_fn_name(pass: &str) -> String {
    format!("pass_bake{pass}")
}

/// File-scope array holding the baked buffers of fixed block `k`.
pub fn baked_array_name(pass: &str, k: usize) -> String {
    format!("__{pass}_fixed_cmd_buffers_{k}")
}

/// Parameters after the context parameter: every clause argument, first declaration of each name
/// wins.  `NULL` and `void` are placeholders for an empty clause.
pub fn pass_params(pass: &PassInfo) -> Vec<&str> {
    let mut seen = HashSet::new();
    Clause::ALL
        .into_iter()
        .flat_map(|clause| pass.clause(clause).iter())
        .filter(|arg| !matches!(*arg, "NULL" | "void"))
        .filter(|arg| seen.insert(declared_name(arg).to_owned()))
        .collect()
}

fn emit_pass(
    code: &mut Code,
    pass: &PassInfo,
    frames: NonZeroU8,
    options: &CompileOptions,
    table: &RewriteTable,
) {
    let params = pass_params(pass);
    let signature = param_list(&options.context_param, params.iter().copied());

    for k in 0..pass.fixed_blocks.len() {
        code.line(format_args!(
            "static VkCommandBuffer {}[{frames}];",
            baked_array_name(&pass.name, k)
        ));
    }

    // Execute
    code.raw(&format!("void {}({signature}) {{", execute_fn_name(&pass.name)));
    let mut cursor = 0;
    for (k, block) in pass.fixed_blocks.iter().enumerate() {
        code.raw(&pass.exec_src[cursor..block.span.start]);
        let primary = rewrite::first_command_buffer(pass.fixed_interior(block), table)
            .unwrap_or_else(|| options.primary_command_buffer.clone());
        code.raw(&format!(
            "vkCmdExecuteCommands({primary}, 1, &{}[{}]);",
            baked_array_name(&pass.name, k),
            options.frame_index
        ));
        cursor = block.span.end;
    }
    code.raw(&pass.exec_src[cursor..]);
    code.raw("}\n");

    if pass.fixed_blocks.is_empty() {
        return;
    }

    // Bake
    let extra = bake_params(pass, &params);
    let signature = param_list(
        &options.context_param,
        params.iter().copied().chain(extra.iter().map(String::as_str)),
    );
    code.open(format_args!("void {}({signature}) {{", bake_fn_name(&pass.name)));
    for (k, block) in pass.fixed_blocks.iter().enumerate() {
        bake_block(code, pass, k, block, frames, options, table);
    }
    code.close("}");
}

fn param_list<'a>(context: &'a str, params: impl Iterator<Item = &'a str>) -> String {
    std::iter::once(context)
        .chain(params)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render pass and subpass declarations the bake function needs beyond the pass parameters.  A
/// bare name gets the Vulkan type.  Expressions are evaluated in place and need nothing.
fn bake_params(pass: &PassInfo, params: &[&str]) -> Vec<String> {
    let mut seen: HashSet<String> = params.iter().map(|p| declared_name(p).to_owned()).collect();
    let mut extra = Vec::new();

    for block in &pass.fixed_blocks {
        for (arg, ty) in [(&block.render_pass, "VkRenderPass"), (&block.subpass, "uint32_t")] {
            if arg.is_expression() || !seen.insert(arg.name.clone()) {
                continue;
            }
            if arg.is_bare() {
                extra.push(format!("{ty} {}", arg.name));
            } else {
                extra.push(arg.declaration.clone());
            }
        }
    }
    extra
}

fn bake_block(
    code: &mut Code,
    pass: &PassInfo,
    k: usize,
    block: &FixedBlock,
    frames: NonZeroU8,
    options: &CompileOptions,
    table: &RewriteTable,
) {
    let baked = baked_array_name(&pass.name, k);
    let interior = pass.fixed_interior(block);

    code.line(format_args!("// fixed block {k}"));
    code.open("{");
    code.line("VkCommandBufferAllocateInfo allocInfo{};");
    code.line("allocInfo.sType = VK_STRUCTURE_TYPE_COMMAND_BUFFER_ALLOCATE_INFO;");
    code.line(format_args!("allocInfo.commandPool = {};", options.command_pool));
    code.line("allocInfo.level = VK_COMMAND_BUFFER_LEVEL_SECONDARY;");
    code.line(format_args!("allocInfo.commandBufferCount = {frames};"));
    code.open(format_args!(
        "if (vkAllocateCommandBuffers({}, &allocInfo, {baked}) != VK_SUCCESS) {{",
        options.device
    ));
    code.line("throw std::runtime_error(\"Failed to allocate command buffers!\");");
    code.close("}");
    code.close("}");

    code.open("{");
    code.line("VkCommandBufferInheritanceInfo inheritanceInfo{};");
    code.line("inheritanceInfo.sType = VK_STRUCTURE_TYPE_COMMAND_BUFFER_INHERITANCE_INFO;");
    code.line(format_args!("inheritanceInfo.renderPass = {};", block.render_pass.name));
    code.line(format_args!("inheritanceInfo.subpass = {};", block.subpass.name));
    code.line("VkCommandBufferBeginInfo beginInfo{};");
    code.line("beginInfo.sType = VK_STRUCTURE_TYPE_COMMAND_BUFFER_BEGIN_INFO;");
    code.line("beginInfo.flags = VK_COMMAND_BUFFER_USAGE_RENDER_PASS_CONTINUE_BIT;");
    code.line("beginInfo.pInheritanceInfo = &inheritanceInfo;");

    for i in 0..frames.get() {
        let buffer = format!("{baked}[{i}]");
        code.open(format_args!(
            "if (vkBeginCommandBuffer({buffer}, &beginInfo) != VK_SUCCESS) {{"
        ));
        code.line("throw std::runtime_error(\"Failed to begin recording command buffer!\");");
        code.close("}");
        code.open("{");
        code.raw(&rewrite::rewrite(interior, &buffer, table));
        code.end_line();
        code.close("}");
        code.open(format_args!(
            "if (vkEndCommandBuffer({buffer}) != VK_SUCCESS) {{"
        ));
        code.line("throw std::runtime_error(\"Failed to record command buffer!\");");
        code.close("}");
    }
    code.close("}");
}

/// Tab indented line writer.
#[derive(Default)]
struct Code {
    out: String,
    depth: usize,
}

impl Code {
    fn line(&mut self, text: impl Display) {
        for _ in 0..self.depth {
            self.out.push('\t');
        }
        self.out.push_str(&text.to_string());
        self.out.push('\n');
    }

    fn open(&mut self, text: impl Display) {
        self.line(text);
        self.depth += 1;
    }

    fn close(&mut self, text: impl Display) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }

    /// Verbatim source text.
    fn raw(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn end_line(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pass::parse;

    fn emit_str(source: &str, frames: u8) -> String {
        let graph = parse(source).unwrap();
        emit(&graph, NonZeroU8::new(frames).unwrap(), &CompileOptions::default())
    }

    #[test]
    fn test_plain_pass() {
        let out = emit_str("PASS_BEGIN(Clear) READ(buffer& vb) { draw(4, cmd); } PASS_END", 2);
        assert!(out.starts_with("#include <VAL/lib/system/VAL_PROC.hpp>\n#include <stdexcept>\n"));
        assert!(out.contains("void pass_mainClear(val::VAL_PROC& V_PROC, buffer& vb) { draw(4, cmd); }\n"));
        assert!(!out.contains("pass_bake"));
        assert!(!out.contains("static VkCommandBuffer"));
    }

    #[test]
    fn test_fixed_pass() {
        let out = emit_str(
            "PASS_BEGIN(Clear) READ(buffer& vb) { FIXED_BEGIN(pass, sub) draw(4, cmd); FIXED_END } PASS_END",
            3,
        );
        assert!(out.contains("static VkCommandBuffer __Clear_fixed_cmd_buffers_0[3];\n"));
        assert!(out.contains(
            "void pass_mainClear(val::VAL_PROC& V_PROC, buffer& vb) { vkCmdExecuteCommands(cmd, 1, &__Clear_fixed_cmd_buffers_0[V_PROC._currentFrame]); }"
        ));
        assert!(out.contains(
            "void pass_bakeClear(val::VAL_PROC& V_PROC, buffer& vb, VkRenderPass pass, uint32_t sub) {"
        ));
        assert!(out.contains("allocInfo.commandBufferCount = 3;"));
        assert!(out.contains("inheritanceInfo.renderPass = pass;"));
        assert!(out.contains("inheritanceInfo.subpass = sub;"));
        assert_eq!(out.matches("vkBeginCommandBuffer(").count(), 3);
        assert_eq!(out.matches("vkEndCommandBuffer(").count(), 3);
        assert_eq!(out.matches("vkAllocateCommandBuffers(").count(), 1);
        for i in 0..3 {
            assert!(out.contains(&format!("draw(4, __Clear_fixed_cmd_buffers_0[{i}]);")));
        }
        let execute = out.split("void pass_bakeClear").next().unwrap();
        assert!(!execute.contains("draw(4"));
    }

    #[test]
    fn test_primary_from_first_call() {
        let out = emit_str(
            "PASS_BEGIN(P) INPUT(VkCommandBuffer& primary) { FIXED_BEGIN(rp, 0) int x = 1; setViewport(vp, primary); FIXED_END } PASS_END",
            1,
        );
        assert!(out.contains("vkCmdExecuteCommands(primary, 1, &__P_fixed_cmd_buffers_0[V_PROC._currentFrame]);"));
        // expression subpass is not a parameter
        assert!(out.contains("void pass_bakeP(val::VAL_PROC& V_PROC, VkCommandBuffer& primary, VkRenderPass rp) {"));
        assert!(out.contains("inheritanceInfo.subpass = 0;"));
    }

    #[test]
    fn test_default_primary() {
        let out = emit_str("PASS_BEGIN(P) { FIXED_BEGIN(rp, 0) int x = 1; FIXED_END } PASS_END", 1);
        assert!(out.contains("vkCmdExecuteCommands(cmd, 1, "));
    }

    #[test]
    fn test_two_blocks_share_parameters() {
        let out = emit_str(
            "PASS_BEGIN(P) {\nFIXED_BEGIN(VkRenderPass rp, uint32_t s) draw(1, cmd); FIXED_END\nFIXED_BEGIN(rp, s) draw(2, cmd); FIXED_END\n} PASS_END",
            2,
        );
        assert!(out.contains("static VkCommandBuffer __P_fixed_cmd_buffers_0[2];"));
        assert!(out.contains("static VkCommandBuffer __P_fixed_cmd_buffers_1[2];"));
        assert!(out.contains("void pass_bakeP(val::VAL_PROC& V_PROC, VkRenderPass rp, uint32_t s) {"));
        assert_eq!(out.matches("vkAllocateCommandBuffers(").count(), 2);
        assert_eq!(out.matches("vkBeginCommandBuffer(").count(), 4);
        assert!(out.contains("draw(2, __P_fixed_cmd_buffers_1[1]);"));
    }

    #[test]
    fn test_params_dedup_and_placeholders() {
        let graph = parse(
            "PASS_BEGIN(P) READ(image& a, NULL) WRITE(void) READ_WRITE(image& a) INPUT(window& w) { } PASS_END",
        )
        .unwrap();
        assert_eq!(pass_params(&graph.passes[0]), vec!["image& a", "window& w"]);
    }

    #[test]
    fn test_prelude_and_epilogue_order() {
        let out = emit_str("// head\nPASS_BEGIN(A) { } PASS_END\n// between\nPASS_BEGIN(B) { } PASS_END\n// tail\n", 1);
        let head = out.find("// head").unwrap();
        let a = out.find("void pass_mainA").unwrap();
        let between = out.find("// between").unwrap();
        let b = out.find("void pass_mainB").unwrap();
        let tail = out.find("// tail").unwrap();
        assert!(head < a && a < between && between < b && b < tail);
    }
}

// Copyright 2026 The MuTate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Command Buffer Rewriting
//!
//! Statements inside a fixed subroutine are recorded once per frame in flight, each time into a
//! different baked secondary buffer.  Recording calls name their command buffer in a known
//! argument position, so baking is a matter of swapping that one argument.
//!
//! Statements are split on `;` outside parentheses, so a `for (;;)` header stays whole.  Only the
//! earliest known call in a statement is rewritten.  Arguments of a rewritten call are re-joined
//! with `, ` and any comments inside the argument list are dropped.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use log::warn;

use crate::prelude::*;
use crate::scan::{self, CommentState, Scanner};

/// Where a call takes its command buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandSlot {
    At(usize),
    /// Overloads distinguished by argument count, as `(arity, index)` pairs.
    ByArity(&'static [(usize, usize)]),
}

impl CommandSlot {
    /// Argument index of the command buffer for a call with `arity` arguments.
    pub fn index(self, arity: usize) -> Option<usize> {
        match self {
            CommandSlot::At(i) => (i < arity).then_some(i),
            CommandSlot::ByArity(overloads) => overloads
                .iter()
                .find(|(a, _)| *a == arity)
                .map(|(_, i)| *i),
        }
    }
}

static STANDARD: LazyLock<RewriteTable> = LazyLock::new(|| {
    const VAL_CALLS: [(&str, usize); 7] = [
        ("setPipeline", 2),
        ("setViewport", 1),
        ("setScissor", 1),
        ("setVertexBuffer", 1),
        ("setIndexBuffer", 1),
        ("draw", 1),
        ("drawIndexed", 1),
    ];
    const VK_CALLS: [&str; 9] = [
        "vkCmdBindPipeline",
        "vkCmdBindDescriptorSets",
        "vkCmdSetViewport",
        "vkCmdSetScissor",
        "vkCmdBindVertexBuffers",
        "vkCmdBindIndexBuffer",
        "vkCmdDraw",
        "vkCmdDrawIndexed",
        "vkCmdPushConstants",
    ];

    let mut calls: HashMap<String, CommandSlot> = VAL_CALLS
        .into_iter()
        .map(|(name, i)| (name.to_owned(), CommandSlot::At(i)))
        .collect();
    calls.extend(VK_CALLS.into_iter().map(|name| (name.to_owned(), CommandSlot::At(0))));
    // (vertexCount, instanceCount, cmd, firstVertex, firstInstance, ..) or the short form
    calls.insert("drawInstanced".to_owned(), CommandSlot::ByArity(&[(7, 3), (5, 2)]));

    RewriteTable { calls }
});

/// Function name to command buffer slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewriteTable {
    calls: HashMap<String, CommandSlot>,
}

impl RewriteTable {
    /// The VAL helpers and the raw Vulkan recording calls.
    pub fn standard() -> &'static RewriteTable {
        &STANDARD
    }

    /// Standard table plus `extra` entries.  Extra entries replace standard ones of the same name.
    pub fn with_calls<'a>(extra: impl IntoIterator<Item = (&'a str, usize)>) -> RewriteTable {
        let mut table = STANDARD.clone();
        table
            .calls
            .extend(extra.into_iter().map(|(name, i)| (name.to_owned(), CommandSlot::At(i))));
        table
    }

    pub fn for_options(options: &CompileOptions) -> Cow<'static, RewriteTable> {
        if options.calls.is_empty() {
            Cow::Borrowed(Self::standard())
        } else {
            Cow::Owned(Self::with_calls(
                options.calls.iter().map(|(name, i)| (name.as_str(), *i)),
            ))
        }
    }

    pub fn slot(&self, name: &str) -> Option<CommandSlot> {
        self.calls.get(name).copied()
    }
}

/// A statement whose earliest known call was recognized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call<'a> {
    pub name: &'a str,
    pub args: Vec<String>,
    /// Index into `args` of the command buffer.
    pub slot: usize,
    // through the opening parenthesis
    head: &'a str,
    // from the closing parenthesis, including the `;`
    tail: &'a str,
}

impl Call<'_> {
    pub fn command_buffer(&self) -> &str {
        &self.args[self.slot]
    }

    /// The statement with its command buffer argument replaced.
    pub fn render(&self, command_buffer: &str) -> String {
        let args: Vec<&str> = self
            .args
            .iter()
            .enumerate()
            .map(|(i, arg)| if i == self.slot { command_buffer } else { arg })
            .collect();
        format!("{}{}{}", self.head, args.join(", "), self.tail)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement<'a> {
    /// Copied unchanged.
    Raw(&'a str),
    Call(Call<'a>),
}

impl Statement<'_> {
    pub fn render(&self, command_buffer: &str) -> Cow<'_, str> {
        match self {
            Statement::Raw(text) => Cow::Borrowed(text),
            Statement::Call(call) => Cow::Owned(call.render(command_buffer)),
        }
    }
}

/// Split `src` into statements.  Concatenating the raw text of every statement gives back `src`.
pub fn statements<'a>(src: &'a str, table: &RewriteTable) -> Vec<Statement<'a>> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;

    for i in Scanner::new(bytes, 0).code() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b';' if depth == 0 => {
                out.push(classify(&src[start..=i], table));
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < src.len() {
        out.push(classify(&src[start..], table));
    }
    out
}

/// Rewrite every recognized call in `src` to record into `command_buffer`.
pub fn rewrite(src: &str, command_buffer: &str, table: &RewriteTable) -> String {
    statements(src, table)
        .iter()
        .map(|s| s.render(command_buffer))
        .collect()
}

/// Command buffer argument of the first recognized call.
pub fn first_command_buffer(src: &str, table: &RewriteTable) -> Option<String> {
    statements(src, table).into_iter().find_map(|s| match s {
        Statement::Call(call) => Some(call.command_buffer().to_owned()),
        Statement::Raw(_) => None,
    })
}

fn classify<'a>(stmt: &'a str, table: &RewriteTable) -> Statement<'a> {
    let bytes = stmt.as_bytes();
    let mut scanner = Scanner::new(bytes, 0);

    while let Some((i, state)) = scanner.next() {
        if state != CommentState::Code
            || !scan::is_ident(bytes[i])
            || (i > 0 && scan::is_ident(bytes[i - 1]))
        {
            continue;
        }
        let word_end = i + bytes[i..].iter().take_while(|&&b| scan::is_ident(b)).count();
        scanner.seek(word_end);

        let name = &stmt[i..word_end];
        let Some(slot) = table.slot(name) else {
            continue;
        };
        let Some(open) = scan::next_code_byte(bytes, word_end, bytes.len()).filter(|&o| bytes[o] == b'(')
        else {
            continue;
        };

        let Some(close) = scan::matching_close(bytes, open) else {
            warn!("unbalanced call to {name} left as is: {}", stmt.trim());
            return Statement::Raw(stmt);
        };
        let args = match ArgBlock::read(bytes, open + 1..close) {
            Ok(args) => args,
            Err(e) => {
                warn!("call to {name} left as is: {e}");
                return Statement::Raw(stmt);
            }
        };
        let Some(slot) = slot.index(args.len()) else {
            warn!(
                "{name} with {} arguments has no known command buffer slot, left as is",
                args.len()
            );
            return Statement::Raw(stmt);
        };

        return Statement::Call(Call {
            name,
            args: args.iter().map(str::to_owned).collect(),
            slot,
            head: &stmt[..=open],
            tail: &stmt[close..],
        });
    }

    Statement::Raw(stmt)
}

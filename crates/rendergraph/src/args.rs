// Copyright 2026 The MuTate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Argument Blocks
//!
//! The comma separated contents of `READ(...)`, `WRITE(...)`, `FIXED_BEGIN(...)` and friends.
//! Nested `(...)` and `{...}` are taken whole, so `makeThing(a, b)` and `{0, 0}` are one argument
//! each.

use std::ops::Index;

use crate::prelude::*;
use crate::scan::{self, CommentState, Scanner, Span};

/// Ordered arguments, each a trimmed copy of the source text.  An empty block is an absent clause.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArgBlock {
    args: Vec<String>,
}

impl ArgBlock {
    /// Split `range` of `src` into arguments.  `range` excludes the enclosing parentheses.
    ///
    /// Double commas do not produce empty arguments.  Comments are dropped; an argument with a
    /// comment in the middle keeps the code on both sides, joined by a space.
    pub fn read(src: &[u8], range: Span) -> Result<Self, ParseError> {
        let window = &src[..range.end.min(src.len())];
        let mut args = Vec::new();
        let mut current: Vec<u8> = Vec::new();
        let mut in_comment = false;

        let mut scanner = Scanner::new(window, range.start);
        while let Some((i, state)) = scanner.next() {
            if state != CommentState::Code {
                if !in_comment && current.last().is_some_and(|&b| !scan::is_blank(b)) {
                    current.push(b' ');
                }
                in_comment = true;
                continue;
            }
            in_comment = false;

            match window[i] {
                b',' => push_arg(&mut args, &mut current),
                b'(' | b'{' => {
                    let close = scan::matching_close(window, i).ok_or_else(|| {
                        ParseError::new(src, i, ParseErrorKind::Unbalanced(window[i] as char))
                    })?;
                    current.extend_from_slice(&window[i..=close]);
                    scanner.seek(close + 1);
                }
                b => current.push(b),
            }
        }
        push_arg(&mut args, &mut current);

        Ok(ArgBlock { args })
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(String::as_str)
    }
}

impl Index<usize> for ArgBlock {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.args[index]
    }
}

fn push_arg(args: &mut Vec<String>, current: &mut Vec<u8>) {
    let trimmed = current.trim_ascii();
    if !trimmed.is_empty() {
        // Splits only happen on ASCII bytes, so the text is still UTF-8.
        args.push(String::from_utf8_lossy(trimmed).into_owned());
    }
    current.clear();
}

/// The name a declaration declares: `const buffer& vb` is `vb`, `VkRenderPass pass` is `pass`,
/// `int counts[4]` is `counts`.  An undecorated identifier is its own name.  Returns an empty
/// string when the text does not end in an identifier.
pub fn declared_name(declaration: &str) -> &str {
    let mut text = declaration.trim();
    if text.ends_with(']') {
        if let Some(bracket) = text.find('[') {
            text = text[..bracket].trim_end();
        }
    }
    let start = text
        .bytes()
        .rposition(|b| !scan::is_ident(b))
        .map_or(0, |i| i + 1);
    &text[start..]
}

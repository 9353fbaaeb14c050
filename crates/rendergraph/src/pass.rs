// Copyright 2026 The MuTate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Passes
//!
//! Reading `PASS_BEGIN(name) ... PASS_END` units out of a graph source.
//!
//! ```text
//! PASS_BEGIN(Name) [READ(..)] [WRITE(..)] [READ_WRITE(..)] [INPUT(..)]
//! {
//!     body, with optional FIXED_BEGIN(renderPass, subpass) ... FIXED_END spans
//! }
//! PASS_END
//! ```
//!
//! Clauses may come in any order.  Everything is copied out of the source, so a [`ParsedGraph`]
//! does not borrow the file contents.

use std::fmt;

use log::{debug, warn};

use crate::prelude::*;
use crate::scan::{self, Boundary, CommentState, Scan, Scanner, Span};

pub const PASS_BEGIN: &str = "PASS_BEGIN";
pub const PASS_END: &str = "PASS_END";
pub const FIXED_BEGIN: &str = "FIXED_BEGIN";
pub const FIXED_END: &str = "FIXED_END";

/// The resource clauses a pass header may declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Clause {
    /// Graphics resources the pass reads from.
    Read,
    /// Graphics resources the pass writes to.
    Write,
    /// Graphics resources the pass reads and writes.
    ReadWrite,
    /// Anything else the pass needs: pipelines, windows, numbers.
    Input,
}

impl Clause {
    pub const ALL: [Clause; 4] = [Clause::Read, Clause::Write, Clause::ReadWrite, Clause::Input];

    pub fn keyword(self) -> &'static str {
        match self {
            Clause::Read => "READ",
            Clause::Write => "WRITE",
            Clause::ReadWrite => "READ_WRITE",
            Clause::Input => "INPUT",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Clause> {
        Clause::ALL.into_iter().find(|c| c.keyword() == word)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One argument of `FIXED_BEGIN`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedArg {
    /// Verbatim argument text, such as `VkRenderPass pass` or `pass`.
    pub declaration: String,
    /// Declared name with the type prefix stripped, such as `pass`.  For an expression argument
    /// like `pipeline.getVkRenderPass()` this is the whole expression.
    pub name: String,
}

impl FixedArg {
    pub fn new(declaration: &str) -> Self {
        let declaration = declaration.trim();
        let name = if is_expression(declaration) {
            declaration
        } else {
            crate::args::declared_name(declaration)
        };
        FixedArg {
            declaration: declaration.to_owned(),
            name: name.to_owned(),
        }
    }

    /// Plain identifier with no type, such as `pass`.
    pub fn is_bare(&self) -> bool {
        self.declaration == self.name && !is_expression(&self.declaration)
    }

    /// Neither an identifier nor a declaration.  Expressions are evaluated in place and do not
    /// become bake parameters.
    pub fn is_expression(&self) -> bool {
        is_expression(&self.declaration)
    }
}

fn is_expression(text: &str) -> bool {
    text.is_empty()
        || text.as_bytes()[0].is_ascii_digit()
        || text.contains(['(', '{', '.', '-', '+', '"', '='])
        || crate::args::declared_name(text).is_empty()
}

/// A `FIXED_BEGIN(render pass, subpass) ... FIXED_END` span.  Offsets are relative to
/// [`PassInfo::exec_src`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedBlock {
    /// Start of the interior, just past the `)` closing the `FIXED_BEGIN` arguments.
    pub source_offset: usize,
    /// Length of the interior, up to the start of `FIXED_END`.
    pub source_length: usize,
    /// Whole span, from `FIXED_BEGIN` through `FIXED_END`.
    pub span: Span,
    pub render_pass: FixedArg,
    pub subpass: FixedArg,
}

impl FixedBlock {
    pub fn interior(&self) -> Span {
        self.source_offset..self.source_offset + self.source_length
    }
}

/// Everything known about one pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassInfo {
    pub name: String,
    pub read: ArgBlock,
    pub write: ArgBlock,
    pub read_write: ArgBlock,
    pub input: ArgBlock,
    /// Ordered by offset, never overlapping.
    pub fixed_blocks: Vec<FixedBlock>,
    /// Body text between the outer braces.
    pub exec_src: String,
    /// Source text after `PASS_END`, up to the next pass or the end of the file.
    pub epilogue: String,
}

impl PassInfo {
    pub fn clause(&self, clause: Clause) -> &ArgBlock {
        match clause {
            Clause::Read => &self.read,
            Clause::Write => &self.write,
            Clause::ReadWrite => &self.read_write,
            Clause::Input => &self.input,
        }
    }

    fn clause_mut(&mut self, clause: Clause) -> &mut ArgBlock {
        match clause {
            Clause::Read => &mut self.read,
            Clause::Write => &mut self.write,
            Clause::ReadWrite => &mut self.read_write,
            Clause::Input => &mut self.input,
        }
    }

    /// Statements inside `block`, without the keywords.
    pub fn fixed_interior(&self, block: &FixedBlock) -> &str {
        &self.exec_src[block.interior()]
    }
}

/// A whole graph source, split into passes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedGraph {
    /// Source text before the first `PASS_BEGIN`: license headers, includes, helpers.
    pub prelude: String,
    pub passes: Vec<PassInfo>,
}

/// Scan a whole graph source.  Fails on the first malformed pass.
pub fn parse(source: &str) -> Result<ParsedGraph, ParseError> {
    let src = source.as_bytes();
    let mut graph = ParsedGraph::default();
    let mut cursor = 0;

    loop {
        let begin = match scan::find_keyword(src, cursor..src.len(), PASS_BEGIN, Boundary::Terminator) {
            Scan::Found(span) => span,
            Scan::NotFound | Scan::CommentSkipped(_) => break,
        };

        let text = &source[cursor..begin.start];
        match graph.passes.last_mut() {
            Some(previous) => previous.epilogue = text.to_owned(),
            None => graph.prelude = text.to_owned(),
        }

        let (pass, end) = read_pass(source, begin.start)?;
        graph.passes.push(pass);
        cursor = end;
    }

    let rest = &source[cursor..];
    match graph.passes.last_mut() {
        Some(last) => last.epilogue = rest.to_owned(),
        None => {
            warn!("no PASS_BEGIN found, output will only contain the source text");
            graph.prelude = rest.to_owned();
        }
    }

    Ok(graph)
}

/// Read the pass whose `PASS_BEGIN` starts at `at`.  Returns the pass and the offset just past its
/// `PASS_END`.
pub fn read_pass(source: &str, at: usize) -> Result<(PassInfo, usize), ParseError> {
    let src = source.as_bytes();
    let err = |offset: usize, kind: ParseErrorKind| ParseError::new(src, offset, kind);

    if !src.get(at..).is_some_and(|s| s.starts_with(PASS_BEGIN.as_bytes())) {
        return Err(err(at, ParseErrorKind::MissingPassBegin));
    }
    let after_keyword = at + PASS_BEGIN.len();

    // (name)
    let name_open = scan::next_code_byte(src, after_keyword, src.len())
        .filter(|&i| src[i] == b'(')
        .ok_or_else(|| err(after_keyword, ParseErrorKind::MissingPassName))?;
    let name_close = scan::matching_close(src, name_open)
        .ok_or_else(|| err(name_open, ParseErrorKind::Unbalanced('(')))?;
    let name = source[name_open + 1..name_close].trim();
    if !is_identifier(name) {
        return Err(err(name_open + 1, ParseErrorKind::InvalidPassName(name.to_owned())));
    }

    let end = find_terminator(src, name_close + 1..src.len(), PASS_END).map_err(|miss| {
        explain_miss(src, &format!("pass {name}"), PASS_END, miss);
        err(at, ParseErrorKind::MissingPassEnd)
    })?;
    // The PASS_END we found belongs to a later pass.
    if scan::find_keyword(src, name_close + 1..end.start, PASS_BEGIN, Boundary::Terminator)
        .found()
        .is_some()
    {
        return Err(err(at, ParseErrorKind::MissingPassEnd));
    }

    let mut pass = PassInfo {
        name: name.to_owned(),
        ..Default::default()
    };

    let body_open = read_header(source, &mut pass, name_close + 1..end.start)?;
    let body_close = scan::matching_close(src, body_open)
        .ok_or_else(|| err(body_open, ParseErrorKind::Unbalanced('{')))?;
    if body_close > end.start {
        return Err(err(body_open, ParseErrorKind::BodyPastPassEnd));
    }
    if let Some(stray) = scan::next_code_byte(src, body_close + 1, end.start) {
        return Err(err(stray, ParseErrorKind::TrailingTokens));
    }

    let body = body_open + 1..body_close;
    pass.exec_src = source[body.clone()].to_owned();
    pass.fixed_blocks = read_fixed_blocks(source, body)?;

    debug!(
        "pass {}: {} read, {} write, {} read-write, {} input, {} fixed",
        pass.name,
        pass.read.len(),
        pass.write.len(),
        pass.read_write.len(),
        pass.input.len(),
        pass.fixed_blocks.len()
    );

    Ok((pass, end.end))
}

/// Walk the header for clauses until the body's `{`, which is the first `{` outside any
/// parentheses.  Returns the offset of that `{`.
fn read_header(source: &str, pass: &mut PassInfo, header: Span) -> Result<usize, ParseError> {
    let src = source.as_bytes();
    let window = &src[..header.end];
    let err = |offset: usize, kind: ParseErrorKind| ParseError::new(src, offset, kind);
    let mut declared: Vec<Clause> = Vec::new();

    let mut scanner = Scanner::new(window, header.start);
    while let Some((i, state)) = scanner.next() {
        if state != CommentState::Code {
            continue;
        }
        match window[i] {
            b'{' => return Ok(i),
            b'(' => {
                let close = scan::matching_close(window, i)
                    .ok_or_else(|| err(i, ParseErrorKind::Unbalanced('(')))?;
                scanner.seek(close + 1);
            }
            b if scan::is_ident(b) && (i == 0 || !scan::is_ident(src[i - 1])) => {
                let word_end = i + window[i..].iter().take_while(|&&b| scan::is_ident(b)).count();
                let word = &source[i..word_end];

                match Clause::from_keyword(word) {
                    Some(clause) => {
                        let open = scan::next_code_byte(src, word_end, header.end)
                            .filter(|&j| src[j] == b'(')
                            .ok_or_else(|| err(word_end, ParseErrorKind::MissingClauseArgs(clause)))?;
                        let close = scan::matching_close(window, open)
                            .ok_or_else(|| err(open, ParseErrorKind::Unbalanced('(')))?;
                        if declared.contains(&clause) {
                            return Err(err(i, ParseErrorKind::DuplicateClause(clause)));
                        }
                        declared.push(clause);
                        *pass.clause_mut(clause) = ArgBlock::read(src, open + 1..close)?;
                        scanner.seek(close + 1);
                    }
                    None => {
                        warn!("pass {}: ignoring `{word}` before the body", pass.name);
                        scanner.seek(word_end);
                    }
                }
            }
            _ => {}
        }
    }

    Err(err(header.start, ParseErrorKind::MissingBody))
}

/// Why a mandatory terminator was not found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NearMiss {
    /// The keyword only appears inside a comment.
    Commented(Span),
    /// The keyword follows code with no blank in between, as in `}PASS_END`.
    Glued(Span),
}

/// Find `keyword` as a terminator in `range`.  On failure, report the closest thing that was
/// rejected, if any.  A glued keyword is reported before a commented one.
pub fn find_terminator(src: &[u8], range: Span, keyword: &str) -> Result<Span, Option<NearMiss>> {
    let commented = match scan::find_keyword(src, range.clone(), keyword, Boundary::Terminator) {
        Scan::Found(span) => return Ok(span),
        Scan::CommentSkipped(span) => Some(NearMiss::Commented(span)),
        Scan::NotFound => None,
    };
    match scan::find_keyword(src, range, keyword, Boundary::Word) {
        Scan::Found(span) => Err(Some(NearMiss::Glued(span))),
        _ => Err(commented),
    }
}

fn explain_miss(src: &[u8], owner: &str, keyword: &str, miss: Option<NearMiss>) {
    match miss {
        Some(NearMiss::Commented(span)) => {
            let (line, _) = scan::line_col(src, span.start);
            warn!("{owner}: {keyword} on line {line} is commented out");
        }
        Some(NearMiss::Glued(span)) => {
            let (line, column) = scan::line_col(src, span.start);
            warn!("{owner}: {keyword} at line {line}, column {column} must be preceded by whitespace");
        }
        None => {}
    }
}

fn read_fixed_blocks(source: &str, body: Span) -> Result<Vec<FixedBlock>, ParseError> {
    let src = source.as_bytes();
    let window = &src[..body.end];
    let err = |offset: usize, kind: ParseErrorKind| ParseError::new(src, offset, kind);

    let mut blocks = Vec::new();
    let mut cursor = body.start;
    while let Scan::Found(begin) =
        scan::find_keyword(src, cursor..body.end, FIXED_BEGIN, Boundary::Terminator)
    {
        let open = scan::next_code_byte(src, begin.end, body.end)
            .filter(|&i| src[i] == b'(')
            .ok_or_else(|| err(begin.end, ParseErrorKind::MissingFixedArgs))?;
        let close = scan::matching_close(window, open)
            .ok_or_else(|| err(open, ParseErrorKind::Unbalanced('(')))?;

        let args = ArgBlock::read(src, open + 1..close)?;
        if args.len() != 2 {
            return Err(err(open, ParseErrorKind::FixedArgCount(args.len())));
        }

        let end = find_terminator(src, close + 1..body.end, FIXED_END).map_err(|miss| {
            let (line, _) = scan::line_col(src, begin.start);
            explain_miss(src, &format!("fixed block at line {line}"), FIXED_END, miss);
            err(begin.start, ParseErrorKind::MissingFixedEnd)
        })?;
        if let Some(nested) =
            scan::find_keyword(src, close + 1..end.start, FIXED_BEGIN, Boundary::Terminator).found()
        {
            return Err(err(nested.start, ParseErrorKind::NestedFixed));
        }

        let block = FixedBlock {
            source_offset: close + 1 - body.start,
            source_length: end.start - (close + 1),
            span: begin.start - body.start..end.end - body.start,
            render_pass: FixedArg::new(&args[0]),
            subpass: FixedArg::new(&args[1]),
        };
        debug!(
            "fixed block at body offset {}: render pass `{}`, subpass `{}`",
            block.span.start, block.render_pass.name, block.subpass.name
        );
        blocks.push(block);
        cursor = end.end;
    }

    Ok(blocks)
}

fn is_identifier(text: &str) -> bool {
    text.bytes().next().is_some_and(|b| !b.is_ascii_digit()) && text.bytes().all(scan::is_ident)
}

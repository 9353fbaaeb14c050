// Copyright 2026 The MuTate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Scanning
//!
//! Byte level primitives the rest of the preprocessor is built on.  Everything works on an
//! immutable `&[u8]` and hands back offsets into it.  Nothing here allocates.
//!
//! The only lexical structure we understand is comments.  A keyword or delimiter inside `//` or
//! `/* */` is never structural.  String literals are not special.  If someone writes `"/*"` in a
//! pass body, they will find out.

use std::ops::Range;

/// Half-open byte range into the source.
pub type Span = Range<usize>;

/// Comment state governing a byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CommentState {
    /// Not inside a comment.  Only these bytes can be structural.
    #[default]
    Code,
    /// Inside `// ...`, up to but not including the newline.
    SingleLine,
    /// Inside `/* ... */`, including both markers.
    MultiLine,
}

pub fn is_blank(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

pub fn is_ident(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Walks bytes forward, tagging each with the comment state that governs it.  Use
/// [`Scanner::code`] when only structural bytes matter.
#[derive(Clone, Debug)]
pub struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
    state: CommentState,
    // The second byte of a two byte comment marker.
    queued: Option<(usize, CommentState)>,
}

impl<'a> Scanner<'a> {
    /// Scan `src` starting at `start`, which must not be inside a comment.  Truncate `src` to bound
    /// the scan; lookahead never crosses the end of the slice.
    pub fn new(src: &'a [u8], start: usize) -> Self {
        Scanner {
            src,
            pos: start,
            state: CommentState::Code,
            queued: None,
        }
    }

    /// Continue from `pos` in code state.  Used to jump over a balanced delimiter span.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
        self.state = CommentState::Code;
        self.queued = None;
    }

    /// Offsets of structural bytes only.
    pub fn code(self) -> impl Iterator<Item = usize> + 'a {
        self.filter_map(|(i, state)| (state == CommentState::Code).then_some(i))
    }
}

impl Iterator for Scanner<'_> {
    type Item = (usize, CommentState);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(queued) = self.queued.take() {
            return Some(queued);
        }

        let i = self.pos;
        let b = *self.src.get(i)?;
        let next = self.src.get(i + 1).copied();
        self.pos += 1;

        let (state, after) = match (self.state, b, next) {
            (CommentState::Code, b'/', Some(b'/')) => {
                (CommentState::SingleLine, CommentState::SingleLine)
            }
            (CommentState::Code, b'/', Some(b'*')) => {
                (CommentState::MultiLine, CommentState::MultiLine)
            }
            (CommentState::MultiLine, b'*', Some(b'/')) => {
                (CommentState::MultiLine, CommentState::Code)
            }
            (CommentState::SingleLine, b'\n', _) => (CommentState::Code, CommentState::Code),
            (state, _, _) => (state, state),
        };

        // Both bytes of a marker belong to the comment.  Queue the second so `/*/` is not read as
        // an open followed by a close.
        let marker = matches!(
            (self.state, b, next),
            (CommentState::Code, b'/', Some(b'/' | b'*')) | (CommentState::MultiLine, b'*', Some(b'/'))
        );
        if marker {
            self.queued = Some((i + 1, state));
            self.pos += 1;
        }
        self.state = after;

        Some((i, state))
    }
}

/// Offset of the delimiter closing the `(` or `{` at `open`.  Only the same delimiter kind is
/// counted, and delimiters inside comments are ignored.  `None` when `open` is not an opening
/// delimiter or the input ends first.
pub fn matching_close(src: &[u8], open: usize) -> Option<usize> {
    let (opening, closing) = match src.get(open)? {
        b'(' => (b'(', b')'),
        b'{' => (b'{', b'}'),
        _ => return None,
    };

    let mut depth = 0usize;
    for i in Scanner::new(src, open).code() {
        if src[i] == opening {
            depth += 1;
        } else if src[i] == closing {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// First structural byte in `from..limit` that is not blank.
pub fn next_code_byte(src: &[u8], from: usize, limit: usize) -> Option<usize> {
    let limit = limit.min(src.len());
    Scanner::new(&src[..limit], from)
        .code()
        .find(|&i| !is_blank(src[i]))
}

/// What may sit either side of a keyword match.  The byte after a match must always be a
/// non-identifier byte or the end of input, so `PASS_END_X` is never `PASS_END`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boundary {
    /// Start of the search or a blank before the match.  `MY_PASS_END`, `x.PASS_END` and
    /// `}PASS_END` are rejected.  Used for `PASS_BEGIN`, `PASS_END`, `FIXED_BEGIN`, `FIXED_END`.
    Terminator,
    /// Start of the search or any non-identifier byte before the match.  Finds a terminator glued
    /// to the code in front of it, so the rejection can be explained.
    Word,
}

impl Boundary {
    fn accepts(self, src: &[u8], search_start: usize, span: &Span) -> bool {
        let leading = span.start == search_start
            || match self {
                Boundary::Terminator => is_blank(src[span.start - 1]),
                Boundary::Word => !is_ident(src[span.start - 1]),
            };
        leading && src.get(span.end).is_none_or(|&b| !is_ident(b))
    }
}

/// Result of a keyword search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scan {
    Found(Span),
    NotFound,
    /// No structural match, but the keyword does appear inside a comment.  Worth mentioning when a
    /// mandatory keyword is missing.
    CommentSkipped(Span),
}

impl Scan {
    pub fn found(self) -> Option<Span> {
        match self {
            Scan::Found(span) => Some(span),
            _ => None,
        }
    }
}

/// Find the first structural occurrence of `keyword` that starts and ends inside `range`.
pub fn find_keyword(src: &[u8], range: Span, keyword: &str, boundary: Boundary) -> Scan {
    let kw = keyword.as_bytes();
    let limit = range.end.min(src.len());
    let window = &src[..limit];

    let mut commented = None;
    for (i, state) in Scanner::new(window, range.start) {
        if !window[i..].starts_with(kw) {
            continue;
        }
        let span = i..i + kw.len();
        if !boundary.accepts(src, range.start, &span) {
            continue;
        }
        if state == CommentState::Code {
            return Scan::Found(span);
        }
        commented.get_or_insert(span);
    }

    commented.map_or(Scan::NotFound, Scan::CommentSkipped)
}

/// 1-based line and column of `offset`.
pub fn line_col(src: &[u8], offset: usize) -> (usize, usize) {
    let before = &src[..offset.min(src.len())];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let column = match before.iter().rposition(|&b| b == b'\n') {
        Some(newline) => offset - newline,
        None => offset + 1,
    };
    (line, column)
}

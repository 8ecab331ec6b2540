//! The pluggable multi-pattern byte scanner abstraction.
//!
//! The engine never talks to a regex library directly; it talks to a [`ByteScanner`].
//! Today there is exactly one implementor (backed by [`regex::bytes`]), but the seam
//! keeps the engine's control flow — visitor-driven, early-terminable, ordered by match
//! end position — independent of which scanning library is behind it.

use crate::constants::{EOL_ID, PATTERN_ID, PatternId};
use regex::bytes::{Regex, RegexBuilder};

/// Returned from a scan visitor to request that the scan stop early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    Continue,
    Terminate,
}

/// Result of a completed scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The scan reached the end of the input without the visitor requesting termination.
    Success,
    /// The visitor requested early termination.
    Terminated,
}

/// Opaque, scanner-private working memory. Allocated fresh per call so that distinct
/// blocks can be scanned concurrently without sharing mutable state.
#[derive(Debug, Clone, Default)]
pub struct Scratch {
    pattern_hits: Vec<(u64, u64)>,
}

/// A capability interface over a compiled multi-pattern scanner.
pub trait ByteScanner {
    /// Allocates a fresh scratch buffer for one scan call.
    fn alloc_scratch(&self) -> Scratch {
        Scratch::default()
    }

    /// Scans `haystack`, invoking `visitor(id, from, to)` for each match in order of
    /// `to`. Returns `Terminated` as soon as the visitor returns `Terminate`.
    fn scan(
        &self,
        haystack: &[u8],
        scratch: &mut Scratch,
        visitor: &mut dyn FnMut(PatternId, u64, u64) -> ScanControl,
    ) -> ScanOutcome;
}

/// Iterates the `(from, to)` byte ranges of every `\n` in a haystack, in ascending order.
struct EolPositions<'a> {
    haystack: &'a [u8],
    pos: usize,
}

impl<'a> EolPositions<'a> {
    fn new(haystack: &'a [u8]) -> Self {
        Self { haystack, pos: 0 }
    }
}

impl Iterator for EolPositions<'_> {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        let rel = self.haystack[self.pos..]
            .iter()
            .position(|&b| b == b'\n')?;
        let idx = self.pos + rel;
        self.pos = idx + 1;
        Some((idx as u64, (idx + 1) as u64))
    }
}

/// The EOL-only database: matches the single byte `\n`.
#[derive(Debug, Default)]
pub struct EolScanner;

impl ByteScanner for EolScanner {
    fn scan(
        &self,
        haystack: &[u8],
        _scratch: &mut Scratch,
        visitor: &mut dyn FnMut(PatternId, u64, u64) -> ScanControl,
    ) -> ScanOutcome {
        for (from, to) in EolPositions::new(haystack) {
            if visitor(EOL_ID, from, to) == ScanControl::Terminate {
                return ScanOutcome::Terminated;
            }
        }
        ScanOutcome::Success
    }
}

/// The two-pattern filter database: EOL plus the user's compiled regex, interleaved in
/// ascending order of match end position.
#[derive(Debug, Clone)]
pub struct FilterScanner {
    pattern: Regex,
}

impl FilterScanner {
    /// Compiles the user pattern. Dotall is always on (a pattern may span a line break);
    /// caseless tracks the engine's `ignore_case` flag.
    pub fn compile(pattern: &str, ignore_case: bool) -> Result<Self, regex::Error> {
        let compiled = RegexBuilder::new(pattern)
            .dot_matches_new_line(true)
            .case_insensitive(ignore_case)
            .build()?;
        Ok(Self { pattern: compiled })
    }
}

impl ByteScanner for FilterScanner {
    fn scan(
        &self,
        haystack: &[u8],
        scratch: &mut Scratch,
        visitor: &mut dyn FnMut(PatternId, u64, u64) -> ScanControl,
    ) -> ScanOutcome {
        scratch.pattern_hits.clear();
        scratch
            .pattern_hits
            .extend(self.pattern.find_iter(haystack).map(|m| (m.start() as u64, m.end() as u64)));

        // Non-overlapping regex matches are yielded in increasing (start, end) order, so
        // a simple merge of the two already-ascending `to` streams preserves the
        // "ordered by match end" contract even for patterns that span a line break.
        let mut eol = EolPositions::new(haystack).peekable();
        let mut pat = scratch.pattern_hits.clone().into_iter().peekable();

        loop {
            let emit_pattern = match (pat.peek(), eol.peek()) {
                (Some(&(_, pend)), Some(&(_, eend))) => pend <= eend,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            let (id, from, to) = if emit_pattern {
                let (s, e) = pat.next().unwrap();
                (PATTERN_ID, s, e)
            } else {
                let (s, e) = eol.next().unwrap();
                (EOL_ID, s, e)
            };
            if visitor(id, from, to) == ScanControl::Terminate {
                return ScanOutcome::Terminated;
            }
        }
        ScanOutcome::Success
    }
}

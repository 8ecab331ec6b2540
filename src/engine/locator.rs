//! Line-at-a-time retrieval (`getLine`, `getRowForAbsLine`).
//!
//! The hard part of this engine: walking a block's byte range lazily, one line at a
//! time, while interleaving match lines with borrowed/local scope lines in file order,
//! and doing it fast for the common case of near-sequential access.

use crate::block::Block;
use crate::constants::{EOL_ID, MAX_SCOPE_AFTER, MAX_SCOPE_BEFORE};
use crate::error::{EngineError, EngineResult};
use crate::scanner::{ByteScanner, EolScanner, FilterScanner, ScanControl};
use crate::tracker::ScopeTracker;

/// A single retrieved line: the raw bytes (CRLF-trimmed), its absolute line number in
/// the file, and whether it is a scope (context) line rather than a direct match.
#[derive(Debug, Clone, Copy)]
pub struct LineView<'a> {
    pub line: &'a [u8],
    pub number: u32,
    pub scope: bool,
}

/// The predictive-cursor state carried between `get_line` calls, so that sequential
/// access (the overwhelmingly common pattern) resumes mid-block instead of rescanning
/// from the block start every time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cursor {
    recent_block: usize,
    recent_line_offset: u32,
    recent_abs_line_offset: u32,
    predicted_line_num: Option<u32>,
    predicted_abs_line_num: u32,
    predicted_line_pos: u64,
}

impl Cursor {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn invalidate_prediction(&mut self) {
        self.predicted_line_num = None;
    }

    /// Whether the next `get_line(number)` call would resume from the predicted
    /// position rather than rescanning from a block boundary.
    pub fn predicts(&self, number: u32) -> bool {
        self.predicted_line_num == Some(number)
    }
}

struct Located {
    block_idx: usize,
    line_offset: u32,
    abs_line_offset: u32,
    current_line: u32,
    base_line: u32,
    search_pos: u64,
}

/// Walks the block prefix sums to find which block holds `number`, resuming from the
/// cursor's last position when `number` is ahead of it (the common sequential case).
fn locate_block(
    blocks: &[Block],
    block_count: usize,
    cursor: &mut Cursor,
    number: u32,
    filtered: bool,
) -> Located {
    let mut block_idx = 0usize;
    let mut line_offset;
    let mut abs_line_offset = 0u32;

    if number > cursor.recent_line_offset {
        block_idx = cursor.recent_block;
        line_offset = cursor.recent_line_offset;
        abs_line_offset = cursor.recent_abs_line_offset;
    } else {
        line_offset = blocks[0].visible_lines(filtered);
        abs_line_offset = blocks[0].lines;
    }

    let mut current_line = 0u32;
    while number >= line_offset && block_idx + 1 < block_count {
        current_line = line_offset;
        block_idx += 1;
        line_offset += blocks[block_idx].visible_lines(filtered);
        abs_line_offset += blocks[block_idx].lines;
    }

    if block_idx != cursor.recent_block {
        cursor.invalidate_prediction();
    }

    Located {
        block_idx,
        line_offset,
        abs_line_offset,
        current_line,
        base_line: current_line,
        search_pos: blocks[block_idx].byte_offset,
    }
}

/// Unfiltered retrieval: plain EOL counting from the block start (or the predicted
/// position), no scope bookkeeping at all.
fn get_line_unfiltered<'a>(
    mem: &'a [u8],
    blocks: &[Block],
    block_count: usize,
    cursor: &mut Cursor,
    eol: &EolScanner,
    number: u32,
) -> EngineResult<LineView<'a>> {
    let mut loc = locate_block(blocks, block_count, cursor, number, false);

    let mut current_line = loc.current_line;
    let mut search_pos = loc.search_pos;
    if cursor.predicted_line_num == Some(number) {
        current_line = number;
        search_pos = cursor.predicted_line_pos;
    }
    let base_pos = blocks[loc.block_idx].byte_offset;
    let scan_size = blocks[loc.block_idx].size - (search_pos - base_pos);
    let bytes = &mem[search_pos as usize..(search_pos + scan_size) as usize];

    let mut scratch = eol.alloc_scratch();
    let mut last_hit = 0u64;
    let mut length = 0u32;
    eol.scan(bytes, &mut scratch, &mut |_id, _from, to| {
        if current_line == number {
            length = (to - last_hit - 1) as u32;
            return ScanControl::Terminate;
        }
        last_hit = to;
        current_line += 1;
        ScanControl::Continue
    });

    finish(mem, cursor, &mut loc, number, number, search_pos, last_hit, length, false)
}

/// Filtered, no-scope retrieval: counts only match lines.
fn get_line_filtered_no_scope<'a>(
    mem: &'a [u8],
    blocks: &[Block],
    block_count: usize,
    cursor: &mut Cursor,
    scanner: &FilterScanner,
    number: u32,
) -> EngineResult<LineView<'a>> {
    let mut loc = locate_block(blocks, block_count, cursor, number, true);

    let mut current_line = loc.current_line;
    let mut abs_number = loc.abs_line_offset;
    let mut search_pos = loc.search_pos;
    if cursor.predicted_line_num == Some(number) {
        abs_number = cursor.predicted_abs_line_num;
        current_line = number;
        search_pos = cursor.predicted_line_pos;
    }
    let base_pos = blocks[loc.block_idx].byte_offset;
    let scan_size = blocks[loc.block_idx].size - (search_pos - base_pos);
    let bytes = &mem[search_pos as usize..(search_pos + scan_size) as usize];

    let mut scratch = scanner.alloc_scratch();
    let mut last_hit = 0u64;
    let mut length = 0u32;
    let mut pattern_match = false;
    scanner.scan(bytes, &mut scratch, &mut |id, _from, to| {
        if id == EOL_ID {
            if pattern_match && current_line == number {
                length = (to - last_hit - 1) as u32;
                return ScanControl::Terminate;
            }
            if pattern_match {
                current_line += 1;
            }
            last_hit = to;
            abs_number += 1;
            pattern_match = false;
        } else {
            pattern_match = true;
        }
        ScanControl::Continue
    });

    finish(mem, cursor, &mut loc, number, abs_number, search_pos, last_hit, length, false)
}

/// Filtered-with-scope retrieval over a block that has at least one match. Mirrors the
/// match-line / before-context / after-context branching of the original engine.
#[allow(clippy::too_many_arguments)]
fn get_line_scoped_matched<'a>(
    mem: &'a [u8],
    blocks: &[Block],
    block_count: usize,
    cursor: &mut Cursor,
    scanner: &FilterScanner,
    before: &mut ScopeTracker<MAX_SCOPE_BEFORE>,
    after: &mut ScopeTracker<MAX_SCOPE_AFTER>,
    number: u32,
) -> EngineResult<LineView<'a>> {
    let mut loc = locate_block(blocks, block_count, cursor, number, true);
    let block = &blocks[loc.block_idx];
    let borrow_tail_lines = block.borrow_tail_lines.max(0) as u32;
    let borrow_head_lines = block.borrow_head_lines.max(0) as u32;

    if loc.block_idx != cursor.recent_block {
        before.reset();
        after.reset();
    }

    let mut current_line = loc.current_line;
    let mut abs_number = loc.abs_line_offset;
    let mut search_pos = loc.search_pos;
    if cursor.predicted_line_num == Some(number) {
        abs_number = cursor.predicted_abs_line_num;
        current_line = number;
        search_pos = cursor.predicted_line_pos;
    } else {
        before.reset();
        after.reset();
    }

    let base_pos = blocks[loc.block_idx].byte_offset;
    let scan_size = blocks[loc.block_idx].size - (search_pos - base_pos);
    let bytes = &mem[search_pos as usize..(search_pos + scan_size) as usize];

    let mut last_hit = 0u64;
    let mut length = 0u32;
    let mut scope = false;
    let mut line_found = false;

    if before.has_base_line() {
        if !before.is_empty() {
            let (pos, len) = before.pop_scope().expect("checked non-empty");
            last_hit = pos - search_pos;
            length = len;
            scope = true;
            line_found = true;
        } else {
            let (pos, len) = before.pop_base_line().expect("checked has_base_line");
            last_hit = pos - search_pos;
            length = len;
            scope = false;
            line_found = true;
            before.reset();
        }
    } else if current_line > loc.line_offset.saturating_sub(borrow_head_lines) && before.count() > 0 {
        let (pos, len) = before.pop_scope().expect("checked count > 0");
        last_hit = pos - search_pos;
        length = len;
        scope = true;
        line_found = true;
    }

    if !line_found {
        let mut scratch = scanner.alloc_scratch();
        let mut pattern_match = false;
        let base_line = loc.base_line;
        scanner.scan(bytes, &mut scratch, &mut |id, _from, to| {
            if id == EOL_ID {
                if pattern_match {
                    let scope_base_line = current_line + before.count() as u32;
                    after.reset();
                    after.push_base_line(scope_base_line, last_hit + search_pos, (to - last_hit - 1) as u32);
                    before.push_base_line(scope_base_line, last_hit + search_pos, (to - last_hit - 1) as u32);

                    if before.count() > 0 {
                        abs_number -= before.count() as u32;
                        while let Some((pos, len)) = before.pop_scope() {
                            if current_line == number {
                                last_hit = pos - search_pos;
                                length = len;
                                scope = true;
                                return ScanControl::Terminate;
                            }
                            current_line += 1;
                            abs_number += 1;
                        }
                    }
                    before.reset();

                    if current_line == number {
                        length = (to - last_hit - 1) as u32;
                        scope = false;
                        return ScanControl::Terminate;
                    }
                    current_line += 1;
                } else {
                    let len = (to - last_hit - 1) as u32;
                    if after.has_base_line() {
                        if !after.is_full() {
                            if !after.push_scope(last_hit + search_pos, len) {
                                after.reset();
                            }
                            if current_line == number {
                                length = len;
                                scope = true;
                                return ScanControl::Terminate;
                            }
                            current_line += 1;
                        } else {
                            before.push_scope(last_hit + search_pos, len);
                        }
                    } else if current_line < base_line + borrow_tail_lines {
                        if current_line == number {
                            length = (to - last_hit - 1) as u32;
                            scope = true;
                            return ScanControl::Terminate;
                        }
                        current_line += 1;
                    } else {
                        before.push_scope(last_hit + search_pos, len);
                    }
                }
                last_hit = to;
                abs_number += 1;
                pattern_match = false;
            } else {
                pattern_match = true;
            }
            ScanControl::Continue
        });

        if borrow_head_lines > 0 {
            if let Some((pos, len)) = before.pop_scope() {
                last_hit = pos - search_pos;
                length = len;
                scope = true;
            }
        }
    }

    finish(mem, cursor, &mut loc, number, abs_number, search_pos, last_hit, length, scope)
}

/// Filtered-with-scope retrieval over a block with no matches of its own: every visible
/// line is either borrowed from a neighbour's match, or a candidate to lend onward.
#[allow(clippy::too_many_arguments)]
fn get_line_scoped_unmatched<'a>(
    mem: &'a [u8],
    blocks: &[Block],
    block_count: usize,
    cursor: &mut Cursor,
    eol: &EolScanner,
    before: &mut ScopeTracker<MAX_SCOPE_BEFORE>,
    number: u32,
) -> EngineResult<LineView<'a>> {
    let mut loc = locate_block(blocks, block_count, cursor, number, true);
    let block = &blocks[loc.block_idx];
    let borrow_tail_lines = block.borrow_tail_lines.max(0) as u32;
    let borrow_head_lines = block.borrow_head_lines.max(0) as u32;

    if loc.block_idx != cursor.recent_block {
        before.reset();
    }

    let mut current_line = loc.current_line;
    let mut abs_number = loc.abs_line_offset;
    let mut search_pos = loc.search_pos;
    if cursor.predicted_line_num == Some(number) {
        abs_number = cursor.predicted_abs_line_num;
        current_line = number;
        search_pos = cursor.predicted_line_pos;
    } else {
        before.reset();
    }

    let base_pos = blocks[loc.block_idx].byte_offset;
    let scan_size = blocks[loc.block_idx].size - (search_pos - base_pos);
    let bytes = &mem[search_pos as usize..(search_pos + scan_size) as usize];

    let mut last_hit = 0u64;
    let mut length = 0u32;
    let mut scope = false;
    let mut line_found = false;

    if current_line > loc.line_offset.saturating_sub(borrow_head_lines) && before.count() > 0 {
        let (pos, len) = before.pop_scope().expect("checked count > 0");
        last_hit = pos - search_pos;
        length = len;
        scope = true;
        line_found = true;
    }

    if !line_found {
        let mut scratch = eol.alloc_scratch();
        let base_line = loc.base_line;
        eol.scan(bytes, &mut scratch, &mut |_id, _from, to| {
            let len = (to - last_hit - 1) as u32;
            if current_line < base_line + borrow_tail_lines {
                if current_line == number {
                    length = len;
                    scope = true;
                    return ScanControl::Terminate;
                }
                current_line += 1;
            }
            if borrow_head_lines > 0 {
                before.push_scope(last_hit + search_pos, len);
            }
            last_hit = to;
            abs_number += 1;
            ScanControl::Continue
        });

        if borrow_head_lines > 0 {
            if let Some((pos, len)) = before.pop_scope() {
                last_hit = pos - search_pos;
                length = len;
                scope = true;
            }
        }
    }

    finish(mem, cursor, &mut loc, number, abs_number, search_pos, last_hit, length, scope)
}

#[allow(clippy::too_many_arguments)]
fn finish<'a>(
    mem: &'a [u8],
    cursor: &mut Cursor,
    loc: &mut Located,
    number: u32,
    abs_number: u32,
    search_pos: u64,
    last_hit: u64,
    mut length: u32,
    scope: bool,
) -> EngineResult<LineView<'a>> {
    let line_start = (search_pos + last_hit) as usize;
    let raw_length = length;

    if length > 0 && mem[line_start + length as usize - 1] == b'\r' {
        length -= 1;
    }

    cursor.predicted_line_pos = search_pos + last_hit + raw_length as u64 + 1;
    cursor.predicted_abs_line_num = abs_number + 1;
    cursor.predicted_line_num = Some(number + 1);
    cursor.recent_block = loc.block_idx;
    cursor.recent_line_offset = loc.line_offset;
    cursor.recent_abs_line_offset = loc.abs_line_offset;

    Ok(LineView {
        line: &mem[line_start..line_start + length as usize],
        number: abs_number,
        scope,
    })
}

/// Retrieves the `number`-th visible line under the engine's current view (0-based:
/// absolute line index when unfiltered, filtered-line index when filtered).
#[allow(clippy::too_many_arguments)]
pub fn get_line<'a>(
    mem: &'a [u8],
    blocks: &[Block],
    block_count: usize,
    filtered: bool,
    scope_before: u32,
    scope_after: u32,
    cursor: &mut Cursor,
    eol: &EolScanner,
    filter: Option<&FilterScanner>,
    before_trackers: &mut [ScopeTracker<MAX_SCOPE_BEFORE>],
    after_trackers: &mut [ScopeTracker<MAX_SCOPE_AFTER>],
    number: u32,
) -> EngineResult<LineView<'a>> {
    if !filtered {
        return get_line_unfiltered(mem, blocks, block_count, cursor, eol, number);
    }
    let scanner = filter.ok_or(EngineError::InvalidContext)?;

    if scope_before == 0 && scope_after == 0 {
        return get_line_filtered_no_scope(mem, blocks, block_count, cursor, scanner, number);
    }

    // Scope-aware retrieval needs the block index before we can borrow its trackers;
    // peek it without mutating the cursor's prediction state.
    let mut probe = *cursor;
    let peek = locate_block(blocks, block_count, &mut probe, number, true);
    let block_idx = peek.block_idx;

    if blocks[block_idx].filtered_lines > 0 {
        get_line_scoped_matched(
            mem,
            blocks,
            block_count,
            cursor,
            scanner,
            &mut before_trackers[block_idx],
            &mut after_trackers[block_idx],
            number,
        )
    } else {
        get_line_scoped_unmatched(
            mem,
            blocks,
            block_count,
            cursor,
            eol,
            &mut before_trackers[block_idx],
            number,
        )
    }
}

/// Maps an absolute (unfiltered) line number back to its row in the current view.
/// Only meaningful when unfiltered — the original engine leaves this case unimplemented
/// upstream, so a filtered view reports `NotSupported` rather than guessing.
pub fn get_row_for_abs_line(filtered: bool, abs_line: u32) -> EngineResult<u32> {
    if filtered {
        Err(EngineError::NotSupported)
    } else {
        Ok(abs_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::filter::filter_block;
    use crate::engine::indexer::fetch_block;
    use crate::engine::merge::merge_scope;
    use crate::tracker::TrackingPolicy;

    fn single_block(data: &[u8]) -> Block {
        Block { active: true, size: data.len() as u64, ..Default::default() }
    }

    #[test]
    fn unfiltered_sequential_access_matches_source_lines() {
        let data = b"alpha\nbeta\ngamma\n";
        let mut blocks = vec![single_block(data)];
        fetch_block(data, &mut blocks[0], &EolScanner);
        let mut cursor = Cursor::default();

        for (i, expected) in ["alpha", "beta", "gamma"].iter().enumerate() {
            let view =
                get_line_unfiltered(data, &blocks, 1, &mut cursor, &EolScanner, i as u32).unwrap();
            assert_eq!(view.line, expected.as_bytes());
            assert_eq!(view.number, i as u32);
            assert!(!view.scope);
        }
    }

    #[test]
    fn unfiltered_crlf_trims_trailing_carriage_return() {
        let data = b"alpha\r\nbeta\r\n";
        let mut blocks = vec![single_block(data)];
        fetch_block(data, &mut blocks[0], &EolScanner);
        let mut cursor = Cursor::default();
        let view = get_line_unfiltered(data, &blocks, 1, &mut cursor, &EolScanner, 0).unwrap();
        assert_eq!(view.line, b"alpha");
    }

    #[test]
    fn filtered_no_scope_returns_only_match_lines() {
        let data = b"one\nerr: x\ntwo\nerr: y\nthree\n";
        let scanner = FilterScanner::compile("^err", false).unwrap();
        let mut blocks = vec![single_block(data)];
        let mut before = ScopeTracker::<MAX_SCOPE_BEFORE>::new(TrackingPolicy::Ring);
        let mut after = ScopeTracker::<MAX_SCOPE_AFTER>::new(TrackingPolicy::Fixed);
        filter_block(data, &mut blocks[0], &scanner, &mut before, &mut after, 0, 0);

        let mut cursor = Cursor::default();
        let first =
            get_line_filtered_no_scope(data, &blocks, 1, &mut cursor, &scanner, 0).unwrap();
        assert_eq!(first.line, b"err: x");
        let second =
            get_line_filtered_no_scope(data, &blocks, 1, &mut cursor, &scanner, 1).unwrap();
        assert_eq!(second.line, b"err: y");
    }

    #[test]
    fn filtered_with_scope_emits_context_around_matches_in_order() {
        let data = b"one\nerr: x\ntwo\nerr: y\nthree\n";
        let scanner = FilterScanner::compile("^err", false).unwrap();
        let mut blocks = vec![single_block(data)];
        let mut before_trackers = vec![ScopeTracker::<MAX_SCOPE_BEFORE>::new(TrackingPolicy::Ring)];
        let mut after_trackers = vec![ScopeTracker::<MAX_SCOPE_AFTER>::new(TrackingPolicy::Fixed)];
        before_trackers[0].set_size(1);
        after_trackers[0].set_size(1);
        filter_block(data, &mut blocks[0], &scanner, &mut before_trackers[0], &mut after_trackers[0], 1, 1);

        let mut cursor = Cursor::default();
        let expected: [(&[u8], bool); 5] = [
            (b"one", true),
            (b"err: x", false),
            (b"two", true),
            (b"err: y", false),
            (b"three", true),
        ];
        for (i, (text, scope)) in expected.iter().enumerate() {
            let view = get_line(
                data,
                &blocks,
                1,
                true,
                1,
                1,
                &mut cursor,
                &EolScanner,
                Some(&scanner),
                &mut before_trackers,
                &mut after_trackers,
                i as u32,
            )
            .unwrap();
            assert_eq!(view.line, *text, "line {i}");
            assert_eq!(view.scope, *scope, "line {i}");
        }
    }

    #[test]
    fn cross_block_borrowed_scope_line_is_emitted_before_the_match() {
        // Block 0: 5 plain lines, no match. Block 1: first line matches, scope B=2.
        let data0 = b"a\nb\nc\nd\ne\n";
        let data1 = b"err: hit\nf\ng\n";
        let mut mem = Vec::new();
        mem.extend_from_slice(data0);
        mem.extend_from_slice(data1);

        let mut blocks = vec![
            Block { active: true, byte_offset: 0, size: data0.len() as u64, ..Default::default() },
            Block { active: true, byte_offset: data0.len() as u64, size: data1.len() as u64, ..Default::default() },
        ];
        let scanner = FilterScanner::compile("^err", false).unwrap();
        let mut before_trackers = vec![
            ScopeTracker::<MAX_SCOPE_BEFORE>::new(TrackingPolicy::Ring),
            ScopeTracker::<MAX_SCOPE_BEFORE>::new(TrackingPolicy::Ring),
        ];
        let mut after_trackers = vec![
            ScopeTracker::<MAX_SCOPE_AFTER>::new(TrackingPolicy::Fixed),
            ScopeTracker::<MAX_SCOPE_AFTER>::new(TrackingPolicy::Fixed),
        ];
        before_trackers[0].set_size(2);
        after_trackers[0].set_size(2);
        before_trackers[1].set_size(2);
        after_trackers[1].set_size(2);

        filter_block(&mem, &mut blocks[0], &scanner, &mut before_trackers[0], &mut after_trackers[0], 2, 2);
        filter_block(&mem, &mut blocks[1], &scanner, &mut before_trackers[1], &mut after_trackers[1], 2, 2);
        merge_scope(&mut blocks, &mut before_trackers, &mut after_trackers, 2);

        assert_eq!(blocks[0].borrow_head_lines, 2);

        let mut cursor = Cursor::default();
        // Lines d, e are block 0's last two lines, lent upward as block 1's before-context.
        let expected: [(&[u8], bool); 3] = [(b"d", true), (b"e", true), (b"err: hit", false)];
        for (i, (text, scope)) in expected.iter().enumerate() {
            let view = get_line(
                &mem,
                &blocks,
                2,
                true,
                2,
                2,
                &mut cursor,
                &EolScanner,
                Some(&scanner),
                &mut before_trackers,
                &mut after_trackers,
                i as u32,
            )
            .unwrap();
            assert_eq!(view.line, *text, "line {i}");
            assert_eq!(view.scope, *scope, "line {i}");
        }
    }

    #[test]
    fn get_row_for_abs_line_is_identity_when_unfiltered_and_unsupported_when_filtered() {
        assert_eq!(get_row_for_abs_line(false, 42).unwrap(), 42);
        assert!(get_row_for_abs_line(true, 42).unwrap_err().is_not_supported());
    }
}

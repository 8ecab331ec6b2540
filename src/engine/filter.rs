//! Per-block pattern + scope accounting (`filter`).

use crate::block::Block;
use crate::constants::{EOL_ID, MAX_SCOPE_AFTER, MAX_SCOPE_BEFORE};
use crate::engine::indexer::BlockInfo;
use crate::scanner::{ByteScanner, FilterScanner, ScanControl};
use crate::tracker::ScopeTracker;

/// Scans `block`'s byte range against the filter database, counting matching and scope
/// lines and classifying spare head/tail lines for cross-block borrowing (see
/// `engine::merge`). `before`/`after` must be the tracker pair owned by this block index;
/// they are reset and repopulated by this call.
#[allow(clippy::too_many_arguments)]
pub fn filter_block(
    mem: &[u8],
    block: &mut Block,
    scanner: &FilterScanner,
    before: &mut ScopeTracker<MAX_SCOPE_BEFORE>,
    after: &mut ScopeTracker<MAX_SCOPE_AFTER>,
    scope_before: u32,
    scope_after: u32,
) -> BlockInfo {
    let start = block.byte_offset as usize;
    let end = start + block.size as usize;
    let bytes = &mem[start..end];

    block.reset_filter_state();
    before.reset();
    after.reset();

    let mut scratch = scanner.alloc_scratch();
    let mut max_length = 0u32;
    let mut last_hit = 0u64;
    let mut pattern_match = false;

    if scope_before == 0 && scope_after == 0 {
        scanner.scan(bytes, &mut scratch, &mut |id, _from, to| {
            if id == EOL_ID {
                if pattern_match {
                    let len = (to - last_hit - 1) as u32;
                    max_length = max_length.max(len);
                    block.filtered_lines += 1;
                }
                last_hit = to;
                pattern_match = false;
            } else {
                pattern_match = true;
            }
            ScanControl::Continue
        });

        return BlockInfo { lines: block.filtered_lines, max_length };
    }

    scanner.scan(bytes, &mut scratch, &mut |id, _from, to| {
        if id == EOL_ID {
            let len = (to - last_hit - 1) as u32;
            if pattern_match {
                max_length = max_length.max(len);
                if block.filtered_lines == 0 {
                    // First match in the block: the run of non-match lines seen so far
                    // becomes a candidate to lend to the previous block's after-context.
                    max_length = max_length.max(before.max_length());
                    block.scope_lines += before.count() as u32;
                    block.head_lines = block.tail_lines;
                } else {
                    max_length = max_length.max(after.max_length()).max(before.max_length());
                    block.scope_lines += (before.count() + after.count()) as u32;
                }
                block.tail_lines = 0;
                block.filtered_lines += 1;
                before.reset();
                after.reset();
            } else if block.filtered_lines > 0 {
                if !after.is_full() {
                    after.push_scope(last_hit, len);
                } else {
                    // After-context is full: further non-match lines become candidate
                    // before-context for the *next* match (preserved source behavior).
                    before.push_scope(last_hit, len);
                }
                block.tail_lines += 1;
            } else {
                before.push_scope(last_hit, len);
                block.tail_lines += 1;
            }
            last_hit = to;
            pattern_match = false;
        } else {
            pattern_match = true;
        }
        ScanControl::Continue
    });

    max_length = max_length.max(after.max_length());
    if block.filtered_lines > 0 {
        block.scope_lines += after.count() as u32;
    }
    block.head_lines = if block.filtered_lines > 0 {
        block.head_lines - scope_before as i32
    } else {
        block.tail_lines
    };
    block.tail_lines = if block.filtered_lines > 0 { block.tail_lines - scope_after as i32 } else { 0 };
    block.filtered_lines += block.scope_lines;

    BlockInfo { lines: block.filtered_lines, max_length }
}

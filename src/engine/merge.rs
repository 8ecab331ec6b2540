//! Cross-block scope reconciliation (`mergeScope`).

use crate::block::Block;
use crate::constants::{MAX_SCOPE_AFTER, MAX_SCOPE_BEFORE};
use crate::tracker::ScopeTracker;

/// Walks adjacent block pairs left-to-right, computing how many lines each block must
/// borrow from (or lend to) its neighbour to satisfy scope across the boundary.
/// Growing a tracker's effective size here is safe because `filter_block` always resets
/// trackers before repopulating them, and `get_line` reads the grown capacity only after
/// `merge_scope` has run.
///
/// Returns the total number of borrowed/lent lines, to be added to the caller's running
/// globally-visible filtered-line count.
pub fn merge_scope(
    blocks: &mut [Block],
    before_trackers: &mut [ScopeTracker<MAX_SCOPE_BEFORE>],
    after_trackers: &mut [ScopeTracker<MAX_SCOPE_AFTER>],
    block_count: usize,
) -> u32 {
    let mut extra_lines: u32 = 0;
    let mut carry: i32 = 0;

    for i in 1..block_count {
        let head_lines = blocks[i].head_lines;
        let tail_lines = if blocks[i - 1].filtered_lines > 0 {
            blocks[i - 1].tail_lines
        } else {
            blocks[i - 1].head_lines - carry
        };
        let lines_left = head_lines + tail_lines;

        carry = 0;
        if tail_lines < 0 {
            // Block i-1's tail runs short; block i lends `carry` of its own head
            // lines to serve as the previous block's after-context.
            carry = if lines_left > 0 {
                head_lines - lines_left
            } else if head_lines > 0 {
                head_lines
            } else {
                0
            };
            blocks[i].borrow_tail_lines = carry;
            if before_trackers[i].size() < carry as usize {
                before_trackers[i].set_size(carry as usize);
            }
        } else if head_lines < 0 {
            // Block i's head runs short; block i-1 lends `carry` of its own tail
            // lines to serve as the next block's before-context.
            carry = if lines_left > 0 {
                tail_lines - lines_left
            } else if tail_lines > 0 {
                tail_lines
            } else {
                0
            };
            blocks[i - 1].borrow_head_lines = carry;
            if after_trackers[i - 1].size() < carry as usize {
                after_trackers[i - 1].set_size(carry as usize);
            }
        }

        extra_lines += carry.max(0) as u32;
    }

    extra_lines
}

//! A single partitioned byte range of the mapped file and its per-block bookkeeping.

/// One newline-aligned slice of the mapped file, plus the counters `fetch`/`filter`/
/// `merge_scope` maintain for it.
#[derive(Debug, Clone, Copy)]
pub struct Block {
    pub active: bool,
    /// Start of this block's half-open byte range within the mapped file.
    pub byte_offset: u64,
    /// Length, in bytes, of this block's range.
    pub size: u64,

    /// Total newlines in the block, set by `fetch`.
    pub lines: u32,

    /// Pattern-matching lines plus scope lines, set by `filter`.
    pub filtered_lines: u32,
    /// Of `filtered_lines`, how many are scope (context) lines rather than matches.
    pub scope_lines: u32,

    /// Signed spare ("lendable") or deficit ("needs borrowing") line count at the head
    /// of the block's own filtered view; written by `filter`, consumed by `merge_scope`.
    pub head_lines: i32,
    /// As `head_lines`, at the tail of the block.
    pub tail_lines: i32,

    /// Lines this block lends, from its own tail, to serve as the *next* block's
    /// before-context (set when the next block's own head runs short). Set exclusively
    /// by `merge_scope`, read exclusively by `get_line` against this block's own index.
    pub borrow_head_lines: i32,
    /// Lines this block lends, from its own head, to serve as the *previous* block's
    /// after-context (set when the previous block's own tail runs short). Set
    /// exclusively by `merge_scope`, read exclusively by `get_line`.
    pub borrow_tail_lines: i32,
}

impl Default for Block {
    fn default() -> Self {
        Self {
            active: false,
            byte_offset: 0,
            size: 0,
            lines: 0,
            filtered_lines: 0,
            scope_lines: 0,
            head_lines: 0,
            tail_lines: 0,
            borrow_head_lines: 0,
            borrow_tail_lines: 0,
        }
    }
}

impl Block {
    /// Number of lines this block presents to `get_line` in the current view.
    pub fn visible_lines(&self, filtered: bool) -> u32 {
        if filtered {
            (self.filtered_lines as i64 + self.borrow_head_lines as i64 + self.borrow_tail_lines as i64)
                .max(0) as u32
        } else {
            self.lines
        }
    }

    /// Clears everything `filter`/`merge_scope` compute, leaving partitioning fields
    /// (`byte_offset`, `size`) and the plain `lines` count from `fetch` untouched.
    pub fn reset_filter_state(&mut self) {
        self.filtered_lines = 0;
        self.scope_lines = 0;
        self.head_lines = 0;
        self.tail_lines = 0;
        self.borrow_head_lines = 0;
        self.borrow_tail_lines = 0;
    }
}

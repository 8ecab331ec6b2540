//! Per-block newline counting (`fetch`).

use crate::block::Block;
use crate::scanner::{ByteScanner, EolScanner, ScanControl};

/// Result of indexing or filtering a single block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockInfo {
    pub lines: u32,
    pub max_length: u32,
}

/// Counts newlines and the longest line in `block`'s byte range, recording the result
/// into `block.lines`. Safe to call concurrently for distinct blocks (each call
/// allocates its own scratch and touches only the `block` it was given).
pub fn fetch_block(mem: &[u8], block: &mut Block, scanner: &EolScanner) -> BlockInfo {
    let start = block.byte_offset as usize;
    let end = start + block.size as usize;
    let bytes = &mem[start..end];

    let mut scratch = scanner.alloc_scratch();
    let mut lines = 0u32;
    let mut max_length = 0u32;
    let mut last_hit = 0u64;

    scanner.scan(bytes, &mut scratch, &mut |_id, _from, to| {
        let len = (to - last_hit - 1) as u32;
        max_length = max_length.max(len);
        last_hit = to;
        lines += 1;
        ScanControl::Continue
    });

    block.lines = lines;
    BlockInfo { lines, max_length }
}

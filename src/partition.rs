//! Divides a mapped file into newline-aligned blocks (`formatBlocks`).

use crate::block::Block;
use crate::constants::{MAX_BLOCK_COUNT, SINGLE_BLOCK_THRESHOLD};

/// Partitions `mem` into up to `MAX_BLOCK_COUNT` blocks, each ending immediately after a
/// `\n` (except the last, which absorbs whatever remains, including an unterminated
/// final line). Files at or under [`SINGLE_BLOCK_THRESHOLD`] are kept as a single block.
///
/// `concurrency_hint` is typically the host's thread count; it is clamped to
/// `[1, MAX_BLOCK_COUNT]`.
///
/// Returns the populated block array and the number of active blocks.
pub fn format_blocks(mem: &[u8], concurrency_hint: usize) -> ([Block; MAX_BLOCK_COUNT], usize) {
    let mut blocks = [Block::default(); MAX_BLOCK_COUNT];
    let size = mem.len() as u64;

    if size == 0 {
        blocks[0].active = true;
        return (blocks, 1);
    }

    let block_count = if size <= SINGLE_BLOCK_THRESHOLD {
        1
    } else {
        concurrency_hint.clamp(1, MAX_BLOCK_COUNT)
    };

    blocks[0].active = true;
    blocks[0].byte_offset = 0;

    let target = size / block_count as u64;
    let mut search_from = target;

    for i in 1..block_count {
        let start = (search_from as usize).min(mem.len());
        // EOF is treated as an implicit `\n`: a boundary search that runs off the end
        // of the file resolves to `size` rather than failing.
        let found = mem[start..].iter().position(|&b| b == b'\n');
        let byte_offset = match found {
            Some(p) => (start + p + 1) as u64,
            None => size,
        };
        let byte_offset = byte_offset.clamp(blocks[i - 1].byte_offset, size);

        blocks[i].active = true;
        blocks[i].byte_offset = byte_offset;
        blocks[i - 1].size = byte_offset - blocks[i - 1].byte_offset;

        search_from += target;
    }

    blocks[block_count - 1].size = size - blocks[block_count - 1].byte_offset;

    (blocks, block_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_file_is_a_single_block() {
        let data = b"alpha\nbeta\ngamma\n";
        let (blocks, count) = format_blocks(data, 8);
        assert_eq!(count, 1);
        assert_eq!(blocks[0].byte_offset, 0);
        assert_eq!(blocks[0].size, data.len() as u64);
    }

    #[test]
    fn empty_file_is_one_empty_block() {
        let (blocks, count) = format_blocks(b"", 8);
        assert_eq!(count, 1);
        assert_eq!(blocks[0].size, 0);
    }

    #[test]
    fn large_file_partitions_on_newline_boundaries() {
        let mut data = Vec::new();
        for i in 0..200_000u32 {
            data.extend_from_slice(format!("line {i}\n").as_bytes());
        }
        let (blocks, count) = format_blocks(&data, 4);
        assert!(count > 1);
        let mut offset = 0u64;
        for block in blocks.iter().take(count) {
            assert_eq!(block.byte_offset, offset);
            assert!(block.byte_offset == 0 || data[block.byte_offset as usize - 1] == b'\n');
            offset += block.size;
        }
        assert_eq!(offset, data.len() as u64);
    }

    #[test]
    fn unterminated_final_line_is_absorbed_by_last_block() {
        let data = b"a\nbb\nccc";
        let (blocks, count) = format_blocks(data, 8);
        let last = count - 1;
        assert_eq!(blocks[last].byte_offset + blocks[last].size, data.len() as u64);
    }
}

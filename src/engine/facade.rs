//! The public engine: owns the memory map, the block/tracker arrays, and the cursor,
//! and exposes the per-block operations as a single coherent lifecycle.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tracing::{debug, info, trace, warn};

use crate::block::Block;
use crate::constants::{MAX_SCOPE_AFTER, MAX_SCOPE_BEFORE};
use crate::engine::filter::filter_block;
use crate::engine::indexer::{fetch_block, BlockInfo};
use crate::engine::locator::{self, Cursor, LineView};
use crate::engine::merge::merge_scope;
use crate::error::{EngineError, EngineResult};
use crate::metrics::EngineMetrics;
use crate::scanner::{EolScanner, FilterScanner};
use crate::tracker::{ScopeTracker, TrackingPolicy};

/// Tunables that shape a freshly-constructed [`Engine`] before any file is opened.
///
/// A thin builder rather than a config-file layer: this engine has no persisted
/// settings, so there is nothing here for `serde`/`config` to load from disk.
#[derive(Debug, Clone, Copy)]
pub struct ScopeConfig {
    pub concurrency_hint: usize,
    pub ignore_case: bool,
    pub scope_before: u32,
    pub scope_after: u32,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            concurrency_hint: num_cpus::get(),
            ignore_case: false,
            scope_before: 0,
            scope_after: 0,
        }
    }
}

impl ScopeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn concurrency_hint(mut self, hint: usize) -> Self {
        self.concurrency_hint = hint;
        self
    }

    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    pub fn scope(mut self, before: u32, after: u32) -> Self {
        self.scope_before = before;
        self.scope_after = after;
        self
    }
}

/// A memory-mapped file, partitioned into blocks, with optional pattern filtering and
/// scope (before/after context) support. This is the library's main entry point.
pub struct Engine {
    mmap: Mmap,
    blocks: Vec<Block>,
    block_count: usize,
    before_trackers: Vec<ScopeTracker<MAX_SCOPE_BEFORE>>,
    after_trackers: Vec<ScopeTracker<MAX_SCOPE_AFTER>>,
    eol_scanner: EolScanner,
    filter_scanner: Option<FilterScanner>,
    filtered: bool,
    ignore_case: bool,
    scope_before: u32,
    scope_after: u32,
    cursor: Cursor,
    filtered_line_total: u32,
    metrics: EngineMetrics,
}

impl Engine {
    /// Opens and memory-maps `path`, and partitions it into blocks (`init` + `formatBlocks`).
    /// Callers must still invoke [`Engine::fetch_all`] (or `par_fetch_all`) before reading
    /// lines in unfiltered mode.
    pub fn open(path: impl AsRef<Path>, config: ScopeConfig) -> EngineResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(EngineError::FileOpenFailed)?;
        let meta = file.metadata().map_err(EngineError::FileStatFailed)?;
        let size = meta.len();

        // SAFETY: the file is opened read-only and the mapping is read-only; the usual
        // caveat applies that external truncation of the file while mapped is UB, which
        // this engine (like its source) does not guard against.
        let mmap = unsafe { Mmap::map(&file) }.map_err(EngineError::FileMapFailed)?;

        let metrics = EngineMetrics::new();
        metrics.record_mapping(size);
        info!(path = %path.display(), bytes = size, "mapped file");

        let (block_array, block_count) = crate::partition::format_blocks(&mmap, config.concurrency_hint);
        debug!(block_count, "partitioned into blocks");

        let blocks = block_array[..block_count].to_vec();
        let before_trackers = (0..block_count)
            .map(|_| {
                let mut t = ScopeTracker::<MAX_SCOPE_BEFORE>::new(TrackingPolicy::Ring);
                t.set_size(config.scope_before as usize);
                t
            })
            .collect();
        let after_trackers = (0..block_count)
            .map(|_| {
                let mut t = ScopeTracker::<MAX_SCOPE_AFTER>::new(TrackingPolicy::Fixed);
                t.set_size(config.scope_after as usize);
                t
            })
            .collect();

        Ok(Self {
            mmap,
            blocks,
            block_count,
            before_trackers,
            after_trackers,
            eol_scanner: EolScanner,
            filter_scanner: None,
            filtered: false,
            ignore_case: config.ignore_case,
            scope_before: config.scope_before,
            scope_after: config.scope_after,
            cursor: Cursor::default(),
            filtered_line_total: 0,
            metrics,
        })
    }

    /// Total mapped file size in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.mmap.len() as u64
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    pub fn is_filtered(&self) -> bool {
        self.filtered
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Counts lines in a single block (`fetch`).
    pub fn fetch(&mut self, block_idx: usize) -> EngineResult<BlockInfo> {
        self.check_block(block_idx)?;
        let info = fetch_block(&self.mmap, &mut self.blocks[block_idx], &self.eol_scanner);
        self.metrics.record_fetch(info.lines);
        Ok(info)
    }

    /// Runs [`Engine::fetch`] over every block, sequentially.
    pub fn fetch_all(&mut self) -> EngineResult<()> {
        for idx in 0..self.block_count {
            self.fetch(idx)?;
        }
        Ok(())
    }

    /// Runs `fetch` across all blocks concurrently via `rayon`. Pure sugar over
    /// [`Engine::fetch`]'s per-block entry point — safe because disjoint `&mut Block`
    /// slices never alias.
    pub fn par_fetch_all(&mut self) -> EngineResult<()> {
        use rayon::prelude::*;
        let mem = &self.mmap;
        let eol = &self.eol_scanner;
        let metrics = self.metrics.clone();
        self.blocks[..self.block_count]
            .par_iter_mut()
            .filter(|b| b.active)
            .for_each(|block| {
                let info = fetch_block(mem, block, eol);
                metrics.record_fetch(info.lines);
            });
        Ok(())
    }

    /// Compiles and installs a user filter pattern (`setPattern`). An empty pattern
    /// disables filtering. Either way, every block's filter/scope counters and trackers
    /// are cleared and the predictive cursor is reset, so no state from a prior
    /// pattern/mode can leak into subsequent `get_line` calls.
    pub fn set_pattern(&mut self, pattern: &str) -> EngineResult<()> {
        for block in &mut self.blocks[..self.block_count] {
            block.reset_filter_state();
        }
        for t in &mut self.before_trackers[..self.block_count] {
            t.reset();
        }
        for t in &mut self.after_trackers[..self.block_count] {
            t.reset();
        }
        self.cursor.reset();

        if pattern.is_empty() {
            self.filtered = false;
            self.filter_scanner = None;
            return Ok(());
        }
        let scanner = match FilterScanner::compile(pattern, self.ignore_case) {
            Ok(scanner) => scanner,
            Err(e) => {
                warn!(pattern, error = %e, "failed to compile filter pattern");
                return Err(EngineError::InvalidPattern(e));
            }
        };
        info!(pattern, "compiled filter pattern");
        self.filter_scanner = Some(scanner);
        self.filtered = true;
        Ok(())
    }

    pub fn set_ignore_case(&mut self, ignore_case: bool) {
        self.ignore_case = ignore_case;
    }

    /// Sets the before/after context window and resizes every block's trackers to match.
    pub fn set_scope(&mut self, before: u32, after: u32) {
        self.scope_before = before;
        self.scope_after = after;
        for t in &mut self.before_trackers {
            t.set_size(before as usize);
        }
        for t in &mut self.after_trackers {
            t.set_size(after as usize);
        }
    }

    fn check_block(&self, block_idx: usize) -> EngineResult<()> {
        if block_idx >= self.block_count || !self.blocks[block_idx].active {
            return Err(EngineError::bad_block(block_idx, self.block_count));
        }
        Ok(())
    }

    /// Scans a single block against the filter pattern (`filter`). A no-op (`Ok` with a
    /// zeroed [`BlockInfo`]) when no pattern is set.
    pub fn filter(&mut self, block_idx: usize) -> EngineResult<BlockInfo> {
        let Some(scanner) = self.filter_scanner.as_ref() else {
            return Ok(BlockInfo::default());
        };
        self.check_block(block_idx)?;
        let info = filter_block(
            &self.mmap,
            &mut self.blocks[block_idx],
            scanner,
            &mut self.before_trackers[block_idx],
            &mut self.after_trackers[block_idx],
            self.scope_before,
            self.scope_after,
        );
        self.metrics.record_filter(info.lines);
        Ok(info)
    }

    /// Runs [`Engine::filter`] over every block, sequentially.
    pub fn filter_all(&mut self) -> EngineResult<()> {
        for idx in 0..self.block_count {
            self.filter(idx)?;
        }
        Ok(())
    }

    /// Runs `filter` across all blocks concurrently via `rayon`.
    pub fn par_filter_all(&mut self) -> EngineResult<()> {
        let Some(scanner) = self.filter_scanner.clone() else {
            return Ok(());
        };
        use rayon::prelude::*;
        let mem = &self.mmap;
        let scope_before = self.scope_before;
        let scope_after = self.scope_after;
        let metrics = self.metrics.clone();
        self.blocks[..self.block_count]
            .iter_mut()
            .zip(self.before_trackers[..self.block_count].iter_mut())
            .zip(self.after_trackers[..self.block_count].iter_mut())
            .collect::<Vec<_>>()
            .into_par_iter()
            .filter(|((b, _), _)| b.active)
            .for_each(|((block, before), after)| {
                let info = filter_block(mem, block, &scanner, before, after, scope_before, scope_after);
                metrics.record_filter(info.lines);
            });
        Ok(())
    }

    /// Reconciles cross-block scope (`mergeScope`). Must be called once after
    /// `filter`/`filter_all`/`par_filter_all` and before any `get_line` call in scoped
    /// filtered mode.
    pub fn merge_scope(&mut self) -> EngineResult<u32> {
        let extra = merge_scope(
            &mut self.blocks[..self.block_count],
            &mut self.before_trackers[..self.block_count],
            &mut self.after_trackers[..self.block_count],
            self.block_count,
        );
        self.filtered_line_total += extra;
        debug!(extra_lines = extra, "merged cross-block scope");
        Ok(extra)
    }

    /// Retrieves the `number`-th visible line under the current view.
    pub fn get_line(&mut self, number: u32) -> EngineResult<LineView<'_>> {
        let used_predicted = self.cursor.predicts(number);
        let view = locator::get_line(
            &self.mmap,
            &self.blocks[..self.block_count],
            self.block_count,
            self.filtered,
            self.scope_before,
            self.scope_after,
            &mut self.cursor,
            &self.eol_scanner,
            self.filter_scanner.as_ref(),
            &mut self.before_trackers[..self.block_count],
            &mut self.after_trackers[..self.block_count],
            number,
        )?;
        self.metrics.record_get_line(used_predicted);
        trace!(number, used_predicted, "get_line");
        Ok(view)
    }

    /// Maps an absolute line number back to its row in the current view
    /// (`getRowForAbsLine`).
    pub fn get_row_for_abs_line(&self, abs_line: u32) -> EngineResult<u32> {
        locator::get_row_for_abs_line(self.filtered, abs_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn unfiltered_round_trip_over_small_file() {
        let file = write_temp(b"alpha\nbeta\ngamma\n");
        let mut engine = Engine::open(file.path(), ScopeConfig::new()).unwrap();
        engine.fetch_all().unwrap();
        assert_eq!(engine.block_count(), 1);
        assert_eq!(engine.get_line(0).unwrap().line, b"alpha");
        assert_eq!(engine.get_line(1).unwrap().line, b"beta");
        assert_eq!(engine.get_line(2).unwrap().line, b"gamma");
    }

    #[test]
    fn filtered_with_scope_end_to_end() {
        let file = write_temp(b"one\nerr: x\ntwo\nerr: y\nthree\n");
        let mut engine = Engine::open(file.path(), ScopeConfig::new().scope(1, 1)).unwrap();
        engine.fetch_all().unwrap();
        engine.set_pattern("^err").unwrap();
        engine.filter_all().unwrap();
        engine.merge_scope().unwrap();

        let expected: [(&[u8], bool); 5] = [
            (b"one", true),
            (b"err: x", false),
            (b"two", true),
            (b"err: y", false),
            (b"three", true),
        ];
        for (i, (text, scope)) in expected.iter().enumerate() {
            let view = engine.get_line(i as u32).unwrap();
            assert_eq!(view.line, *text);
            assert_eq!(view.scope, *scope);
        }
    }

    #[test]
    fn fetch_out_of_range_block_is_bad_block() {
        let file = write_temp(b"a\n");
        let mut engine = Engine::open(file.path(), ScopeConfig::new()).unwrap();
        let err = engine.fetch(5).unwrap_err();
        assert!(matches!(err, EngineError::BadBlock { .. }));
    }

    #[test]
    fn empty_pattern_disables_filtering() {
        let file = write_temp(b"a\nb\n");
        let mut engine = Engine::open(file.path(), ScopeConfig::new()).unwrap();
        engine.set_pattern("err").unwrap();
        assert!(engine.is_filtered());
        engine.set_pattern("").unwrap();
        assert!(!engine.is_filtered());
    }

    #[test]
    fn changing_pattern_clears_stale_block_and_cursor_state() {
        let file = write_temp(b"a\nerr: hit1\nb\nc\nerr: hit2\nd\n");
        let mut engine = Engine::open(file.path(), ScopeConfig::new().scope(2, 2)).unwrap();
        engine.fetch_all().unwrap();

        engine.set_pattern("^err").unwrap();
        engine.filter_all().unwrap();
        engine.merge_scope().unwrap();
        let _ = engine.get_line(0).unwrap();
        let _ = engine.get_line(1).unwrap();

        engine.set_pattern("^zzz").unwrap();
        for block in &engine.blocks[..engine.block_count] {
            assert_eq!(block.filtered_lines, 0);
            assert_eq!(block.scope_lines, 0);
            assert_eq!(block.head_lines, 0);
            assert_eq!(block.tail_lines, 0);
            assert_eq!(block.borrow_head_lines, 0);
            assert_eq!(block.borrow_tail_lines, 0);
        }
        assert!(!engine.cursor.predicts(0));
    }
}

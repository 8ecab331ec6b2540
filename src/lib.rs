//! Parallel, filter-and-scope-aware line indexer over a memory-mapped text file.
//!
//! Maps a file once, partitions it into newline-aligned blocks, and lets the host
//! index (`fetch`) and optionally pattern-filter (`filter`/`set_pattern`) each block
//! independently before retrieving arbitrary lines (`get_line`) with before/after
//! context, near-O(1) for sequential access.

pub mod block;
pub mod constants;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod metrics;
pub mod partition;
pub mod scanner;
pub mod tracker;

pub use block::Block;
pub use engine::{Engine, LineView};
pub use engine::facade::ScopeConfig;
pub use error::{EngineError, EngineResult};
pub use metrics::{EngineMetrics, MetricsSnapshot};

//! Fixed-size limits and pattern identifiers shared across the engine.

/// Maximum number of blocks a file is ever partitioned into.
pub const MAX_BLOCK_COUNT: usize = 40;

/// Maximum number of "before" context lines a single block may track.
pub const MAX_SCOPE_BEFORE: usize = 10;

/// Maximum number of "after" context lines a single block may track.
pub const MAX_SCOPE_AFTER: usize = 10;

/// Maximum length, in bytes, of a pattern-compile error message.
pub const MAX_ERROR_LENGTH: usize = 64;

/// Files at or under this size are kept as a single block regardless of concurrency hints.
pub const SINGLE_BLOCK_THRESHOLD: u64 = 1024 * 1024;

/// Identifies a byte-scanner match kind. The two well-known ids below mirror the
/// EOL/PATTERN pair a multi-pattern scanner database is compiled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternId(pub u32);

/// The end-of-line pattern id (matches a single `\n` byte).
pub const EOL_ID: PatternId = PatternId(0x5EE0);

/// The user-supplied filter pattern id.
pub const PATTERN_ID: PatternId = PatternId(0x5EAA);

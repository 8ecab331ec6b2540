//! The engine's error taxonomy, mirroring the stable C-style error codes one-to-one.

use std::io;

/// Everything that can go wrong while constructing or operating an [`crate::Engine`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("bad argument")]
    BadArgument,

    #[error("operation not supported")]
    NotSupported,

    #[error("invalid context")]
    InvalidContext,

    #[error("failed to open file: {0}")]
    FileOpenFailed(#[source] io::Error),

    #[error("failed to stat file: {0}")]
    FileStatFailed(#[source] io::Error),

    #[error("failed to map file: {0}")]
    FileMapFailed(#[source] io::Error),

    #[error("engine initialization failed")]
    InitFailed,

    #[error("block {block_index} out of range (block count {block_count})")]
    BadBlock { block_index: usize, block_count: usize },

    #[error("scan operation failed on block {block_index}")]
    EngineOpFailed { block_index: usize },

    #[error("invalid pattern: {0}")]
    InvalidPattern(#[source] regex::Error),

    #[error("unknown error")]
    Unknown,
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn bad_block(block_index: usize, block_count: usize) -> Self {
        Self::BadBlock { block_index, block_count }
    }

    pub fn engine_op_failed(block_index: usize) -> Self {
        Self::EngineOpFailed { block_index }
    }

    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::FileOpenFailed(_) | Self::FileStatFailed(_) | Self::FileMapFailed(_) | Self::InitFailed
        )
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported)
    }

    /// Maps onto the stable numeric C-style error taxonomy (§6/§7 of the spec).
    pub fn to_c_code(&self) -> i32 {
        match self {
            Self::BadArgument | Self::BadBlock { .. } => 1,
            Self::NotSupported => 2,
            Self::InvalidContext => 3,
            Self::FileOpenFailed(_) => 4,
            Self::FileStatFailed(_) => 5,
            Self::FileMapFailed(_) => 6,
            Self::InitFailed => 7,
            Self::EngineOpFailed { .. } => 8,
            Self::InvalidPattern(_) => 8,
            Self::Unknown => 9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_maps_to_a_stable_code() {
        let io_err = || io::Error::new(io::ErrorKind::NotFound, "nope");
        let variants: Vec<(EngineError, i32)> = vec![
            (EngineError::BadArgument, 1),
            (EngineError::bad_block(3, 2), 1),
            (EngineError::NotSupported, 2),
            (EngineError::InvalidContext, 3),
            (EngineError::FileOpenFailed(io_err()), 4),
            (EngineError::FileStatFailed(io_err()), 5),
            (EngineError::FileMapFailed(io_err()), 6),
            (EngineError::InitFailed, 7),
            (EngineError::engine_op_failed(0), 8),
            (EngineError::InvalidPattern(regex::Error::Syntax("x".into())), 8),
            (EngineError::Unknown, 9),
        ];
        for (err, expected) in variants {
            assert_eq!(err.to_c_code(), expected, "{err}");
        }
    }

    #[test]
    fn construction_errors_are_identified() {
        assert!(EngineError::InitFailed.is_construction_error());
        assert!(!EngineError::BadArgument.is_construction_error());
    }
}

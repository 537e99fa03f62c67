//! Error types for bank packing and the VQ / DeltaLZ codecs

use thiserror::Error;

/// Errors that can occur while packing or verifying compressed banks
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// VQ vector size outside {2, 4, 8, 16}
    #[error("vec_size must be 2, 4, 8, or 16, got {0}")]
    InvalidVecSize(usize),

    /// A minimal compressed unit cannot fit one 16 KB bank
    #[error("compressed unit of {0} bytes cannot fit a 16 KB bank")]
    BankOverflow(usize),

    /// Data requires more banks than the configured maximum
    #[error("data needs {needed} banks but only {max} are available")]
    TooManyBanks { needed: usize, max: usize },

    /// Compressed bank is shorter than its fixed header
    #[error("bank data too short: {0} bytes")]
    BankTooShort(usize),

    /// A literal token promised more bytes than the bank contains
    #[error("literal run overruns compressed data at offset {0}")]
    LiteralOverrun(usize),

    /// A match token is missing its offset bytes
    #[error("match token at offset {0} is truncated")]
    TruncatedMatch(usize),

    /// A match reaches outside the decoded output
    #[error("match offset {offset} invalid with {written} bytes written")]
    InvalidMatchOffset { offset: usize, written: usize },

    /// Encoder output does not decode back to its input
    #[error("round-trip verification failed: decoded stream diverges at sample {at}")]
    RoundTripMismatch { at: usize },

    /// Decode-buffer simulation found a token straddling the wrap point
    #[error("token at buffer position {buf_pos} with length {len} straddles the wrap boundary")]
    WrapStraddle { buf_pos: usize, len: usize },

    /// Decode-buffer simulation found a match source outside the valid window
    #[error("match offset {offset} reaches past the last buffer wrap ({valid} valid bytes)")]
    MatchPastWrap { offset: usize, valid: usize },
}

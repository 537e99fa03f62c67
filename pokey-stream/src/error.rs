//! Pipeline error type aggregating the member crates

use thiserror::Error;

use pokey_codec::CodecError;
use pokey_dsp::DspError;
use pokey_mads::AsmError;

/// Errors surfaced to the host application
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Option out of range or mutually exclusive
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Decoded PCM too short to fill a single compressed unit
    #[error("audio too short to encode")]
    AudioTooShort,

    /// Input exceeds capacity and strict mode is on
    #[error("audio exceeds {max} banks; {dropped} samples would be dropped (strict mode)")]
    MaxBanksExceeded { max: usize, dropped: usize },

    #[error(transparent)]
    Dsp(#[from] DspError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Assembler(#[from] AsmError),
}

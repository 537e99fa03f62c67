//! Pokey-stream: turn decoded PCM into a self-booting Atari 8-bit XEX
//!
//! The pipeline quantizes mono float PCM to POKEY level indices,
//! compresses them into 16 KB extended-memory banks (VQ, DeltaLZ, or
//! raw), generates the assembly data fragments the static player expects,
//! and assembles everything with the built-in MADS-dialect assembler into
//! an XEX binary.
//!
//! ```text
//! PCM -> resample -> dc block -> normalize -> [pre-emphasis]
//!     -> quantize -> VQ | DeltaLZ | raw banks
//!     -> generated .asm fragments + static player -> assembler -> XEX
//! ```
//!
//! Audio file decoding, CLI parsing, and disk I/O belong to the caller;
//! the crate consumes `&[f32]` samples plus an [`EncoderConfig`] and
//! produces bytes (primary) or the generated source set (secondary).
//!
//! # Example
//!
//! ```no_run
//! use pokey_stream::{encode_to_xex, EncoderConfig};
//!
//! let samples: Vec<f32> = vec![0.0; 44100];
//! let config = EncoderConfig::default();
//! let xex = encode_to_xex(&samples, 44100, &config).unwrap();
//! assert_eq!(&xex[..2], &[0xFF, 0xFF]);
//! ```

mod config;
mod error;
mod pipeline;
mod player;
pub mod project;
mod splash;

pub use config::{Compression, EncoderConfig, LzMode};
pub use error::PipelineError;
pub use pipeline::{encode_to_xex, generate_project, Project};

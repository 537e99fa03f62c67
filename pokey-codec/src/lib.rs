//! Pokey-codec: bank-sized compression for POKEY level-index streams
//!
//! Three codecs share one job: turn the quantized level-index stream into
//! payloads that fit the Atari XL/XE 16 KB extended-memory bank window and
//! that a 6502 interrupt handler can decode in real time.
//!
//! - **RAW** ([`layout`]): plain level indices, one byte per sample, banks
//!   zero-padded to size.
//! - **VQ** ([`vq`]): per-bank 256-entry codebooks of fixed-size vectors,
//!   trained with deterministic k-means. The bank holds the codebook
//!   followed by one index byte per vector.
//! - **DeltaLZ** ([`lz`]): delta transform + LZ77 with token-level
//!   guarantees about the player's 16 KB circular decode buffer, so the
//!   in-IRQ decoder never needs a wrap check on its match pointer.
//!
//! Bank encodings are independent once chunk boundaries are fixed, so VQ
//! training fans out across banks with `rayon`; every bank derives its RNG
//! seed from its own index, which keeps output byte-identical regardless
//! of thread scheduling.

mod error;
pub mod layout;
pub mod lz;
mod rng;
pub mod vq;

pub use error::CodecError;
pub use layout::{bank_portb_table, split_into_banks, BANK_BASE, BANK_SIZE, MAX_BANKS};

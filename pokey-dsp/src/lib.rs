//! Pokey-DSP: signal preparation and POKEY-level quantization for pokeystream
//!
//! This crate turns decoded mono float PCM into a stream of POKEY *level
//! indices* — the byte values the on-target player feeds through its AUDC
//! lookup tables. It is a pure transform layer: audio file decoding happens
//! upstream, bank packing and compression happen downstream.
//!
//! # Pipeline position
//!
//! ```text
//! decoded PCM ──> resample ──> dc_block ──> normalize ──> [pre-emphasis]
//!             ──> quantize (level indices, 1 byte per sample)
//! ```
//!
//! # Level model
//!
//! With `C` POKEY channels in volume-only mode the player can hold
//! `L = 15*C + 1` distinct output voltages (all channels silent up to all
//! channels at volume 15). The [`tables::LevelTable`] orders those states so
//! that consecutive indices differ in exactly one channel by exactly one
//! volume step — the *single-step* property that makes sequential AUDC
//! writes glitch-free — while the modeled analog sum stays monotone.
//!
//! # Voltage curve
//!
//! POKEY's volume DAC is nonlinear. The 16-entry curve below was measured
//! on an AMI C012294 and is the basis for quantization targets, noise
//! shaping error terms, and the monotonicity check. It is immutable shared
//! data; components take it by reference and never mutate it.

mod audio;
mod enhance;
mod quantize;
pub mod tables;

pub use audio::{
    dc_block, find_best_divisor, normalize, resample, TimerChoice, DC_CUTOFF_HZ, HEADROOM_DB,
};
pub use enhance::{
    apply_preemphasis, compress_dynamics, design_zoh_preemphasis, PREEMPHASIS_STRENGTH,
    PREEMPHASIS_TAPS,
};
pub use quantize::{quantize, quantize_1cps, quantize_shaped2};
pub use tables::LevelTable;

use thiserror::Error;

// =============================================================================
// Hardware constants
// =============================================================================

/// PAL POKEY base clock in Hz
pub const PAL_CLOCK: u32 = 1_773_447;

/// 64 kHz timer base clock (AUDCTL = $00), PAL_CLOCK / 28
pub const CLK_64K: u32 = PAL_CLOCK / 28;

/// AUDCTL value selecting the 1.79 MHz clock for channel 1
pub const AUDCTL_179: u8 = 0x40;

/// AUDCTL value selecting the 64 kHz base clock
pub const AUDCTL_64K: u8 = 0x00;

/// Maximum POKEY channels driven by the player
pub const MAX_CHANNELS: u8 = 4;

/// AUDC volume-only bit; the silence byte is exactly this value
pub const AUDC_VOLUME_ONLY: u8 = 0x10;

/// Measured single-channel volume-to-voltage curve (AMI C012294, volts)
///
/// Index is the 4-bit AUDC volume. The ladder is nonlinear: steps near the
/// top are ~1.7x the steps near the bottom.
pub const VOLTAGE_CURVE: [f32; 16] = [
    0.000_000, 0.032_677, 0.068_621, 0.101_298, 0.143_778, 0.176_455,
    0.212_399, 0.245_076, 0.300_626, 0.333_303, 0.369_247, 0.401_924,
    0.444_404, 0.477_081, 0.513_025, 0.545_702,
];

// =============================================================================
// Error type
// =============================================================================

/// Errors from table construction and signal preparation
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DspError {
    /// Channel count outside 1..=4
    #[error("invalid POKEY channel count: {0} (must be 1-4)")]
    InvalidChannelCount(u8),
}

// =============================================================================
// Level helpers
// =============================================================================

/// Maximum level index for `channels` POKEY channels (0-based)
pub fn max_level(channels: u8) -> u8 {
    15 * channels
}

/// Number of quantization levels for `channels` POKEY channels
pub fn level_count(channels: u8) -> usize {
    usize::from(max_level(channels)) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_shape() {
        assert_eq!(VOLTAGE_CURVE.len(), 16);
        assert_eq!(VOLTAGE_CURVE[0], 0.0);
        for i in 1..16 {
            assert!(VOLTAGE_CURVE[i] > VOLTAGE_CURVE[i - 1]);
        }
    }

    #[test]
    fn test_level_counts() {
        assert_eq!(level_count(1), 16);
        assert_eq!(level_count(2), 31);
        assert_eq!(level_count(3), 46);
        assert_eq!(level_count(4), 61);
    }

    #[test]
    fn test_clocks() {
        assert_eq!(PAL_CLOCK, 1_773_447);
        assert_eq!(CLK_64K, 63_337);
    }
}

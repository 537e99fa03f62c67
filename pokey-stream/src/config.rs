//! Encoder configuration
//!
//! The host application (CLI, GUI, build script) fills this struct in
//! however it likes — serde derives are provided so it can come straight
//! from a manifest file — and [`EncoderConfig::validate`] rejects
//! contradictory settings before any work starts.

use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// Compression codec selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Raw level indices, one byte per sample
    Off,
    /// Delta-coded LZ77, decoded inside the playback IRQ
    Lz,
    /// Per-bank vector quantization codebooks
    Vq,
}

/// DeltaLZ encoding mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LzMode {
    /// One level index per sample, delta transform on
    #[serde(rename = "scalar")]
    Scalar,
    /// One-channel-per-sample packed bytes, raw LZ without delta
    #[serde(rename = "1cps")]
    OneCps,
}

/// Pipeline options; see the field docs for ranges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Codec (default VQ)
    pub compression: Compression,
    /// VQ vector dimension: 2, 4, 8, or 16
    pub vec_size: usize,
    /// POKEY channels 1-4; more channels, more levels, rougher ladder
    pub channels: u8,
    /// Requested sample rate in Hz, snapped to an achievable POKEY rate
    pub rate: u32,
    /// Treble pre-emphasis compensating the DAC's sample-and-hold droop
    pub enhance: bool,
    /// Hard cap on extended-memory banks (1-64)
    pub max_banks: usize,
    /// First-order noise shaping (forced off for VQ)
    pub noise_shaping: bool,
    /// VQ silence-gate strength 0-100, percent of the level range
    pub noise_gate: u8,
    /// DeltaLZ mode
    pub mode: LzMode,
    /// Treat truncation at `max_banks` as an error instead of a warning
    pub strict: bool,
    /// Optional ceiling on the final XEX size in bytes
    pub xex_size_limit: Option<usize>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            compression: Compression::Vq,
            vec_size: 4,
            channels: 2,
            rate: 8000,
            enhance: false,
            max_banks: 64,
            noise_shaping: true,
            noise_gate: 5,
            mode: LzMode::Scalar,
            strict: false,
            xex_size_limit: None,
        }
    }
}

impl EncoderConfig {
    /// Reject out-of-range or mutually exclusive options
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(1..=4).contains(&self.channels) {
            return Err(PipelineError::InvalidConfig(format!(
                "channels must be 1-4, got {}",
                self.channels
            )));
        }
        if !matches!(self.vec_size, 2 | 4 | 8 | 16) {
            return Err(PipelineError::InvalidConfig(format!(
                "vec_size must be 2, 4, 8, or 16, got {}",
                self.vec_size
            )));
        }
        if self.compression != Compression::Vq && self.vec_size != 4 {
            return Err(PipelineError::InvalidConfig(
                "vec_size only applies to VQ compression".into(),
            ));
        }
        if self.noise_gate > 100 {
            return Err(PipelineError::InvalidConfig(format!(
                "noise_gate must be 0-100, got {}",
                self.noise_gate
            )));
        }
        if !(1..=64).contains(&self.max_banks) {
            return Err(PipelineError::InvalidConfig(format!(
                "max_banks must be 1-64, got {}",
                self.max_banks
            )));
        }
        if self.rate == 0 {
            return Err(PipelineError::InvalidConfig("rate must be positive".into()));
        }
        if self.mode == LzMode::OneCps && self.compression != Compression::Lz {
            return Err(PipelineError::InvalidConfig(
                "1cps mode only applies to LZ compression".into(),
            ));
        }
        Ok(())
    }

    /// Noise shaping is never used for VQ input; k-means cannot cluster
    /// the dither patterns
    pub fn effective_noise_shaping(&self) -> bool {
        self.noise_shaping && self.compression != Compression::Vq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        EncoderConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_bad_channels() {
        let config = EncoderConfig {
            channels: 5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_vec_size_without_vq() {
        let config = EncoderConfig {
            compression: Compression::Off,
            vec_size: 8,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        // Default vec_size with raw mode is fine
        let config = EncoderConfig {
            compression: Compression::Off,
            ..Default::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_1cps_without_lz() {
        let config = EncoderConfig {
            mode: LzMode::OneCps,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = EncoderConfig {
            compression: Compression::Lz,
            mode: LzMode::OneCps,
            ..Default::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn test_vq_forces_nearest_quantization() {
        let config = EncoderConfig::default();
        assert!(config.noise_shaping);
        assert!(!config.effective_noise_shaping());
        let config = EncoderConfig {
            compression: Compression::Lz,
            ..Default::default()
        };
        assert!(config.effective_noise_shaping());
    }
}

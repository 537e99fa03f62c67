//! Single-step level tables and AUDC lookup generation
//!
//! A [`LevelTable`] orders every reachable multi-channel volume state so
//! that each step changes exactly ONE AUDC register by exactly one volume
//! unit. The player can then move between any two consecutive levels with a
//! single register write and never passes through a spurious intermediate
//! voltage.
//!
//! Allocation fills one channel completely before advancing to the next:
//! level `s` puts `min(s, 15)` on channel 1, `min(s-15, 15)` on channel 2,
//! and so on. Each step raises exactly one volume by one, and the summed
//! modeled voltage is monotone because the measured curve is strictly
//! increasing — every step adds one positive ladder increment.

use crate::{max_level, DspError, AUDC_VOLUME_ONLY, VOLTAGE_CURVE};

/// Ordered multi-channel level table for 1-4 POKEY channels
#[derive(Debug, Clone)]
pub struct LevelTable {
    channels: u8,
    /// Summed modeled voltage per level index, ascending
    voltages: Vec<f32>,
    /// Per-channel volumes per level index; channels >= `channels` stay 0
    volumes: Vec<[u8; 4]>,
}

impl LevelTable {
    /// Build the single-step table for `channels` POKEY channels
    pub fn new(channels: u8) -> Result<Self, DspError> {
        if !(1..=4).contains(&channels) {
            return Err(DspError::InvalidChannelCount(channels));
        }

        let n_ch = usize::from(channels);
        let steps = usize::from(max_level(channels));

        let mut state = [0u8; 4];
        let mut volumes = Vec::with_capacity(steps + 1);
        let mut voltages = Vec::with_capacity(steps + 1);
        volumes.push(state);
        voltages.push(0.0);

        for k in 1..=steps {
            // Lowest channel with headroom; channel c covers levels
            // 15*c+1 ..= 15*(c+1)
            let ch = (k - 1) / 15;
            state[ch] += 1;
            volumes.push(state);
            voltages.push(summed_voltage(&state, n_ch));
        }

        Ok(Self {
            channels,
            voltages,
            volumes,
        })
    }

    /// POKEY channel count this table was built for
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Number of levels (`15 * channels + 1`)
    pub fn len(&self) -> usize {
        self.voltages.len()
    }

    /// True only for a degenerate table (never constructed here)
    pub fn is_empty(&self) -> bool {
        self.voltages.is_empty()
    }

    /// Highest level index
    pub fn max_level(&self) -> u8 {
        max_level(self.channels)
    }

    /// Modeled summed voltage at full scale
    pub fn max_voltage(&self) -> f32 {
        *self.voltages.last().unwrap()
    }

    /// Ascending summed voltages, one per level index
    pub fn voltages(&self) -> &[f32] {
        &self.voltages
    }

    /// Per-channel volumes at `level` (channels beyond the configured count
    /// read 0)
    pub fn volumes(&self, level: usize) -> [u8; 4] {
        let idx = level.min(self.volumes.len() - 1);
        self.volumes[idx]
    }

    /// 256-entry AUDC lookup table for one channel (0-based)
    ///
    /// Entries `[0, max_level]` map the level index to `volume | $10`
    /// (volume-only mode); the remainder is deterministic silence. Channels
    /// beyond the configured count yield an all-silence table so the
    /// generated project can always emit four tables.
    pub fn audc_table(&self, channel: usize) -> [u8; 256] {
        let mut table = [AUDC_VOLUME_ONLY; 256];
        if channel < usize::from(self.channels) {
            for (level, vols) in self.volumes.iter().enumerate() {
                table[level] = vols[channel] | AUDC_VOLUME_ONLY;
            }
        }
        table
    }

    /// Verify the summed modeled voltage is non-decreasing in the level index
    pub fn is_monotone(&self) -> bool {
        self.voltages.windows(2).all(|w| w[1] >= w[0])
    }
}

fn summed_voltage(state: &[u8; 4], n_ch: usize) -> f32 {
    state[..n_ch]
        .iter()
        .map(|&v| VOLTAGE_CURVE[usize::from(v)])
        .sum()
}

//! Float-to-level quantizers
//!
//! All quantizers map bipolar input in [-1, 1] affinely into the voltage
//! domain (`(x + 1) / 2 * V_max`) and pick level indices against the
//! modeled voltage table. Full-scale negative is silence, full-scale
//! positive is the top level.
//!
//! Noise shaping matters at these bit depths: plain rounding leaves the
//! quantization error correlated with the signal. First-order error
//! diffusion pushes it toward high frequencies where the reconstruction
//! filter and the ear are more forgiving. VQ input must NOT be noise
//! shaped — the dither patterns defeat k-means clustering and cost ~3 dB.

use crate::tables::LevelTable;
use crate::VOLTAGE_CURVE;

/// Quantize samples in [-1, 1] to level indices
///
/// # Arguments
/// * `samples` - mono float PCM, already normalized
/// * `table` - level table for the active channel count
/// * `noise_shaping` - first-order error diffusion on/off
pub fn quantize(samples: &[f32], table: &LevelTable, noise_shaping: bool) -> Vec<u8> {
    let voltages = table.voltages();
    let max_v = table.max_voltage();

    if !noise_shaping {
        return samples
            .iter()
            .map(|&x| nearest_level(voltages, scale(x, max_v)) as u8)
            .collect();
    }

    let mut out = Vec::with_capacity(samples.len());
    let mut error = 0.0f32;
    for &x in samples {
        let scaled = scale(x, max_v);
        let target = (scaled + error).clamp(0.0, max_v);
        let idx = nearest_level(voltages, target);
        out.push(idx as u8);
        error = scaled + error - voltages[idx];
    }
    out
}

/// Second-order noise-shaping quantizer
///
/// Two error feedback taps (1.8, -0.85) notch the shaped noise near
/// 2.5 kHz at an 8 kHz sample rate, trading noise at the band edges for
/// quiet in the range hearing is most sensitive to. The leak factor decays
/// the error state so DC offsets cannot rail the integrator.
///
/// Kept as an alternative to the default first-order shaper.
pub fn quantize_shaped2(samples: &[f32], table: &LevelTable, leak: f32) -> Vec<u8> {
    const C1: f32 = 1.8;
    const C2: f32 = -0.85;

    let voltages = table.voltages();
    let max_v = table.max_voltage();
    let mut out = Vec::with_capacity(samples.len());
    let (mut e1, mut e2) = (0.0f32, 0.0f32);

    for &x in samples {
        let scaled = scale(x, max_v);
        let target = (scaled + C1 * e1 + C2 * e2).clamp(0.0, max_v);
        let idx = nearest_level(voltages, target);
        out.push(idx as u8);
        let err = scaled + C1 * e1 + C2 * e2 - voltages[idx];
        e2 = e1 * leak;
        e1 = err * leak;
    }
    out
}

/// One-channel-per-sample quantizer
///
/// Each output byte is `(channel << 4) | volume`: the player rewrites a
/// single AUDC register per sample via indexed addressing, which is what
/// makes 12 kHz+ rates fit the IRQ budget. The encoder tracks all four
/// channel volumes and greedily picks the one rewrite whose resulting
/// summed voltage lands closest to the (optionally noise-shaped) target.
pub fn quantize_1cps(samples: &[f32], noise_shaping: bool) -> Vec<u8> {
    let max_v = 4.0 * VOLTAGE_CURVE[15];
    let mut state = [0usize; 4];
    let mut error = 0.0f32;
    let mut out = Vec::with_capacity(samples.len());

    for &x in samples {
        let scaled = scale(x, max_v);
        let target = if noise_shaping {
            (scaled + error).clamp(0.0, max_v)
        } else {
            scaled
        };

        let base: f32 = state.iter().map(|&v| VOLTAGE_CURVE[v]).sum();
        let mut best = (0usize, 0usize, f32::INFINITY, 0.0f32);
        for ch in 0..4 {
            let old = VOLTAGE_CURVE[state[ch]];
            for vol in 0..16 {
                let trial = base - old + VOLTAGE_CURVE[vol];
                let err = (trial - target).abs();
                if err < best.2 {
                    best = (ch, vol, err, trial);
                }
            }
        }

        let (ch, vol, _, total) = best;
        state[ch] = vol;
        out.push(((ch as u8) << 4) | vol as u8);
        if noise_shaping {
            error = scaled + error - total;
        }
    }
    out
}

#[inline]
fn scale(x: f32, max_v: f32) -> f32 {
    (x + 1.0) * 0.5 * max_v
}

/// Index of the table voltage nearest `v` (table is sorted ascending)
fn nearest_level(voltages: &[f32], v: f32) -> usize {
    let last = voltages.len() - 1;
    let idx = voltages.partition_point(|&t| t < v);
    if idx > last {
        return last;
    }
    if idx > 0 && (v - voltages[idx - 1]).abs() < (v - voltages[idx]).abs() {
        idx - 1
    } else {
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::LevelTable;

    #[test]
    fn test_silence_maps_to_zero() {
        let table = LevelTable::new(1).unwrap();
        let samples = vec![-1.0f32; 64];
        let idx = quantize(&samples, &table, false);
        assert!(idx.iter().all(|&i| i == 0));
    }

    #[test]
    fn test_full_scale_maps_to_top() {
        let table = LevelTable::new(1).unwrap();
        let samples = vec![1.0f32; 64];
        let idx = quantize(&samples, &table, false);
        assert!(idx.iter().all(|&i| i == 15));
    }

    #[test]
    fn test_indices_in_range() {
        for ch in 1..=4u8 {
            let table = LevelTable::new(ch).unwrap();
            let samples: Vec<f32> = (0..500).map(|i| ((i as f32) * 0.13).sin()).collect();
            for shaped in [false, true] {
                let idx = quantize(&samples, &table, shaped);
                assert!(idx.iter().all(|&i| i <= table.max_level()));
            }
        }
    }

    #[test]
    fn test_noise_shaping_tracks_dc() {
        // A mid-level DC input should dither between adjacent levels so the
        // mean voltage approaches the input, which plain rounding cannot do.
        let table = LevelTable::new(2).unwrap();
        let target = 0.31f32;
        let samples = vec![target; 4000];
        let idx = quantize(&samples, &table, true);
        let mean_v: f32 = idx
            .iter()
            .map(|&i| table.voltages()[usize::from(i)])
            .sum::<f32>()
            / idx.len() as f32;
        let want = (target + 1.0) * 0.5 * table.max_voltage();
        assert!(
            (mean_v - want).abs() < 0.004,
            "mean {} vs target {}",
            mean_v,
            want
        );
    }

    #[test]
    fn test_shaped2_stays_in_range() {
        let table = LevelTable::new(4).unwrap();
        let samples: Vec<f32> = (0..2000).map(|i| ((i as f32) * 0.01).sin() * 0.9).collect();
        let idx = quantize_shaped2(&samples, &table, 0.95);
        assert_eq!(idx.len(), samples.len());
        assert!(idx.iter().all(|&i| i <= 60));
    }

    #[test]
    fn test_1cps_byte_format() {
        let samples: Vec<f32> = (0..300).map(|i| ((i as f32) * 0.05).sin() * 0.7).collect();
        let packed = quantize_1cps(&samples, true);
        assert_eq!(packed.len(), samples.len());
        for &b in &packed {
            assert!((b >> 4) & 0x0F <= 3, "channel nibble out of range");
        }
    }

    #[test]
    fn test_1cps_silence() {
        let packed = quantize_1cps(&vec![-1.0f32; 32], false);
        // All channels start silent; silence needs no rewrites beyond vol 0
        assert!(packed.iter().all(|&b| b & 0x0F == 0));
    }
}

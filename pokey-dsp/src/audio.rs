//! Resampling, DC blocking, normalization, and POKEY timer selection
//!
//! Float-to-float preprocessing between the external audio decoder and the
//! quantizer. Everything here operates on mono f32 buffers.

use tracing::debug;

use crate::{AUDCTL_179, AUDCTL_64K, CLK_64K, PAL_CLOCK};

/// Half-width of the windowed-sinc resampling kernel, in source samples
const SINC_HALF_WIDTH: usize = 16;

/// DC-block cutoff in Hz
pub const DC_CUTOFF_HZ: f32 = 20.0;

/// Normalization headroom below 0 dBFS
pub const HEADROOM_DB: f32 = 0.5;

/// POKEY timer configuration chosen for a requested sample rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerChoice {
    /// AUDF1 divisor byte
    pub divisor: u8,
    /// Achievable IRQ rate in Hz
    pub actual_rate: f64,
    /// AUDCTL value selecting the clock ($40 = 1.79 MHz, $00 = 64 kHz)
    pub audctl: u8,
}

/// Find the POKEY timer divisor and clock closest to `target_rate`
///
/// The timer underflows at `clock / (divisor + 1)`. The 1.79 MHz channel-1
/// clock gives fine granularity down to ~6.9 kHz; below that the divisor
/// would overflow 8 bits and the 64 kHz base clock takes over.
pub fn find_best_divisor(target_rate: u32) -> TimerChoice {
    let target = f64::from(target_rate.max(1));

    let raw = f64::from(PAL_CLOCK) / target - 1.0;
    if (0.0..=255.0).contains(&raw) {
        let divisor = raw.round().clamp(0.0, 255.0) as u8;
        return TimerChoice {
            divisor,
            actual_rate: f64::from(PAL_CLOCK) / f64::from(u32::from(divisor) + 1),
            audctl: AUDCTL_179,
        };
    }

    let raw = f64::from(CLK_64K) / target - 1.0;
    let divisor = raw.round().clamp(0.0, 255.0) as u8;
    TimerChoice {
        divisor,
        actual_rate: f64::from(CLK_64K) / f64::from(u32::from(divisor) + 1),
        audctl: AUDCTL_64K,
    }
}

/// Windowed-sinc resample from `src_rate` to `dst_rate`
///
/// Hann-windowed sinc interpolation; when downsampling, the kernel cutoff
/// drops to the output Nyquist so aliasing is filtered in the same pass.
pub fn resample(input: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || input.is_empty() {
        return input.to_vec();
    }

    let ratio = f64::from(src_rate) / f64::from(dst_rate);
    let n_out = (input.len() as f64 / ratio).floor() as usize;
    // Downsampling: cut off at the destination Nyquist
    let cutoff = (f64::from(dst_rate) / f64::from(src_rate)).min(1.0) as f32;

    debug!(src_rate, dst_rate, n_out, "resampling");

    let mut out = Vec::with_capacity(n_out);
    for n in 0..n_out {
        let center = n as f64 * ratio;
        let base = center.floor() as isize;
        let mut acc = 0.0f32;
        for k in (base - SINC_HALF_WIDTH as isize + 1)..=(base + SINC_HALF_WIDTH as isize) {
            if k < 0 || k as usize >= input.len() {
                continue;
            }
            let d = (center - k as f64) as f32;
            let w = hann(d / SINC_HALF_WIDTH as f32);
            acc += input[k as usize] * cutoff * sinc(cutoff * d) * w;
        }
        out.push(acc);
    }
    out
}

/// Remove DC offset and subsonics with a zero-phase Butterworth high-pass
///
/// Any DC offset wastes dynamic range at these bit depths and turns into a
/// constant noise floor after quantization. The 2nd-order section runs
/// forward and backward so the pass adds no phase distortion.
pub fn dc_block(samples: &[f32], cutoff_hz: f32, sample_rate: f32) -> Vec<f32> {
    if samples.is_empty() || cutoff_hz >= sample_rate * 0.5 {
        return samples.to_vec();
    }

    let coeffs = butterworth_hpf(cutoff_hz, sample_rate);
    let mut fwd = biquad(samples, &coeffs);
    fwd.reverse();
    let mut back = biquad(&fwd, &coeffs);
    back.reverse();
    back
}

/// Peak-normalize to `HEADROOM_DB` below full scale
///
/// Music typically peaks at -3 to -6 dBFS, wasting a third of the level
/// range. Quiet input is boosted; input already at or above the target is
/// left alone (attenuating would only lose resolution).
pub fn normalize(samples: &[f32], headroom_db: f32) -> Vec<f32> {
    let peak = samples.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
    if peak < 1e-6 {
        return samples.to_vec();
    }
    let target = 10.0f32.powf(-headroom_db / 20.0);
    let gain = target / peak;
    if gain > 1.0 {
        samples.iter().map(|&x| x * gain).collect()
    } else {
        samples.to_vec()
    }
}

// =============================================================================
// Internals
// =============================================================================

#[derive(Clone, Copy)]
struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

/// 2nd-order Butterworth high-pass via bilinear transform
fn butterworth_hpf(cutoff_hz: f32, sample_rate: f32) -> Biquad {
    let k = (std::f32::consts::PI * cutoff_hz / sample_rate).tan();
    let q = std::f32::consts::FRAC_1_SQRT_2;
    let norm = 1.0 / (1.0 + k / q + k * k);
    Biquad {
        b0: norm,
        b1: -2.0 * norm,
        b2: norm,
        a1: 2.0 * (k * k - 1.0) * norm,
        a2: (1.0 - k / q + k * k) * norm,
    }
}

/// Direct form II transposed
fn biquad(samples: &[f32], c: &Biquad) -> Vec<f32> {
    let (mut z1, mut z2) = (0.0f32, 0.0f32);
    samples
        .iter()
        .map(|&x| {
            let y = c.b0 * x + z1;
            z1 = c.b1 * x + z2 - c.a1 * y;
            z2 = c.b2 * x - c.a2 * y;
            y
        })
        .collect()
}

fn sinc(x: f32) -> f32 {
    if x.abs() < 1e-6 {
        1.0
    } else {
        let px = std::f32::consts::PI * x;
        px.sin() / px
    }
}

/// Hann window over t in [-1, 1]
fn hann(t: f32) -> f32 {
    if t.abs() >= 1.0 {
        0.0
    } else {
        0.5 * (1.0 + (std::f32::consts::PI * t).cos())
    }
}

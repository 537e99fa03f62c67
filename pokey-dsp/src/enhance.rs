//! Perceptual pre-emphasis for POKEY's sample-and-hold output
//!
//! POKEY holds each sample as a constant voltage until the next write. The
//! staircase has frequency response sinc(f/fs): -0.9 dB at 2 kHz, -2.1 dB
//! at 3 kHz, -3.9 dB at Nyquist (8 kHz rate), which reads as muffled
//! treble. Pre-emphasis applies the inverse curve before quantization so
//! the combined output is perceptually flat.
//!
//! The filter is a short 15-tap linear-phase FIR blended at 70% with
//! identity. Longer filters or full-strength correction pre-ring, and the
//! low-level quantizer cannot track the transients.

use std::f32::consts::PI;

/// Tap count of the pre-emphasis FIR (odd)
pub const PREEMPHASIS_TAPS: usize = 15;

/// Default blend between identity (0.0) and full inverse-sinc (1.0)
pub const PREEMPHASIS_STRENGTH: f32 = 0.7;

/// Design the inverse-sinc FIR by frequency sampling
///
/// The desired magnitude is `1 / sinc(f / fs)` over 0..Nyquist with a
/// cosine taper above 0.85x Nyquist (boosting right up to Nyquist would
/// amplify aliasing products). Coefficients come from the real inverse
/// transform of the sampled response under a Hamming window, normalized to
/// unity DC gain.
pub fn design_zoh_preemphasis(n_taps: usize) -> Vec<f32> {
    let n_taps = n_taps | 1;
    let mid = (n_taps / 2) as f32;

    const N_FREQS: usize = 512;
    const ROLLOFF_START: f32 = 0.85;

    // Desired response on a dense grid of normalized frequencies (0..1 of
    // Nyquist).
    let mut desired = [0.0f32; N_FREQS];
    for (k, d) in desired.iter_mut().enumerate() {
        let f = k as f32 / (N_FREQS - 1) as f32;
        let ratio = f * 0.5; // f/fs, 0..0.5
        let inv = if ratio > 1e-6 { 1.0 / sinc(ratio) } else { 1.0 };
        let rolloff = if f > ROLLOFF_START {
            (0.5 * PI * (f - ROLLOFF_START) / (1.0 - ROLLOFF_START)).cos()
        } else {
            1.0
        };
        *d = 1.0 + rolloff * (inv - 1.0);
    }

    // Inverse transform: h[n] = 2 * integral of D(f) cos(2 pi f (n - mid))
    // over cycles/sample in [0, 0.5], trapezoid rule over the grid.
    let mut h = vec![0.0f32; n_taps];
    let df = 0.5 / (N_FREQS - 1) as f32;
    for (n, tap) in h.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        for (k, &d) in desired.iter().enumerate() {
            let f = k as f32 * df;
            let w = if k == 0 || k == N_FREQS - 1 { 0.5 } else { 1.0 };
            acc += w * d * (2.0 * PI * f * (n as f32 - mid)).cos();
        }
        *tap = 2.0 * acc * df;
    }

    // Hamming window tames the truncation ripple
    for (n, tap) in h.iter_mut().enumerate() {
        let w = 0.54 - 0.46 * (2.0 * PI * n as f32 / (n_taps - 1) as f32).cos();
        *tap *= w;
    }

    let dc: f32 = h.iter().sum();
    if dc.abs() > 1e-6 {
        for tap in &mut h {
            *tap /= dc;
        }
    }
    h
}

/// Apply blended ZOH pre-emphasis
///
/// `strength` 0.0 bypasses, 1.0 is the full inverse-sinc boost. Output is
/// clipped to [-1, 1]; callers re-normalize afterwards.
pub fn apply_preemphasis(samples: &[f32], strength: f32) -> Vec<f32> {
    if strength <= 0.0 || samples.is_empty() {
        return samples.to_vec();
    }

    let taps = design_zoh_preemphasis(PREEMPHASIS_TAPS);
    let boosted = fir_filter(samples, &taps);

    samples
        .iter()
        .zip(&boosted)
        .map(|(&dry, &wet)| (dry * (1.0 - strength) + wet * strength).clamp(-1.0, 1.0))
        .collect()
}

/// Soft mu-law dynamics compression
///
/// Expands quiet passages into the usable level range. NOT in the default
/// pipeline: at 31 levels / 8 kHz the raised RMS turns into
/// sample-to-sample level jumps that sound like crackling. Available for
/// experiments at higher rates or channel counts.
pub fn compress_dynamics(samples: &[f32], strength: f32) -> Vec<f32> {
    if strength <= 0.0 {
        return samples.to_vec();
    }
    let mu = 255.0 * strength;
    let norm = (1.0 + mu).ln();
    samples
        .iter()
        .map(|&x| x.signum() * (1.0 + mu * x.abs()).ln() / norm)
        .collect()
}

fn sinc(x: f32) -> f32 {
    if x.abs() < 1e-6 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Causal FIR convolution, zero-padded history
fn fir_filter(samples: &[f32], taps: &[f32]) -> Vec<f32> {
    let mut out = Vec::with_capacity(samples.len());
    for n in 0..samples.len() {
        let mut acc = 0.0f32;
        for (k, &t) in taps.iter().enumerate() {
            if n >= k {
                acc += t * samples[n - k];
            }
        }
        out.push(acc);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unity_dc_gain() {
        let taps = design_zoh_preemphasis(PREEMPHASIS_TAPS);
        assert_eq!(taps.len(), 15);
        let dc: f32 = taps.iter().sum();
        assert!((dc - 1.0).abs() < 1e-4, "DC gain {}", dc);
    }

    #[test]
    fn test_treble_boost() {
        // A tone at 0.75x Nyquist should gain energy through the filter.
        let samples: Vec<f32> = (0..800)
            .map(|i| (PI * 0.75 * i as f32).sin() * 0.5)
            .collect();
        let boosted = apply_preemphasis(&samples, 1.0);
        let rms = |v: &[f32]| (v.iter().map(|x| x * x).sum::<f32>() / v.len() as f32).sqrt();
        // Skip the filter warmup region
        assert!(rms(&boosted[32..]) > rms(&samples[32..]));
    }

    #[test]
    fn test_bypass_at_zero_strength() {
        let samples: Vec<f32> = (0..100).map(|i| (i as f32 * 0.1).sin()).collect();
        assert_eq!(apply_preemphasis(&samples, 0.0), samples);
        assert_eq!(compress_dynamics(&samples, 0.0), samples);
    }

    #[test]
    fn test_dynamics_reduce_ratio() {
        let mut audio = vec![0.9f32; 100];
        audio.extend(vec![0.05f32; 100]);
        let out = compress_dynamics(&audio, 0.5);
        let mean = |v: &[f32]| v.iter().map(|x| x.abs()).sum::<f32>() / v.len() as f32;
        let before = mean(&audio[..100]) / mean(&audio[100..]);
        let after = mean(&out[..100]) / mean(&out[100..]);
        assert!(after < before);
    }
}

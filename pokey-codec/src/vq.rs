//! Vector quantization with per-bank trained codebooks
//!
//! Level indices are grouped into fixed-size vectors (2, 4, 8, or 16
//! samples) and each 16 KB bank carries its own 256-entry codebook
//! followed by one index byte per vector:
//!
//! ```text
//!   vec_size=2:   codebook  512B   indices/bank 15872   samples/bank  31744
//!   vec_size=4:   codebook 1024B   indices/bank 15360   samples/bank  61440
//!   vec_size=8:   codebook 2048B   indices/bank 14336   samples/bank 114688
//!   vec_size=16:  codebook 4096B   indices/bank 12288   samples/bank 196608
//! ```
//!
//! The player reads codebook entries straight out of banked memory through
//! the generated `vq_lo_tab`/`vq_hi_tab` address tables; nothing is copied
//! at runtime.
//!
//! Input must be quantized WITHOUT noise shaping. Shaped dither turns
//! steady levels into patterns like [14,16,15,14] that k-means cannot
//! cluster, costing about 3 dB of VQ SNR.
//!
//! Noise gate (`gate` 1-100): codebook index 0 is reserved for silence and
//! every vector whose samples all sit below `ceil(max_level * gate / 100)`
//! encodes as index 0 without touching the training set. With `gate = 0`
//! all 256 codes are trained, then the least-used code is overwritten with
//! the silence vector so zero-padded bank tails still decode cleanly.
//!
//! Training is deterministic: each bank seeds its own generator from the
//! bank index, so parallel runs are byte-identical.

use rayon::prelude::*;
use tracing::debug;

use crate::rng::BankRng;
use crate::{CodecError, BANK_SIZE, MAX_BANKS};

/// Codebook entries per bank
pub const N_CODES: usize = 256;

/// Default k-means iteration budget
pub const KMEANS_ITERS: usize = 20;

/// Codebook bytes, indices per bank, and samples per bank for a vector size
pub fn vq_bank_geometry(vec_size: usize) -> Result<(usize, usize, usize), CodecError> {
    if !matches!(vec_size, 2 | 4 | 8 | 16) {
        return Err(CodecError::InvalidVecSize(vec_size));
    }
    let cb_bytes = N_CODES * vec_size;
    let idx_per_bank = BANK_SIZE - cb_bytes;
    Ok((cb_bytes, idx_per_bank, idx_per_bank * vec_size))
}

/// Encode a level-index stream into VQ banks with per-bank codebooks
///
/// Banks are trained in parallel; chunk boundaries are fixed by the bank
/// geometry beforehand, so each bank is independent and seeds its RNG from
/// its own index. Trailing samples that do not fill a whole vector are
/// dropped.
///
/// Returns the 16 KB zero-padded banks and the number of samples encoded.
pub fn vq_encode_banks(
    indices: &[u8],
    vec_size: usize,
    max_banks: usize,
    max_level: u8,
    n_iter: usize,
    gate: u8,
) -> Result<(Vec<Vec<u8>>, usize), CodecError> {
    let (_, _, samples_per_bank) = vq_bank_geometry(vec_size)?;
    let max_banks = max_banks.min(MAX_BANKS);

    let mut chunks: Vec<&[u8]> = Vec::new();
    let mut pos = 0usize;
    while pos < indices.len() && chunks.len() < max_banks {
        let len = (indices.len() - pos).min(samples_per_bank) / vec_size * vec_size;
        if len == 0 {
            break;
        }
        chunks.push(&indices[pos..pos + len]);
        pos += len;
    }
    let consumed: usize = chunks.iter().map(|c| c.len()).sum();

    let banks: Vec<Vec<u8>> = chunks
        .par_iter()
        .enumerate()
        .map(|(bank_index, chunk)| {
            encode_bank(chunk, vec_size, max_level, n_iter, gate, bank_index)
        })
        .collect();

    Ok((banks, consumed))
}

/// Train and assemble one bank
fn encode_bank(
    chunk: &[u8],
    vec_size: usize,
    max_level: u8,
    n_iter: usize,
    gate: u8,
    bank_index: usize,
) -> Vec<u8> {
    let n_vecs = chunk.len() / vec_size;
    let vectors: Vec<&[u8]> = chunk.chunks_exact(vec_size).collect();
    let mut rng = BankRng::new(bank_index);

    let (codebook, assignments) = if gate > 0 {
        let thresh = gate_threshold(max_level, gate);
        let silent: Vec<bool> = vectors
            .iter()
            .map(|v| v.iter().all(|&s| s < thresh))
            .collect();
        let training: Vec<&[u8]> = vectors
            .iter()
            .zip(&silent)
            .filter(|(_, &s)| !s)
            .map(|(v, _)| *v)
            .collect();

        let mut codebook = vec![vec![0u8; vec_size]; N_CODES];
        if !training.is_empty() {
            let trained = kmeans(&training, vec_size, N_CODES - 1, n_iter, max_level, &mut rng);
            codebook[1..].clone_from_slice(&trained);
        }

        // Gated vectors always emit index 0; the rest take their nearest
        // centroid over the full codebook.
        let assignments: Vec<u8> = vectors
            .iter()
            .zip(&silent)
            .map(|(v, &s)| if s { 0 } else { nearest_code(&codebook, v) })
            .collect();
        (codebook, assignments)
    } else {
        let mut codebook = kmeans(&vectors, vec_size, N_CODES, n_iter, max_level, &mut rng);
        let mut assignments: Vec<u8> = vectors.iter().map(|v| nearest_code(&codebook, v)).collect();

        // Zero-padded bank tails decode through some codebook entry, so a
        // true silence vector must exist. Overwrite the least-used code.
        if !codebook.iter().any(|c| c.iter().all(|&x| x == 0)) {
            let mut counts = [0usize; N_CODES];
            for &a in &assignments {
                counts[usize::from(a)] += 1;
            }
            let victim = counts
                .iter()
                .enumerate()
                .min_by_key(|(_, &c)| c)
                .map(|(i, _)| i)
                .unwrap();
            codebook[victim] = vec![0u8; vec_size];
            assignments = vectors.iter().map(|v| nearest_code(&codebook, v)).collect();
        }
        (codebook, assignments)
    };

    let mut bank = Vec::with_capacity(BANK_SIZE);
    for entry in &codebook {
        bank.extend_from_slice(entry);
    }
    bank.extend_from_slice(&assignments);
    bank.resize(BANK_SIZE, 0);

    debug!(
        bank = bank_index,
        vectors = n_vecs,
        "trained VQ bank codebook"
    );
    bank
}

/// Per-sample silence threshold: a vector is silent when ALL its samples
/// fall below this level
fn gate_threshold(max_level: u8, gate: u8) -> u8 {
    ((usize::from(max_level) * usize::from(gate)).div_ceil(100)) as u8
}

/// Decode one VQ bank back to level indices
///
/// `n_vectors` limits the index stream (the final bank of a stream encodes
/// fewer vectors than the geometry allows); `None` decodes the full bank.
pub fn vq_decode_bank(
    bank: &[u8],
    vec_size: usize,
    n_vectors: Option<usize>,
) -> Result<Vec<u8>, CodecError> {
    let (cb_bytes, idx_per_bank, _) = vq_bank_geometry(vec_size)?;
    if bank.len() < cb_bytes {
        return Err(CodecError::BankTooShort(bank.len()));
    }
    let codebook = &bank[..cb_bytes];
    let idx_stream = &bank[cb_bytes..];
    let count = n_vectors.unwrap_or(idx_per_bank).min(idx_stream.len());

    let mut out = Vec::with_capacity(count * vec_size);
    for &code in &idx_stream[..count] {
        let base = usize::from(code) * vec_size;
        out.extend_from_slice(&codebook[base..base + vec_size]);
    }
    Ok(out)
}

/// Decode a whole bank sequence, trimmed to `total_samples`
pub fn vq_decode_banks(
    banks: &[Vec<u8>],
    vec_size: usize,
    total_samples: usize,
) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(total_samples);
    for bank in banks {
        if out.len() >= total_samples {
            break;
        }
        let want = (total_samples - out.len()).div_ceil(vec_size);
        out.extend(vq_decode_bank(bank, vec_size, Some(want))?);
    }
    out.truncate(total_samples);
    Ok(out)
}

/// Root-mean-square error between two index streams
pub fn vq_rmse(original: &[u8], decoded: &[u8]) -> f64 {
    let n = original.len().min(decoded.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = original[..n]
        .iter()
        .zip(&decoded[..n])
        .map(|(&a, &b)| {
            let d = f64::from(a) - f64::from(b);
            d * d
        })
        .sum();
    (sum / n as f64).sqrt()
}

/// Signal-to-noise ratio in dB over the modeled voltage curve
pub fn vq_snr(original: &[u8], decoded: &[u8], voltages: &[f32]) -> f64 {
    let n = original.len().min(decoded.len());
    if n == 0 {
        return 0.0;
    }
    let at = |i: u8| f64::from(voltages[usize::from(i).min(voltages.len() - 1)]);
    let mut sig = 0.0f64;
    let mut noise = 0.0f64;
    for (&a, &b) in original[..n].iter().zip(&decoded[..n]) {
        sig += at(a) * at(a);
        let d = at(a) - at(b);
        noise += d * d;
    }
    if noise < 1e-30 {
        return 999.0;
    }
    10.0 * (sig / noise).log10()
}

// =============================================================================
// k-means
// =============================================================================

/// k-means with k-means++ seeding over integer vectors
///
/// Returns `n_codes` centroids rounded to integers in `[0, max_level]`.
/// Fewer training vectors than codes is fine: the spares duplicate random
/// training vectors and downstream assignment simply never picks them over
/// an exact match.
fn kmeans(
    vectors: &[&[u8]],
    vec_size: usize,
    n_codes: usize,
    n_iter: usize,
    max_level: u8,
    rng: &mut BankRng,
) -> Vec<Vec<u8>> {
    let n_vecs = vectors.len();
    let vf: Vec<Vec<f32>> = vectors
        .iter()
        .map(|v| v.iter().map(|&x| f32::from(x)).collect())
        .collect();

    if n_vecs == 0 {
        return vec![vec![0u8; vec_size]; n_codes];
    }
    if n_vecs <= n_codes {
        let mut codebook: Vec<Vec<u8>> = vectors.iter().map(|v| v.to_vec()).collect();
        while codebook.len() < n_codes {
            codebook.push(vectors[rng.next_index(n_vecs)].to_vec());
        }
        return codebook;
    }

    // k-means++ seeding: each new seed is drawn proportionally to the
    // squared distance from the nearest seed so far.
    let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(n_codes);
    let first = rng.next_index(n_vecs);
    centroids.push(vf[first].clone());
    let mut best_dist: Vec<f64> = vf.iter().map(|v| dist2(v, &centroids[0])).collect();

    while centroids.len() < n_codes {
        let total: f64 = best_dist.iter().sum();
        let pick = if total < 1e-30 {
            rng.next_index(n_vecs)
        } else {
            let mut r = rng.next_f64() * total;
            let mut chosen = n_vecs - 1;
            for (i, &d) in best_dist.iter().enumerate() {
                if r < d {
                    chosen = i;
                    break;
                }
                r -= d;
            }
            chosen
        };
        let seed = vf[pick].clone();
        for (bd, v) in best_dist.iter_mut().zip(&vf) {
            let d = dist2(v, &seed);
            if d < *bd {
                *bd = d;
            }
        }
        centroids.push(seed);
    }

    // Lloyd iterations until assignments stabilize or the budget runs out
    let mut assignments = vec![0u32; n_vecs];
    for _ in 0..n_iter {
        let mut changed = false;
        for (i, v) in vf.iter().enumerate() {
            let a = nearest_centroid(&centroids, v) as u32;
            if assignments[i] != a {
                assignments[i] = a;
                changed = true;
            }
        }

        let mut sums = vec![vec![0.0f64; vec_size]; n_codes];
        let mut counts = vec![0usize; n_codes];
        for (v, &a) in vf.iter().zip(&assignments) {
            let a = a as usize;
            counts[a] += 1;
            for (s, &x) in sums[a].iter_mut().zip(v) {
                *s += f64::from(x);
            }
        }
        for (c, (sum, &count)) in centroids.iter_mut().zip(sums.iter().zip(&counts)) {
            if count > 0 {
                for (cd, &s) in c.iter_mut().zip(sum) {
                    *cd = (s / count as f64) as f32;
                }
            }
            // Empty clusters keep their previous centroid
        }

        if !changed {
            break;
        }
    }

    centroids
        .into_iter()
        .map(|c| {
            c.into_iter()
                .map(|x| (x.round().clamp(0.0, f32::from(max_level))) as u8)
                .collect()
        })
        .collect()
}

fn dist2(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum()
}

fn nearest_centroid(centroids: &[Vec<f32>], v: &[f32]) -> usize {
    let mut best = 0usize;
    let mut best_d = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = dist2(v, c);
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

/// Nearest integer codebook entry for one input vector (ties take the
/// lowest index)
fn nearest_code(codebook: &[Vec<u8>], v: &[u8]) -> u8 {
    let mut best = 0usize;
    let mut best_d = u64::MAX;
    for (i, c) in codebook.iter().enumerate() {
        let d: u64 = c
            .iter()
            .zip(v)
            .map(|(&a, &b)| {
                let d = i64::from(a) - i64::from(b);
                (d * d) as u64
            })
            .sum();
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_indices(len: usize, max_level: u8) -> Vec<u8> {
        let mid = f32::from(max_level) / 2.0;
        (0..len)
            .map(|i| {
                let x = mid + mid * (i as f32 * 0.031).sin();
                x.round().clamp(0.0, f32::from(max_level)) as u8
            })
            .collect()
    }

    #[test]
    fn test_geometry() {
        assert_eq!(vq_bank_geometry(4).unwrap(), (1024, 15360, 61440));
        assert_eq!(vq_bank_geometry(8).unwrap(), (2048, 14336, 114688));
        assert_eq!(vq_bank_geometry(16).unwrap(), (4096, 12288, 196608));
        assert!(vq_bank_geometry(3).is_err());
    }

    #[test]
    fn test_roundtrip_quality() {
        let indices = sine_indices(2000, 30);
        for vec_size in [4usize, 8, 16] {
            let (banks, consumed) =
                vq_encode_banks(&indices, vec_size, 64, 30, 10, 0).unwrap();
            assert_eq!(banks.len(), 1);
            assert_eq!(banks[0].len(), BANK_SIZE);
            let decoded = vq_decode_banks(&banks, vec_size, consumed).unwrap();
            let rmse = vq_rmse(&indices[..consumed], &decoded);
            assert!(rmse < 2.0, "vec_size {} rmse {}", vec_size, rmse);
        }
    }

    #[test]
    fn test_determinism() {
        let indices = sine_indices(20_000, 60);
        let run = || vq_encode_banks(&indices, 4, 64, 60, KMEANS_ITERS, 5).unwrap();
        let (a, ca) = run();
        let (b, cb) = run();
        assert_eq!(ca, cb);
        assert_eq!(a, b);
    }

    #[test]
    fn test_silence_gate() {
        // All-zero input with an active gate: entry 0 is the zero vector
        // and every index byte is zero.
        let indices = vec![0u8; 8192];
        let (banks, consumed) = vq_encode_banks(&indices, 4, 64, 15, 10, 5).unwrap();
        assert_eq!(banks.len(), 1);
        assert_eq!(consumed, 8192);
        assert_eq!(&banks[0][..4], &[0, 0, 0, 0]);
        let (cb_bytes, _, _) = vq_bank_geometry(4).unwrap();
        assert!(banks[0][cb_bytes..cb_bytes + 2048].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_gated_vectors_emit_zero() {
        // Loud signal with quiet stretches: every below-threshold vector
        // must encode as index 0 even if a nearer centroid exists.
        let mut indices = sine_indices(8000, 30);
        for chunk in indices.chunks_mut(100) {
            for s in &mut chunk[..40] {
                *s = (*s).min(1);
            }
        }
        let gate = 10u8; // threshold = ceil(30*10/100) = 3
        let thresh = 3u8;
        let (banks, consumed) = vq_encode_banks(&indices, 4, 64, 30, 10, gate).unwrap();
        let (cb_bytes, _, _) = vq_bank_geometry(4).unwrap();
        assert_eq!(&banks[0][..4], &[0, 0, 0, 0]);
        let n_vecs = consumed / 4;
        for (vi, vector) in indices[..consumed].chunks(4).enumerate().take(n_vecs) {
            if vector.iter().all(|&s| s < thresh) {
                assert_eq!(banks[0][cb_bytes + vi], 0, "vector {} not gated", vi);
            }
        }
    }

    #[test]
    fn test_ungated_has_silence_entry() {
        let indices = sine_indices(4000, 30);
        let (banks, _) = vq_encode_banks(&indices, 4, 64, 30, 10, 0).unwrap();
        let has_zero = banks[0][..1024]
            .chunks(4)
            .any(|entry| entry.iter().all(|&b| b == 0));
        assert!(has_zero);
    }

    #[test]
    fn test_codebook_values_bounded() {
        let indices = sine_indices(6000, 45);
        let (banks, _) = vq_encode_banks(&indices, 8, 64, 45, 10, 5).unwrap();
        let (cb_bytes, _, _) = vq_bank_geometry(8).unwrap();
        assert!(banks[0][..cb_bytes].iter().all(|&b| b <= 45));
    }

    #[test]
    fn test_few_vectors_degenerate() {
        // Fewer than 256 distinct vectors is allowed; duplicates are fine.
        let indices: Vec<u8> = (0..32u8).cycle().take(128).collect();
        let (banks, consumed) = vq_encode_banks(&indices, 8, 64, 31, 5, 0).unwrap();
        assert_eq!(banks.len(), 1);
        let decoded = vq_decode_banks(&banks, 8, consumed).unwrap();
        assert_eq!(decoded.len(), consumed);
    }

    #[test]
    fn test_max_banks_truncation() {
        let indices = sine_indices(200_000, 30);
        let (banks, consumed) = vq_encode_banks(&indices, 16, 1, 30, 5, 0).unwrap();
        assert_eq!(banks.len(), 1);
        let (_, _, spb) = vq_bank_geometry(16).unwrap();
        assert_eq!(consumed, spb.min(200_000 / 16 * 16));
    }
}

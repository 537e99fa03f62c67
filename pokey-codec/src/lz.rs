//! DeltaLZ: delta transform + buffer-aware LZ77 for in-IRQ decoding
//!
//! Pipeline per bank:
//!   1. Delta encode: `d[i] = (s[i] - s[i-1]) & 0xFF` (seeded by the bank
//!      header byte; skipped for packed 1CPS streams)
//!   2. LZ compress with decode-buffer awareness
//!
//! The on-target decoder replays the token stream into a 16 KB circular
//! buffer at $8000, wrapping only at token boundaries, and copies match
//! bytes with NO wrap check on the source pointer. The compressor is what
//! makes that sound:
//!
//!   - no literal run straddles the wrap point (runs split there)
//!   - no match copy straddles the wrap point
//!   - a match never reaches back past the most recent wrap
//!
//! The buffer position is always DERIVED from the byte count,
//! `buf_pos = (initial + emitted) % 16384`, never tracked by hand, so it
//! cannot drift from the decoder's view — including across bank
//! boundaries, where both the delta accumulator and the buffer position
//! carry over.
//!
//! Token format:
//! ```text
//!   $00         end of block
//!   $01-$7F     literal run: N delta bytes follow
//!   $80-$BF     short match: length = (token & $3F) + 3, 1-byte offset
//!   $C0-$FF     long match:  length = (token & $3F) + 3, 2-byte offset LE
//! ```
//!
//! Bank format: 1 header byte (delta accumulator seed) + token stream.

use tracing::debug;

use crate::{CodecError, MAX_BANKS};

/// Minimum useful match length
pub const MIN_MATCH: usize = 3;

/// Maximum encodable match length ((0x3F) + 3)
pub const MAX_MATCH: usize = 66;

/// Maximum short-match back-offset
const MAX_SHORT_OFF: usize = 255;

/// Maximum long-match back-offset
const MAX_LONG_OFF: usize = 16383;

const HASH_SIZE: usize = 8192;
const CHAIN_LEN: usize = 96;
const MAX_LITERAL: usize = 127;

/// Bank header: 1 byte delta accumulator seed
pub const HEADER_SIZE: usize = 1;

/// Circular decode buffer size on the target ($8000-$BFFF)
pub const DECODE_BUF_SIZE: usize = 16384;

/// Compress one bank's worth of level indices
///
/// # Arguments
/// * `indices` - raw index values for this bank
/// * `prev_value` - last index of the previous bank (delta continuity)
/// * `buf_pos` - decoder buffer position entering this bank
/// * `use_delta` - delta transform on (scalar) or off (1CPS packed bytes)
///
/// Returns the bank bytes and the buffer position after this bank.
pub fn compress_bank(
    indices: &[u8],
    prev_value: u8,
    buf_pos: usize,
    use_delta: bool,
) -> (Vec<u8>, usize) {
    if indices.is_empty() {
        return (vec![prev_value, 0x00], buf_pos % DECODE_BUF_SIZE);
    }

    let to_compress: Vec<u8> = if use_delta {
        let mut deltas = Vec::with_capacity(indices.len());
        deltas.push(indices[0].wrapping_sub(prev_value));
        for w in indices.windows(2) {
            deltas.push(w[1].wrapping_sub(w[0]));
        }
        deltas
    } else {
        indices.to_vec()
    };

    let (compressed, new_buf_pos) = lz_compress(&to_compress, buf_pos);
    let mut bank = Vec::with_capacity(HEADER_SIZE + compressed.len());
    bank.push(prev_value);
    bank.extend_from_slice(&compressed);
    (bank, new_buf_pos)
}

/// Split an index stream into banks, filling each as full as possible
///
/// Binary-searches the largest sample prefix whose compressed form fits
/// `bank_size`, seeding the search with the measured compression ratio.
/// Delta and decode-buffer state carry across banks. Stops at `max_banks`,
/// leaving any remainder unencoded (the caller decides whether truncation
/// is an error).
///
/// Returns the banks and the number of input samples consumed.
pub fn compress_banks(
    indices: &[u8],
    bank_size: usize,
    max_banks: usize,
    use_delta: bool,
) -> Result<(Vec<Vec<u8>>, usize), CodecError> {
    if indices.is_empty() {
        return Ok((Vec::new(), 0));
    }
    let max_banks = max_banks.min(MAX_BANKS);
    let total = indices.len();

    // Seed the chunk guess from the ratio of a leading sample
    let probe = &indices[..total.min(bank_size)];
    let (probe_comp, _) = compress_bank(probe, 0, 0, use_delta);
    let est_ratio = (probe_comp.len() as f64 / probe.len() as f64).max(0.05);
    let mut chunk_guess = bank_size.max((bank_size as f64 / est_ratio) as usize);

    let mut banks: Vec<Vec<u8>> = Vec::new();
    let mut pos = 0usize;
    let mut prev_val = 0u8;
    let mut buf_pos = 0usize;

    while pos < total && banks.len() < max_banks {
        let remaining = total - pos;
        let attempt = |len: usize| compress_bank(&indices[pos..pos + len], prev_val, buf_pos, use_delta);

        // Everything left in one bank?
        let (comp_all, bp_all) = attempt(remaining);
        if comp_all.len() <= bank_size {
            pos += remaining;
            prev_val = indices[pos - 1];
            buf_pos = bp_all;
            banks.push(comp_all);
            break;
        }

        // Establish a fitting lower bound
        let mut lo = 1024.min(remaining);
        let (mut best_comp, mut best_bp) = attempt(lo);
        while best_comp.len() > bank_size {
            if lo <= 1 {
                return Err(CodecError::BankOverflow(best_comp.len()));
            }
            lo /= 2;
            let r = attempt(lo);
            best_comp = r.0;
            best_bp = r.1;
        }

        // Grow toward a non-fitting upper bound
        let mut hi = chunk_guess.saturating_mul(2).clamp(lo + 1, remaining);
        loop {
            let (comp, bp) = attempt(hi);
            if comp.len() <= bank_size {
                lo = hi;
                best_comp = comp;
                best_bp = bp;
                if hi == remaining {
                    break; // cannot happen after the whole-fit check, kept defensive
                }
                hi = (hi + bank_size).min(remaining);
            } else {
                break;
            }
        }

        // Binary search between lo (fits) and hi (does not)
        while hi - lo > 64 {
            let mid = lo + (hi - lo) / 2;
            let (comp, bp) = attempt(mid);
            if comp.len() <= bank_size {
                lo = mid;
                best_comp = comp;
                best_bp = bp;
            } else {
                hi = mid;
            }
        }

        // Fine-tune near the boundary
        let mut try_len = lo + 16;
        while try_len < hi && try_len <= remaining {
            let (comp, bp) = attempt(try_len);
            if comp.len() <= bank_size {
                lo = try_len;
                best_comp = comp;
                best_bp = bp;
                try_len += 16;
            } else {
                break;
            }
        }

        pos += lo;
        prev_val = indices[pos - 1];
        buf_pos = best_bp;
        chunk_guess = (lo * bank_size / best_comp.len().max(1)).max(bank_size);
        debug!(
            bank = banks.len(),
            samples = lo,
            bytes = best_comp.len(),
            "packed DeltaLZ bank"
        );
        banks.push(best_comp);
    }

    Ok((banks, pos))
}

/// Decompress one bank back to level indices (host-side verification)
pub fn decompress_bank(data: &[u8], use_delta: bool) -> Result<Vec<u8>, CodecError> {
    if data.len() < HEADER_SIZE + 1 {
        return Err(CodecError::BankTooShort(data.len()));
    }
    let raw = lz_decompress(&data[HEADER_SIZE..])?;
    if !use_delta {
        return Ok(raw);
    }
    let mut acc = data[0];
    Ok(raw
        .iter()
        .map(|&d| {
            acc = acc.wrapping_add(d);
            acc
        })
        .collect())
}

/// Replay the decoder's circular buffer and check every bank-safety rule
///
/// Walks the token streams of all banks in order, tracking the 16 KB
/// buffer position exactly as the 6502 does. Reports the first literal or
/// match that straddles the wrap boundary, and the first match whose
/// source reaches past the most recent wrap.
pub fn simulate_decode_buffer(banks: &[Vec<u8>]) -> Result<(), CodecError> {
    let mut buf_pos = 0usize; // bytes written since the last wrap

    for bank in banks {
        if bank.len() < HEADER_SIZE + 1 {
            return Err(CodecError::BankTooShort(bank.len()));
        }
        let data = &bank[HEADER_SIZE..];
        let mut pos = 0usize;
        loop {
            if pos >= data.len() {
                return Err(CodecError::TruncatedMatch(pos));
            }
            let token = data[pos];
            pos += 1;
            match token {
                0x00 => break,
                1..=0x7F => {
                    let count = usize::from(token);
                    if pos + count > data.len() {
                        return Err(CodecError::LiteralOverrun(pos));
                    }
                    if count > DECODE_BUF_SIZE - buf_pos {
                        return Err(CodecError::WrapStraddle {
                            buf_pos,
                            len: count,
                        });
                    }
                    pos += count;
                    buf_pos = (buf_pos + count) % DECODE_BUF_SIZE;
                }
                _ => {
                    let len = usize::from(token & 0x3F) + 3;
                    let offset = if token < 0xC0 {
                        if pos >= data.len() {
                            return Err(CodecError::TruncatedMatch(pos));
                        }
                        let off = usize::from(data[pos]);
                        pos += 1;
                        off
                    } else {
                        if pos + 1 >= data.len() {
                            return Err(CodecError::TruncatedMatch(pos));
                        }
                        let off = usize::from(data[pos]) | (usize::from(data[pos + 1]) << 8);
                        pos += 2;
                        off
                    };
                    if offset == 0 || offset > buf_pos {
                        return Err(CodecError::MatchPastWrap {
                            offset,
                            valid: buf_pos,
                        });
                    }
                    if len > DECODE_BUF_SIZE - buf_pos {
                        return Err(CodecError::WrapStraddle { buf_pos, len });
                    }
                    buf_pos = (buf_pos + len) % DECODE_BUF_SIZE;
                }
            }
        }
    }
    Ok(())
}

// =============================================================================
// LZ core
// =============================================================================

/// Buffer-aware LZ compression
///
/// Returns the token stream (terminated with $00) and the buffer position
/// after the final byte.
fn lz_compress(data: &[u8], initial_buf_pos: usize) -> (Vec<u8>, usize) {
    let n = data.len();
    let bp_at = |p: usize| (initial_buf_pos + p) % DECODE_BUF_SIZE;
    if n == 0 {
        return (vec![0x00], bp_at(0));
    }

    let mut heads: Vec<Vec<u32>> = vec![Vec::new(); HASH_SIZE];
    let mut output = Vec::with_capacity(n / 2 + 16);
    let mut literal_start = 0usize; // data position of the pending run
    let mut literal_len = 0usize;
    let mut pos = 0usize;

    while pos < n {
        let bp = bp_at(pos);
        // A match may reach back only to the last wrap boundary, and the
        // copy may not cross the boundary ahead.
        let match_window = bp;
        let dest_room = DECODE_BUF_SIZE - bp;

        let mut best_len = 0usize;
        let mut best_off = 0usize;

        if pos + MIN_MATCH <= n {
            let hv = hash3(data, pos);
            let max_len = MAX_MATCH.min(n - pos).min(dest_room);

            let chain = &heads[hv];
            for &cand in chain.iter().rev().take(CHAIN_LEN) {
                let cand = cand as usize;
                let offset = pos - cand;
                if offset < 1 || offset > MAX_LONG_OFF || offset > match_window {
                    continue;
                }
                if data[cand] != data[pos] {
                    continue;
                }
                let mut length = 0usize;
                while length < max_len && data[cand + length] == data[pos + length] {
                    length += 1;
                }
                if length > best_len || (length == best_len && offset < best_off) {
                    best_len = length;
                    best_off = offset;
                    if length == max_len {
                        break;
                    }
                }
            }

            push_chain(&mut heads[hv], pos);
        }

        // Lazy lookahead: when the next position starts a strictly longer
        // match, emitting one literal now pays for itself.
        if best_len >= MIN_MATCH
            && best_len < MAX_MATCH.min(dest_room)
            && pos + 1 + MIN_MATCH <= n
        {
            let next_bp = bp_at(pos + 1);
            let next_len = probe_match_len(
                data,
                pos + 1,
                &heads,
                next_bp,
                MAX_MATCH.min(n - pos - 1).min(DECODE_BUF_SIZE - next_bp),
            );
            if next_len > best_len + 1 {
                best_len = 0;
            }
        }

        let match_cost = if best_off <= MAX_SHORT_OFF { 2 } else { 3 };
        if best_len >= MIN_MATCH && best_len > match_cost {
            if literal_len > 0 {
                flush_literals(
                    &mut output,
                    &data[literal_start..literal_start + literal_len],
                    bp_at(literal_start),
                );
                literal_len = 0;
            }

            let enc_len = (best_len - 3) as u8;
            if best_off <= MAX_SHORT_OFF {
                output.push(0x80 | (enc_len & 0x3F));
                output.push(best_off as u8);
            } else {
                output.push(0xC0 | (enc_len & 0x3F));
                output.push((best_off & 0xFF) as u8);
                output.push((best_off >> 8) as u8);
            }

            for k in 1..best_len {
                let p = pos + k;
                if p + 2 < n {
                    let hv = hash3(data, p);
                    push_chain(&mut heads[hv], p);
                }
            }
            pos += best_len;
        } else {
            if literal_len == 0 {
                literal_start = pos;
            }
            literal_len += 1;
            pos += 1;
        }
    }

    if literal_len > 0 {
        flush_literals(
            &mut output,
            &data[literal_start..literal_start + literal_len],
            bp_at(literal_start),
        );
    }

    output.push(0x00);
    (output, bp_at(n))
}

/// Emit a literal run as tokens, splitting at 127 bytes and at the wrap
/// boundary
fn flush_literals(output: &mut Vec<u8>, run: &[u8], start_bp: usize) {
    let mut bp = start_bp;
    let mut p = 0usize;
    while p < run.len() {
        let to_wrap = DECODE_BUF_SIZE - bp;
        let chunk = (run.len() - p).min(MAX_LITERAL).min(to_wrap);
        output.push(chunk as u8);
        output.extend_from_slice(&run[p..p + chunk]);
        p += chunk;
        bp = (bp + chunk) % DECODE_BUF_SIZE;
    }
}

/// Best match length available at `pos` without touching the chains;
/// used only by the lazy-match lookahead
fn probe_match_len(
    data: &[u8],
    pos: usize,
    heads: &[Vec<u32>],
    match_window: usize,
    max_len: usize,
) -> usize {
    const PROBE_DEPTH: usize = 16;

    let mut best = 0usize;
    let chain = &heads[hash3(data, pos)];
    for &cand in chain.iter().rev().take(PROBE_DEPTH) {
        let cand = cand as usize;
        let offset = pos - cand;
        if offset < 1 || offset > MAX_LONG_OFF || offset > match_window {
            continue;
        }
        if data[cand] != data[pos] {
            continue;
        }
        let mut length = 0usize;
        while length < max_len && data[cand + length] == data[pos + length] {
            length += 1;
        }
        if length > best {
            best = length;
            if length == max_len {
                break;
            }
        }
    }
    best
}

fn push_chain(chain: &mut Vec<u32>, pos: usize) {
    chain.push(pos as u32);
    if chain.len() > CHAIN_LEN {
        let excess = chain.len() - CHAIN_LEN;
        chain.drain(..excess);
    }
}

fn hash3(data: &[u8], pos: usize) -> usize {
    let h = (u64::from(data[pos])
        .wrapping_mul(2_654_435_761)
        .wrapping_add(u64::from(data[pos + 1])))
    .wrapping_mul(31)
    .wrapping_add(u64::from(data[pos + 2]));
    (h % HASH_SIZE as u64) as usize
}

/// Reference token-stream decoder (no circular buffer; host memory)
fn lz_decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut output = Vec::new();
    let mut pos = 0usize;
    while pos < data.len() {
        let token = data[pos];
        pos += 1;
        match token {
            0x00 => break,
            1..=0x7F => {
                let count = usize::from(token);
                if pos + count > data.len() {
                    return Err(CodecError::LiteralOverrun(pos));
                }
                output.extend_from_slice(&data[pos..pos + count]);
                pos += count;
            }
            _ => {
                let length = usize::from(token & 0x3F) + 3;
                let offset = if token < 0xC0 {
                    if pos >= data.len() {
                        return Err(CodecError::TruncatedMatch(pos));
                    }
                    let off = usize::from(data[pos]);
                    pos += 1;
                    off
                } else {
                    if pos + 1 >= data.len() {
                        return Err(CodecError::TruncatedMatch(pos));
                    }
                    let off = usize::from(data[pos]) | (usize::from(data[pos + 1]) << 8);
                    pos += 2;
                    off
                };
                if offset == 0 || offset > output.len() {
                    return Err(CodecError::InvalidMatchOffset {
                        offset,
                        written: output.len(),
                    });
                }
                let src = output.len() - offset;
                for i in 0..length {
                    let b = output[src + i];
                    output.push(b);
                }
            }
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BANK_SIZE;

    /// Deterministic pseudo-random byte stream for test corpora
    fn noise(len: usize, max: u8, seed: u64) -> Vec<u8> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) as u8) % (max + 1)
            })
            .collect()
    }

    fn roundtrip(indices: &[u8]) -> Vec<u8> {
        let (comp, _) = compress_bank(indices, 0, 0, true);
        decompress_bank(&comp, true).unwrap()
    }

    #[test]
    fn test_roundtrip_silence() {
        let indices = vec![15u8; 500];
        let (comp, _) = compress_bank(&indices, 0, 0, true);
        assert_eq!(decompress_bank(&comp, true).unwrap(), indices);
        assert!(comp.len() < indices.len() / 2);
    }

    #[test]
    fn test_roundtrip_ramp() {
        let indices: Vec<u8> = (0..31u8).cycle().take(310).collect();
        assert_eq!(roundtrip(&indices), indices);
    }

    #[test]
    fn test_roundtrip_noise() {
        let indices = noise(4096, 30, 42);
        assert_eq!(roundtrip(&indices), indices);
    }

    #[test]
    fn test_roundtrip_no_delta() {
        let indices = noise(2048, 0x3F, 7);
        let (comp, _) = compress_bank(&indices, 0, 0, false);
        assert_eq!(decompress_bank(&comp, false).unwrap(), indices);
    }

    #[test]
    fn test_constant_stream_compresses_to_matches() {
        // All-equal levels: every delta after the first is zero, so the
        // stream should collapse into a handful of long matches.
        let indices = vec![7u8; 4096];
        let (comp, _) = compress_bank(&indices, 0, 0, true);
        assert_eq!(comp[0], 0); // header = prev_value
        assert!(comp.len() < 96, "constant bank compressed to {}", comp.len());
        assert_eq!(*comp.last().unwrap(), 0x00);
        assert_eq!(decompress_bank(&comp, true).unwrap(), indices);
    }

    #[test]
    fn test_delta_continuity_across_banks() {
        let indices = [10u8, 11, 12, 13, 14, 15];
        let (b1, bp1) = compress_bank(&indices[..3], 0, 0, true);
        assert_eq!(decompress_bank(&b1, true).unwrap(), &indices[..3]);
        let (b2, _) = compress_bank(&indices[3..], indices[2], bp1, true);
        assert_eq!(decompress_bank(&b2, true).unwrap(), &indices[3..]);
    }

    #[test]
    fn test_compress_banks_roundtrip() {
        let indices = noise(50_000, 30, 42);
        let (banks, consumed) = compress_banks(&indices, 2048, 64, true).unwrap();
        assert_eq!(consumed, indices.len());
        assert!(banks.len() > 1);
        assert!(banks.iter().all(|b| b.len() <= 2048));

        let mut result = Vec::new();
        for bank in &banks {
            result.extend(decompress_bank(bank, true).unwrap());
        }
        assert_eq!(result, indices);
    }

    #[test]
    fn test_compress_banks_respects_max() {
        let indices = noise(200_000, 60, 9);
        let (banks, consumed) = compress_banks(&indices, 2048, 4, true).unwrap();
        assert_eq!(banks.len(), 4);
        assert!(consumed < indices.len());
    }

    #[test]
    fn test_buffer_safety_over_wraps() {
        // Enough data that the decode buffer wraps several times.
        let indices = noise(60_000, 30, 1234);
        let (banks, consumed) = compress_banks(&indices, BANK_SIZE, 64, true).unwrap();
        assert_eq!(consumed, indices.len());
        simulate_decode_buffer(&banks).unwrap();
    }

    #[test]
    fn test_buffer_safety_compressible_corpus() {
        // Highly compressible data produces long matches that press against
        // the wrap boundary.
        let mut indices = Vec::new();
        for i in 0..50_000usize {
            indices.push(((i / 64) % 31) as u8);
        }
        let (banks, _) = compress_banks(&indices, BANK_SIZE, 64, true).unwrap();
        simulate_decode_buffer(&banks).unwrap();
    }

    #[test]
    fn test_simulator_rejects_bad_match() {
        // Hand-built bank: header, then a match with offset 5 while only 3
        // bytes have been written since the start.
        let bank = vec![0u8, 0x03, 1, 2, 3, 0x80, 5, 0x00];
        assert!(matches!(
            simulate_decode_buffer(&[bank]),
            Err(CodecError::MatchPastWrap { offset: 5, valid: 3 })
        ));
    }

    #[test]
    fn test_empty_bank() {
        let (comp, bp) = compress_bank(&[], 9, 100, true);
        assert_eq!(comp, vec![9, 0x00]);
        assert_eq!(bp, 100);
    }

    #[test]
    fn test_decoder_rejects_truncation() {
        assert!(matches!(
            decompress_bank(&[0, 0x05, 1, 2], true),
            Err(CodecError::LiteralOverrun(_))
        ));
        assert!(matches!(
            decompress_bank(&[0, 0x80], true),
            Err(CodecError::TruncatedMatch(_))
        ));
    }
}

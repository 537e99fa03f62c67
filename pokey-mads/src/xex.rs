//! Atari XEX (DOS binary load) output
//!
//! ```text
//!   $FF $FF                 file magic, once at the start
//!   start_lo start_hi       segment load range
//!   end_lo   end_hi
//!   data...                 end - start + 1 bytes
//!   [next segment header + data ...]
//! ```
//!
//! Special write-pair addresses recognized by the loader:
//!   $02E0/$02E1  RUNAD  - jumped to after the whole file loads
//!   $02E2/$02E3  INITAD - called as soon as the pair loads, then cleared
//!
//! Segments appear in source order; a later segment may overwrite bytes
//! an earlier one loaded.

/// One contiguous block of assembled output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub start: u16,
    pub data: Vec<u8>,
}

impl Segment {
    pub fn new(start: u16) -> Self {
        Self {
            start,
            data: Vec::new(),
        }
    }

    /// Inclusive end address
    pub fn end(&self) -> u16 {
        self.start
            .wrapping_add(self.data.len() as u16)
            .wrapping_sub(1)
    }
}

/// INITAD write-pair segment pointing at `addr`
pub(crate) fn init_segment(addr: u16) -> Segment {
    Segment {
        start: 0x02E2,
        data: addr.to_le_bytes().to_vec(),
    }
}

/// Build the XEX byte stream from segments plus an optional RUN address
pub fn build_xex(segments: &[Segment], run_addr: Option<u16>) -> Vec<u8> {
    let total: usize = segments.iter().map(|s| 4 + s.data.len()).sum();
    let mut out = Vec::with_capacity(2 + total + 6);
    out.extend_from_slice(&[0xFF, 0xFF]);

    for seg in segments {
        if seg.data.is_empty() {
            continue;
        }
        out.extend_from_slice(&seg.start.to_le_bytes());
        out.extend_from_slice(&seg.end().to_le_bytes());
        out.extend_from_slice(&seg.data);
    }

    if let Some(addr) = run_addr {
        out.extend_from_slice(&[0xE0, 0x02, 0xE1, 0x02]);
        out.extend_from_slice(&addr.to_le_bytes());
    }

    out
}

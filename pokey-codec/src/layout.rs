//! Bank layout for Atari XL/XE extended memory
//!
//! The bank window is $4000-$7FFF, 16 KB per bank, selected through PORTB
//! at $D301. The PORTB bit patterns below match the scan order of the
//! player's memory-detection routine; the generated XEX only uses them
//! indirectly, through the table the player fills in at runtime.

use crate::CodecError;

/// Bank size in bytes
pub const BANK_SIZE: usize = 16384;

/// Start of the bank window on the target
pub const BANK_BASE: u16 = 0x4000;

/// First address past the bank window
pub const BANK_END: u16 = 0x8000;

/// Maximum addressable banks (1 MB expansion)
pub const MAX_BANKS: usize = 64;

/// PORTB values per bank, in memory-detection scan order
pub const DBANK_TABLE: [u8; 64] = [
    0xE3, 0xC3, 0xA3, 0x83, 0x63, 0x43, 0x23, 0x03,
    0xE7, 0xC7, 0xA7, 0x87, 0x67, 0x47, 0x27, 0x07,
    0xEB, 0xCB, 0xAB, 0x8B, 0x6B, 0x4B, 0x2B, 0x0B,
    0xEF, 0xCF, 0xAF, 0x8F, 0x6F, 0x4F, 0x2F, 0x0F,
    0xED, 0xCD, 0xAD, 0x8D, 0x6D, 0x4D, 0x2D, 0x0D,
    0xE9, 0xC9, 0xA9, 0x89, 0x69, 0x49, 0x29, 0x09,
    0xE5, 0xC5, 0xA5, 0x85, 0x65, 0x45, 0x25, 0x05,
    0xE1, 0xC1, 0xA1, 0x81, 0x61, 0x41, 0x21, 0x01,
];

/// Split a raw byte stream into zero-padded 16 KB banks
///
/// Raw banks are padded with level 0 (silence) so the player, which always
/// walks the full window, plays out the tail quietly instead of reading
/// garbage.
pub fn split_into_banks(data: &[u8], max_banks: usize) -> Result<Vec<Vec<u8>>, CodecError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let needed = data.len().div_ceil(BANK_SIZE);
    if needed > max_banks {
        return Err(CodecError::TooManyBanks {
            needed,
            max: max_banks,
        });
    }

    let mut banks = Vec::with_capacity(needed);
    for chunk in data.chunks(BANK_SIZE) {
        let mut bank = chunk.to_vec();
        bank.resize(BANK_SIZE, 0);
        banks.push(bank);
    }
    Ok(banks)
}

/// PORTB values for the first `n_banks` banks
pub fn bank_portb_table(n_banks: usize) -> Result<&'static [u8], CodecError> {
    if n_banks > DBANK_TABLE.len() {
        return Err(CodecError::TooManyBanks {
            needed: n_banks,
            max: DBANK_TABLE.len(),
        });
    }
    Ok(&DBANK_TABLE[..n_banks])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_bank_padded() {
        let data: Vec<u8> = (0..=255).collect();
        let banks = split_into_banks(&data, MAX_BANKS).unwrap();
        assert_eq!(banks.len(), 1);
        assert_eq!(banks[0].len(), BANK_SIZE);
        assert_eq!(&banks[0][..256], &data[..]);
        assert!(banks[0][256..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_multi_bank() {
        let data = vec![0xFFu8; BANK_SIZE * 3 + 100];
        let banks = split_into_banks(&data, MAX_BANKS).unwrap();
        assert_eq!(banks.len(), 4);
        assert!(banks.iter().all(|b| b.len() == BANK_SIZE));
        assert_eq!(banks[3][99], 0xFF);
        assert_eq!(banks[3][100], 0x00);
    }

    #[test]
    fn test_overflow() {
        let data = vec![0u8; BANK_SIZE * 65];
        assert!(matches!(
            split_into_banks(&data, 64),
            Err(CodecError::TooManyBanks { needed: 65, max: 64 })
        ));
    }

    #[test]
    fn test_empty() {
        assert!(split_into_banks(&[], 64).unwrap().is_empty());
    }

    #[test]
    fn test_portb_table() {
        let portb = bank_portb_table(4).unwrap();
        assert_eq!(portb, &[0xE3, 0xC3, 0xA3, 0x83]);
        assert!(bank_portb_table(65).is_err());
    }
}

//! Splash screen text in ANTIC Mode 2 screen codes

/// Characters per splash line
pub(crate) const LINE_WIDTH: usize = 40;

/// Convert ASCII text to ANTIC Mode 2 screen codes, padded to 40 chars
///
/// ANTIC's character set is not ASCII: `$20-$5F` shifts down to `$00-$3F`
/// (space through underscore); lowercase stays where it is.
pub(crate) fn to_screen_codes(text: &str) -> [u8; LINE_WIDTH] {
    let mut codes = [0u8; LINE_WIDTH];
    for (slot, ch) in codes.iter_mut().zip(text.chars()) {
        let v = ch as u32;
        *slot = match v {
            0x20..=0x5F => (v - 0x20) as u8,
            0x60..=0x7F => v as u8,
            _ => 0x00,
        };
    }
    codes
}

/// Center text within the 40-column line
pub(crate) fn center(text: &str) -> String {
    let text: String = text.chars().take(LINE_WIDTH).collect();
    let pad = (LINE_WIDTH - text.chars().count()) / 2;
    format!("{:pad$}{}", "", text, pad = pad)
}

/// 40-column info line: channels, rate, codec, memory footprint
pub(crate) fn format_info_line(
    channels: u8,
    sample_rate: f64,
    mode_label: &str,
    ram_kb: usize,
) -> String {
    let line = format!(
        "{}CH  {}HZ  {}  {}KB",
        channels,
        sample_rate.round() as u64,
        mode_label,
        ram_kb
    );
    center(&line.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_codes() {
        let codes = to_screen_codes("A 0");
        assert_eq!(codes[0], 0x21); // 'A' = $41 - $20
        assert_eq!(codes[1], 0x00); // space
        assert_eq!(codes[2], 0x10); // '0' = $30 - $20
        assert_eq!(codes.len(), 40);
        assert!(codes[3..].iter().all(|&c| c == 0));
    }

    #[test]
    fn test_long_text_truncated() {
        let long = "X".repeat(60);
        let codes = to_screen_codes(&long);
        assert_eq!(codes.len(), 40);
        assert!(codes.iter().all(|&c| c == 0x38)); // 'X' = $58 - $20
    }

    #[test]
    fn test_info_line_fits() {
        let line = format_info_line(2, 7988.5, "VQ4", 128);
        assert!(line.chars().count() <= 40);
        assert!(line.contains("2CH"));
        assert!(line.contains("7989HZ"));
        assert!(line.contains("VQ4"));
        assert!(line.contains("128KB"));
    }
}

//! Windows-1252 decoding.
//!
//! Archive folder and file names are stored in the Windows "ANSI" code page.
//! Bytes below 0x80 and from 0xA0 upward map directly to the same Unicode
//! scalar; only the 0x80..=0x9F block differs from Latin-1.

/// Unicode scalars for 0x80..=0x9F. Unassigned slots map to the C1 control
/// of the same value, matching the WHATWG decoder.
const HIGH_BLOCK: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

/// Decode a single byte.
#[inline]
pub fn decode_byte(b: u8) -> char {
    match b {
        0x80..=0x9F => HIGH_BLOCK[(b - 0x80) as usize],
        _ => b as char,
    }
}

/// Decode a Windows-1252 byte string.
pub fn decode(bytes: &[u8]) -> String {
    if bytes.is_ascii() {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    bytes.iter().map(|&b| decode_byte(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        assert_eq!(decode(b"meshes\\armor"), "meshes\\armor");
    }

    #[test]
    fn test_high_block() {
        assert_eq!(decode(&[0x80, 0x99, 0xE9]), "\u{20AC}\u{2122}\u{e9}");
    }
}

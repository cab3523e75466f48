//! Archive path hashing.
//!
//! The low half packs the first, last and second-to-last characters with
//! the stem length; the high half is a multiplicative hash over the inner
//! characters plus one over the extension.

const MULTIPLIER: u32 = 0x1003F;

/// Extensions that set fixed bits in the low half.
const EXTENSION_BITS: [(&[u8], u32); 4] = [
    (b".kf", 0x80),
    (b".nif", 0x8000),
    (b".dds", 0x8080),
    (b".wav", 0x8000_0000),
];

/// Hash a folder or file path.
///
/// Case and slash direction do not affect the result. File paths are split
/// at the last `.` of their final component; folder paths never are.
pub fn hash_path(path: &str, is_folder: bool) -> u64 {
    hash_bytes(path.as_bytes(), is_folder)
}

/// [`hash_path`] over raw (Windows-1252) bytes.
pub fn hash_bytes(path: &[u8], is_folder: bool) -> u64 {
    let normalized: Vec<u8> = path
        .iter()
        .map(|&b| match b {
            b'/' => b'\\',
            _ => b.to_ascii_lowercase(),
        })
        .collect();

    let (stem, ext) = if is_folder {
        (&normalized[..], &[][..])
    } else {
        split_extension(&normalized)
    };

    let len = stem.len();
    let mut low = 0u32;
    if len > 0 {
        low = u32::from(stem[len - 1])
            | (len as u32) << 16
            | u32::from(stem[0]) << 24;
        if len > 2 {
            low |= u32::from(stem[len - 2]) << 8;
        }
    }
    for (known, bits) in EXTENSION_BITS {
        if ext == known {
            low |= bits;
        }
    }

    let inner = if len > 3 { &stem[1..len - 2] } else { &[][..] };
    let high = polynomial(inner).wrapping_add(polynomial(ext));

    u64::from(high) << 32 | u64::from(low)
}

fn split_extension(name: &[u8]) -> (&[u8], &[u8]) {
    let file_start = name.iter().rposition(|&b| b == b'\\').map_or(0, |i| i + 1);
    match name[file_start..].iter().rposition(|&b| b == b'.') {
        Some(dot) => name.split_at(file_start + dot),
        None => (name, &[][..]),
    }
}

fn polynomial(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |h, &b| h.wrapping_mul(MULTIPLIER).wrapping_add(u32::from(b)))
}

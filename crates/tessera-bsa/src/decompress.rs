//! Payload decompression.

use std::io::Read;

use flate2::read::ZlibDecoder;
use log::warn;

/// Inflate a compressed payload: a 4-byte little-endian length followed by
/// a zlib stream.
///
/// Corrupt payloads occur in shipped archives, so failures yield an empty
/// buffer and a warning instead of an error.
pub fn inflate_payload(path: &str, raw: &[u8]) -> Vec<u8> {
    if raw.len() < 4 {
        warn!("{}: compressed payload of {} bytes has no length prefix", path, raw.len());
        return Vec::new();
    }
    let expected = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
    // The prefix is untrusted: cap the preallocation and stop one byte past
    // the declared size.
    let mut out = Vec::with_capacity(expected.min(raw.len().saturating_mul(8)));
    let decoder = ZlibDecoder::new(&raw[4..]);
    match decoder.take(expected as u64 + 1).read_to_end(&mut out) {
        Ok(_) if out.len() == expected => out,
        Ok(_) => {
            warn!(
                "{}: decompressed to {} bytes, expected {}",
                path,
                out.len(),
                expected
            );
            out
        }
        Err(e) => {
            warn!("{}: decompression failed: {}", path, e);
            Vec::new()
        }
    }
}

/// A file's raw bytes, decompressed on demand.
#[derive(Debug, Clone)]
pub struct DeferredPayload {
    raw: Vec<u8>,
    compressed: bool,
}

impl DeferredPayload {
    pub fn new(raw: Vec<u8>, compressed: bool) -> Self {
        Self { raw, compressed }
    }

    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Stored length, before decompression.
    #[inline]
    pub fn raw_len(&self) -> usize {
        self.raw.len()
    }

    /// The file contents. `path` only labels warnings.
    pub fn resolve(self, path: &str) -> Vec<u8> {
        if self.compressed {
            inflate_payload(path, &self.raw)
        } else {
            self.raw
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_inflate() {
        let data = b"hello hello hello";
        let mut raw = (data.len() as u32).to_le_bytes().to_vec();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(data).unwrap();
        raw.extend(encoder.finish().unwrap());

        let payload = DeferredPayload::new(raw, true);
        assert_eq!(payload.resolve("a.txt"), data);
    }

    #[test]
    fn test_huge_length_prefix() {
        let data = b"short";
        let mut raw = u32::MAX.to_le_bytes().to_vec();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(data).unwrap();
        raw.extend(encoder.finish().unwrap());

        // Short output is kept with a warning.
        assert_eq!(inflate_payload("big", &raw), data);
    }

    #[test]
    fn test_corrupt_payload_is_empty() {
        assert!(inflate_payload("bad", &[5, 0, 0, 0, 1, 2, 3]).is_empty());
        assert!(inflate_payload("short", &[5]).is_empty());
    }
}

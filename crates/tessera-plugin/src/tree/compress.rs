//! Zlib handling for compressed field blocks.
//!
//! A compressed block is a 4-byte little-endian uncompressed length followed
//! by a zlib stream.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use rayon::prelude::*;
use tessera_common::CancelToken;

use super::field::{encode_fields, Field};
use crate::codec::FieldIter;
use crate::{Error, Result};

/// Inflate a compressed field block, prefix included.
pub fn inflate(id: u32, block: &[u8]) -> Result<Vec<u8>> {
    if block.len() < 4 {
        return Err(Error::Decompression {
            id,
            message: format!("block of {} bytes has no length prefix", block.len()),
        });
    }
    let expected = u32::from_le_bytes([block[0], block[1], block[2], block[3]]) as usize;
    // The prefix is untrusted: cap the preallocation and stop one byte past
    // the declared size.
    let mut out = Vec::with_capacity(expected.min(block.len().saturating_mul(8)));
    ZlibDecoder::new(&block[4..])
        .take(expected as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| Error::Decompression {
            id,
            message: e.to_string(),
        })?;
    if out.len() != expected {
        return Err(Error::DecompressedSizeMismatch {
            id,
            expected,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Deflate an encoded field block, prepending its length.
pub fn deflate(id: u32, raw: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(raw.len()).map_err(|_| Error::TooLarge(raw.len()))?;
    let mut out = Vec::with_capacity(raw.len() / 2 + 16);
    out.extend_from_slice(&len.to_le_bytes());
    let mut encoder = ZlibEncoder::new(out, Compression::default());
    encoder.write_all(raw).map_err(|e| Error::Compression {
        id,
        message: e.to_string(),
    })?;
    encoder.finish().map_err(|e| Error::Compression {
        id,
        message: e.to_string(),
    })
}

/// Inflate a compressed block and decode its fields.
pub fn decode_packed(id: u32, block: &[u8]) -> Result<Vec<Field>> {
    let raw = inflate(id, block)?;
    FieldIter::new(tessera_common::Segment::new(&raw))
        .map(|f| f.map(Field::from))
        .collect()
}

/// A record whose compressed block still has to be decoded into fields.
pub(crate) struct InflateJob<'a> {
    pub id: u32,
    pub block: &'a [u8],
    pub fields: &'a mut Vec<Field>,
}

/// Decode every pending block in parallel.
pub(crate) fn inflate_all(jobs: Vec<InflateJob<'_>>, cancel: &CancelToken) -> Result<()> {
    jobs.into_par_iter().try_for_each(|job| {
        cancel.check()?;
        *job.fields = decode_packed(job.id, job.block)?;
        Ok(())
    })
}

/// A compressed record whose block must be rebuilt from its fields.
pub(crate) struct PackJob<'a> {
    pub id: u32,
    pub fields: &'a [Field],
    pub packed: &'a mut Option<Vec<u8>>,
}

/// Encode and deflate every pending block in parallel.
pub(crate) fn deflate_all(jobs: Vec<PackJob<'_>>, cancel: &CancelToken) -> Result<()> {
    jobs.into_par_iter().try_for_each(|job| {
        cancel.check()?;
        let raw = encode_fields(job.fields)?;
        *job.packed = Some(deflate(job.id, &raw)?);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deflate_inflate() {
        let raw = b"EDID\x04\x00abc\0".repeat(50);
        let packed = deflate(7, &raw).unwrap();
        assert_eq!(&packed[..4], &(raw.len() as u32).to_le_bytes());
        assert!(packed.len() < raw.len());
        assert_eq!(inflate(7, &packed).unwrap(), raw);

        let fields = decode_packed(7, &packed).unwrap();
        assert_eq!(fields.len(), 50);
    }

    #[test]
    fn test_size_mismatch() {
        let mut packed = deflate(1, b"abcdef").unwrap();
        packed[0] = 9;
        assert!(matches!(
            inflate(1, &packed),
            Err(Error::DecompressedSizeMismatch {
                expected: 9,
                actual: 6,
                ..
            })
        ));
    }

    #[test]
    fn test_untrusted_length_prefix() {
        let mut packed = deflate(2, b"abcdef").unwrap();
        packed[..4].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            inflate(2, &packed),
            Err(Error::DecompressedSizeMismatch { actual: 6, .. })
        ));

        let mut packed = deflate(2, &[7u8; 64]).unwrap();
        packed[..4].copy_from_slice(&4u32.to_le_bytes());
        assert!(matches!(
            inflate(2, &packed),
            Err(Error::DecompressedSizeMismatch {
                expected: 4,
                actual: 5,
                ..
            })
        ));
    }

    #[test]
    fn test_garbage_is_an_error() {
        let block = [6, 0, 0, 0, 0xde, 0xad, 0xbe, 0xef];
        assert!(matches!(inflate(3, &block), Err(Error::Decompression { id: 3, .. })));
        assert!(inflate(3, &[1, 2]).is_err());
    }
}

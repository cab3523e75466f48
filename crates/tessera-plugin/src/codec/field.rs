//! Field block decoding and encoding.
//!
//! A field is a tag, a 16-bit length and that many payload bytes. Payloads
//! longer than 65535 bytes are preceded by an [`XXXX`] field whose 4-byte
//! payload is the real length of exactly the next field; that field's own
//! 16-bit length is ignored.

use byteorder::{LittleEndian, WriteBytesExt};
use tessera_common::{Cursor, Segment, Tag};

use super::header::XXXX;
use crate::{Error, Result};

/// Size of a field header (tag + 16-bit length).
pub const FIELD_HEADER_SIZE: usize = 6;

/// A field borrowed from a decoded data block.
#[derive(Debug, Clone, Copy)]
pub struct FieldView<'a> {
    pub tag: Tag,
    pub data: &'a [u8],
}

/// Iterator over the fields of an uncompressed data block.
#[derive(Debug, Clone)]
pub struct FieldIter<'a> {
    cursor: Cursor<'a>,
    base: usize,
    failed: bool,
}

impl<'a> FieldIter<'a> {
    pub fn new(seg: Segment<'a>) -> Self {
        Self {
            cursor: seg.cursor(),
            base: seg.offset(),
            failed: false,
        }
    }

    fn next_field(&mut self) -> Result<Option<FieldView<'a>>> {
        let mut pending: Option<(usize, u32)> = None;
        loop {
            if self.cursor.is_empty() {
                return match pending {
                    Some((offset, _)) => Err(Error::DanglingLengthOverride { offset }),
                    None => Ok(None),
                };
            }
            let offset = self.base + self.cursor.position();
            let tag = self.cursor.read_tag()?;
            let short_len = self.cursor.read_u16()?;

            if tag == XXXX {
                let payload = self.cursor.read_bytes(short_len as usize)?;
                let override_len = Segment::new(payload).read_u32_le(0)?;
                pending = Some((offset, override_len));
                continue;
            }

            let len = match pending.take() {
                Some((_, long_len)) => long_len as usize,
                None => short_len as usize,
            };
            let data = self.cursor.read_bytes(len)?;
            return Ok(Some(FieldView { tag, data }));
        }
    }
}

impl<'a> Iterator for FieldIter<'a> {
    type Item = Result<FieldView<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_field() {
            Ok(Some(field)) => Some(Ok(field)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Encoded size of one field, including any length override.
#[inline]
pub fn encoded_field_len(data_len: usize) -> usize {
    if data_len > u16::MAX as usize {
        FIELD_HEADER_SIZE + 4 + FIELD_HEADER_SIZE + data_len
    } else {
        FIELD_HEADER_SIZE + data_len
    }
}

/// Append one encoded field to `out`.
pub fn encode_field(tag: Tag, data: &[u8], out: &mut Vec<u8>) -> Result<()> {
    if data.len() > u16::MAX as usize {
        let long_len = u32::try_from(data.len()).map_err(|_| Error::TooLarge(data.len()))?;
        out.write_u32::<LittleEndian>(XXXX.as_u32())?;
        out.write_u16::<LittleEndian>(4)?;
        out.write_u32::<LittleEndian>(long_len)?;
        out.write_u32::<LittleEndian>(tag.as_u32())?;
        out.write_u16::<LittleEndian>(0)?;
    } else {
        out.write_u32::<LittleEndian>(tag.as_u32())?;
        out.write_u16::<LittleEndian>(data.len() as u16)?;
    }
    out.extend_from_slice(data);
    Ok(())
}

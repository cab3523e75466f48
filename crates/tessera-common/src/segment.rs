//! Bounded windows and cursors over a shared byte buffer.
//!
//! A [`Segment`] is a `(buffer, offset, length)` window that never copies
//! the underlying bytes. Every read is bounds-checked against the window and
//! every offset computation is overflow-checked; this is the boundary the
//! codec layers above rely on for memory safety of malformed input.
//!
//! A [`Cursor`] is a position inside a segment that advances as it reads.
//!
//! # Example
//!
//! ```
//! use tessera_common::Segment;
//!
//! let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
//! let seg = Segment::new(&data);
//!
//! assert_eq!(seg.read_u32_le(0).unwrap(), 0x04030201);
//! assert_eq!(seg.read_u16_be(3).unwrap(), 0x0405);
//! assert!(seg.read_u32_le(6).is_err());
//! ```

use std::ops::Range;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use zerocopy::FromBytes;

use crate::{Error, Result, Tag};

/// A bounded, zero-copy window into a byte buffer.
#[derive(Debug, Clone, Copy)]
pub struct Segment<'a> {
    buf: &'a [u8],
    offset: usize,
    len: usize,
}

impl<'a> Segment<'a> {
    /// A segment covering the whole buffer.
    #[inline]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            len: buf.len(),
        }
    }

    /// A segment covering `len` bytes at `offset` of `buf`.
    pub fn with_range(buf: &'a [u8], offset: usize, len: usize) -> Result<Self> {
        let end = checked_end(offset, len)?;
        if end > buf.len() {
            return Err(Error::OutOfBounds {
                offset,
                len,
                available: buf.len().saturating_sub(offset),
            });
        }
        Ok(Self { buf, offset, len })
    }

    /// Absolute offset of this segment within the underlying buffer.
    #[inline]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Length of the window.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The windowed bytes.
    #[inline]
    pub fn bytes(&self) -> &'a [u8] {
        &self.buf[self.offset..self.offset + self.len]
    }

    /// Translate a relative range into an absolute one, checking bounds.
    fn range(&self, at: usize, n: usize) -> Result<Range<usize>> {
        let end = checked_end(at, n)?;
        if end > self.len {
            return Err(Error::OutOfBounds {
                offset: self.offset.saturating_add(at),
                len: n,
                available: self.len.saturating_sub(at),
            });
        }
        let start = self.offset + at;
        Ok(start..start + n)
    }

    /// Borrow `n` bytes at relative offset `at`.
    #[inline]
    pub fn get(&self, at: usize, n: usize) -> Result<&'a [u8]> {
        let range = self.range(at, n)?;
        Ok(&self.buf[range])
    }

    /// A sub-window of `n` bytes at relative offset `at`.
    pub fn slice(&self, at: usize, n: usize) -> Result<Segment<'a>> {
        let range = self.range(at, n)?;
        Ok(Segment {
            buf: self.buf,
            offset: range.start,
            len: n,
        })
    }

    /// The sub-window from relative offset `at` to the end.
    pub fn slice_from(&self, at: usize) -> Result<Segment<'a>> {
        let n = self.len.checked_sub(at).ok_or(Error::OutOfBounds {
            offset: self.offset.saturating_add(at),
            len: 0,
            available: 0,
        })?;
        self.slice(at, n)
    }

    /// Copy the whole window into `dest`.
    pub fn copy_to(&self, dest: &mut [u8]) -> Result<()> {
        if dest.len() < self.len {
            return Err(Error::DestinationTooSmall {
                needed: self.len,
                available: dest.len(),
            });
        }
        dest[..self.len].copy_from_slice(self.bytes());
        Ok(())
    }

    /// Copy the window into a new owned vector.
    #[inline]
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes().to_vec()
    }

    #[inline]
    pub fn read_u8(&self, at: usize) -> Result<u8> {
        self.get(at, 1).map(|b| b[0])
    }

    #[inline]
    pub fn read_u16_le(&self, at: usize) -> Result<u16> {
        self.get(at, 2).map(LittleEndian::read_u16)
    }

    #[inline]
    pub fn read_u16_be(&self, at: usize) -> Result<u16> {
        self.get(at, 2).map(BigEndian::read_u16)
    }

    #[inline]
    pub fn read_i16_le(&self, at: usize) -> Result<i16> {
        self.get(at, 2).map(LittleEndian::read_i16)
    }

    #[inline]
    pub fn read_u32_le(&self, at: usize) -> Result<u32> {
        self.get(at, 4).map(LittleEndian::read_u32)
    }

    #[inline]
    pub fn read_u32_be(&self, at: usize) -> Result<u32> {
        self.get(at, 4).map(BigEndian::read_u32)
    }

    #[inline]
    pub fn read_u64_le(&self, at: usize) -> Result<u64> {
        self.get(at, 8).map(LittleEndian::read_u64)
    }

    #[inline]
    pub fn read_u64_be(&self, at: usize) -> Result<u64> {
        self.get(at, 8).map(BigEndian::read_u64)
    }

    /// Read a packed tag at relative offset `at`.
    #[inline]
    pub fn read_tag(&self, at: usize) -> Result<Tag> {
        self.read_u32_le(at).map(Tag::from_raw)
    }

    /// A cursor positioned at the start of this segment.
    #[inline]
    pub fn cursor(&self) -> Cursor<'a> {
        Cursor {
            segment: *self,
            position: 0,
        }
    }
}

/// A reading position inside a [`Segment`].
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    segment: Segment<'a>,
    position: usize,
}

impl<'a> Cursor<'a> {
    /// Create a cursor over a whole buffer.
    #[inline]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self {
            segment: Segment::new(buf),
            position: 0,
        }
    }

    /// Current position relative to the segment start.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Number of bytes left to read.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.segment.len().saturating_sub(self.position)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position >= self.segment.len()
    }

    /// Move to an absolute position within the segment.
    pub fn seek(&mut self, position: usize) -> Result<()> {
        if position > self.segment.len() {
            return Err(Error::OutOfBounds {
                offset: self.segment.offset().saturating_add(position),
                len: 0,
                available: 0,
            });
        }
        self.position = position;
        Ok(())
    }

    /// Skip `count` bytes.
    pub fn advance(&mut self, count: usize) -> Result<()> {
        let target = checked_end(self.position, count)?;
        self.seek(target)
    }

    /// Read `count` bytes as a borrowed slice.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.segment.get(self.position, count)?;
        self.position += count;
        Ok(bytes)
    }

    /// Read `count` bytes as a sub-segment.
    pub fn read_segment(&mut self, count: usize) -> Result<Segment<'a>> {
        let seg = self.segment.slice(self.position, count)?;
        self.position += count;
        Ok(seg)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_bytes(1).map(|b| b[0])
    }

    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_bytes(2).map(LittleEndian::read_u16)
    }

    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_bytes(4).map(LittleEndian::read_u32)
    }

    #[inline]
    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_bytes(8).map(LittleEndian::read_u64)
    }

    #[inline]
    pub fn read_tag(&mut self) -> Result<Tag> {
        self.read_u32().map(Tag::from_raw)
    }

    /// Read a fixed-layout header struct.
    ///
    /// The struct must implement `FromBytes` from the zerocopy crate.
    #[inline]
    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        let size = std::mem::size_of::<T>();
        let bytes = self.read_bytes(size)?;
        T::read_from_bytes(bytes).map_err(|_| Error::OutOfBounds {
            offset: self.segment.offset() + self.position - size,
            len: size,
            available: bytes.len(),
        })
    }

    /// Peek at the next little-endian `u32` without advancing.
    #[inline]
    pub fn peek_u32(&self) -> Result<u32> {
        self.segment.read_u32_le(self.position)
    }

    /// Read bytes up to (not including) the next NUL, consuming the NUL.
    pub fn read_cstring_bytes(&mut self) -> Result<&'a [u8]> {
        let rest = self.segment.get(self.position, self.remaining())?;
        let nul = memchr::memchr(0, rest).ok_or(Error::MissingNullTerminator(
            self.segment.offset() + self.position,
        ))?;
        self.position += nul + 1;
        Ok(&rest[..nul])
    }
}

#[inline]
fn checked_end(offset: usize, len: usize) -> Result<usize> {
    offset.checked_add(len).ok_or(Error::Overflow { offset, len })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unaligned_reads() {
        let data = [0xAAu8, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let seg = Segment::new(&data);

        assert_eq!(seg.read_u32_le(1).unwrap(), 0x04030201);
        assert_eq!(seg.read_u32_be(1).unwrap(), 0x01020304);
        assert_eq!(seg.read_u64_le(1).unwrap(), 0x0807060504030201);
    }

    #[test]
    fn test_sub_segment_is_relative() {
        let data = [0u8, 1, 2, 3, 4, 5, 6, 7];
        let seg = Segment::new(&data).slice(2, 4).unwrap();

        assert_eq!(seg.offset(), 2);
        assert_eq!(seg.read_u8(0).unwrap(), 2);
        assert!(seg.read_u8(4).is_err());
        assert_eq!(seg.slice(1, 2).unwrap().bytes(), &[3, 4]);
    }

    #[test]
    fn test_overflow_is_rejected() {
        let data = [0u8; 4];
        let seg = Segment::new(&data);

        assert!(matches!(
            seg.get(usize::MAX, 2),
            Err(Error::Overflow { .. })
        ));
        assert!(matches!(
            Segment::with_range(&data, 3, 2),
            Err(Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_copy_to() {
        let data = [9u8, 8, 7];
        let seg = Segment::new(&data);
        let mut small = [0u8; 2];
        let mut big = [0u8; 4];

        assert!(seg.copy_to(&mut small).is_err());
        seg.copy_to(&mut big).unwrap();
        assert_eq!(big, [9, 8, 7, 0]);
    }

    #[test]
    fn test_cursor_cstring() {
        let data = b"hello\0world\0";
        let mut cursor = Cursor::new(data);

        assert_eq!(cursor.read_cstring_bytes().unwrap(), b"hello");
        assert_eq!(cursor.read_cstring_bytes().unwrap(), b"world");
        assert!(cursor.is_empty());
        assert!(cursor.read_cstring_bytes().is_err());
    }

    #[test]
    fn test_cursor_peek_does_not_advance() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut cursor = Cursor::new(&data);

        assert_eq!(cursor.peek_u32().unwrap(), 0x04030201);
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.read_u32().unwrap(), 0x04030201);
        assert!(cursor.read_u8().is_err());
    }
}

//! Zero-copy views over encoded records and groups.

use tessera_common::{Segment, Tag};

use super::field::FieldIter;
use super::group_reader::GroupReader;
use super::header::{flags, GroupHeader, GroupType, RecordHeader, GRUP, HEADER_SIZE};
use crate::{Error, Result};

/// A record header plus its data block, borrowed from a buffer.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    seg: Segment<'a>,
    header: RecordHeader,
}

impl<'a> RecordView<'a> {
    /// Interpret the start of `seg` as a record, bounding the view to the
    /// record's declared extent.
    pub fn parse(seg: Segment<'a>) -> Result<Self> {
        let header: RecordHeader = seg.cursor().read_struct()?;
        let data_size = header.data_size as usize;
        let available = seg.len().saturating_sub(HEADER_SIZE);
        if data_size > available {
            return Err(Error::SizeOverrun {
                kind: "record",
                offset: seg.offset(),
                declared: data_size,
                available,
            });
        }
        Ok(Self {
            seg: seg.slice(0, HEADER_SIZE + data_size)?,
            header,
        })
    }

    /// The decoded header.
    #[inline]
    pub fn header(&self) -> RecordHeader {
        self.header
    }

    #[inline]
    pub fn tag(&self) -> Tag {
        Tag::from_raw(self.header.tag)
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.header.id
    }

    #[inline]
    pub fn flags(&self) -> u32 {
        self.header.flags
    }

    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.header.flags & flags::COMPRESSED != 0
    }

    /// Total encoded length including the header.
    #[inline]
    pub fn total_len(&self) -> usize {
        self.seg.len()
    }

    /// The data block following the header, compressed or not.
    #[inline]
    pub fn data(&self) -> Segment<'a> {
        // Bounds established in `parse`.
        self.seg
            .slice_from(HEADER_SIZE)
            .unwrap_or_else(|_| Segment::new(&[]))
    }

    /// Iterate the fields of an uncompressed data block.
    pub fn fields(&self) -> FieldIter<'a> {
        FieldIter::new(self.data())
    }
}

/// A group header plus its children, borrowed from a buffer.
#[derive(Debug, Clone, Copy)]
pub struct GroupView<'a> {
    seg: Segment<'a>,
    header: GroupHeader,
}

impl<'a> GroupView<'a> {
    /// Interpret the start of `seg` as a group, bounding the view to the
    /// group's declared size.
    pub fn parse(seg: Segment<'a>) -> Result<Self> {
        let header: GroupHeader = seg.cursor().read_struct()?;
        if header.tag != GRUP.as_u32() {
            return Err(Error::InvalidGroupTag {
                offset: seg.offset(),
                actual: Tag::from_raw(header.tag),
            });
        }
        let size = header.group_size as usize;
        if size < HEADER_SIZE {
            return Err(Error::GroupTooSmall {
                offset: seg.offset(),
                size: header.group_size,
            });
        }
        if size > seg.len() {
            return Err(Error::SizeOverrun {
                kind: "group",
                offset: seg.offset(),
                declared: size,
                available: seg.len(),
            });
        }
        Ok(Self {
            seg: seg.slice(0, size)?,
            header,
        })
    }

    #[inline]
    pub fn header(&self) -> GroupHeader {
        self.header
    }

    #[inline]
    pub fn group_type(&self) -> GroupType {
        GroupType::from_raw(self.header.group_type)
    }

    #[inline]
    pub fn label(&self) -> u32 {
        self.header.label
    }

    /// Total encoded length including the header.
    #[inline]
    pub fn total_len(&self) -> usize {
        self.seg.len()
    }

    /// The whole group, header included.
    #[inline]
    pub fn segment(&self) -> Segment<'a> {
        self.seg
    }

    /// A pull reader over this group's children.
    pub fn reader(&self) -> GroupReader<'a> {
        GroupReader::new(*self)
    }
}

//! Pull-based decoder over one group's children.

use tessera_common::Segment;

use super::header::{GRUP, HEADER_SIZE};
use super::view::{GroupView, RecordView};
use crate::{Error, Result};

/// Position of a [`GroupReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Nothing read yet.
    Start,
    /// Positioned on a child record.
    Record,
    /// Positioned on a nested group.
    Subgroup,
    /// Past the last child.
    Done,
}

/// A state machine walking the children of one group.
///
/// Each [`advance`](GroupReader::advance) moves past the current child and
/// classifies the next one by its first four bytes.
///
/// ```ignore
/// let mut reader = group.reader();
/// loop {
///     match reader.advance()? {
///         ReaderState::Record => handle_record(reader.record()?),
///         ReaderState::Subgroup => handle_group(reader.subgroup()?),
///         ReaderState::Done => break,
///         ReaderState::Start => unreachable!(),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct GroupReader<'a> {
    seg: Segment<'a>,
    position: usize,
    current_len: usize,
    state: ReaderState,
}

impl<'a> GroupReader<'a> {
    pub fn new(group: GroupView<'a>) -> Self {
        Self {
            seg: group.segment(),
            position: HEADER_SIZE,
            current_len: 0,
            state: ReaderState::Start,
        }
    }

    #[inline]
    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Move to the next child.
    pub fn advance(&mut self) -> Result<ReaderState> {
        if self.state == ReaderState::Done {
            return Ok(ReaderState::Done);
        }
        self.position = self
            .position
            .checked_add(self.current_len)
            .ok_or(tessera_common::Error::Overflow {
                offset: self.position,
                len: self.current_len,
            })?;
        self.current_len = 0;

        if self.position >= self.seg.len() {
            self.state = ReaderState::Done;
            return Ok(self.state);
        }

        let rest = self.seg.slice_from(self.position)?;
        if rest.read_tag(0)? == GRUP {
            self.current_len = GroupView::parse(rest)?.total_len();
            self.state = ReaderState::Subgroup;
        } else {
            self.current_len = RecordView::parse(rest)?.total_len();
            self.state = ReaderState::Record;
        }
        Ok(self.state)
    }

    /// The record under the reader.
    pub fn record(&self) -> Result<RecordView<'a>> {
        self.expect(ReaderState::Record)?;
        RecordView::parse(self.seg.slice(self.position, self.current_len)?)
    }

    /// The nested group under the reader.
    pub fn subgroup(&self) -> Result<GroupView<'a>> {
        self.expect(ReaderState::Subgroup)?;
        GroupView::parse(self.seg.slice(self.position, self.current_len)?)
    }

    fn expect(&self, expected: ReaderState) -> Result<()> {
        if self.state != expected {
            return Err(Error::ReaderState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{GroupHeader, RecordHeader};
    use tessera_common::Tag;
    use zerocopy::IntoBytes;

    fn record(tag: &[u8; 4], id: u32) -> Vec<u8> {
        let body = b"EDID\x02\x00x\0";
        let header = RecordHeader {
            tag: Tag::lit(tag).as_u32(),
            data_size: body.len() as u32,
            id,
            ..Default::default()
        };
        let mut out = header.as_bytes().to_vec();
        out.extend_from_slice(body);
        out
    }

    fn group(group_type: u32, label: u32, children: &[u8]) -> Vec<u8> {
        let header = GroupHeader {
            tag: GRUP.as_u32(),
            group_size: (HEADER_SIZE + children.len()) as u32,
            label,
            group_type,
            ..Default::default()
        };
        let mut out = header.as_bytes().to_vec();
        out.extend_from_slice(children);
        out
    }

    fn cell_group() -> Vec<u8> {
        let mut children = record(b"CELL", 0x10);
        children.extend(group(6, 0x10, &record(b"REFR", 0x11)));
        children.extend(record(b"CELL", 0x12));
        group(0, Tag::lit(b"CELL").as_u32(), &children)
    }

    #[test]
    fn test_walks_mixed_children() {
        let bytes = cell_group();
        let view = GroupView::parse(Segment::new(&bytes)).unwrap();
        let mut reader = view.reader();
        assert_eq!(reader.state(), ReaderState::Start);

        assert_eq!(reader.advance().unwrap(), ReaderState::Record);
        assert_eq!(reader.record().unwrap().id(), 0x10);

        assert_eq!(reader.advance().unwrap(), ReaderState::Subgroup);
        let sub = reader.subgroup().unwrap();
        assert_eq!(sub.label(), 0x10);
        let mut inner = sub.reader();
        assert_eq!(inner.advance().unwrap(), ReaderState::Record);
        assert_eq!(inner.record().unwrap().tag(), Tag::lit(b"REFR"));
        assert_eq!(inner.advance().unwrap(), ReaderState::Done);

        assert_eq!(reader.advance().unwrap(), ReaderState::Record);
        assert_eq!(reader.record().unwrap().id(), 0x12);
        assert_eq!(reader.advance().unwrap(), ReaderState::Done);
    }

    #[test]
    fn test_done_is_sticky() {
        let bytes = group(0, 0, &[]);
        let view = GroupView::parse(Segment::new(&bytes)).unwrap();
        let mut reader = view.reader();
        assert_eq!(reader.advance().unwrap(), ReaderState::Done);
        assert_eq!(reader.advance().unwrap(), ReaderState::Done);
        assert_eq!(reader.state(), ReaderState::Done);
    }

    #[test]
    fn test_wrong_accessor_is_an_error() {
        let bytes = cell_group();
        let view = GroupView::parse(Segment::new(&bytes)).unwrap();
        let mut reader = view.reader();

        assert!(matches!(
            reader.record(),
            Err(Error::ReaderState {
                expected: ReaderState::Record,
                actual: ReaderState::Start,
            })
        ));

        reader.advance().unwrap();
        assert!(matches!(
            reader.subgroup(),
            Err(Error::ReaderState {
                expected: ReaderState::Subgroup,
                actual: ReaderState::Record,
            })
        ));

        reader.advance().unwrap();
        assert!(matches!(
            reader.record(),
            Err(Error::ReaderState {
                expected: ReaderState::Record,
                actual: ReaderState::Subgroup,
            })
        ));

        while reader.advance().unwrap() != ReaderState::Done {}
        assert!(reader.record().is_err());
        assert!(reader.subgroup().is_err());
    }
}

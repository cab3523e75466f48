//! Whole-file block framing and size validation.

use std::io::Read;

use log::debug;
use tessera_common::{Segment, Tag};
use zerocopy::FromBytes;

use super::header::{GroupHeader, RecordHeader, GRUP, HEADER_SIZE};
use super::view::{GroupView, RecordView};
use super::ReaderState;
use crate::{Error, Result};

/// A plugin split into its top-level blocks, each holding header and body.
#[derive(Debug, Clone, Default)]
pub struct RawPlugin {
    /// The header record.
    pub header: Vec<u8>,
    /// Top-level groups in file order.
    pub groups: Vec<Vec<u8>>,
}

impl RawPlugin {
    /// Total number of bytes across all blocks.
    pub fn len(&self) -> usize {
        self.header.len() + self.groups.iter().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.groups.is_empty()
    }

    /// Concatenate the blocks back into one buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(&self.header);
        for group in self.groups {
            out.extend_from_slice(&group);
        }
        out
    }
}

/// Read header-framed blocks from a sequential stream.
///
/// The first block must be a record; every later block must be a group.
pub fn read_blocks<R: Read>(mut reader: R) -> Result<RawPlugin> {
    let mut raw = RawPlugin::default();
    let mut offset = 0u64;
    let mut first = true;

    loop {
        let mut head = [0u8; HEADER_SIZE];
        let read = read_full(&mut reader, &mut head)?;
        if read == 0 {
            break;
        }
        if read < HEADER_SIZE {
            return Err(Error::TruncatedHeader { offset, read });
        }

        let tag = Tag::from_raw(u32::from_le_bytes([head[0], head[1], head[2], head[3]]));
        let body_len = if tag == GRUP {
            let group = GroupHeader::read_from_bytes(&head)
                .map_err(|_| Error::TruncatedHeader { offset, read })?;
            if (group.group_size as usize) < HEADER_SIZE {
                return Err(Error::GroupTooSmall {
                    offset: offset as usize,
                    size: group.group_size,
                });
            }
            group.group_size as usize - HEADER_SIZE
        } else {
            let record = RecordHeader::read_from_bytes(&head)
                .map_err(|_| Error::TruncatedHeader { offset, read })?;
            record.data_size as usize
        };

        // The declared length is untrusted; let the buffer grow with the
        // bytes actually present.
        let mut block = head.to_vec();
        let got = (&mut reader).take(body_len as u64).read_to_end(&mut block)?;
        if got < body_len {
            return Err(Error::SizeOverrun {
                kind: if tag == GRUP { "group" } else { "record" },
                offset: offset as usize,
                declared: body_len,
                available: got,
            });
        }

        match (first, tag == GRUP) {
            (true, false) => raw.header = block,
            (true, true) => return Err(Error::MissingHeaderRecord),
            (false, true) => raw.groups.push(block),
            (false, false) => return Err(Error::UnexpectedTopLevelRecord { offset, tag }),
        }
        first = false;
        offset += (HEADER_SIZE + body_len) as u64;
    }

    if first {
        return Err(Error::MissingHeaderRecord);
    }
    debug!(
        "read plugin: {} bytes, {} top-level groups",
        offset,
        raw.groups.len()
    );
    Ok(raw)
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Split a contiguous plugin buffer into its header record and top-level
/// groups.
pub fn split_blocks(seg: Segment<'_>) -> Result<(RecordView<'_>, Vec<GroupView<'_>>)> {
    if seg.len() < HEADER_SIZE {
        return Err(Error::TruncatedHeader {
            offset: 0,
            read: seg.len(),
        });
    }
    if seg.read_tag(0)? == GRUP {
        return Err(Error::MissingHeaderRecord);
    }
    let header = RecordView::parse(seg)?;

    let mut groups = Vec::new();
    let mut position = header.total_len();
    while position < seg.len() {
        let rest = seg.slice_from(position)?;
        if rest.len() < HEADER_SIZE {
            return Err(Error::TruncatedHeader {
                offset: position as u64,
                read: rest.len(),
            });
        }
        let tag = rest.read_tag(0)?;
        if tag != GRUP {
            return Err(Error::UnexpectedTopLevelRecord {
                offset: position as u64,
                tag,
            });
        }
        let group = GroupView::parse(rest)?;
        position += group.total_len();
        groups.push(group);
    }
    Ok((header, groups))
}

/// Counts gathered by [`validate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationSummary {
    pub records: usize,
    pub groups: usize,
    pub fields: usize,
    pub compressed: usize,
}

/// Walk serialized plugin bytes and check that every declared size matches
/// the measured extent of its contents.
///
/// Uncompressed field blocks are decoded to the last byte; compressed
/// blocks are only checked for their length prefix.
pub fn validate(bytes: &[u8]) -> Result<ValidationSummary> {
    let seg = Segment::new(bytes);
    let (header, groups) = split_blocks(seg)?;
    let mut summary = ValidationSummary::default();
    validate_record(&header, &mut summary)?;
    for group in &groups {
        validate_group(group, &mut summary)?;
    }
    Ok(summary)
}

fn validate_record(record: &RecordView<'_>, summary: &mut ValidationSummary) -> Result<()> {
    summary.records += 1;
    if record.is_compressed() {
        let data = record.data();
        if data.len() < 4 {
            return Err(Error::SizeOverrun {
                kind: "compressed block",
                offset: data.offset(),
                declared: 4,
                available: data.len(),
            });
        }
        summary.compressed += 1;
        return Ok(());
    }
    for field in record.fields() {
        field?;
        summary.fields += 1;
    }
    Ok(())
}

fn validate_group(group: &GroupView<'_>, summary: &mut ValidationSummary) -> Result<()> {
    summary.groups += 1;
    let mut reader = group.reader();
    loop {
        match reader.advance()? {
            ReaderState::Record => validate_record(&reader.record()?, summary)?,
            ReaderState::Subgroup => validate_group(&reader.subgroup()?, summary)?,
            ReaderState::Done | ReaderState::Start => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::IntoBytes;

    fn record(tag: &[u8; 4], id: u32, body: &[u8]) -> Vec<u8> {
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

    fn group(label: &[u8; 4], children: &[u8]) -> Vec<u8> {
        let header = GroupHeader {
            tag: GRUP.as_u32(),
            group_size: (HEADER_SIZE + children.len()) as u32,
            label: Tag::lit(label).as_u32(),
            ..Default::default()
        };
        let mut out = header.as_bytes().to_vec();
        out.extend_from_slice(children);
        out
    }

    fn sample() -> Vec<u8> {
        let mut field = b"EDID".to_vec();
        field.extend_from_slice(&2u16.to_le_bytes());
        field.extend_from_slice(b"A\0");

        let mut bytes = record(b"TES4", 0, &[]);
        bytes.extend(group(b"GMST", &record(b"GMST", 0x10, &field)));
        bytes
    }

    #[test]
    fn test_read_blocks() {
        let bytes = sample();
        let raw = read_blocks(bytes.as_slice()).unwrap();
        assert_eq!(raw.header.len(), HEADER_SIZE);
        assert_eq!(raw.groups.len(), 1);
        assert_eq!(raw.into_bytes(), bytes);
    }

    #[test]
    fn test_read_blocks_truncated() {
        let bytes = sample();
        let cut = &bytes[..bytes.len() - 3];
        assert!(matches!(
            read_blocks(cut),
            Err(Error::SizeOverrun { kind: "group", .. })
        ));
        assert!(matches!(
            read_blocks(&bytes[..10]),
            Err(Error::TruncatedHeader { offset: 0, read: 10 })
        ));
    }

    #[test]
    fn test_huge_declared_size_is_an_overrun() {
        let mut bytes = record(b"TES4", 0, &[]);
        bytes[4..8].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());
        assert!(matches!(
            read_blocks(bytes.as_slice()),
            Err(Error::SizeOverrun {
                kind: "record",
                offset: 0,
                declared: 0xFFFF_FFF0,
                available: 0,
            })
        ));
    }

    #[test]
    fn test_top_level_record_rejected() {
        let mut bytes = sample();
        bytes.extend(record(b"GMST", 1, &[]));
        assert!(matches!(
            read_blocks(bytes.as_slice()),
            Err(Error::UnexpectedTopLevelRecord { .. })
        ));
        assert!(split_blocks(Segment::new(&bytes)).is_err());
    }

    #[test]
    fn test_validate_counts() {
        let summary = validate(&sample()).unwrap();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.groups, 1);
        assert_eq!(summary.fields, 1);
    }

    #[test]
    fn test_validate_rejects_bad_group_size() {
        let mut bytes = sample();
        // Group size field of the first group, one byte too large.
        let at = HEADER_SIZE + 4;
        let size = u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap()) + 1;
        bytes[at..at + 4].copy_from_slice(&size.to_le_bytes());
        assert!(validate(&bytes).is_err());
    }
}

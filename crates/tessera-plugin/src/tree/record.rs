use std::fmt;

use tessera_common::Tag;
use zerocopy::IntoBytes;

use super::compress::{self, InflateJob, PackJob};
use super::field::Field;
use super::group::Group;
use crate::codec::{flags, RecordHeader, RecordView};
use crate::Result;

/// An owned record: header values, fields, and the groups it owns.
///
/// A compressed record keeps the block it was decoded from until its field
/// list is mutated, so unmodified records serialize byte-for-byte.
#[derive(Clone)]
pub struct Record {
    pub tag: Tag,
    pub id: u32,
    pub flags: u32,
    pub revision: u32,
    pub version: u16,
    pub unknown: u16,
    fields: Vec<Field>,
    groups: Vec<Group>,
    packed: Option<Vec<u8>>,
    dummy: bool,
}

impl Record {
    /// Create an empty record.
    pub fn new(tag: Tag, id: u32) -> Self {
        Self {
            tag,
            id,
            flags: 0,
            revision: 0,
            version: 0,
            unknown: 0,
            fields: Vec::new(),
            groups: Vec::new(),
            packed: None,
            dummy: false,
        }
    }

    /// A placeholder hosting subgroups that have no owning record.
    ///
    /// Dummies never serialize and are skipped by identifiers.
    pub fn dummy() -> Self {
        Self {
            dummy: true,
            ..Self::new(Tag::NONE, 0)
        }
    }

    /// Decode a record, inflating its fields if compressed.
    pub fn from_view(view: &RecordView<'_>) -> Result<Self> {
        let mut record = Self::from_view_deferred(view)?;
        if let Some(block) = &record.packed {
            record.fields = compress::decode_packed(record.id, block)?;
        }
        Ok(record)
    }

    /// Decode a record, leaving a compressed block undecoded.
    pub(crate) fn from_view_deferred(view: &RecordView<'_>) -> Result<Self> {
        let header = view.header();
        let mut record = Self {
            tag: Tag::from_raw(header.tag),
            id: header.id,
            flags: header.flags,
            revision: header.revision,
            version: header.version,
            unknown: header.unknown,
            ..Self::new(Tag::NONE, 0)
        };
        if view.is_compressed() {
            record.packed = Some(view.data().to_vec());
        } else {
            record.fields = view
                .fields()
                .map(|f| f.map(Field::from))
                .collect::<Result<_>>()?;
        }
        Ok(record)
    }

    /// Collect the pending decompression work of this record and everything
    /// below it.
    pub(crate) fn collect_inflate_jobs<'a>(&'a mut self, jobs: &mut Vec<InflateJob<'a>>) {
        let Self {
            id,
            fields,
            groups,
            packed,
            ..
        } = self;
        if let Some(block) = packed.as_deref() {
            if fields.is_empty() {
                jobs.push(InflateJob {
                    id: *id,
                    block,
                    fields,
                });
            }
        }
        for group in groups.iter_mut() {
            group.collect_inflate_jobs(jobs);
        }
    }

    /// Collect records below and including this one whose compressed block
    /// has to be rebuilt.
    pub(crate) fn collect_pack_jobs<'a>(&'a mut self, jobs: &mut Vec<PackJob<'a>>) {
        let compressed = self.is_compressed() && !self.dummy;
        let Self {
            id,
            fields,
            groups,
            packed,
            ..
        } = self;
        if compressed && packed.is_none() {
            jobs.push(PackJob {
                id: *id,
                fields: fields.as_slice(),
                packed,
            });
        }
        for group in groups.iter_mut() {
            group.collect_pack_jobs(jobs);
        }
    }

    #[inline]
    pub fn is_dummy(&self) -> bool {
        self.dummy
    }

    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.flags & flags::COMPRESSED != 0
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.flags & flags::DELETED != 0
    }

    #[inline]
    pub fn is_persistent(&self) -> bool {
        self.flags & flags::PERSISTENT != 0
    }

    /// Set or clear the compressed flag. Dropping the flag discards the
    /// retained block.
    pub fn set_compressed(&mut self, compressed: bool) {
        if compressed {
            self.flags |= flags::COMPRESSED;
        } else {
            self.flags &= !flags::COMPRESSED;
            self.packed = None;
        }
    }

    /// The header values this record would serialize with, data size aside.
    pub fn header(&self) -> RecordHeader {
        RecordHeader {
            tag: self.tag.as_u32(),
            data_size: 0,
            flags: self.flags,
            id: self.id,
            revision: self.revision,
            version: self.version,
            unknown: self.unknown,
        }
    }

    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Mutable access to the field list. Invalidates the retained
    /// compressed block.
    pub fn fields_mut(&mut self) -> &mut Vec<Field> {
        self.packed = None;
        &mut self.fields
    }

    /// First field with the given tag.
    pub fn field(&self, tag: Tag) -> Option<&Field> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    /// Number of fields with the given tag.
    pub fn count_fields(&self, tag: Tag) -> usize {
        self.fields.iter().filter(|f| f.tag == tag).count()
    }

    pub fn push_field(&mut self, field: Field) {
        self.fields_mut().push(field);
    }

    /// Replace the payload of the first field with `tag`, appending a new
    /// field if there is none.
    pub fn set_field(&mut self, tag: Tag, data: impl Into<Vec<u8>>) {
        let data = data.into();
        let fields = self.fields_mut();
        match fields.iter_mut().find(|f| f.tag == tag) {
            Some(field) => field.data = data,
            None => fields.push(Field::new(tag, data)),
        }
    }

    /// Remove every field with `tag`, returning how many were removed.
    pub fn remove_fields(&mut self, tag: Tag) -> usize {
        let before = self.fields.len();
        if self.fields.iter().any(|f| f.tag == tag) {
            self.fields_mut().retain(|f| f.tag != tag);
        }
        before - self.fields.len()
    }

    #[inline]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    #[inline]
    pub fn groups_mut(&mut self) -> &mut Vec<Group> {
        &mut self.groups
    }

    pub fn push_group(&mut self, group: Group) {
        self.groups.push(group);
    }

    /// The retained compressed block, if it still matches the fields.
    #[inline]
    pub fn packed(&self) -> Option<&[u8]> {
        self.packed.as_deref()
    }

    pub(crate) fn set_packed(&mut self, block: Vec<u8>) {
        self.packed = Some(block);
    }

    /// Records and groups this record accounts for, itself included unless
    /// it is a dummy.
    pub fn node_count(&self) -> usize {
        let own = usize::from(!self.dummy);
        own + self
            .groups
            .iter()
            .map(|g| 1 + g.descendant_count())
            .sum::<usize>()
    }
}

// The retained block is a cache of `fields` and takes no part in equality.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.dummy == other.dummy
            && self.header().as_bytes() == other.header().as_bytes()
            && self.fields == other.fields
            && self.groups == other.groups
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dummy {
            return f
                .debug_struct("Dummy")
                .field("groups", &self.groups)
                .finish();
        }
        f.debug_struct("Record")
            .field("tag", &self.tag)
            .field("id", &format_args!("{:08X}", self.id))
            .field("flags", &format_args!("{:#x}", self.flags))
            .field("fields", &self.fields)
            .field("groups", &self.groups)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::GroupType;

    #[test]
    fn test_fields_mut_drops_packed_block() {
        let mut record = Record::new(Tag::lit(b"REFR"), 1);
        record.set_compressed(true);
        record.set_packed(vec![0, 0, 0, 0]);
        assert!(record.packed().is_some());

        // Reads keep the block.
        assert!(record.field(Tag::lit(b"DATA")).is_none());
        assert_eq!(record.remove_fields(Tag::lit(b"DATA")), 0);
        assert!(record.packed().is_some());

        record.set_field(Tag::lit(b"DATA"), vec![0u8; 24]);
        assert!(record.packed().is_none());
        assert_eq!(record.count_fields(Tag::lit(b"DATA")), 1);
    }

    #[test]
    fn test_set_field_replaces_first() {
        let mut record = Record::new(Tag::lit(b"NPC_"), 2);
        record.push_field(Field::new(Tag::lit(b"EDID"), b"a\0".to_vec()));
        record.push_field(Field::new(Tag::lit(b"EDID"), b"b\0".to_vec()));
        record.set_field(Tag::lit(b"EDID"), b"c\0".to_vec());
        assert_eq!(record.fields()[0].data, b"c\0");
        assert_eq!(record.fields()[1].data, b"b\0");
        assert_eq!(record.remove_fields(Tag::lit(b"EDID")), 2);
    }

    #[test]
    fn test_node_count() {
        let mut cell = Record::new(Tag::lit(b"CELL"), 0x10);
        let mut children = Group::new(GroupType::CellChildren, 0x10);
        let mut temp = Group::new(GroupType::CellTemporaryChildren, 0x10);
        temp.push_record(Record::new(Tag::lit(b"REFR"), 0x11));
        temp.push_record(Record::new(Tag::lit(b"REFR"), 0x12));
        let mut dummy = Record::dummy();
        dummy.push_group(temp);
        children.push_record(dummy);
        cell.push_group(children);

        // cell + children group + temp group + two refs
        assert_eq!(cell.node_count(), 5);
    }
}

use std::fmt;

use super::compress::{self, InflateJob, PackJob};
use super::record::Record;
use crate::codec::{describe_label, GroupHeader, GroupType, GroupView, ReaderState, GRUP};
use crate::Result;
use tessera_common::CancelToken;

/// An owned group and its child records.
#[derive(Clone, PartialEq)]
pub struct Group {
    pub group_type: GroupType,
    pub label: u32,
    pub stamp: u16,
    pub unknown1: u16,
    pub version: u16,
    pub unknown2: u16,
    records: Vec<Record>,
}

impl Group {
    pub fn new(group_type: GroupType, label: u32) -> Self {
        Self {
            group_type,
            label,
            stamp: 0,
            unknown1: 0,
            version: 0,
            unknown2: 0,
            records: Vec::new(),
        }
    }

    /// An empty group carrying this group's header values under a new type.
    pub fn sibling(&self, group_type: GroupType) -> Self {
        Self {
            group_type,
            records: Vec::new(),
            ..*self
        }
    }

    /// Decode a group and everything below it, inflating compressed records.
    pub fn parse(view: &GroupView<'_>) -> Result<Self> {
        let mut group = Self::parse_deferred(view)?;
        let mut jobs = Vec::new();
        group.collect_inflate_jobs(&mut jobs);
        compress::inflate_all(jobs, &CancelToken::new())?;
        Ok(group)
    }

    /// Decode the structure, leaving compressed blocks undecoded.
    ///
    /// A subgroup is attached to the record right before it when its type
    /// names an owner and its label is that record's ID. Any other subgroup
    /// is hosted by a dummy record, one per run of consecutive subgroups.
    pub(crate) fn parse_deferred(view: &GroupView<'_>) -> Result<Self> {
        let header = view.header();
        let mut group = Self {
            group_type: view.group_type(),
            label: header.label,
            stamp: header.stamp,
            unknown1: header.unknown1,
            version: header.version,
            unknown2: header.unknown2,
            records: Vec::new(),
        };

        let mut reader = view.reader();
        loop {
            match reader.advance()? {
                ReaderState::Record => {
                    let record = Record::from_view_deferred(&reader.record()?)?;
                    group.records.push(record);
                }
                ReaderState::Subgroup => {
                    let sub = Self::parse_deferred(&reader.subgroup()?)?;
                    group.attach(sub);
                }
                ReaderState::Done | ReaderState::Start => break,
            }
        }
        Ok(group)
    }

    fn attach(&mut self, sub: Group) {
        match self.records.last_mut() {
            Some(owner)
                if !owner.is_dummy()
                    && sub.group_type.is_children()
                    && sub.label == owner.id =>
            {
                owner.push_group(sub);
            }
            Some(host) if host.is_dummy() => host.push_group(sub),
            _ => {
                let mut host = Record::dummy();
                host.push_group(sub);
                self.records.push(host);
            }
        }
    }

    pub(crate) fn collect_inflate_jobs<'a>(&'a mut self, jobs: &mut Vec<InflateJob<'a>>) {
        for record in self.records.iter_mut() {
            record.collect_inflate_jobs(jobs);
        }
    }

    pub(crate) fn collect_pack_jobs<'a>(&'a mut self, jobs: &mut Vec<PackJob<'a>>) {
        for record in self.records.iter_mut() {
            record.collect_pack_jobs(jobs);
        }
    }

    /// The header values this group would serialize with, size aside.
    pub fn header(&self) -> GroupHeader {
        GroupHeader {
            tag: GRUP.as_u32(),
            group_size: 0,
            label: self.label,
            group_type: self.group_type.as_u32(),
            stamp: self.stamp,
            unknown1: self.unknown1,
            version: self.version,
            unknown2: self.unknown2,
        }
    }

    #[inline]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[inline]
    pub fn records_mut(&mut self) -> &mut Vec<Record> {
        &mut self.records
    }

    pub fn push_record(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Records and groups below this group, excluding the group itself.
    pub fn descendant_count(&self) -> usize {
        self.records.iter().map(Record::node_count).sum()
    }

    /// Iterate real records in this group, looking through dummies.
    pub fn iter_records(&self) -> impl Iterator<Item = &Record> + '_ {
        self.records.iter().filter(|r| !r.is_dummy())
    }

    /// Subgroups hosted by dummy records directly in this group.
    pub fn bare_groups(&self) -> impl Iterator<Item = &Group> + '_ {
        self.records
            .iter()
            .filter(|r| r.is_dummy())
            .flat_map(|r| r.groups().iter())
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("type", &self.group_type)
            .field("label", &describe_label(self.group_type, self.label))
            .field("records", &self.records)
            .finish()
    }
}

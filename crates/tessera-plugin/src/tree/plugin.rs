use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;
use tessera_common::{CancelToken, Segment, Tag};

use super::compress;
use super::field::Field;
use super::group::Group;
use super::record::Record;
use crate::codec::{read_blocks, split_blocks, GroupView, RawPlugin, RecordView};
use crate::tags::{HEDR, TES4};
use crate::Result;

/// Offset of the record count inside the header record's `HEDR` field.
const HEDR_COUNT_OFFSET: usize = 4;

/// A decoded plugin: its header record and top-level groups.
#[derive(Debug, Clone, PartialEq)]
pub struct Plugin {
    header: Record,
    groups: Vec<Group>,
}

/// Node totals reported by [`Plugin::count_nodes`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeCounts {
    pub records: usize,
    pub groups: usize,
    pub fields: usize,
    pub compressed: usize,
}

impl Plugin {
    /// An empty plugin with a fresh header record.
    pub fn new() -> Self {
        let mut hedr = Vec::with_capacity(12);
        hedr.extend_from_slice(&1.0f32.to_le_bytes());
        hedr.extend_from_slice(&0u32.to_le_bytes());
        hedr.extend_from_slice(&0x800u32.to_le_bytes());

        let mut header = Record::new(TES4, 0);
        header.push_field(Field::new(HEDR, hedr));
        Self::from_parts(header, Vec::new())
    }

    pub fn from_parts(header: Record, groups: Vec<Group>) -> Self {
        Self { header, groups }
    }

    /// Decode a plugin from one contiguous buffer.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Self::parse_with_cancel(bytes, &CancelToken::new())
    }

    /// Decode a plugin, checking `cancel` between record decompressions.
    pub fn parse_with_cancel(bytes: &[u8], cancel: &CancelToken) -> Result<Self> {
        let (header, groups) = split_blocks(Segment::new(bytes))?;
        Self::decode(&header, &groups, cancel)
    }

    /// Decode a plugin from blocks read by [`read_blocks`].
    pub fn from_raw(raw: &RawPlugin, cancel: &CancelToken) -> Result<Self> {
        let header = RecordView::parse(Segment::new(&raw.header))?;
        let groups = raw
            .groups
            .iter()
            .map(|g| GroupView::parse(Segment::new(g)))
            .collect::<Result<Vec<_>>>()?;
        Self::decode(&header, &groups, cancel)
    }

    /// Read and decode a plugin file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = read_blocks(BufReader::new(File::open(path)?))?;
        debug!("decoding {}", path.display());
        Self::from_raw(&raw, &CancelToken::new())
    }

    fn decode(
        header: &RecordView<'_>,
        groups: &[GroupView<'_>],
        cancel: &CancelToken,
    ) -> Result<Self> {
        let header = Record::from_view(header)?;
        let mut groups = groups
            .iter()
            .map(Group::parse_deferred)
            .collect::<Result<Vec<_>>>()?;

        let mut jobs = Vec::new();
        for group in groups.iter_mut() {
            group.collect_inflate_jobs(&mut jobs);
        }
        let pending = jobs.len();
        compress::inflate_all(jobs, cancel)?;

        let plugin = Self { header, groups };
        debug!(
            "decoded plugin: {} top-level groups, {} compressed records",
            plugin.groups.len(),
            pending
        );
        Ok(plugin)
    }

    #[inline]
    pub fn header(&self) -> &Record {
        &self.header
    }

    #[inline]
    pub fn header_mut(&mut self) -> &mut Record {
        &mut self.header
    }

    #[inline]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    #[inline]
    pub fn groups_mut(&mut self) -> &mut Vec<Group> {
        &mut self.groups
    }

    /// Split borrows of the header and the top-level groups.
    pub fn parts_mut(&mut self) -> (&mut Record, &mut Vec<Group>) {
        (&mut self.header, &mut self.groups)
    }

    pub fn push_group(&mut self, group: Group) {
        self.groups.push(group);
    }

    /// The top-level group holding records of type `tag`.
    pub fn top_group(&self, tag: Tag) -> Option<&Group> {
        self.groups.iter().find(|g| g.label == tag.as_u32())
    }

    /// Record count stored in the header, if the header carries one.
    pub fn record_count(&self) -> Option<u32> {
        let hedr = self.header.field(HEDR)?;
        Segment::new(&hedr.data)
            .read_u32_le(HEDR_COUNT_OFFSET)
            .ok()
    }

    /// Store a record count in the header. The field list is only touched
    /// when the value changes.
    pub fn set_record_count(&mut self, count: u32) {
        if self.record_count() == Some(count) {
            return;
        }
        let fields = self.header.fields_mut();
        let index = match fields.iter().position(|f| f.tag == HEDR) {
            Some(index) => index,
            None => {
                fields.insert(0, Field::new(HEDR, vec![0u8; 12]));
                0
            }
        };
        let hedr = &mut fields[index];
        let end = HEDR_COUNT_OFFSET + 4;
        if hedr.data.len() < end {
            hedr.data.resize(end, 0);
        }
        hedr.data[HEDR_COUNT_OFFSET..end].copy_from_slice(&count.to_le_bytes());
    }

    /// Add `delta` to the stored record count, saturating at zero.
    pub fn adjust_record_count(&mut self, delta: i64) {
        let current = i64::from(self.record_count().unwrap_or(0));
        let next = (current + delta).clamp(0, i64::from(u32::MAX)) as u32;
        self.set_record_count(next);
    }

    /// Records and groups below the header that serialize.
    pub fn node_count(&self) -> usize {
        self.groups.iter().map(|g| 1 + g.descendant_count()).sum()
    }

    /// Totals over the whole tree, header included.
    pub fn count_nodes(&self) -> NodeCounts {
        let mut counts = NodeCounts::default();
        count_record(&self.header, &mut counts);
        for group in &self.groups {
            count_group(group, &mut counts);
        }
        counts
    }
}

impl Default for Plugin {
    fn default() -> Self {
        Self::new()
    }
}

fn count_record(record: &Record, counts: &mut NodeCounts) {
    if !record.is_dummy() {
        counts.records += 1;
        counts.fields += record.fields().len();
        if record.is_compressed() {
            counts.compressed += 1;
        }
    }
    for group in record.groups() {
        count_group(group, counts);
    }
}

fn count_group(group: &Group, counts: &mut NodeCounts) {
    counts.groups += 1;
    for record in group.records() {
        count_record(record, counts);
    }
}

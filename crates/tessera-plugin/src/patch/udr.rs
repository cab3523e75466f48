//! Undelete and disable references.
//!
//! A deleted placed reference is restored from the last donor that carries
//! it, then parked: flagged initially disabled, moved far below the world,
//! and given an enable parent that keeps it off.

use std::sync::Arc;

use log::{debug, info};
use rustc_hash::{FxHashMap, FxHashSet};
use tessera_common::Tag;

use crate::codec::{flags, GroupType};
use crate::ident::{NodeMut, ObjectIdentifier, RecordIndex, Step};
use crate::merged::{Donor, MergedDonors};
use crate::tags::{ACHR, ACRE, DATA, XESP};
use crate::tree::{Field, Plugin, Record};
use crate::{Error, Result};

/// Record types that always live among a cell's persistent references.
pub const PERSISTENT_TYPES: [Tag; 2] = [ACHR, ACRE];

/// Height a disabled reference is parked at.
pub const PARKED_Z: f32 = -30000.0;

const DATA_LEN: usize = 24;
const DATA_Z: usize = 8;
const XESP_LEN: usize = 8;
const XESP_PARENT: u32 = 0x14;
const XESP_FLAGS: u32 = 1;

/// Per-run cache of donor record indexes, keyed by donor name.
#[derive(Debug, Default)]
pub struct DonorCache {
    indexes: FxHashMap<String, Arc<RecordIndex>>,
}

impl DonorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The record index of `donor`, built on first use.
    pub fn index(&mut self, donor: &Donor) -> Arc<RecordIndex> {
        let entry = self
            .indexes
            .entry(donor.name.to_ascii_lowercase())
            .or_insert_with(|| {
                debug!("indexing donor {}", donor.name);
                Arc::new(donor.plugin.record_index())
            });
        Arc::clone(entry)
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

/// Outcome of an [`undelete_and_disable`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UdrStats {
    /// Records restored from a donor.
    pub restored: usize,
    /// Records that were not deleted and only had flags and fields checked.
    pub checked: usize,
    /// Records moved into a persistent children group.
    pub relocated: usize,
}

/// Undelete and disable the records with the given IDs. Repeated IDs
/// are handled once.
///
/// Deleted records take their content from the last donor carrying them.
/// Every target ends up flagged initially disabled with exactly one `DATA`
/// and one `XESP` field holding the parking values; records that already
/// satisfy this are left untouched. Persistent records found among a
/// cell's temporary or visible-distant references are moved to the
/// persistent group afterwards.
pub fn undelete_and_disable(
    plugin: &mut Plugin,
    ids: &[u32],
    donors: &MergedDonors,
    cache: &mut DonorCache,
) -> Result<UdrStats> {
    let index = plugin.record_index();
    let mut stats = UdrStats::default();
    let mut relocations = Vec::new();
    let mut seen = FxHashSet::default();

    for &id in ids {
        if !seen.insert(id) {
            continue;
        }
        let ident = index.get(&id).ok_or(Error::RecordNotFound(id))?;
        let source = if is_deleted(plugin, ident)? {
            Some(find_donor_record(donors, cache, id)?)
        } else {
            None
        };

        let record = ident
            .resolve_mut(plugin)?
            .into_record()
            .ok_or_else(|| Error::IdentifierNotFound(ident.to_string()))?;

        let persistent = match source {
            Some(donor_record) => {
                restore(record, donor_record);
                stats.restored += 1;
                PERSISTENT_TYPES.contains(&record.tag) || donor_record.is_persistent()
            }
            None => {
                stats.checked += 1;
                PERSISTENT_TYPES.contains(&record.tag) || record.is_persistent()
            }
        };
        disable(record, persistent);

        if persistent && in_transient_group(ident) {
            relocations.push(ident.clone());
        }
    }

    for ident in &relocations {
        relocate(plugin, ident)?;
        stats.relocated += 1;
    }

    info!(
        "undelete and disable: {} restored, {} checked, {} relocated",
        stats.restored, stats.checked, stats.relocated
    );
    Ok(stats)
}

fn is_deleted(plugin: &Plugin, ident: &ObjectIdentifier) -> Result<bool> {
    ident
        .resolve(plugin)?
        .as_record()
        .map(Record::is_deleted)
        .ok_or_else(|| Error::IdentifierNotFound(ident.to_string()))
}

fn find_donor_record<'d>(
    donors: &'d MergedDonors,
    cache: &mut DonorCache,
    id: u32,
) -> Result<&'d Record> {
    for donor in donors.iter().rev() {
        let index = cache.index(donor);
        let Some(ident) = index.get(&id) else {
            continue;
        };
        if let Some(record) = ident.resolve(&donor.plugin)?.as_record() {
            debug!("record {:08X} restored from {}", id, donor.name);
            return Ok(record);
        }
    }
    Err(Error::DonorRecordMissing(id))
}

fn restore(record: &mut Record, source: &Record) {
    record.flags = source.flags;
    record.version = source.version;
    record.unknown = source.unknown;
    record.revision = 0;
    *record.fields_mut() = source.fields().to_vec();
}

/// Apply the disabled state. Only fields that differ are rewritten.
fn disable(record: &mut Record, persistent: bool) {
    let mut wanted = (record.flags & !flags::DELETED) | flags::INITIALLY_DISABLED;
    if persistent {
        wanted |= flags::PERSISTENT;
    }
    record.flags = wanted;

    ensure_single(record, XESP, XESP_LEN, Some(DATA), |data| {
        data[0..4].copy_from_slice(&XESP_PARENT.to_le_bytes());
        data[4..8].copy_from_slice(&XESP_FLAGS.to_le_bytes());
    });
    ensure_single(record, DATA, DATA_LEN, None, |data| {
        data[DATA_Z..DATA_Z + 4].copy_from_slice(&PARKED_Z.to_le_bytes());
    });
}

/// Make `record` hold exactly one `tag` field of at least `min_len` bytes,
/// patched by `apply`. A missing field is inserted before `before` when
/// that field exists, else appended.
fn ensure_single(
    record: &mut Record,
    tag: Tag,
    min_len: usize,
    before: Option<Tag>,
    apply: impl Fn(&mut [u8]),
) {
    let positions: Vec<usize> = record
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| f.tag == tag)
        .map(|(i, _)| i)
        .collect();

    let mut wanted = positions
        .first()
        .map(|&i| record.fields()[i].data.clone())
        .unwrap_or_default();
    if wanted.len() < min_len {
        wanted.resize(min_len, 0);
    }
    apply(&mut wanted);

    if let [only] = positions[..] {
        if record.fields()[only].data == wanted {
            return;
        }
    }

    let fields = record.fields_mut();
    match positions.split_first() {
        Some((&first, extra)) => {
            for &i in extra.iter().rev() {
                fields.remove(i);
            }
            fields[first].data = wanted;
        }
        None => {
            let at = before
                .and_then(|b| fields.iter().position(|f| f.tag == b))
                .unwrap_or(fields.len());
            fields.insert(at, Field::new(tag, wanted));
        }
    }
}

fn in_transient_group(ident: &ObjectIdentifier) -> bool {
    let steps = ident.steps();
    steps.len() >= 2
        && matches!(
            steps[steps.len() - 2],
            Step::Group { kind, .. } if kind.is_transient_cell_children()
        )
}

/// Move a record out of its temporary or visible-distant group into the
/// persistent children group beside it, creating that group if needed.
fn relocate(plugin: &mut Plugin, ident: &ObjectIdentifier) -> Result<()> {
    let not_found = || Error::IdentifierNotFound(ident.to_string());
    let parent = ident.parent();
    let (Some(group_ident), Some(Step::Record { tag, id })) = (parent, ident.last().copied()) else {
        return Err(not_found());
    };
    let Some(Step::Group { kind, label }) = group_ident.last().copied() else {
        return Err(not_found());
    };
    let owner_ident = group_ident.parent().ok_or_else(not_found)?;

    let transient = group_ident
        .resolve_mut(plugin)?
        .into_group()
        .ok_or_else(not_found)?;
    let persistent_group = transient.sibling(GroupType::CellPersistentChildren);
    let records = transient.records_mut();
    let position = records
        .iter()
        .position(|r| !r.is_dummy() && r.tag == tag && r.id == id)
        .ok_or_else(not_found)?;
    let record = records.remove(position);

    let siblings = match owner_ident.resolve_mut(plugin)? {
        NodeMut::Record(owner) => owner.groups_mut(),
        NodeMut::Group(owner) => {
            let records = owner.records_mut();
            let host = records
                .iter()
                .position(|r| {
                    r.is_dummy()
                        && r
                            .groups()
                            .iter()
                            .any(|g| g.group_type == kind && g.label == label)
                })
                .ok_or_else(not_found)?;
            records[host].groups_mut()
        }
        _ => return Err(Error::ParentMismatch(ident.to_string())),
    };

    let target = match siblings
        .iter()
        .position(|g| g.group_type == GroupType::CellPersistentChildren && g.label == label)
    {
        Some(at) => at,
        None => {
            let at = siblings
                .iter()
                .position(|g| g.group_type == kind && g.label == label)
                .unwrap_or(siblings.len());
            siblings.insert(at, persistent_group);
            at
        }
    };
    siblings[target].push_record(record);
    debug!("relocated {} {:08X} to persistent references", tag, id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{CELL, REFR};
    use crate::tree::Group;

    fn cell_with(temp_refs: Vec<Record>) -> Plugin {
        let mut plugin = Plugin::new();
        let mut top = Group::new(GroupType::Top, CELL.as_u32());
        let mut block = Group::new(GroupType::InteriorCellBlock, 0);
        let mut cell = Record::new(CELL, 0x100);
        let mut children = Group::new(GroupType::CellChildren, 0x100);
        let mut temp = Group::new(GroupType::CellTemporaryChildren, 0x100);
        temp.stamp = 0x1234;
        for r in temp_refs {
            temp.push_record(r);
        }
        let mut host = Record::dummy();
        host.push_group(temp);
        children.push_record(host);
        cell.push_group(children);
        block.push_record(cell);
        let mut top_host = Record::dummy();
        top_host.push_group(block);
        top.push_record(top_host);
        plugin.push_group(top);
        plugin
    }

    fn placed(tag: Tag, id: u32) -> Record {
        let mut r = Record::new(tag, id);
        r.push_field(Field::new(Tag::lit(b"NAME"), 0x700u32.to_le_bytes().to_vec()));
        r.push_field(Field::new(DATA, vec![0x11; 24]));
        r
    }

    fn deleted(tag: Tag, id: u32) -> Record {
        let mut r = Record::new(tag, id);
        r.flags = flags::DELETED;
        r
    }

    #[test]
    fn test_restore_and_park() {
        let mut plugin = cell_with(vec![deleted(REFR, 0x101)]);
        let donors = MergedDonors::new(vec![Donor::new(
            "Master.esm",
            cell_with(vec![placed(REFR, 0x101)]),
        )]);
        let mut cache = DonorCache::new();
        let stats = undelete_and_disable(&mut plugin, &[0x101], &donors, &mut cache).unwrap();
        assert_eq!(stats.restored, 1);
        assert_eq!(stats.relocated, 0);
        assert_eq!(cache.len(), 1);

        let ident = plugin.find_identifier(0x101).unwrap();
        let record = ident.resolve(&plugin).unwrap().as_record().unwrap();
        assert!(!record.is_deleted());
        assert_ne!(record.flags & flags::INITIALLY_DISABLED, 0);

        let tags: Vec<_> = record.fields().iter().map(|f| f.tag).collect();
        assert_eq!(tags, [Tag::lit(b"NAME"), XESP, DATA]);
        let data = &record.field(DATA).unwrap().data;
        assert_eq!(&data[8..12], &[0x00, 0x60, 0xEA, 0xC6]);
        assert_eq!(&data[0..8], &[0x11; 8]);
        let xesp = &record.field(XESP).unwrap().data;
        assert_eq!(xesp, &[0x14, 0, 0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn test_persistent_type_is_relocated() {
        let mut plugin = cell_with(vec![deleted(ACHR, 0x102), placed(REFR, 0x103)]);
        let donors = MergedDonors::new(vec![
            Donor::new("Empty.esm", Plugin::new()),
            Donor::new("Master.esm", cell_with(vec![placed(ACHR, 0x102)])),
        ]);
        let stats =
            undelete_and_disable(&mut plugin, &[0x102], &donors, &mut DonorCache::new()).unwrap();
        assert_eq!(stats.relocated, 1);

        let ident = plugin.find_identifier(0x102).unwrap();
        let steps = ident.steps();
        assert!(matches!(
            steps[steps.len() - 2],
            Step::Group {
                kind: GroupType::CellPersistentChildren,
                label: 0x100
            }
        ));
        let record = ident.resolve(&plugin).unwrap().as_record().unwrap();
        assert!(record.is_persistent());

        // The new group copies the temporary group's header and sits before it.
        let cell = plugin.find_identifier(0x100).unwrap();
        let cell = cell.resolve(&plugin).unwrap().as_record().unwrap();
        let hosted: Vec<_> = cell.groups()[0].bare_groups().collect();
        assert_eq!(hosted.len(), 2);
        assert_eq!(hosted[0].group_type, GroupType::CellPersistentChildren);
        assert_eq!(hosted[0].stamp, 0x1234);
        assert_eq!(hosted[1].records().len(), 1);
    }

    #[test]
    fn test_repeated_ids_apply_once() {
        let mut plugin = cell_with(vec![deleted(ACHR, 0x102)]);
        let donors = MergedDonors::new(vec![Donor::new(
            "Master.esm",
            cell_with(vec![placed(ACHR, 0x102)]),
        )]);
        let stats = undelete_and_disable(
            &mut plugin,
            &[0x102, 0x102, 0x102],
            &donors,
            &mut DonorCache::new(),
        )
        .unwrap();
        assert_eq!(stats.restored, 1);
        assert_eq!(stats.checked, 0);
        assert_eq!(stats.relocated, 1);
        assert!(plugin.find_identifier(0x102).is_some());
    }

    #[test]
    fn test_missing_donor_record() {
        let mut plugin = cell_with(vec![deleted(REFR, 0x101)]);
        let donors = MergedDonors::new(vec![Donor::new("Master.esm", Plugin::new())]);
        assert!(matches!(
            undelete_and_disable(&mut plugin, &[0x101], &donors, &mut DonorCache::new()),
            Err(Error::DonorRecordMissing(0x101))
        ));
        assert!(matches!(
            undelete_and_disable(&mut plugin, &[0x999], &donors, &mut DonorCache::new()),
            Err(Error::RecordNotFound(0x999))
        ));
    }
}

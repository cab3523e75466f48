//! Payload-shrinking record optimizations.

use log::info;
use tessera_common::Tag;

use crate::tags::{CLSZ, OFST, RNAM, WRLD};
use crate::tree::{Group, Plugin, Record};

/// Fields removed outright, per record type.
pub const STRIPPED_FIELDS: &[(Tag, &[Tag])] = &[(WRLD, &[OFST, CLSZ])];

/// Fields holding a sparse array that is compacted, per record type.
pub const SPARSE_FIELDS: &[(Tag, Tag)] = &[(WRLD, RNAM)];

/// Leading bytes of a sparse field kept as-is.
const SPARSE_PREFIX: usize = 6;
/// Offset of the 16-bit entry count inside the prefix.
const SPARSE_COUNT: usize = 4;
const SPARSE_ENTRY: usize = 8;

/// What an optimization pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub records: usize,
    pub fields_removed: usize,
    pub entries_removed: usize,
}

/// Optimize every record in the plugin.
pub fn optimize(plugin: &mut Plugin) -> OptimizeStats {
    let mut stats = OptimizeStats::default();
    let (header, groups) = plugin.parts_mut();
    optimize_tree(header, &mut stats);
    for group in groups.iter_mut() {
        optimize_group(group, &mut stats);
    }
    info!(
        "optimized {} records: {} fields removed, {} sparse entries dropped",
        stats.records, stats.fields_removed, stats.entries_removed
    );
    stats
}

fn optimize_group(group: &mut Group, stats: &mut OptimizeStats) {
    for record in group.records_mut() {
        optimize_tree(record, stats);
    }
}

fn optimize_tree(record: &mut Record, stats: &mut OptimizeStats) {
    if !record.is_dummy() {
        let before = *stats;
        optimize_record(record, stats);
        if *stats != before {
            stats.records += 1;
        }
    }
    for group in record.groups_mut() {
        optimize_group(group, stats);
    }
}

/// Apply the per-type rules to one record. Records that need no change
/// keep their retained compressed block.
pub fn optimize_record(record: &mut Record, stats: &mut OptimizeStats) {
    for (tag, stripped) in STRIPPED_FIELDS {
        if record.tag == *tag {
            for field in stripped.iter() {
                stats.fields_removed += record.remove_fields(*field);
            }
        }
    }

    for (tag, sparse) in SPARSE_FIELDS {
        if record.tag != *tag {
            continue;
        }
        let pending: Vec<(usize, Vec<u8>, usize)> = record
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, f)| f.tag == *sparse)
            .filter_map(|(i, f)| compact(&f.data).map(|(data, dropped)| (i, data, dropped)))
            .collect();
        if pending.is_empty() {
            continue;
        }
        let fields = record.fields_mut();
        for (i, data, dropped) in pending {
            fields[i].data = data;
            stats.entries_removed += dropped;
        }
    }
}

/// Drop all-zero entries from a sparse field, rewriting its count.
///
/// Returns `None` when the payload is malformed or has nothing to drop.
pub fn compact(data: &[u8]) -> Option<(Vec<u8>, usize)> {
    if data.len() < SPARSE_PREFIX || (data.len() - SPARSE_PREFIX) % SPARSE_ENTRY != 0 {
        return None;
    }
    let entries = &data[SPARSE_PREFIX..];
    let declared = u16::from_le_bytes([data[SPARSE_COUNT], data[SPARSE_COUNT + 1]]) as usize;
    if declared != entries.len() / SPARSE_ENTRY {
        return None;
    }

    let kept: Vec<&[u8]> = entries
        .chunks_exact(SPARSE_ENTRY)
        .filter(|entry| entry.iter().any(|&b| b != 0))
        .collect();
    let dropped = declared - kept.len();
    if dropped == 0 {
        return None;
    }

    let mut out = Vec::with_capacity(SPARSE_PREFIX + kept.len() * SPARSE_ENTRY);
    out.extend_from_slice(&data[..SPARSE_PREFIX]);
    out[SPARSE_COUNT..SPARSE_COUNT + 2].copy_from_slice(&(kept.len() as u16).to_le_bytes());
    for entry in kept {
        out.extend_from_slice(entry);
    }
    Some((out, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Field;

    fn sparse(entries: &[[u8; 8]]) -> Vec<u8> {
        let mut out = vec![0xAA, 0xBB, 0xCC, 0xDD];
        out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for e in entries {
            out.extend_from_slice(e);
        }
        out
    }

    #[test]
    fn test_compact_drops_zero_entries() {
        let data = sparse(&[[0; 8], [1, 0, 0, 0, 0, 0, 0, 0], [0; 8], [0, 0, 0, 0, 0, 0, 0, 9]]);
        let (out, dropped) = compact(&data).unwrap();
        assert_eq!(dropped, 2);
        assert_eq!(out, sparse(&[[1, 0, 0, 0, 0, 0, 0, 0], [0, 0, 0, 0, 0, 0, 0, 9]]));
        assert!(compact(&out).is_none());
    }

    #[test]
    fn test_compact_rejects_malformed() {
        let mut data = sparse(&[[0; 8]]);
        data.push(0);
        assert!(compact(&data).is_none());
        let mut data = sparse(&[[0; 8]]);
        data[4] = 3;
        assert!(compact(&data).is_none());
    }

    #[test]
    fn test_world_record() {
        let mut world = Record::new(WRLD, 0x3C);
        world.push_field(Field::new(Tag::lit(b"EDID"), b"Tamriel\0".to_vec()));
        world.push_field(Field::new(OFST, vec![0; 100]));
        world.push_field(Field::new(RNAM, sparse(&[[0; 8], [5; 8]])));

        let mut stats = OptimizeStats::default();
        optimize_record(&mut world, &mut stats);
        assert_eq!(stats.fields_removed, 1);
        assert_eq!(stats.entries_removed, 1);
        assert_eq!(world.fields().len(), 2);
        assert_eq!(world.field(RNAM).unwrap().data, sparse(&[[5; 8]]));

        let other = Record::new(Tag::lit(b"CELL"), 1);
        let mut unchanged = other.clone();
        optimize_record(&mut unchanged, &mut stats);
        assert_eq!(unchanged, other);
    }
}

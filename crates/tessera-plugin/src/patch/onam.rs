//! Maintenance of the header's override list.

use std::collections::BTreeSet;

use log::info;

use crate::tags::{DATA, INTV, ONAM};
use crate::tree::{Field, Plugin};

/// Record IDs listed in the header's `ONAM` field.
pub fn overrides(plugin: &Plugin) -> Vec<u32> {
    plugin
        .header()
        .field(ONAM)
        .map(|f| {
            f.data
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        })
        .unwrap_or_default()
}

/// Recompute the override list as the IDs of `previous` still present in
/// the tree, plus `extra`, sorted and deduplicated.
///
/// `previous` defaults to the list currently stored. An empty result
/// removes the field. The header is left untouched when nothing changes.
pub fn update_overrides(plugin: &mut Plugin, previous: Option<&[u32]>, extra: &[u32]) -> Vec<u32> {
    let stored = overrides(plugin);
    let previous = previous.unwrap_or(&stored);
    let present: BTreeSet<u32> = plugin.record_ids().into_iter().collect();

    let wanted: BTreeSet<u32> = previous
        .iter()
        .copied()
        .filter(|id| present.contains(id))
        .chain(extra.iter().copied())
        .collect();
    let wanted: Vec<u32> = wanted.into_iter().collect();

    let has_field = plugin.header().field(ONAM).is_some();
    if wanted == stored && (has_field || wanted.is_empty()) {
        return wanted;
    }

    let header = plugin.header_mut();
    if wanted.is_empty() {
        header.remove_fields(ONAM);
    } else {
        let data: Vec<u8> = wanted.iter().flat_map(|id| id.to_le_bytes()).collect();
        if has_field {
            header.set_field(ONAM, data);
        } else {
            let fields = header.fields_mut();
            let at = match fields.iter().rposition(|f| f.tag == DATA) {
                Some(last_master) => last_master + 1,
                None => fields
                    .iter()
                    .position(|f| f.tag == INTV)
                    .unwrap_or(fields.len()),
            };
            fields.insert(at, Field::new(ONAM, data));
        }
    }
    info!(
        "override list: {} -> {} entries",
        stored.len(),
        wanted.len()
    );
    wanted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::GroupType;
    use crate::tags::HEDR;
    use crate::tree::{Group, Record};
    use tessera_common::Tag;

    fn plugin_with_ids(ids: &[u32]) -> Plugin {
        let mut plugin = Plugin::new();
        plugin
            .header_mut()
            .push_field(Field::new(Tag::lit(b"MAST"), b"Master.esm\0".to_vec()));
        plugin.header_mut().push_field(Field::new(DATA, vec![0; 8]));
        plugin.header_mut().push_field(Field::new(INTV, vec![0; 4]));
        let mut top = Group::new(GroupType::Top, Tag::lit(b"MISC").as_u32());
        for &id in ids {
            top.push_record(Record::new(Tag::lit(b"MISC"), id));
        }
        plugin.push_group(top);
        plugin
    }

    #[test]
    fn test_intersect_and_union() {
        let mut plugin = plugin_with_ids(&[3, 1, 2]);
        let result = update_overrides(&mut plugin, Some(&[2, 9, 1, 1]), &[7, 2]);
        assert_eq!(result, [1, 2, 7]);
        assert_eq!(overrides(&plugin), [1, 2, 7]);

        let tags: Vec<_> = plugin.header().fields().iter().map(|f| f.tag).collect();
        assert_eq!(tags, [HEDR, Tag::lit(b"MAST"), DATA, ONAM, INTV]);
    }

    #[test]
    fn test_empty_removes_field() {
        let mut plugin = plugin_with_ids(&[1]);
        update_overrides(&mut plugin, Some(&[1]), &[]);
        assert!(plugin.header().field(ONAM).is_some());
        update_overrides(&mut plugin, Some(&[5]), &[]);
        assert!(plugin.header().field(ONAM).is_none());
    }

    #[test]
    fn test_unchanged_keeps_header() {
        let mut plugin = plugin_with_ids(&[4]);
        update_overrides(&mut plugin, Some(&[4]), &[]);
        let before = plugin.header().clone();
        assert_eq!(update_overrides(&mut plugin, None, &[]), [4]);
        assert_eq!(plugin.header(), &before);
    }
}

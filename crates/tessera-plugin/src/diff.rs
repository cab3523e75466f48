//! Minimal deletion sets between two trees.

use std::collections::BTreeSet;

use crate::ident::{visit, ObjectIdentifier};
use crate::tree::Plugin;

/// Every record, group and field identifier in a plugin.
pub fn identifier_set(plugin: &Plugin) -> BTreeSet<ObjectIdentifier> {
    let mut set = BTreeSet::new();
    visit(plugin, |id, _| {
        set.insert(id.clone());
    });
    set
}

/// Identifiers present in `old` but not in `new`, reduced to the highest
/// removed ancestor of each removed subtree.
///
/// The result is in ascending order.
pub fn compute_deletions(old: &Plugin, new: &Plugin) -> Vec<ObjectIdentifier> {
    let old_ids = identifier_set(old);
    let new_ids = identifier_set(new);
    minimize(old_ids.difference(&new_ids).cloned().collect())
}

/// Drop every identifier that has an ancestor in the same set.
pub fn minimize(removed: BTreeSet<ObjectIdentifier>) -> Vec<ObjectIdentifier> {
    removed
        .iter()
        .filter(|id| {
            let mut ancestor = id.parent();
            while let Some(candidate) = ancestor {
                if removed.contains(&candidate) {
                    return false;
                }
                ancestor = candidate.parent();
            }
            true
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::GroupType;
    use crate::tree::{Field, Group, Record};
    use tessera_common::Tag;

    fn plugin_with(records: &[(u32, &[&[u8]])]) -> Plugin {
        let mut plugin = Plugin::new();
        let mut top = Group::new(GroupType::Top, Tag::lit(b"MISC").as_u32());
        for (id, names) in records {
            let mut record = Record::new(Tag::lit(b"MISC"), *id);
            for name in *names {
                record.push_field(Field::new(Tag::lit(b"FULL"), name.to_vec()));
            }
            top.push_record(record);
        }
        plugin.push_group(top);
        plugin
    }

    #[test]
    fn test_identical_trees() {
        let a = plugin_with(&[(1, &[b"a"]), (2, &[b"b"])]);
        assert!(compute_deletions(&a, &a.clone()).is_empty());
    }

    #[test]
    fn test_removed_record_reported_once() {
        let old = plugin_with(&[(1, &[b"a", b"b"]), (2, &[b"c"])]);
        let new = plugin_with(&[(2, &[b"c"])]);
        let deletions = compute_deletions(&old, &new);
        assert_eq!(deletions.len(), 1);
        assert_eq!(deletions[0], old.find_identifier(1).unwrap());
    }

    #[test]
    fn test_removed_field_occurrence() {
        let old = plugin_with(&[(1, &[b"a", b"b"])]);
        let new = plugin_with(&[(1, &[b"a"])]);
        let deletions = compute_deletions(&old, &new);
        assert_eq!(deletions.len(), 1);
        assert_eq!(deletions[0].depth(), 3);
        assert_eq!(deletions[0].to_string(), "/<Top MISC>/MISC:00000001/FULL#1");
    }
}

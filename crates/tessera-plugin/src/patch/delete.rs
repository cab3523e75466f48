//! Deletion by identifier.

use log::info;

use crate::ident::{NodeMut, ObjectIdentifier, Step};
use crate::tree::{Group, Plugin, Record};
use crate::{Error, Result};

/// Remove every node named in `identifiers` and lower the header's record
/// count by the number of records and groups taken out.
///
/// Identifiers are processed in descending order, so removing several
/// children of one parent never shifts a sibling that is still pending.
/// Returns the count subtracted.
pub fn delete(plugin: &mut Plugin, identifiers: &[ObjectIdentifier]) -> Result<usize> {
    let mut ordered: Vec<&ObjectIdentifier> = identifiers.iter().collect();
    ordered.sort_unstable_by(|a, b| b.cmp(a));
    ordered.dedup();

    let mut removed = 0;
    for ident in ordered {
        removed += delete_one(plugin, ident)?;
    }
    plugin.adjust_record_count(-(removed as i64));
    info!(
        "deleted {} nodes ({} records and groups)",
        identifiers.len(),
        removed
    );
    Ok(removed)
}

/// Delete records by ID.
pub fn delete_records(plugin: &mut Plugin, ids: &[u32]) -> Result<usize> {
    let index = plugin.record_index();
    let identifiers = ids
        .iter()
        .map(|id| index.get(id).cloned().ok_or(Error::RecordNotFound(*id)))
        .collect::<Result<Vec<_>>>()?;
    delete(plugin, &identifiers)
}

fn delete_one(plugin: &mut Plugin, ident: &ObjectIdentifier) -> Result<usize> {
    let (parent, step) = match (ident.parent(), ident.last()) {
        (Some(parent), Some(step)) => (parent, *step),
        _ => return Err(Error::ParentMismatch(ident.to_string())),
    };
    let missing = || Error::IdentifierNotFound(ident.to_string());
    let mismatch = || Error::ParentMismatch(ident.to_string());

    match (parent.resolve_mut(plugin)?, step) {
        (NodeMut::Root(plugin), Step::Group { kind, label }) => {
            let groups = plugin.groups_mut();
            let position = groups
                .iter()
                .position(|g| g.group_type == kind && g.label == label)
                .ok_or_else(missing)?;
            Ok(groups.remove(position).descendant_count())
        }
        (NodeMut::Group(group), Step::Record { tag, id }) => {
            let records = group.records_mut();
            let position = records
                .iter()
                .position(|r| !r.is_dummy() && r.tag == tag && r.id == id)
                .ok_or_else(missing)?;
            let count = records.remove(position).node_count();
            merge_dummies(group);
            Ok(count)
        }
        (NodeMut::Group(group), Step::Group { kind, label }) => {
            let removed = group
                .records_mut()
                .iter_mut()
                .filter(|r| r.is_dummy())
                .find_map(|host| take_group(host, kind.as_u32(), label))
                .ok_or_else(missing)?;
            merge_dummies(group);
            Ok(removed.descendant_count())
        }
        (NodeMut::Record(record), Step::Group { kind, label }) => {
            take_group(record, kind.as_u32(), label)
                .map(|g| g.descendant_count())
                .ok_or_else(missing)
        }
        (NodeMut::Record(record), Step::Field { tag, index }) => {
            let position = record
                .fields()
                .iter()
                .enumerate()
                .filter(|(_, f)| f.tag == tag)
                .nth(index as usize)
                .map(|(i, _)| i)
                .ok_or_else(missing)?;
            record.fields_mut().remove(position);
            Ok(0)
        }
        _ => Err(mismatch()),
    }
}

fn take_group(owner: &mut Record, kind: u32, label: u32) -> Option<Group> {
    let groups = owner.groups_mut();
    let position = groups
        .iter()
        .position(|g| g.group_type.as_u32() == kind && g.label == label)?;
    Some(groups.remove(position))
}

/// Drop empty dummies and fold adjacent ones together, so the group reads
/// back with the same shape after serialization.
pub(crate) fn merge_dummies(group: &mut Group) {
    let records = std::mem::take(group.records_mut());
    let mut merged: Vec<Record> = Vec::with_capacity(records.len());
    for mut record in records {
        if record.is_dummy() {
            if record.groups().is_empty() {
                continue;
            }
            if let Some(host) = merged.last_mut().filter(|r| r.is_dummy()) {
                host.groups_mut().append(record.groups_mut());
                continue;
            }
        }
        merged.push(record);
    }
    *group.records_mut() = merged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::GroupType;
    use crate::tree::Field;
    use tessera_common::Tag;

    fn misc(id: u32) -> Record {
        Record::new(Tag::lit(b"MISC"), id)
    }

    #[test]
    fn test_delete_fields_in_descending_order() {
        let mut plugin = Plugin::new();
        let mut top = Group::new(GroupType::Top, Tag::lit(b"MISC").as_u32());
        let mut record = misc(1);
        for byte in [1u8, 2, 3] {
            record.push_field(Field::new(Tag::lit(b"FULL"), vec![byte]));
        }
        top.push_record(record);
        plugin.push_group(top);

        let base = plugin.find_identifier(1).unwrap();
        let full = |index| {
            base.child(Step::Field {
                tag: Tag::lit(b"FULL"),
                index,
            })
        };
        delete(&mut plugin, &[full(0), full(2)]).unwrap();

        let record = base.resolve(&plugin).unwrap().as_record().unwrap();
        assert_eq!(record.fields().len(), 1);
        assert_eq!(record.fields()[0].data, [2]);
    }

    #[test]
    fn test_delete_missing_fails() {
        let mut plugin = Plugin::new();
        plugin.push_group(Group::new(GroupType::Top, Tag::lit(b"MISC").as_u32()));
        assert!(matches!(
            delete_records(&mut plugin, &[7]),
            Err(Error::RecordNotFound(7))
        ));

        let mut ident = ObjectIdentifier::new();
        ident.push_group(&plugin.groups()[0]);
        ident.push_record(&misc(7));
        assert!(matches!(
            delete(&mut plugin, &[ident]),
            Err(Error::IdentifierNotFound(_))
        ));
    }

    #[test]
    fn test_header_cannot_be_deleted() {
        let mut plugin = Plugin::new();
        let mut ident = ObjectIdentifier::new();
        ident.push_record(plugin.header());
        assert!(matches!(
            delete(&mut plugin, &[ident]),
            Err(Error::ParentMismatch(_))
        ));
    }

    #[test]
    fn test_merge_dummies() {
        let mut group = Group::new(GroupType::WorldChildren, 1);
        let mut a = Record::dummy();
        a.push_group(Group::new(GroupType::ExteriorCellBlock, 0));
        let mut b = Record::dummy();
        b.push_group(Group::new(GroupType::ExteriorCellBlock, 1));
        group.push_record(a);
        group.push_record(Record::dummy());
        group.push_record(b);

        merge_dummies(&mut group);
        assert_eq!(group.records().len(), 1);
        assert_eq!(group.records()[0].groups().len(), 2);
    }
}

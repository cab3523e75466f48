//! Canonical ordering for structural comparison.
//!
//! Sorting changes what a plugin means to the game; it exists so two trees
//! can be compared node by node.

use std::cmp::Ordering;

use super::delete::merge_dummies;
use crate::tree::{Field, Group, Plugin, Record};

/// Sort the whole tree into canonical order.
pub fn sort(plugin: &mut Plugin) {
    let (header, groups) = plugin.parts_mut();
    sort_record(header);
    for group in groups.iter_mut() {
        sort_group(group);
    }
    if !is_sorted(groups, cmp_groups) {
        groups.sort_by(cmp_groups);
    }
}

/// Sort a record's fields by (tag, payload) and its groups by (type, label),
/// recursively.
pub fn sort_record(record: &mut Record) {
    if !is_sorted(record.fields(), cmp_fields) {
        record.fields_mut().sort_by(cmp_fields);
    }
    let groups = record.groups_mut();
    for group in groups.iter_mut() {
        sort_group(group);
    }
    if !is_sorted(groups, cmp_groups) {
        groups.sort_by(cmp_groups);
    }
}

/// Sort a group's records by (tag, id), gathering bare subgroups into one
/// leading dummy.
pub fn sort_group(group: &mut Group) {
    for record in group.records_mut() {
        sort_record(record);
    }
    let records = group.records_mut();
    if !is_sorted(records, cmp_records) {
        records.sort_by(cmp_records);
    }
    merge_dummies(group);
    for host in group.records_mut().iter_mut().filter(|r| r.is_dummy()) {
        let groups = host.groups_mut();
        if !is_sorted(groups, cmp_groups) {
            groups.sort_by(cmp_groups);
        }
    }
}

fn is_sorted<T>(items: &[T], cmp: fn(&T, &T) -> Ordering) -> bool {
    items.windows(2).all(|w| cmp(&w[0], &w[1]) != Ordering::Greater)
}

fn cmp_fields(a: &Field, b: &Field) -> Ordering {
    a.tag
        .cmp(&b.tag)
        .then_with(|| a.data.cmp(&b.data))
        .then_with(|| a.data.len().cmp(&b.data.len()))
}

fn cmp_groups(a: &Group, b: &Group) -> Ordering {
    (a.group_type, a.label).cmp(&(b.group_type, b.label))
}

fn cmp_records(a: &Record, b: &Record) -> Ordering {
    (!a.is_dummy(), a.tag, a.id).cmp(&(!b.is_dummy(), b.tag, b.id))
}

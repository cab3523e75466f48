//! Structural addressing of tree nodes.
//!
//! An [`ObjectIdentifier`] is the path of `(type, label)` pairs from the
//! plugin root to a node. Records contribute `(tag, id)`, groups
//! `(group type, label)` and fields `(tag, occurrence index)`. Dummy records
//! never appear in a path; groups they host are addressed as if they sat
//! directly in the enclosing group.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHashMap;
use tessera_common::Tag;

use crate::codec::{describe_label, GroupType};
use crate::tree::{Field, Group, Plugin, Record};
use crate::{Error, Result};

/// One element of an identifier path.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Record { tag: Tag, id: u32 },
    Group { kind: GroupType, label: u32 },
    Field { tag: Tag, index: u32 },
}

impl Step {
    pub fn record(record: &Record) -> Self {
        Self::Record {
            tag: record.tag,
            id: record.id,
        }
    }

    pub fn group(group: &Group) -> Self {
        Self::Group {
            kind: group.group_type,
            label: group.label,
        }
    }

    /// The packed `(type, label)` pair this step compares by.
    ///
    /// Group types are small integers and tags are printable ASCII, so the
    /// two never collide.
    #[inline]
    pub fn key(&self) -> (u32, u32) {
        match *self {
            Self::Record { tag, id } => (tag.as_u32(), id),
            Self::Group { kind, label } => (kind.as_u32(), label),
            Self::Field { tag, index } => (tag.as_u32(), index),
        }
    }
}

impl PartialEq for Step {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Step {}

impl PartialOrd for Step {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Step {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Hash for Step {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Record { tag, id } => write!(f, "{}:{:08X}", tag, id),
            Self::Group { kind, label } => write!(f, "<{} {}>", kind, describe_label(kind, label)),
            Self::Field { tag, index } => write!(f, "{}#{}", tag, index),
        }
    }
}

/// Path from the plugin root to a record, group or field.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectIdentifier {
    steps: Vec<Step>,
}

impl ObjectIdentifier {
    /// The root identifier.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    #[inline]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.steps.len()
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    #[inline]
    pub fn last(&self) -> Option<&Step> {
        self.steps.last()
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn push_record(&mut self, record: &Record) {
        self.steps.push(Step::record(record));
    }

    pub fn push_group(&mut self, group: &Group) {
        self.steps.push(Step::group(group));
    }

    pub fn push_field(&mut self, tag: Tag, index: u32) {
        self.steps.push(Step::Field { tag, index });
    }

    pub fn pop(&mut self) -> Option<Step> {
        self.steps.pop()
    }

    /// A copy of this identifier extended by one step.
    pub fn child(&self, step: Step) -> Self {
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        steps.extend_from_slice(&self.steps);
        steps.push(step);
        Self { steps }
    }

    /// The identifier of the enclosing node, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.steps.split_last()?;
        Some(Self {
            steps: init.to_vec(),
        })
    }

    /// Whether `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.steps.len() < other.steps.len() && other.steps.starts_with(&self.steps)
    }

    /// Look up the node this identifier names.
    pub fn resolve<'a>(&self, plugin: &'a Plugin) -> Result<Node<'a>> {
        let mut node = Node::Root(plugin);
        for step in &self.steps {
            node = node
                .child(step)
                .ok_or_else(|| Error::IdentifierNotFound(self.to_string()))?;
        }
        Ok(node)
    }

    /// Look up the node this identifier names, mutably.
    pub fn resolve_mut<'a>(&self, plugin: &'a mut Plugin) -> Result<NodeMut<'a>> {
        let mut node = NodeMut::Root(plugin);
        for step in &self.steps {
            node = node
                .child(step)
                .ok_or_else(|| Error::IdentifierNotFound(self.to_string()))?;
        }
        Ok(node)
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("/");
        }
        for step in &self.steps {
            write!(f, "/{}", step)?;
        }
        Ok(())
    }
}

/// A node reached by resolving an identifier.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Root(&'a Plugin),
    Record(&'a Record),
    Group(&'a Group),
    Field(&'a Field),
}

impl<'a> Node<'a> {
    fn child(self, step: &Step) -> Option<Node<'a>> {
        match (self, *step) {
            (Node::Root(plugin), Step::Record { tag, id }) => {
                let header = plugin.header();
                (header.tag == tag && header.id == id).then_some(Node::Record(header))
            }
            (Node::Root(plugin), Step::Group { kind, label }) => plugin
                .groups()
                .iter()
                .find(|g| g.group_type == kind && g.label == label)
                .map(Node::Group),
            (Node::Group(group), Step::Record { tag, id }) => group
                .iter_records()
                .find(|r| r.tag == tag && r.id == id)
                .map(Node::Record),
            (Node::Group(group), Step::Group { kind, label }) => group
                .bare_groups()
                .find(|g| g.group_type == kind && g.label == label)
                .map(Node::Group),
            (Node::Record(record), Step::Group { kind, label }) => record
                .groups()
                .iter()
                .find(|g| g.group_type == kind && g.label == label)
                .map(Node::Group),
            (Node::Record(record), Step::Field { tag, index }) => record
                .fields()
                .iter()
                .filter(|f| f.tag == tag)
                .nth(index as usize)
                .map(Node::Field),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&'a Record> {
        match *self {
            Node::Record(record) => Some(record),
            _ => None,
        }
    }
}

/// A mutable node reached by resolving an identifier.
#[derive(Debug)]
pub enum NodeMut<'a> {
    Root(&'a mut Plugin),
    Record(&'a mut Record),
    Group(&'a mut Group),
    Field(&'a mut Field),
}

impl<'a> NodeMut<'a> {
    fn child(self, step: &Step) -> Option<NodeMut<'a>> {
        match (self, *step) {
            (NodeMut::Root(plugin), Step::Record { tag, id }) => {
                let header = plugin.header_mut();
                (header.tag == tag && header.id == id).then_some(NodeMut::Record(header))
            }
            (NodeMut::Root(plugin), Step::Group { kind, label }) => plugin
                .groups_mut()
                .iter_mut()
                .find(|g| g.group_type == kind && g.label == label)
                .map(NodeMut::Group),
            (NodeMut::Group(group), Step::Record { tag, id }) => group
                .records_mut()
                .iter_mut()
                .find(|r| !r.is_dummy() && r.tag == tag && r.id == id)
                .map(NodeMut::Record),
            (NodeMut::Group(group), Step::Group { kind, label }) => group
                .records_mut()
                .iter_mut()
                .filter(|r| r.is_dummy())
                .flat_map(|r| r.groups_mut().iter_mut())
                .find(|g| g.group_type == kind && g.label == label)
                .map(NodeMut::Group),
            (NodeMut::Record(record), Step::Group { kind, label }) => record
                .groups_mut()
                .iter_mut()
                .find(|g| g.group_type == kind && g.label == label)
                .map(NodeMut::Group),
            (NodeMut::Record(record), Step::Field { tag, index }) => {
                let position = record
                    .fields()
                    .iter()
                    .enumerate()
                    .filter(|(_, f)| f.tag == tag)
                    .nth(index as usize)
                    .map(|(i, _)| i)?;
                Some(NodeMut::Field(&mut record.fields_mut()[position]))
            }
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<&'a mut Record> {
        match self {
            NodeMut::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn into_group(self) -> Option<&'a mut Group> {
        match self {
            NodeMut::Group(group) => Some(group),
            _ => None,
        }
    }
}

/// Walk the tree in pre-order, calling `f` with the identifier of every
/// record, group and field. Dummy records are skipped; their groups are
/// visited in place.
pub fn visit<'a, F>(plugin: &'a Plugin, mut f: F)
where
    F: FnMut(&ObjectIdentifier, Node<'a>),
{
    let mut path = ObjectIdentifier::new();
    visit_record(plugin.header(), &mut path, &mut f);
    for group in plugin.groups() {
        visit_group(group, &mut path, &mut f);
    }
}

fn visit_record<'a, F>(record: &'a Record, path: &mut ObjectIdentifier, f: &mut F)
where
    F: FnMut(&ObjectIdentifier, Node<'a>),
{
    if record.is_dummy() {
        for group in record.groups() {
            visit_group(group, path, f);
        }
        return;
    }

    path.push_record(record);
    f(path, Node::Record(record));

    let mut seen: FxHashMap<Tag, u32> = FxHashMap::default();
    for field in record.fields() {
        let index = seen.entry(field.tag).or_insert(0);
        path.push_field(field.tag, *index);
        f(path, Node::Field(field));
        path.pop();
        *index += 1;
    }
    for group in record.groups() {
        visit_group(group, path, f);
    }
    path.pop();
}

fn visit_group<'a, F>(group: &'a Group, path: &mut ObjectIdentifier, f: &mut F)
where
    F: FnMut(&ObjectIdentifier, Node<'a>),
{
    path.push_group(group);
    f(path, Node::Group(group));
    for record in group.records() {
        visit_record(record, path, f);
    }
    path.pop();
}

/// Record ID to identifier lookup for one plugin.
pub type RecordIndex = FxHashMap<u32, ObjectIdentifier>;

impl Plugin {
    /// Identifiers of every record below the header, keyed by record ID.
    ///
    /// When an ID occurs more than once the first occurrence in file order
    /// wins.
    pub fn record_index(&self) -> RecordIndex {
        let mut index = RecordIndex::default();
        for group in self.groups() {
            let mut path = ObjectIdentifier::new();
            visit_group(group, &mut path, &mut |id: &ObjectIdentifier, node: Node<'_>| {
                if let Node::Record(record) = node {
                    index.entry(record.id).or_insert_with(|| id.clone());
                }
            });
        }
        index
    }

    /// Identifier of the first record with `id`, header excluded.
    pub fn find_identifier(&self, id: u32) -> Option<ObjectIdentifier> {
        let mut found = None;
        for group in self.groups() {
            let mut path = ObjectIdentifier::new();
            visit_group(group, &mut path, &mut |ident: &ObjectIdentifier, node: Node<'_>| {
                if found.is_none() && matches!(node, Node::Record(r) if r.id == id) {
                    found = Some(ident.clone());
                }
            });
            if found.is_some() {
                break;
            }
        }
        found
    }

    /// IDs of every record below the header, in file order.
    pub fn record_ids(&self) -> Vec<u32> {
        let mut ids = Vec::new();
        for group in self.groups() {
            let mut path = ObjectIdentifier::new();
            visit_group(group, &mut path, &mut |_: &ObjectIdentifier, node: Node<'_>| {
                if let Node::Record(record) = node {
                    ids.push(record.id);
                }
            });
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{CELL, REFR};

    fn cell_plugin() -> Plugin {
        let mut plugin = Plugin::new();
        let mut top = Group::new(GroupType::Top, CELL.as_u32());
        let mut block = Group::new(GroupType::InteriorCellBlock, 0);
        let mut cell = Record::new(CELL, 0x100);
        let mut children = Group::new(GroupType::CellChildren, 0x100);
        let mut temp = Group::new(GroupType::CellTemporaryChildren, 0x100);
        let mut refr = Record::new(REFR, 0x101);
        refr.push_field(Field::new(Tag::lit(b"NAME"), vec![1, 2, 3, 4]));
        refr.push_field(Field::new(Tag::lit(b"NAME"), vec![5, 6, 7, 8]));
        temp.push_record(refr);

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

    #[test]
    fn test_resolve_through_dummies() {
        let plugin = cell_plugin();
        let ident = plugin.find_identifier(0x101).unwrap();
        assert_eq!(ident.depth(), 6);

        let node = ident.resolve(&plugin).unwrap();
        assert_eq!(node.as_record().map(|r| r.id), Some(0x101));

        let field = ident.child(Step::Field {
            tag: Tag::lit(b"NAME"),
            index: 1,
        });
        match field.resolve(&plugin).unwrap() {
            Node::Field(f) => assert_eq!(f.data, [5, 6, 7, 8]),
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_resolve_missing() {
        let plugin = cell_plugin();
        let mut ident = plugin.find_identifier(0x100).unwrap();
        ident.push_record(&Record::new(REFR, 0x999));
        assert!(matches!(
            ident.resolve(&plugin),
            Err(Error::IdentifierNotFound(_))
        ));
    }

    #[test]
    fn test_resolve_mut() {
        let mut plugin = cell_plugin();
        let ident = plugin.find_identifier(0x101).unwrap();
        let record = ident.resolve_mut(&mut plugin).unwrap().into_record().unwrap();
        record.flags = 0x20;
        assert!(plugin.record_index()[&0x101]
            .resolve(&plugin)
            .unwrap()
            .as_record()
            .unwrap()
            .is_deleted());
    }

    #[test]
    fn test_order_and_parent() {
        let plugin = cell_plugin();
        let cell = plugin.find_identifier(0x100).unwrap();
        let refr = plugin.find_identifier(0x101).unwrap();
        assert!(cell.is_ancestor_of(&refr));
        assert!(cell < refr);
        assert_eq!(refr.parent().unwrap().parent().unwrap().parent().unwrap(), cell);
        assert_eq!(plugin.record_ids(), vec![0x100, 0x101]);
    }
}

//! Structural comparison of two plugins for diagnostics.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::Hasher;

use rustc_hash::FxHasher;

use crate::diff::minimize;
use crate::ident::{visit, Node, ObjectIdentifier};
use crate::patch::sort;
use crate::tree::Plugin;

/// Options for [`compare`].
#[derive(Debug, Clone, Copy)]
pub struct CompareOptions {
    /// Sort copies of both trees first, so ordering differences vanish.
    pub sort: bool,
    /// Report every removed descendant instead of only subtree roots.
    pub expand: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            sort: true,
            expand: false,
        }
    }
}

/// A node present on both sides whose own content differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDiff {
    pub id: ObjectIdentifier,
    pub left: String,
    pub right: String,
}

/// Result of comparing two plugins.
#[derive(Debug, Clone, Default)]
pub struct ComparisonResult {
    pub only_left: Vec<ObjectIdentifier>,
    pub only_right: Vec<ObjectIdentifier>,
    pub differing: Vec<NodeDiff>,
}

impl ComparisonResult {
    pub fn identical(&self) -> bool {
        self.only_left.is_empty() && self.only_right.is_empty() && self.differing.is_empty()
    }
}

/// What a node looks like without its children.
///
/// Field digests compare their hash first and fall back to the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Digest<'a> {
    Root,
    Record {
        flags: u32,
        revision: u32,
        version: u16,
        unknown: u16,
    },
    Group {
        stamp: u16,
        unknown1: u16,
        version: u16,
        unknown2: u16,
    },
    Field {
        hash: u64,
        data: &'a [u8],
    },
}

impl fmt::Display for Digest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Digest::Root => f.write_str("root"),
            Digest::Record {
                flags,
                revision,
                version,
                unknown,
            } => write!(
                f,
                "flags={:#010x} revision={:#x} version={} unknown={}",
                flags, revision, version, unknown
            ),
            Digest::Group {
                stamp,
                unknown1,
                version,
                unknown2,
            } => write!(
                f,
                "stamp={:#06x} unknown={:#x}/{:#x} version={}",
                stamp, unknown1, unknown2, version
            ),
            Digest::Field { hash, data } => {
                write!(f, "{} bytes, hash {:016x}", data.len(), hash)
            }
        }
    }
}

fn digest(node: Node<'_>) -> Digest<'_> {
    match node {
        Node::Root(_) => Digest::Root,
        Node::Record(r) => Digest::Record {
            flags: r.flags,
            revision: r.revision,
            version: r.version,
            unknown: r.unknown,
        },
        Node::Group(g) => Digest::Group {
            stamp: g.stamp,
            unknown1: g.unknown1,
            version: g.version,
            unknown2: g.unknown2,
        },
        Node::Field(field) => {
            let mut hasher = FxHasher::default();
            hasher.write(&field.data);
            Digest::Field {
                hash: hasher.finish(),
                data: &field.data,
            }
        }
    }
}

fn digests(plugin: &Plugin) -> BTreeMap<ObjectIdentifier, Digest<'_>> {
    let mut map = BTreeMap::new();
    visit(plugin, |id, node| {
        map.insert(id.clone(), digest(node));
    });
    map
}

/// Compare two plugins node by node.
pub fn compare(left: &Plugin, right: &Plugin, options: CompareOptions) -> ComparisonResult {
    let sorted = options.sort.then(|| {
        let mut l = left.clone();
        let mut r = right.clone();
        sort(&mut l);
        sort(&mut r);
        (l, r)
    });
    let (left, right) = match &sorted {
        Some((l, r)) => (digests(l), digests(r)),
        None => (digests(left), digests(right)),
    };

    let mut result = ComparisonResult::default();
    let only = |a: &BTreeMap<ObjectIdentifier, Digest<'_>>,
                b: &BTreeMap<ObjectIdentifier, Digest<'_>>| {
        let missing: BTreeSet<ObjectIdentifier> =
            a.keys().filter(|k| !b.contains_key(*k)).cloned().collect();
        if options.expand {
            missing.into_iter().collect()
        } else {
            minimize(missing)
        }
    };
    result.only_left = only(&left, &right);
    result.only_right = only(&right, &left);

    for (id, l) in &left {
        if let Some(r) = right.get(id) {
            if l != r {
                result.differing.push(NodeDiff {
                    id: id.clone(),
                    left: l.to_string(),
                    right: r.to_string(),
                });
            }
        }
    }
    result
}

fn write_listing(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    ids: &[ObjectIdentifier],
) -> fmt::Result {
    writeln!(f, "{} ({}):", title, ids.len())?;
    for id in ids {
        let indent = id.depth().saturating_sub(1) * 2;
        match id.last() {
            Some(step) => writeln!(f, "  {:indent$}{}", "", step, indent = indent)?,
            None => writeln!(f, "  /")?,
        }
    }
    Ok(())
}

impl fmt::Display for ComparisonResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.identical() {
            return writeln!(f, "plugins are structurally identical");
        }
        write_listing(f, "only in left", &self.only_left)?;
        write_listing(f, "only in right", &self.only_right)?;
        writeln!(f, "differing ({}):", self.differing.len())?;
        for diff in &self.differing {
            let indent = diff.id.depth().saturating_sub(1) * 2;
            writeln!(f, "  {:indent$}{}", "", diff.id, indent = indent)?;
            writeln!(f, "  {:indent$}  - {}", "", diff.left, indent = indent)?;
            writeln!(f, "  {:indent$}  + {}", "", diff.right, indent = indent)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::GroupType;
    use crate::tree::{Field, Group, Record};
    use tessera_common::Tag;

    fn plugin(records: &[(u32, u8)]) -> Plugin {
        let mut plugin = Plugin::new();
        let mut top = Group::new(GroupType::Top, Tag::lit(b"MISC").as_u32());
        for &(id, value) in records {
            let mut record = Record::new(Tag::lit(b"MISC"), id);
            record.push_field(Field::new(Tag::lit(b"DATA"), vec![value]));
            top.push_record(record);
        }
        plugin.push_group(top);
        plugin
    }

    #[test]
    fn test_compare_ignores_order_when_sorting() {
        let a = plugin(&[(1, 0), (2, 0)]);
        let b = plugin(&[(2, 0), (1, 0)]);
        assert!(compare(&a, &b, CompareOptions::default()).identical());
    }

    #[test]
    fn test_compare_reports_each_side() {
        let a = plugin(&[(1, 0), (2, 5)]);
        let b = plugin(&[(2, 6), (3, 0)]);
        let result = compare(&a, &b, CompareOptions::default());
        assert_eq!(result.only_left.len(), 1);
        assert_eq!(result.only_right.len(), 1);
        assert_eq!(result.differing.len(), 1);

        let text = result.to_string();
        assert!(text.contains("only in left (1):"));
        assert!(text.contains("MISC:00000001"));
        assert!(text.contains("DATA#0"));

        let expanded = compare(
            &a,
            &b,
            CompareOptions {
                expand: true,
                ..Default::default()
            },
        );
        assert_eq!(expanded.only_left.len(), 2);
    }

    #[test]
    fn test_field_digest_compares_bytes() {
        let same_hash = |data: &'static [u8]| Digest::Field { hash: 7, data };
        assert_eq!(same_hash(&[1, 2][..]), same_hash(&[1, 2][..]));
        assert_ne!(same_hash(&[1, 2][..]), same_hash(&[2, 1][..]));

        let a = plugin(&[(1, 3)]);
        let b = plugin(&[(1, 4)]);
        let result = compare(&a, &b, CompareOptions::default());
        assert_eq!(result.differing.len(), 1);
        assert!(result.differing[0].left.starts_with("1 bytes, hash"));
    }
}

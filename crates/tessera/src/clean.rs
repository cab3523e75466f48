//! Per-plugin cleaning pipeline.

use std::path::{Path, PathBuf};
use std::thread;

use log::{debug, info, warn};
use rayon::prelude::*;
use tessera_plugin::patch::{self, DonorCache, OptimizeStats, UdrStats};
use tessera_plugin::{Donor, Merged, Plugin};

use crate::config::EditInstructions;
use crate::Result;

/// What [`clean_plugin`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Records and groups removed, descendants included
    pub deleted: usize,
    pub udr: UdrStats,
    /// Fields removed by strip instructions
    pub stripped: usize,
    pub optimized: Option<OptimizeStats>,
    /// Final override list length
    pub overrides: usize,
}

/// Load each donor on the rayon pool and publish it into `merged` at its
/// position in `names`. Failures fill the slot with the error so waiters
/// stop blocking.
pub fn load_donors(merged: &Merged, dir: &Path, names: &[String]) {
    names.par_iter().enumerate().for_each(|(slot, name)| {
        let path = dir.join(name);
        let published = match Plugin::open(&path) {
            Ok(plugin) => {
                debug!("loaded donor {}", path.display());
                merged.publish(slot, Donor::new(name.as_str(), plugin))
            }
            Err(e) => {
                warn!("failed to load donor {}: {}", path.display(), e);
                merged.fail(slot, format!("{}: {}", name, e))
            }
        };
        if let Err(e) = published {
            warn!("{}", e);
        }
    });
}

/// Apply `instructions` to `plugin`: delete, undelete-and-disable, strip,
/// optionally optimize, then rebuild the override list.
///
/// Donors are only awaited when there are records to undelete.
pub fn clean_plugin(
    plugin: &mut Plugin,
    instructions: &EditInstructions,
    donors: &Merged,
) -> Result<CleanReport> {
    let mut report = CleanReport::default();
    let previous = patch::overrides(plugin);

    let delete = instructions.delete_ids();
    if !delete.is_empty() {
        report.deleted = patch::delete_records(plugin, &delete)?;
    }

    let udr = instructions.udr_ids();
    if !udr.is_empty() {
        let merged = donors.wait()?;
        let mut cache = DonorCache::new();
        report.udr = patch::undelete_and_disable(plugin, &udr, &merged, &mut cache)?;
    }

    let strip = instructions.strip_targets();
    if !strip.is_empty() {
        report.stripped = patch::strip_fields(plugin, &strip)?;
    }

    if instructions.optimize {
        report.optimized = Some(patch::optimize(plugin));
    }

    let extra = instructions.extra_override_ids();
    report.overrides = patch::update_overrides(plugin, Some(&previous), &extra).len();

    info!(
        "cleaned: {} removed, {} restored, {} checked, {} relocated, {} fields stripped",
        report.deleted,
        report.udr.restored,
        report.udr.checked,
        report.udr.relocated,
        report.stripped
    );
    Ok(report)
}

/// Clean the plugin at `input` and write the result to `output`.
///
/// Donors named in the instructions are read from `donor_dir` while the
/// plugin itself is parsed and the deletions run.
pub fn clean_file(
    input: &Path,
    output: &Path,
    instructions: &EditInstructions,
    donor_dir: &Path,
) -> Result<CleanReport> {
    let merged = Merged::new(instructions.donors.len());
    thread::scope(|s| -> Result<CleanReport> {
        s.spawn(|| load_donors(&merged, donor_dir, &instructions.donors));

        let mut plugin = Plugin::open(input)?;
        let report = clean_plugin(&mut plugin, instructions, &merged)?;
        let written = plugin.write_to(output)?;
        info!("wrote {} ({} bytes)", output.display(), written);
        Ok(report)
    })
}

/// Default output location: `<dir>/<file name>`, never the input itself.
pub fn output_path(input: &Path, out_dir: &Path) -> PathBuf {
    match input.file_name() {
        Some(name) => out_dir.join(name),
        None => out_dir.join("out.esp"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecordId;
    use tessera_plugin::codec::GroupType;
    use tessera_plugin::tags::ONAM;
    use tessera_plugin::{flags, Field, Group, Record};
    use tessera_common::Tag;

    const GMST: Tag = Tag::lit(b"GMST");
    const EDID: Tag = Tag::lit(b"EDID");

    fn plugin_with(ids: &[(u32, u32)]) -> Plugin {
        let mut plugin = Plugin::new();
        let mut group = Group::new(GroupType::Top, GMST.as_u32());
        for &(id, record_flags) in ids {
            let mut record = Record::new(GMST, id);
            record.flags = record_flags;
            record.push_field(Field::new(EDID, format!("rec{:x}\0", id)));
            group.push_record(record);
        }
        plugin.push_group(group);
        plugin
    }

    #[test]
    fn test_pipeline_without_donors() {
        let mut plugin = plugin_with(&[(0x800, 0), (0x801, 0), (0x802, 0)]);
        let previous: Vec<u8> = [0x801u32, 0x900].iter().flat_map(|id| id.to_le_bytes()).collect();
        plugin.header_mut().set_field(ONAM, previous);

        let instructions = EditInstructions {
            delete: vec![RecordId(0x801)],
            strip: vec![crate::config::StripField {
                id: RecordId(0x802),
                field: EDID,
            }],
            extra_overrides: vec![RecordId(0x800)],
            ..Default::default()
        };
        let merged = Merged::new(0);
        let report = clean_plugin(&mut plugin, &instructions, &merged).unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.stripped, 1);
        assert_eq!(report.overrides, 1);
        assert_eq!(patch::overrides(&plugin), [0x800]);
        assert_eq!(plugin.record_ids(), [0x800, 0x802]);
    }

    #[test]
    fn test_udr_waits_for_donors() {
        let mut plugin = plugin_with(&[(0x800, flags::DELETED)]);
        let donor = plugin_with(&[(0x800, 0)]);
        let instructions = EditInstructions {
            udr: vec![RecordId(0x800)],
            donors: vec!["Master.esm".to_string()],
            ..Default::default()
        };

        let merged = Merged::new(1);
        let report = thread::scope(|s| {
            s.spawn(|| merged.publish(0, Donor::new("Master.esm", donor)));
            clean_plugin(&mut plugin, &instructions, &merged)
        })
        .unwrap();

        assert_eq!(report.udr.restored, 1);
        let record = plugin.groups()[0].records()[0].clone();
        assert!(!record.is_deleted());
        assert_ne!(record.flags & flags::INITIALLY_DISABLED, 0);
    }

    #[test]
    fn test_missing_donor_file_fails_udr() {
        let dir = tempfile::tempdir().unwrap();
        let mut plugin = plugin_with(&[(0x800, flags::DELETED)]);
        let instructions = EditInstructions {
            udr: vec![RecordId(0x800)],
            donors: vec!["Missing.esm".to_string()],
            ..Default::default()
        };
        let merged = Merged::new(1);
        load_donors(&merged, dir.path(), &instructions.donors);
        assert!(clean_plugin(&mut plugin, &instructions, &merged).is_err());
    }

    #[test]
    fn test_clean_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("Patch.esp");
        let output = output_path(&input, &dir.path().join("out"));
        std::fs::create_dir_all(output.parent().unwrap()).unwrap();

        plugin_with(&[(0x800, 0), (0x801, 0)]).write_to(&input).unwrap();
        let instructions = EditInstructions {
            delete: vec![RecordId(0x800)],
            ..Default::default()
        };
        let report = clean_file(&input, &output, &instructions, dir.path()).unwrap();
        assert_eq!(report.deleted, 1);

        let cleaned = Plugin::open(&output).unwrap();
        assert_eq!(cleaned.record_ids(), [0x801]);
        assert_eq!(cleaned.record_count(), Some(2));
    }
}

use log::info;
use tessera_common::Tag;

use crate::tree::Plugin;
use crate::{Error, Result};

/// Remove every field of the given type from each named record.
///
/// Returns the number of fields removed. A record ID absent from the
/// plugin is an error; a record without the field is not.
pub fn strip_fields(plugin: &mut Plugin, targets: &[(u32, Tag)]) -> Result<usize> {
    let index = plugin.record_index();
    let mut removed = 0;
    for &(id, tag) in targets {
        let ident = index.get(&id).ok_or(Error::RecordNotFound(id))?;
        let record = ident
            .resolve_mut(plugin)?
            .into_record()
            .ok_or_else(|| Error::IdentifierNotFound(ident.to_string()))?;
        removed += record.remove_fields(tag);
    }
    info!("stripped {} fields from {} records", removed, targets.len());
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::GroupType;
    use crate::tree::{Field, Group, Record};

    #[test]
    fn test_strip() {
        let mut plugin = Plugin::new();
        let mut top = Group::new(GroupType::Top, Tag::lit(b"NPC_").as_u32());
        let mut npc = Record::new(Tag::lit(b"NPC_"), 0x10);
        npc.push_field(Field::new(Tag::lit(b"EDID"), b"Guard\0".to_vec()));
        npc.push_field(Field::new(Tag::lit(b"SCRI"), vec![0; 4]));
        npc.push_field(Field::new(Tag::lit(b"SCRI"), vec![1; 4]));
        top.push_record(npc);
        plugin.push_group(top);

        let removed = strip_fields(
            &mut plugin,
            &[(0x10, Tag::lit(b"SCRI")), (0x10, Tag::lit(b"FULL"))],
        )
        .unwrap();
        assert_eq!(removed, 2);
        assert!(matches!(
            strip_fields(&mut plugin, &[(0x11, Tag::lit(b"SCRI"))]),
            Err(Error::RecordNotFound(0x11))
        ));
    }
}

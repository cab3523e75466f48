//! Record and field tags interpreted by this crate.

use tessera_common::Tag;

pub const TES4: Tag = Tag::lit(b"TES4");
pub const HEDR: Tag = Tag::lit(b"HEDR");
pub const ONAM: Tag = Tag::lit(b"ONAM");
pub const INTV: Tag = Tag::lit(b"INTV");

pub const WRLD: Tag = Tag::lit(b"WRLD");
pub const CELL: Tag = Tag::lit(b"CELL");
pub const REFR: Tag = Tag::lit(b"REFR");
pub const ACHR: Tag = Tag::lit(b"ACHR");
pub const ACRE: Tag = Tag::lit(b"ACRE");

pub const DATA: Tag = Tag::lit(b"DATA");
pub const XESP: Tag = Tag::lit(b"XESP");
pub const OFST: Tag = Tag::lit(b"OFST");
pub const CLSZ: Tag = Tag::lit(b"CLSZ");
pub const RNAM: Tag = Tag::lit(b"RNAM");

//! Owned, mutable plugin tree built from the codec views.

mod compress;
mod field;
mod group;
mod plugin;
mod record;

pub use compress::{decode_packed, deflate, inflate};
pub(crate) use compress::deflate_all;
pub use field::{encode_fields, fields_len, Field};
pub use group::Group;
pub use plugin::{NodeCounts, Plugin};
pub use record::Record;

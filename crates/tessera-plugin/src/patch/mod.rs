//! Tree mutations: deletion, undelete-and-disable, optimization, sorting,
//! override maintenance and field stripping.
//!
//! Every operation either completes or returns an error before the tree is
//! serialized; callers drop the tree on error.

mod delete;
mod onam;
mod optimize;
mod sort;
mod strip;
mod udr;

pub use delete::{delete, delete_records};
pub use onam::{overrides, update_overrides};
pub use optimize::{
    compact, optimize, optimize_record, OptimizeStats, SPARSE_FIELDS, STRIPPED_FIELDS,
};
pub use sort::{sort, sort_group, sort_record};
pub use strip::strip_fields;
pub use udr::{undelete_and_disable, DonorCache, UdrStats, PARKED_Z, PERSISTENT_TYPES};

//! Byte-level codec: header layouts, zero-copy views, and the group reader.

mod field;
mod file;
mod group_reader;
mod header;
mod view;

pub use field::{encode_field, encoded_field_len, FieldIter, FieldView, FIELD_HEADER_SIZE};
pub use file::{read_blocks, split_blocks, validate, RawPlugin, ValidationSummary};
pub use group_reader::{GroupReader, ReaderState};
pub use header::{
    describe_label, flags, grid_label, GroupHeader, GroupType, RecordHeader, GRUP, HEADER_SIZE,
    XXXX,
};
pub use view::{GroupView, RecordView};

use std::fmt;

use tessera_common::Tag;

use crate::codec::{encode_field, encoded_field_len, FieldView};
use crate::Result;

/// An owned field: a type tag and its payload.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub tag: Tag,
    pub data: Vec<u8>,
}

impl Field {
    pub fn new(tag: Tag, data: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            data: data.into(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes this field occupies in an encoded field block.
    #[inline]
    pub fn encoded_len(&self) -> usize {
        encoded_field_len(self.data.len())
    }
}

impl From<FieldView<'_>> for Field {
    fn from(view: FieldView<'_>) -> Self {
        Self::new(view.tag, view.data)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Field({}, {} bytes)", self.tag, self.data.len())
    }
}

/// Encoded length of a whole field list.
pub fn fields_len(fields: &[Field]) -> usize {
    fields.iter().map(Field::encoded_len).sum()
}

/// Encode a field list into an uncompressed field block.
pub fn encode_fields(fields: &[Field]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(fields_len(fields));
    for field in fields {
        encode_field(field.tag, &field.data, &mut out)?;
    }
    Ok(out)
}

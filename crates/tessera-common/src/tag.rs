//! Four-character type tags.
//!
//! Records, fields and top-level groups are discriminated by four ASCII
//! bytes. A [`Tag`] packs them into a little-endian `u32` so comparisons are
//! plain integer comparisons and the wire representation can be copied
//! without conversion.

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// A packed four-byte ASCII tag such as `TES4`, `GRUP` or `EDID`.
///
/// Ordering is the numeric order of the packed little-endian value, which
/// is what canonical sorting and identifier comparison rely on.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Tag(u32);

impl Tag {
    /// Zero sentinel produced for invalid input.
    pub const NONE: Self = Self(0);

    /// Build a tag from a byte literal at compile time.
    ///
    /// No validation is performed; intended for constants.
    #[inline]
    pub const fn lit(bytes: &[u8; 4]) -> Self {
        Self(u32::from_le_bytes(*bytes))
    }

    /// Create a tag from four bytes.
    ///
    /// Any non-ASCII byte yields [`Tag::NONE`]; callers must not rely on
    /// round-tripping such input.
    #[inline]
    pub fn new(bytes: [u8; 4]) -> Self {
        Self::try_new(bytes).unwrap_or(Self::NONE)
    }

    /// Create a tag from four bytes, rejecting non-ASCII input.
    pub fn try_new(bytes: [u8; 4]) -> Result<Self, Error> {
        if bytes.is_ascii() {
            Ok(Self(u32::from_le_bytes(bytes)))
        } else {
            Err(Error::InvalidTag(bytes))
        }
    }

    /// Wrap a raw packed value as read from the wire.
    #[inline]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Get the packed value.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Get the four bytes in wire order.
    #[inline]
    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Check if this is the zero sentinel.
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.to_bytes() {
            let c = if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '?'
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self)
    }
}

impl FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let mut packed = [0u8; 4];
        if bytes.len() != 4 {
            let n = bytes.len().min(4);
            packed[..n].copy_from_slice(&bytes[..n]);
            return Err(Error::InvalidTag(packed));
        }
        packed.copy_from_slice(bytes);
        Self::try_new(packed)
    }
}

impl From<Tag> for u32 {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Tag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Tag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packing_is_little_endian() {
        let tag = Tag::new(*b"TES4");
        assert_eq!(tag.as_u32(), u32::from_le_bytes(*b"TES4"));
        assert_eq!(tag, Tag::lit(b"TES4"));
        assert_eq!(tag.to_string(), "TES4");
    }

    #[test]
    fn test_non_ascii_falls_back_to_sentinel() {
        assert_eq!(Tag::new([0x80, b'A', b'B', b'C']), Tag::NONE);
        assert!(Tag::try_new([b'A', 0xFF, b'B', b'C']).is_err());
    }

    #[test]
    fn test_ordering_is_numeric() {
        let a = Tag::lit(b"ZZZA");
        let b = Tag::lit(b"AAAB");
        // Last byte is most significant in the packed value.
        assert!(a < b);
        assert_eq!(a.as_u32() < b.as_u32(), a < b);
    }

    #[test]
    fn test_parse() {
        assert_eq!("EDID".parse::<Tag>().unwrap(), Tag::lit(b"EDID"));
        assert!("EDI".parse::<Tag>().is_err());
    }
}

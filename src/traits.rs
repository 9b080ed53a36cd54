//! Helper traits
use std::iter;

/// Encode a string the way `win:UnicodeString` fields are laid out in a payload
pub trait EncodeUtf16 {
    /// UTF-16 code units, null terminator included
    fn into_utf16(self) -> Vec<u16>;

    /// Little-endian bytes of [`Self::into_utf16`], i.e. exactly what a payload contains
    fn into_utf16_bytes(self) -> Vec<u8>
    where
        Self: Sized,
    {
        self.into_utf16()
            .into_iter()
            .flat_map(|unit| unit.to_le_bytes())
            .collect()
    }
}

impl EncodeUtf16 for &str {
    fn into_utf16(self) -> Vec<u16> {
        self.encode_utf16() // Make a UTF-16 iterator
            .chain(iter::once(0)) // Append a null
            .collect() // Collect the iterator into a vector
    }
}

impl EncodeUtf16 for String {
    fn into_utf16(self) -> Vec<u16> {
        self.as_str().into_utf16()
    }
}

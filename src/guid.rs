//! Provider identity
//!
//! ETW identifies providers (and, for classic kernel events, event classes) with a 128-bit GUID.
//! The core of this crate does not depend on any native binding, so [`Guid`] wraps a [`uuid::Uuid`],
//! and converts from the Windows `GUID` structure where it is available.
use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

/// A 128-bit identifier
///
/// Displayed and parsed as `22fb2cd6-0e7b-422b-a0c7-2fad1fd0e716`. Parsing also accepts braces and upper case.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(transparent))]
pub struct Guid(Uuid);

impl Guid {
    /// Build a `Guid` from its components, e.g. as found in C headers
    pub const fn from_values(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Guid(Uuid::from_fields(data1, data2, data3, &data4))
    }

    /// Build a `Guid` from its 16-byte in-memory (mixed-endian) representation, as it appears in an event payload
    pub const fn from_bytes_le(bytes: [u8; 16]) -> Self {
        Guid(Uuid::from_bytes_le(bytes))
    }

    /// The 16-byte in-memory representation of this `Guid`
    pub fn to_bytes_le(&self) -> [u8; 16] {
        self.0.to_bytes_le()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        Guid(uuid)
    }
}

impl FromStr for Guid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Guid)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(windows)]
impl From<windows::core::GUID> for Guid {
    fn from(guid: windows::core::GUID) -> Self {
        Guid::from_values(guid.data1, guid.data2, guid.data3, guid.data4)
    }
}

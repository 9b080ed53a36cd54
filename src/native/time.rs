//! Implements wrappers for Windows time representations.

/// A [FILETIME](https://learn.microsoft.com/en-us/windows/win32/api/minwinbase/ns-minwinbase-filetime):
/// a count of 100-nanosecond intervals since January 1, 1601 (UTC)
///
/// Event timestamps use this representation unless the capture session was configured for raw timestamps.
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct FileTime(i64);

const SECONDS_BETWEEN_1601_AND_1970: i64 = 11_644_473_600;
const NS_IN_SECOND: i64 = 1_000_000_000;
const MS_IN_SECOND: i64 = 1_000;

impl FileTime {
    pub const fn from_quad(quad: i64) -> Self {
        FileTime(quad)
    }

    /// Converts to a unix timestamp with millisecond granularity.
    pub fn as_unix_timestamp(&self) -> i64 {
        self.0 / 10_000 - (SECONDS_BETWEEN_1601_AND_1970 * MS_IN_SECOND)
    }

    /// Converts to a unix timestamp with nanosecond granularity.
    pub fn as_unix_timestamp_nanos(&self) -> i128 {
        self.0 as i128 * 100 - (SECONDS_BETWEEN_1601_AND_1970 as i128 * NS_IN_SECOND as i128)
    }

    /// Converts to OffsetDateTime
    ///
    /// Returns `None` for values outside of the range `time` can represent
    #[cfg(feature = "time_rs")]
    pub fn as_date_time(&self) -> Option<time::OffsetDateTime> {
        time::OffsetDateTime::from_unix_timestamp_nanos(self.as_unix_timestamp_nanos()).ok()
    }

    pub fn as_quad(&self) -> i64 {
        self.0
    }

    pub(crate) fn from_slice(slice: &[u8; 8]) -> Self {
        FileTime(i64::from_le_bytes(*slice))
    }
}

#[cfg(feature = "serde")]
impl serde::ser::Serialize for FileTime {
    #[cfg(feature = "time_rs")]
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self.as_date_time() {
            Some(date_time) => serde::Serialize::serialize(&date_time, serializer),
            None => serializer.serialize_i64(self.as_unix_timestamp()),
        }
    }

    #[cfg(not(feature = "time_rs"))]
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i64(self.as_unix_timestamp())
    }
}

//! Null-terminated UTF-16 strings
//!
//! `win:UnicodeString` fields have no length prefix: their size is only known by looking for the
//! terminating null code unit. Payloads are not guaranteed to be 2-byte aligned, so scanning is done
//! on byte pairs rather than on a `&[u16]`.

/// String scanning errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// `start` is past the end of the buffer
    OutOfBounds { start: usize, available: usize },
    /// The buffer ends before a null code unit is found
    Unterminated { start: usize, available: usize },
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfBounds { start, available } => {
                write!(f, "string starts at {} but buffer is {} bytes long", start, available)
            }
            Self::Unterminated { start, available } => write!(
                f,
                "no null terminator for string starting at {} ({} bytes available)",
                start, available
            ),
        }
    }
}

impl std::error::Error for ScanError {}

/// Length in bytes of the UTF-16 string starting at `start`, including its 2-byte null terminator
///
/// This is what the next field's offset must be computed with.
///
/// # Example
/// ```
/// # use ferrisetw_decoder::string_scanner::scan_utf16_length;
/// let buffer = [b'h', 0, b'i', 0, 0, 0, 0xff];
/// assert_eq!(scan_utf16_length(&buffer, 0), Ok(6));
/// assert_eq!(scan_utf16_length(&buffer, 2), Ok(4));
/// ```
pub fn scan_utf16_length(buffer: &[u8], start: usize) -> Result<usize, ScanError> {
    let remaining = buffer.get(start..).ok_or(ScanError::OutOfBounds {
        start,
        available: buffer.len(),
    })?;

    let mut l = 0;
    for bytes in remaining.chunks_exact(2) {
        l += 2;
        if bytes[0] == 0 && bytes[1] == 0 {
            return Ok(l);
        }
    }

    Err(ScanError::Unterminated {
        start,
        available: buffer.len(),
    })
}

/// Decode little-endian UTF-16 bytes into a `String`
///
/// A trailing null terminator, if any, is not part of the result. Unpaired surrogates are replaced
/// with `U+FFFD`.
pub fn decode_utf16(bytes: &[u8]) -> String {
    let mut units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    // remove the null terminator
    if units.last() == Some(&0) {
        units.pop();
    }

    widestring::decode_utf16_lossy(units.iter().copied()).collect::<String>()
}

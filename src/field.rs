//! Located fields
//!
//! Once the offset engine has found where a field lives, a [`FieldSlice`] pairs its [`FieldSpec`] with its
//! bytes, and knows how to interpret them. Payloads are little-endian and not necessarily aligned.
use zerocopy::byteorder::{LittleEndian, I16, I32, I64, U16, U32, U64};
use zerocopy::FromBytes;

use crate::guid::Guid;
use crate::native::time::FileTime;
use crate::schema::{FieldKind, FieldSpec};
use crate::string_scanner::decode_utf16;
use crate::view::{DecodeError, DecodeResult};

/// A field of a given payload
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldSlice<'schema, 'record> {
    pub spec: &'schema FieldSpec,
    pub buffer: &'record [u8],
}

impl<'schema, 'record> FieldSlice<'schema, 'record> {
    pub fn create(spec: &'schema FieldSpec, buffer: &'record [u8]) -> Self {
        FieldSlice { spec, buffer }
    }

    fn invalid_type(&self) -> DecodeError {
        DecodeError::InvalidType {
            field: self.spec.name.clone(),
        }
    }

    fn unsupported_width(&self) -> DecodeError {
        DecodeError::UnsupportedFieldWidth {
            field: self.spec.name.clone(),
            width: self.buffer.len(),
        }
    }

    pub fn length_mismatch(&self, expected: usize) -> DecodeError {
        DecodeError::LengthMismatch {
            field: self.spec.name.clone(),
            expected,
            found: self.buffer.len(),
        }
    }

    /// Numbers can only be read from fixed-width and pointer fields
    pub fn expect_scalar(&self) -> DecodeResult<()> {
        match self.spec.kind {
            FieldKind::Fixed(_) | FieldKind::Pointer => Ok(()),
            FieldKind::Utf16String | FieldKind::TrailingBlob => Err(self.invalid_type()),
        }
    }

    /// Check the field can be read as an integer of exactly `size` bytes
    pub fn expect_int(&self, size: usize) -> DecodeResult<()> {
        self.expect_scalar()?;
        match self.buffer.len() {
            1 | 2 | 4 | 8 if self.buffer.len() == size => Ok(()),
            1 | 2 | 4 | 8 => Err(self.length_mismatch(size)),
            _ => Err(self.unsupported_width()),
        }
    }

    pub fn read<T: FromBytes>(&self) -> DecodeResult<T> {
        T::read_from(self.buffer).ok_or_else(|| self.length_mismatch(std::mem::size_of::<T>()))
    }

    /// The field as an unsigned integer, zero-extended to 64 bits
    pub fn unsigned(&self) -> DecodeResult<u64> {
        self.expect_scalar()?;
        match self.buffer.len() {
            1 => Ok(self.read::<u8>()? as u64),
            2 => Ok(self.read::<U16<LittleEndian>>()?.get() as u64),
            4 => Ok(self.read::<U32<LittleEndian>>()?.get() as u64),
            8 => Ok(self.read::<U64<LittleEndian>>()?.get()),
            _ => Err(self.unsupported_width()),
        }
    }

    /// The field as a signed integer, sign-extended to 64 bits
    pub fn signed(&self) -> DecodeResult<i64> {
        self.expect_scalar()?;
        match self.buffer.len() {
            1 => Ok(self.read::<i8>()? as i64),
            2 => Ok(self.read::<I16<LittleEndian>>()?.get() as i64),
            4 => Ok(self.read::<I32<LittleEndian>>()?.get() as i64),
            8 => Ok(self.read::<I64<LittleEndian>>()?.get()),
            _ => Err(self.unsupported_width()),
        }
    }

    pub fn float(&self) -> DecodeResult<f64> {
        self.expect_scalar()?;
        match self.buffer.len() {
            4 => Ok(f32::from_bits(self.read::<U32<LittleEndian>>()?.get()) as f64),
            8 => Ok(f64::from_bits(self.read::<U64<LittleEndian>>()?.get())),
            _ => Err(self.unsupported_width()),
        }
    }

    /// `win:Boolean` is 4 bytes wide, but some providers log 1-byte booleans
    pub fn boolean(&self) -> DecodeResult<bool> {
        match self.buffer.len() {
            1 | 4 | 8 => Ok(self.unsigned()? != 0),
            _ => Err(self.unsupported_width()),
        }
    }

    pub fn guid(&self) -> DecodeResult<Guid> {
        self.expect_scalar()?;
        let bytes: [u8; 16] = self.read()?;
        Ok(Guid::from_bytes_le(bytes))
    }

    pub fn file_time(&self) -> DecodeResult<FileTime> {
        self.expect_scalar()?;
        let bytes: [u8; 8] = self.read()?;
        Ok(FileTime::from_slice(&bytes))
    }

    /// The string, without its null terminator
    pub fn string(&self) -> DecodeResult<String> {
        match self.spec.kind {
            FieldKind::Utf16String => Ok(decode_utf16(self.buffer)),
            _ => Err(self.invalid_type()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn integers_are_little_endian() {
        let spec = FieldSpec::fixed("F", 4);
        let slice = FieldSlice::create(&spec, &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(slice.unsigned(), Ok(0x1234_5678));
        assert_eq!(slice.signed(), Ok(0x1234_5678));
    }

    #[test]
    fn sign_extension() {
        let spec = FieldSpec::fixed("F", 2);
        let slice = FieldSlice::create(&spec, &[0xfe, 0xff]);
        assert_eq!(slice.signed(), Ok(-2));
        assert_eq!(slice.unsigned(), Ok(0xfffe));
    }

    #[test]
    fn odd_widths() {
        let spec = FieldSpec::fixed("F", 3);
        let slice = FieldSlice::create(&spec, &[1, 2, 3]);
        assert_eq!(
            slice.unsigned(),
            Err(DecodeError::UnsupportedFieldWidth {
                field: "F".to_string(),
                width: 3
            })
        );
        assert_eq!(
            slice.expect_int(4),
            Err(DecodeError::UnsupportedFieldWidth {
                field: "F".to_string(),
                width: 3
            })
        );

        let spec = FieldSpec::fixed("G", 2);
        let slice = FieldSlice::create(&spec, &[1, 2]);
        assert_eq!(
            slice.expect_int(4),
            Err(DecodeError::LengthMismatch {
                field: "G".to_string(),
                expected: 4,
                found: 2
            })
        );
    }

    #[test]
    fn floats() {
        let spec = FieldSpec::fixed("F", 8);
        let bytes = 1.5f64.to_le_bytes();
        assert_eq!(FieldSlice::create(&spec, &bytes).float(), Ok(1.5));

        let spec = FieldSpec::fixed("F", 4);
        let bytes = (-0.25f32).to_le_bytes();
        assert_eq!(FieldSlice::create(&spec, &bytes).float(), Ok(-0.25));
    }

    #[test]
    fn strings_only_from_string_fields() {
        let spec = FieldSpec::fixed("F", 4);
        let slice = FieldSlice::create(&spec, &[b'a', 0, 0, 0]);
        assert_eq!(
            slice.string(),
            Err(DecodeError::InvalidType {
                field: "F".to_string()
            })
        );

        let spec = FieldSpec::utf16_string("S");
        let slice = FieldSlice::create(&spec, &[b'a', 0, 0, 0]);
        assert_eq!(slice.string(), Ok("a".to_string()));
        assert_eq!(
            slice.unsigned(),
            Err(DecodeError::InvalidType {
                field: "S".to_string()
            })
        );
    }
}

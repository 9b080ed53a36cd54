//! Typed access to event payloads
//!
//! A [`TypedEventView`] pairs a [`RawEventEnvelope`] with the [`FieldSchema`] its payload is laid out with,
//! and gives typed access to the fields, without copying the payload.
use crate::envelope::{EventIdentity, RawEventEnvelope};
use crate::field::FieldSlice;
use crate::guid::Guid;
use crate::native::time::FileTime;
use crate::offsets::{offset_of, FieldRange, OffsetCache};
use crate::schema::{FieldFormat, FieldKind, FieldSchema, SchemaKey};

/// Decoding errors
///
/// None of them is fatal: a field that fails to decode does not prevent other fields (or other events)
/// from being decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A field extends past the end of the payload (this includes strings with no null terminator)
    ///
    /// Fields are laid out one after the other, so a field can only be located once every field before it
    /// has been. `field` is the first field that does not fit, `requested` is the one that was asked for:
    /// they differ when an earlier field overruns the payload.
    TruncatedBuffer {
        field: String,
        requested: String,
        offset: usize,
        length: usize,
        available: usize,
    },
    /// The event is not one the schema describes
    IdentityMismatch {
        expected: SchemaKey,
        found: EventIdentity,
    },
    /// No schema is known for this event
    UnknownSchema(SchemaKey),
    /// The field width can not be interpreted as a number
    UnsupportedFieldWidth { field: String, width: usize },
    /// No field has this name
    NotFound(String),
    /// The schema has no field at this index
    FieldIndexOutOfRange(usize),
    /// The requested type is not compatible with the kind of the field
    InvalidType { field: String },
    /// The field width does not match the size of the requested type
    LengthMismatch {
        field: String,
        expected: usize,
        found: usize,
    },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TruncatedBuffer {
                field,
                requested,
                offset,
                length,
                available,
            } => {
                write!(
                    f,
                    "truncated buffer: field {} needs {} bytes at offset {}, payload is {} bytes",
                    field, length, offset, available
                )?;
                if field != requested {
                    write!(f, " (while locating {})", requested)?;
                }
                Ok(())
            }
            Self::IdentityMismatch { expected, found } => write!(
                f,
                "identity mismatch: schema is for {}, event is {{{}}} id {} v{} opcode {}",
                expected, found.provider_id, found.id, found.version, found.opcode
            ),
            Self::UnknownSchema(key) => write!(f, "no schema for {}", key),
            Self::UnsupportedFieldWidth { field, width } => {
                write!(f, "field {} has unsupported width {}", field, width)
            }
            Self::NotFound(name) => write!(f, "field {} not found", name),
            Self::FieldIndexOutOfRange(index) => write!(f, "no field at index {}", index),
            Self::InvalidType { field } => write!(f, "invalid type for field {}", field),
            Self::LengthMismatch {
                field,
                expected,
                found,
            } => write!(
                f,
                "length mismatch for field {}: expected {} bytes, found {}",
                field, expected, found
            ),
        }
    }
}

impl std::error::Error for DecodeError {}

pub type DecodeResult<T> = Result<T, DecodeError>;

/// A pointer-sized value, zero-extended to 64 bits
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash)]
pub struct Pointer(u64);

impl Pointer {
    pub fn new(value: u64) -> Self {
        Pointer(value)
    }
}

impl std::ops::Deref for Pointer {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::LowerHex for Pointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::LowerHex::fmt(&self.0, f) // delegate to u64 implementation
    }
}

impl std::fmt::UpperHex for Pointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::UpperHex::fmt(&self.0, f) // delegate to u64 implementation
    }
}

impl std::fmt::Display for Pointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f) // delegate to u64 implementation
    }
}

/// A decoded field, interpreted according to its [`FieldKind`] and [`FieldFormat`]
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Unsigned(u64),
    Signed(i64),
    HexInt(u64),
    Float(f64),
    Boolean(bool),
    Guid(Guid),
    FileTime(FileTime),
    Pointer(Pointer),
    String(String),
    Binary(&'a [u8]),
}

/// A typed, zero-copy view over the payload of one event
///
/// Offsets of the fields are computed on first access and cached for the lifetime of the view.
/// Because fields may have variable length (e.g. strings), a view is only suited to a single
/// [`RawEventEnvelope`]. Building a view is cheap: they are meant to be short-lived.
///
/// # Example
/// ```
/// # use ferrisetw_decoder::envelope::{AddressSize, EventIdentity, RawEventEnvelope};
/// # use ferrisetw_decoder::schema::{FieldSchema, FieldSpec, SchemaKey};
/// # use ferrisetw_decoder::traits::EncodeUtf16;
/// # use ferrisetw_decoder::view::{Pointer, TypedEventView};
/// # use ferrisetw_decoder::providers::kernel_guids::FILE_IO_GUID;
/// let schema = FieldSchema::builder(SchemaKey::new(FILE_IO_GUID, 0, 2).with_opcode(64))
///     .field(FieldSpec::pointer("IrpPtr"))
///     .field(FieldSpec::utf16_string("OpenPath"))
///     .build()
///     .unwrap();
///
/// let mut payload = 0x1122334455667788u64.to_le_bytes().to_vec();
/// payload.extend("C:\\f.txt".into_utf16_bytes());
/// let identity = EventIdentity::new(FILE_IO_GUID, 0, 2).with_opcode(64);
/// let envelope = RawEventEnvelope::new(identity, AddressSize::Bits64, &payload);
///
/// let view = TypedEventView::try_new(&envelope, &schema).unwrap();
///
/// // Type inference...
/// let path: String = view.try_parse("OpenPath").unwrap();
/// assert_eq!(path, "C:\\f.txt");
/// // ...or the turbofish operator
/// assert_eq!(*view.try_parse::<Pointer>("IrpPtr").unwrap(), 0x1122334455667788);
/// ```
pub struct TypedEventView<'a> {
    envelope: RawEventEnvelope<'a>,
    schema: &'a FieldSchema,
    cache: OffsetCache,
}

/// Build a view of `envelope`, laid out according to `schema`
///
/// Fails with [`DecodeError::IdentityMismatch`] if `schema` does not describe this kind of event.
pub fn build_view<'a>(
    envelope: &RawEventEnvelope<'a>,
    schema: &'a FieldSchema,
) -> DecodeResult<TypedEventView<'a>> {
    TypedEventView::try_new(envelope, schema)
}

impl<'a> TypedEventView<'a> {
    /// Use the `try_new` function to create a view
    ///
    /// The payload is not validated here: each field is only checked when it is accessed.
    pub fn try_new(envelope: &RawEventEnvelope<'a>, schema: &'a FieldSchema) -> DecodeResult<Self> {
        if !schema.matches(envelope.identity()) {
            return Err(DecodeError::IdentityMismatch {
                expected: *schema.key(),
                found: *envelope.identity(),
            });
        }

        Ok(TypedEventView {
            envelope: *envelope,
            schema,
            cache: OffsetCache::new(schema.len()),
        })
    }

    pub fn envelope(&self) -> &RawEventEnvelope<'a> {
        &self.envelope
    }

    pub fn schema(&self) -> &'a FieldSchema {
        self.schema
    }

    pub fn index_of(&self, name: &str) -> DecodeResult<usize> {
        self.schema
            .index_of(name)
            .ok_or_else(|| DecodeError::NotFound(name.to_string()))
    }

    /// Where the field at `index` lives in the payload
    pub fn field_range_at(&self, index: usize) -> DecodeResult<FieldRange> {
        offset_of(
            self.schema,
            self.envelope.data(),
            self.envelope.address_size(),
            index,
            &self.cache,
        )
    }

    /// Where the field called `name` lives in the payload
    pub fn field_range(&self, name: &str) -> DecodeResult<FieldRange> {
        self.field_range_at(self.index_of(name)?)
    }

    fn field_slice(&self, index: usize) -> DecodeResult<FieldSlice<'a, 'a>> {
        let range = self.field_range_at(index)?;
        let spec = self
            .schema
            .field(index)
            .ok_or(DecodeError::FieldIndexOutOfRange(index))?;
        let buffer = self.envelope.data().get(range.as_range()).ok_or_else(|| {
            DecodeError::TruncatedBuffer {
                field: spec.name.clone(),
                requested: spec.name.clone(),
                offset: range.start,
                length: range.len,
                available: self.envelope.data().len(),
            }
        })?;
        Ok(FieldSlice::create(spec, buffer))
    }

    /// Return a field of the event, or an error in case decoding failed.
    ///
    /// You must explicitly define `T`, the type you want to parse the field into.<br/>
    /// In case this type is not compatible with the field, [`DecodeError::InvalidType`] or
    /// [`DecodeError::LengthMismatch`] is returned.
    pub fn try_parse<T>(&self, name: &str) -> DecodeResult<T>
    where
        TypedEventView<'a>: private::TryParse<T>,
    {
        use crate::view::private::TryParse;
        self.try_parse_impl(self.index_of(name)?)
    }

    /// Same as [`Self::try_parse`], for the field at `index`
    pub fn try_parse_at<T>(&self, index: usize) -> DecodeResult<T>
    where
        TypedEventView<'a>: private::TryParse<T>,
    {
        use crate::view::private::TryParse;
        self.try_parse_impl(index)
    }

    /// Any 1, 2, 4 or 8-byte field (including pointers), zero-extended to 64 bits
    pub fn unsigned(&self, name: &str) -> DecodeResult<u64> {
        self.field_slice(self.index_of(name)?)?.unsigned()
    }

    /// The bytes of a field, borrowed from the payload
    pub fn raw(&self, name: &str) -> DecodeResult<&'a [u8]> {
        Ok(self.field_slice(self.index_of(name)?)?.buffer)
    }

    /// Decode the field at `index` according to its kind and format
    pub fn value_at(&self, index: usize) -> DecodeResult<FieldValue<'a>> {
        let slice = self.field_slice(index)?;
        match slice.spec.kind {
            FieldKind::Pointer => Ok(FieldValue::Pointer(Pointer(slice.unsigned()?))),
            FieldKind::Utf16String => Ok(FieldValue::String(slice.string()?)),
            FieldKind::TrailingBlob => Ok(FieldValue::Binary(slice.buffer)),
            FieldKind::Fixed(_) => match slice.spec.format {
                FieldFormat::Unsigned => Ok(FieldValue::Unsigned(slice.unsigned()?)),
                FieldFormat::Signed => Ok(FieldValue::Signed(slice.signed()?)),
                FieldFormat::HexInt => Ok(FieldValue::HexInt(slice.unsigned()?)),
                FieldFormat::Float => Ok(FieldValue::Float(slice.float()?)),
                FieldFormat::Boolean => Ok(FieldValue::Boolean(slice.boolean()?)),
                FieldFormat::Guid => Ok(FieldValue::Guid(slice.guid()?)),
                FieldFormat::FileTime => Ok(FieldValue::FileTime(slice.file_time()?)),
                FieldFormat::Binary => Ok(FieldValue::Binary(slice.buffer)),
            },
        }
    }

    /// Decode the field called `name` according to its kind and format
    pub fn value(&self, name: &str) -> DecodeResult<FieldValue<'a>> {
        self.value_at(self.index_of(name)?)
    }

    /// Every field of the schema, in payload order, along with its decoded value
    pub fn values(&self) -> impl Iterator<Item = (&'a str, DecodeResult<FieldValue<'a>>)> + '_ {
        let schema = self.schema;
        schema
            .fields()
            .iter()
            .enumerate()
            .map(move |(index, field)| (field.name.as_str(), self.value_at(index)))
    }
}

impl std::fmt::Debug for TypedEventView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedEventView")
            .field("schema", self.schema.key())
            .field("name", &self.schema.name())
            .field("payload_len", &self.envelope.data().len())
            .field("known_offsets", &self.cache.known())
            .finish()
    }
}

mod private {
    use super::*;

    /// Trait to try and parse a type
    ///
    /// This trait has to be implemented in order to be able to parse a type we want to retrieve from
    /// within an event.
    ///
    /// An implementation for most of the primitive types is created by using a macro, any other needed type
    /// requires this trait to be implemented
    pub trait TryParse<T> {
        /// Implement the `try_parse` function to provide a way to parse `T` from a payload or
        /// return an error in case the type `T` can't be parsed
        ///
        /// # Arguments
        /// * `index` - Index of the field in the schema
        fn try_parse_impl(&self, index: usize) -> Result<T, DecodeError>;
    }
}

macro_rules! impl_try_parse_primitive {
    ($T:ident) => {
        impl private::TryParse<$T> for TypedEventView<'_> {
            fn try_parse_impl(&self, index: usize) -> DecodeResult<$T> {
                let slice = self.field_slice(index)?;
                slice.expect_int(std::mem::size_of::<$T>())?;
                slice.read::<$T>()
            }
        }
    };
    ($T:ident, $LE:ident) => {
        impl private::TryParse<$T> for TypedEventView<'_> {
            fn try_parse_impl(&self, index: usize) -> DecodeResult<$T> {
                let slice = self.field_slice(index)?;
                slice.expect_int(std::mem::size_of::<$T>())?;
                Ok(slice
                    .read::<zerocopy::byteorder::$LE<zerocopy::byteorder::LittleEndian>>()?
                    .get())
            }
        }
    };
}

impl_try_parse_primitive!(u8);
impl_try_parse_primitive!(i8);
impl_try_parse_primitive!(u16, U16);
impl_try_parse_primitive!(i16, I16);
impl_try_parse_primitive!(u32, U32);
impl_try_parse_primitive!(i32, I32);
impl_try_parse_primitive!(i64, I64);

/// `u64` can be read from any 8-byte field, and from pointers of either width (zero-extended)
impl private::TryParse<u64> for TypedEventView<'_> {
    fn try_parse_impl(&self, index: usize) -> DecodeResult<u64> {
        let slice = self.field_slice(index)?;
        if slice.spec.kind == FieldKind::Pointer {
            return slice.unsigned();
        }
        slice.expect_int(std::mem::size_of::<u64>())?;
        slice.unsigned()
    }
}

impl private::TryParse<f32> for TypedEventView<'_> {
    fn try_parse_impl(&self, index: usize) -> DecodeResult<f32> {
        let slice = self.field_slice(index)?;
        if slice.buffer.len() != std::mem::size_of::<f32>() {
            return Err(slice.length_mismatch(std::mem::size_of::<f32>()));
        }
        Ok(slice.float()? as f32)
    }
}

impl private::TryParse<f64> for TypedEventView<'_> {
    fn try_parse_impl(&self, index: usize) -> DecodeResult<f64> {
        let slice = self.field_slice(index)?;
        if slice.buffer.len() != std::mem::size_of::<f64>() {
            return Err(slice.length_mismatch(std::mem::size_of::<f64>()));
        }
        slice.float()
    }
}

impl private::TryParse<bool> for TypedEventView<'_> {
    fn try_parse_impl(&self, index: usize) -> DecodeResult<bool> {
        self.field_slice(index)?.boolean()
    }
}

impl private::TryParse<Pointer> for TypedEventView<'_> {
    fn try_parse_impl(&self, index: usize) -> DecodeResult<Pointer> {
        let slice = self.field_slice(index)?;
        match slice.buffer.len() {
            4 | 8 => Ok(Pointer(slice.unsigned()?)),
            _ => Err(slice.length_mismatch(self.envelope.pointer_size())),
        }
    }
}

/// The `String` impl of the `TryParse` trait should be used to retrieve [`FieldKind::Utf16String`] fields
///
/// The null terminator is not part of the returned string.
impl private::TryParse<String> for TypedEventView<'_> {
    fn try_parse_impl(&self, index: usize) -> DecodeResult<String> {
        self.field_slice(index)?.string()
    }
}

impl private::TryParse<Guid> for TypedEventView<'_> {
    fn try_parse_impl(&self, index: usize) -> DecodeResult<Guid> {
        self.field_slice(index)?.guid()
    }
}

impl private::TryParse<FileTime> for TypedEventView<'_> {
    fn try_parse_impl(&self, index: usize) -> DecodeResult<FileTime> {
        self.field_slice(index)?.file_time()
    }
}

impl<'a> private::TryParse<&'a [u8]> for TypedEventView<'a> {
    fn try_parse_impl(&self, index: usize) -> DecodeResult<&'a [u8]> {
        Ok(self.field_slice(index)?.buffer)
    }
}

impl private::TryParse<Vec<u8>> for TypedEventView<'_> {
    fn try_parse_impl(&self, index: usize) -> DecodeResult<Vec<u8>> {
        Ok(self.field_slice(index)?.buffer.to_vec())
    }
}

impl<'a> private::TryParse<FieldValue<'a>> for TypedEventView<'a> {
    fn try_parse_impl(&self, index: usize) -> DecodeResult<FieldValue<'a>> {
        self.value_at(index)
    }
}

/// An event type with a statically known layout
///
/// Implementations are usually generated with [`event_type!`](crate::event_type).
pub trait TypedEvent<'a>: Sized {
    /// The layout of this event type
    fn schema() -> &'static FieldSchema;

    /// Wrap a view built from [`Self::schema`]
    fn from_view(view: TypedEventView<'a>) -> Self;
}

impl<'a> RawEventEnvelope<'a> {
    /// View this event as a `T`
    ///
    /// Fails with [`DecodeError::IdentityMismatch`] if this event is not a `T`.
    pub fn try_as<T: TypedEvent<'a>>(&self) -> DecodeResult<T> {
        let view = TypedEventView::try_new(self, T::schema())?;
        Ok(T::from_view(view))
    }
}

/// Declare an event type with one accessor per field
///
/// Accessors are declared in payload order. Each of them returns a `DecodeResult` of the declared type.
///
/// # Example
/// ```
/// use ferrisetw_decoder::event_type;
/// use ferrisetw_decoder::providers::kernel_guids::FILE_IO_GUID;
/// use ferrisetw_decoder::schema::{FieldSpec, SchemaKey};
/// use ferrisetw_decoder::view::Pointer;
///
/// event_type! {
///     /// `FileIo_Create`, version 2
///     pub struct FileIoCreate {
///         key: SchemaKey::new(FILE_IO_GUID, 0, 2).with_opcode(64),
///         name: "FileIo/Create",
///         fields: {
///             irp_ptr: Pointer = FieldSpec::pointer("IrpPtr"),
///             ttid: Pointer = FieldSpec::pointer("TTID"),
///             file_object: Pointer = FieldSpec::pointer("FileObject"),
///             create_options: u32 = FieldSpec::fixed("CreateOptions", 4),
///             file_attributes: u32 = FieldSpec::fixed("FileAttributes", 4),
///             share_access: u32 = FieldSpec::fixed("ShareAccess", 4),
///             open_path: String = FieldSpec::utf16_string("OpenPath"),
///         }
///     }
/// }
/// ```
#[macro_export]
macro_rules! event_type {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            key: $key:expr,
            name: $event_name:expr,
            fields: {
                $( $(#[$fmeta:meta])* $accessor:ident : $ty:ty = $spec:expr ),* $(,)?
            }
        }
    ) => {
        $(#[$meta])*
        $vis struct $name<'a> {
            view: $crate::view::TypedEventView<'a>,
        }

        impl<'a> $name<'a> {
            const ACCESSORS: &'static [&'static str] = &[$(stringify!($accessor)),*];

            fn field_index(accessor: &str) -> usize {
                Self::ACCESSORS
                    .iter()
                    .position(|a| *a == accessor)
                    .unwrap_or(usize::MAX)
            }

            /// The underlying view
            pub fn view(&self) -> &$crate::view::TypedEventView<'a> {
                &self.view
            }

            pub fn into_view(self) -> $crate::view::TypedEventView<'a> {
                self.view
            }

            $(
                $(#[$fmeta])*
                pub fn $accessor(&self) -> $crate::view::DecodeResult<$ty> {
                    self.view.try_parse_at::<$ty>(Self::field_index(stringify!($accessor)))
                }
            )*
        }

        impl<'a> $crate::view::TypedEvent<'a> for $name<'a> {
            fn schema() -> &'static $crate::schema::FieldSchema {
                static SCHEMA: $crate::__private::Lazy<$crate::schema::FieldSchema> =
                    $crate::__private::Lazy::new(|| {
                        $crate::schema::FieldSchema::from_static_table(
                            $key,
                            $event_name,
                            vec![$($spec),*],
                        )
                    });
                &SCHEMA
            }

            fn from_view(view: $crate::view::TypedEventView<'a>) -> Self {
                $name { view }
            }
        }
    };
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::envelope::AddressSize;
    use crate::providers::kernel_guids::DISK_IO_GUID;
    use crate::schema::FieldSpec;

    fn schema() -> FieldSchema {
        FieldSchema::builder(SchemaKey::new(DISK_IO_GUID, 0, 3))
            .field(FieldSpec::fixed("Small", 2))
            .field(FieldSpec::pointer("Ptr"))
            .field(FieldSpec::fixed("Id", 16).with_format(FieldFormat::Guid))
            .build()
            .unwrap()
    }

    #[test]
    fn typed_accessors() {
        let schema = schema();
        let mut payload = vec![0x34, 0x12];
        payload.extend(&0xdead_beefu32.to_le_bytes());
        payload.extend(&DISK_IO_GUID.to_bytes_le());
        let envelope = RawEventEnvelope::new(
            EventIdentity::new(DISK_IO_GUID, 0, 3),
            AddressSize::Bits32,
            &payload,
        );
        let view = TypedEventView::try_new(&envelope, &schema).unwrap();

        assert_eq!(view.try_parse::<u16>("Small"), Ok(0x1234));
        assert_eq!(
            view.try_parse::<u32>("Small"),
            Err(DecodeError::LengthMismatch {
                field: "Small".into(),
                expected: 4,
                found: 2
            })
        );
        assert_eq!(view.try_parse::<u64>("Ptr"), Ok(0xdead_beef));
        assert_eq!(view.try_parse::<u32>("Ptr"), Ok(0xdead_beef));
        assert_eq!(view.try_parse::<Guid>("Id"), Ok(DISK_IO_GUID));
        assert_eq!(view.value("Id"), Ok(FieldValue::Guid(DISK_IO_GUID)));
        assert_eq!(view.unsigned("Small"), Ok(0x1234));
        assert_eq!(
            view.try_parse::<String>("Small"),
            Err(DecodeError::InvalidType {
                field: "Small".into()
            })
        );
        assert_eq!(view.try_parse::<u8>("Nope"), Err(DecodeError::NotFound("Nope".into())));
        assert_eq!(view.try_parse_at::<u8>(7), Err(DecodeError::FieldIndexOutOfRange(7)));
    }

    #[test]
    fn identity_is_checked() {
        let schema = schema();
        let payload = [0u8; 64];
        let envelope = RawEventEnvelope::new(
            EventIdentity::new(DISK_IO_GUID, 0, 2),
            AddressSize::Bits64,
            &payload,
        );
        match TypedEventView::try_new(&envelope, &schema) {
            Err(DecodeError::IdentityMismatch { expected, found }) => {
                assert_eq!(expected, *schema.key());
                assert_eq!(found.version, 2);
            }
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }
}

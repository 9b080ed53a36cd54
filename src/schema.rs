//! Event payload layouts
//!
//! A [`FieldSchema`] describes the payload of one kind of event: the ordered list of its fields and how
//! many bytes each of them occupies. Schemas are plain data. They usually come from a catalog generated
//! from provider manifests or MOF classes, and are looked up through a
//! [`SchemaRegistry`](crate::schema_locator::SchemaRegistry).
use crate::envelope::EventIdentity;
use crate::guid::Guid;

/// Schema module errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A trailing blob spans up to the end of the payload, so it must be the last field
    TrailingBlobNotLast(String),
    /// Two fields share the same name
    DuplicateField(String),
    /// Field names are used for lookups and must not be empty
    EmptyFieldName { index: usize },
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TrailingBlobNotLast(name) => {
                write!(f, "trailing blob {} is not the last field", name)
            }
            Self::DuplicateField(name) => write!(f, "duplicate field {}", name),
            Self::EmptyFieldName { index } => write!(f, "field #{} has no name", index),
        }
    }
}

impl std::error::Error for SchemaError {}

pub type SchemaResult<T> = Result<T, SchemaError>;

/// A way to group events that share the same [`FieldSchema`]
///
/// From the [docs](https://docs.microsoft.com/en-us/windows/win32/api/evntprov/ns-evntprov-event_descriptor):
/// > For manifest-based ETW, the combination Provider.DecodeGuid + Event.Id + Event.Version should uniquely identify an event,
/// > i.e. all events with the same DecodeGuid, Id, and Version should have the same set of fields with no changes in field names, field types, or field ordering.
///
/// Classic kernel events do not follow this rule: they all have `Id == 0` and are told apart by their opcode.
/// Schemas for such events pin the opcode as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SchemaKey {
    pub provider: Guid,
    /// From the [docs](https://docs.microsoft.com/en-us/windows/win32/api/evntprov/ns-evntprov-event_descriptor): A 16-bit number used to identify manifest-based events
    pub id: u16,
    /// From the [docs](https://docs.microsoft.com/en-us/windows/win32/api/evntprov/ns-evntprov-event_descriptor): An 8-bit number used to specify the version of a manifest-based event.
    // A new version may reorder, resize, add or drop fields. Versions are never assumed to extend each other.
    pub version: u8,
    /// `None` unless the provider defines several shapes under the same id
    #[cfg_attr(feature = "serde", serde(default))]
    pub opcode: Option<u8>,
}

impl SchemaKey {
    pub fn new(provider: Guid, id: u16, version: u8) -> Self {
        SchemaKey {
            provider,
            id,
            version,
            opcode: None,
        }
    }

    pub fn with_opcode(mut self, opcode: u8) -> Self {
        self.opcode = Some(opcode);
        self
    }

    /// The key of an event, qualified by its opcode
    pub(crate) fn from_identity(identity: &EventIdentity) -> Self {
        SchemaKey::new(identity.provider_id, identity.id, identity.version)
            .with_opcode(identity.opcode)
    }

    /// Whether an event with this identity is laid out according to this key
    pub fn matches(&self, identity: &EventIdentity) -> bool {
        self.provider == identity.provider_id
            && self.id == identity.id
            && self.version == identity.version
            && self.opcode.map_or(true, |op| op == identity.opcode)
    }

    pub(crate) fn without_opcode(mut self) -> Self {
        self.opcode = None;
        self
    }
}

impl std::fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}} id {} v{}", self.provider, self.id, self.version)?;
        if let Some(opcode) = self.opcode {
            write!(f, " opcode {}", opcode)?;
        }
        Ok(())
    }
}

/// How many bytes a field occupies in the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldKind {
    /// A field with a fixed size in bytes (integers, GUIDs, timestamps...)
    Fixed(u16),
    /// A pointer-sized field. Its size is the address size of the envelope
    Pointer,
    /// A null-terminated UTF-16 string
    Utf16String,
    /// Every remaining byte of the payload
    TrailingBlob,
}

/// How the bytes of a [`FieldKind::Fixed`] field should be interpreted
///
/// This does not affect the layout, only [`FieldValue`](crate::view::FieldValue) decoding (hence serialization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldFormat {
    Unsigned,
    Signed,
    HexInt,
    Float,
    Boolean,
    Guid,
    FileTime,
    Binary,
}

impl Default for FieldFormat {
    fn default() -> Self {
        FieldFormat::Unsigned
    }
}

/// Attributes of a field
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    #[cfg_attr(feature = "serde", serde(default))]
    pub format: FieldFormat,
}

impl FieldSpec {
    pub fn new<S: Into<String>>(name: S, kind: FieldKind) -> Self {
        FieldSpec {
            name: name.into(),
            kind,
            format: FieldFormat::default(),
        }
    }

    pub fn fixed<S: Into<String>>(name: S, width: u16) -> Self {
        Self::new(name, FieldKind::Fixed(width))
    }

    pub fn pointer<S: Into<String>>(name: S) -> Self {
        Self::new(name, FieldKind::Pointer)
    }

    pub fn utf16_string<S: Into<String>>(name: S) -> Self {
        Self::new(name, FieldKind::Utf16String)
    }

    pub fn trailing_blob<S: Into<String>>(name: S) -> Self {
        Self::new(name, FieldKind::TrailingBlob)
    }

    pub fn with_format(mut self, format: FieldFormat) -> Self {
        self.format = format;
        self
    }
}

/// The ordered layout of the payload of one kind of event
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldSchema {
    key: SchemaKey,
    /// Human-readable name of the event, e.g. `FileIo/Create`
    #[cfg_attr(feature = "serde", serde(default))]
    name: String,
    fields: Vec<FieldSpec>,
}

impl FieldSchema {
    /// Start building the schema of the events identified by `key`
    ///
    /// # Example
    /// ```
    /// # use ferrisetw_decoder::schema::{FieldSchema, FieldSpec, SchemaKey};
    /// # use ferrisetw_decoder::providers::kernel_guids::DISK_IO_GUID;
    /// let schema = FieldSchema::builder(SchemaKey::new(DISK_IO_GUID, 0, 3).with_opcode(10))
    ///     .named("DiskIo/Read")
    ///     .field(FieldSpec::fixed("DiskNumber", 4))
    ///     .field(FieldSpec::fixed("IrpFlags", 4))
    ///     .field(FieldSpec::fixed("TransferSize", 4))
    ///     .field(FieldSpec::pointer("FileObject"))
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(schema.index_of("TransferSize"), Some(2));
    /// ```
    pub fn builder(key: SchemaKey) -> FieldSchemaBuilder {
        FieldSchemaBuilder {
            key,
            name: String::new(),
            fields: Vec::new(),
        }
    }

    /// Used by [`event_type!`](crate::event_type)
    ///
    /// Tables are not validated. An invalid table can not make decoding read out of bounds: a misplaced
    /// trailing blob makes every later field truncated, and a duplicated name resolves to its first field.
    #[doc(hidden)]
    pub fn from_static_table(key: SchemaKey, name: &str, fields: Vec<FieldSpec>) -> Self {
        let schema = FieldSchema {
            key,
            name: name.to_string(),
            fields,
        };
        debug_assert!(schema.validate().is_ok(), "invalid table for {}", name);
        schema
    }

    pub fn key(&self) -> &SchemaKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&FieldSpec> {
        self.fields.get(index)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of the field called `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Whether an event with this identity can be decoded with this schema
    pub fn matches(&self, identity: &EventIdentity) -> bool {
        self.key.matches(identity)
    }

    /// Check the invariants the offset computation relies on
    ///
    /// Schemas built with [`FieldSchema::builder`] are always valid. This is useful for deserialized ones.
    pub fn validate(&self) -> SchemaResult<()> {
        let last = self.fields.len().saturating_sub(1);
        for (index, field) in self.fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(SchemaError::EmptyFieldName { index });
            }
            if field.kind == FieldKind::TrailingBlob && index != last {
                return Err(SchemaError::TrailingBlobNotLast(field.name.clone()));
            }
            if self.fields[..index].iter().any(|f| f.name == field.name) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        Ok(())
    }
}

/// Builds a [`FieldSchema`]
#[derive(Debug, Clone)]
pub struct FieldSchemaBuilder {
    key: SchemaKey,
    name: String,
    fields: Vec<FieldSpec>,
}

impl FieldSchemaBuilder {
    pub fn named<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Append a field. Fields must be added in payload order
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> SchemaResult<FieldSchema> {
        let schema = FieldSchema {
            key: self.key,
            name: self.name,
            fields: self.fields,
        };
        schema.validate()?;
        Ok(schema)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::providers::kernel_guids::FILE_IO_GUID;

    fn key() -> SchemaKey {
        SchemaKey::new(FILE_IO_GUID, 0, 2)
    }

    #[test]
    fn key_matching() {
        let identity = EventIdentity::new(FILE_IO_GUID, 0, 2).with_opcode(64).with_level(4);
        assert!(key().matches(&identity));
        assert!(key().with_opcode(64).matches(&identity));
        assert!(!key().with_opcode(65).matches(&identity));
        assert!(!SchemaKey::new(FILE_IO_GUID, 0, 3).matches(&identity));
        assert!(!SchemaKey::new(FILE_IO_GUID, 1, 2).matches(&identity));
    }

    #[test]
    fn trailing_blob_must_be_last() {
        let err = FieldSchema::builder(key())
            .field(FieldSpec::trailing_blob("Rest"))
            .field(FieldSpec::fixed("After", 4))
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::TrailingBlobNotLast("Rest".to_string()));

        assert!(FieldSchema::builder(key())
            .field(FieldSpec::fixed("Before", 4))
            .field(FieldSpec::trailing_blob("Rest"))
            .build()
            .is_ok());
    }

    #[test]
    fn field_names() {
        let err = FieldSchema::builder(key())
            .field(FieldSpec::fixed("A", 4))
            .field(FieldSpec::pointer("A"))
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateField("A".to_string()));

        let err = FieldSchema::builder(key())
            .field(FieldSpec::fixed("", 4))
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::EmptyFieldName { index: 0 });
    }

    #[test]
    fn lookups() {
        let schema = FieldSchema::builder(key())
            .named("FileIo/Create")
            .field(FieldSpec::pointer("IrpPtr"))
            .field(FieldSpec::utf16_string("OpenPath"))
            .build()
            .unwrap();
        assert_eq!(schema.name(), "FileIo/Create");
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.index_of("OpenPath"), Some(1));
        assert_eq!(schema.index_of("Nope"), None);
        assert_eq!(schema.field(0).map(|f| f.kind), Some(FieldKind::Pointer));
    }
}

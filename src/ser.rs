//! Integrates with [serde](https://serde.rs/) enabling [`TypedEventView`](crate::view::TypedEventView) to be serialized to various formats.
//!
//! Requires the `serde` feature be enabled.
//!
//! If the `time_rs` feature is enabled, then time stamps are serialized per the serialization format
//! of the time crate. Otherwise, if `time_rs` is not enabled, then timestamps are serialized as 64bit
//! unix timestamps.
//!
//! ```
//! use ferrisetw_decoder::envelope::{AddressSize, EventIdentity, RawEventEnvelope};
//! use ferrisetw_decoder::providers::manifest_guids::KERNEL_PROCESS_GUID;
//! use ferrisetw_decoder::schema::{FieldSchema, FieldSpec, SchemaKey};
//! use ferrisetw_decoder::view::TypedEventView;
//! use ferrisetw_decoder::EventSerializer;
//! extern crate serde_json;
//!
//! let schema = FieldSchema::builder(SchemaKey::new(KERNEL_PROCESS_GUID, 1, 3))
//!     .named("ProcessStart")
//!     .field(FieldSpec::fixed("ProcessID", 4))
//!     .build()
//!     .unwrap();
//! let payload = 1234u32.to_le_bytes();
//! let envelope = RawEventEnvelope::new(
//!     EventIdentity::new(KERNEL_PROCESS_GUID, 1, 3),
//!     AddressSize::Bits64,
//!     &payload,
//! );
//! let view = TypedEventView::try_new(&envelope, &schema).unwrap();
//!
//! // Generate a serializer for the view
//! let ser = EventSerializer::new(&view, Default::default());
//! // Pass the serializer to any serde compatible serializer
//! match serde_json::to_value(ser) {
//!     Err(err) => println!("Error {:?}", err),
//!     Ok(json) => assert_eq!(json["Event"]["ProcessID"], 1234),
//! }
//! ```
#![cfg(feature = "serde")]

use serde::ser::{SerializeMap, SerializeStruct};

use crate::envelope::{CpuTime, RawEventEnvelope};
use crate::schema::FieldSchema;
use crate::view::{FieldValue, TypedEventView};

/// Serialization options for EventSerializer
#[derive(Debug, Clone, Copy)]
pub struct EventSerializerOptions {
    /// Includes information from the schema in the serialized output such as the event name and its key.
    pub include_schema: bool,
    /// Includes the header of the event (identity, process, timestamp...) in the serialized output.
    pub include_header: bool,
    /// When `true` a field that fails to decode fails the serialization with an error, otherwise it is serialized as `null`.
    pub fail_on_error: bool,
}

impl core::default::Default for EventSerializerOptions {
    fn default() -> Self {
        Self {
            include_schema: true,
            include_header: true,
            fail_on_error: false,
        }
    }
}

/// Used to serialize [`TypedEventView`](crate::view::TypedEventView) using [serde](https://serde.rs/)
pub struct EventSerializer<'a, 'b> {
    pub(crate) view: &'a TypedEventView<'b>,
    pub(crate) options: EventSerializerOptions,
}

impl<'a, 'b> EventSerializer<'a, 'b> {
    /// Creates an event serializer object.
    pub fn new(view: &'a TypedEventView<'b>, options: EventSerializerOptions) -> Self {
        Self { view, options }
    }
}

impl serde::ser::Serialize for EventSerializer<'_, '_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        let mut state = serializer.serialize_struct("Record", 3)?;

        if self.options.include_schema {
            let schema = SchemaSer::new(self.view.schema());
            state.serialize_field("Schema", &schema)?;
        } else {
            state.skip_field("Schema")?;
        }

        if self.options.include_header {
            let header = HeaderSer::new(self.view.envelope());
            state.serialize_field("Header", &header)?;
        } else {
            state.skip_field("Header")?;
        }

        let event = EventSer::new(self.view, &self.options);
        state.serialize_field("Event", &event)?;

        state.end()
    }
}

struct SchemaSer<'a> {
    schema: &'a FieldSchema,
}

impl<'a> SchemaSer<'a> {
    fn new(schema: &'a FieldSchema) -> Self {
        Self { schema }
    }
}

impl serde::ser::Serialize for SchemaSer<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("Schema", 2)?;
        state.serialize_field("Name", &self.schema.name().trim())?;
        state.serialize_field("Key", self.schema.key())?;
        state.end()
    }
}

struct HeaderSer<'a, 'b> {
    envelope: &'a RawEventEnvelope<'b>,
}

impl<'a, 'b> HeaderSer<'a, 'b> {
    fn new(envelope: &'a RawEventEnvelope<'b>) -> Self {
        Self { envelope }
    }
}

impl serde::ser::Serialize for HeaderSer<'_, '_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        let mut state = serializer.serialize_struct("Header", 8)?;
        state.serialize_field("ThreadId", &self.envelope.thread_id())?;
        state.serialize_field("ProcessId", &self.envelope.process_id())?;
        state.serialize_field("TimeStamp", &self.envelope.file_time())?;
        state.serialize_field("ProcessorNumber", &self.envelope.processor_number())?;
        state.serialize_field("PointerSize", &self.envelope.pointer_size())?;
        state.serialize_field("CpuTime", &CpuTimeSer(self.envelope.cpu_time()))?;
        state.serialize_field("ProviderId", &self.envelope.provider_id())?;
        let descriptor = DescriptorSer::new(self.envelope);
        state.serialize_field("Descriptor", &descriptor)?;
        state.end()
    }
}

struct CpuTimeSer(CpuTime);

impl serde::ser::Serialize for CpuTimeSer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        let mut state = serializer.serialize_struct("CpuTime", 3)?;
        state.serialize_field("KernelTime", &self.0.kernel)?;
        state.serialize_field("UserTime", &self.0.user)?;
        state.serialize_field("ProcessorTime", &self.0.processor)?;
        state.end()
    }
}

struct DescriptorSer<'a, 'b> {
    envelope: &'a RawEventEnvelope<'b>,
}

impl<'a, 'b> DescriptorSer<'a, 'b> {
    fn new(envelope: &'a RawEventEnvelope<'b>) -> Self {
        Self { envelope }
    }
}

impl serde::ser::Serialize for DescriptorSer<'_, '_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        let identity = self.envelope.identity();
        let mut state = serializer.serialize_struct("Descriptor", 7)?;
        state.serialize_field("Id", &identity.id)?;
        state.serialize_field("Version", &identity.version)?;
        state.serialize_field("Channel", &identity.channel)?;
        state.serialize_field("Level", &identity.level)?;
        state.serialize_field("Opcode", &identity.opcode)?;
        state.serialize_field("Task", &identity.task)?;
        state.serialize_field("Keyword", &identity.keyword)?;
        state.end()
    }
}

struct EventSer<'a, 'b> {
    view: &'a TypedEventView<'b>,
    options: &'a EventSerializerOptions,
}

impl<'a, 'b> EventSer<'a, 'b> {
    fn new(view: &'a TypedEventView<'b>, options: &'a EventSerializerOptions) -> Self {
        Self { view, options }
    }
}

impl serde::ser::Serialize for EventSer<'_, '_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_map(Some(self.view.schema().len()))?;
        for (name, value) in self.view.values() {
            match value {
                Ok(value) => state.serialize_entry(name, &value)?,
                Err(err) if self.options.fail_on_error => {
                    return Err(serde::ser::Error::custom(err));
                }
                Err(err) => {
                    log::debug!("serializing {} as null: {}", name, err);
                    let value: Option<u64> = None;
                    state.serialize_entry(name, &value)?;
                }
            }
        }
        state.end()
    }
}

impl serde::ser::Serialize for FieldValue<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            FieldValue::Unsigned(v) => serializer.serialize_u64(*v),
            FieldValue::Signed(v) => serializer.serialize_i64(*v),
            FieldValue::HexInt(v) => {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&format!("{:#x}", v))
                } else {
                    serializer.serialize_u64(*v)
                }
            }
            FieldValue::Float(v) => serializer.serialize_f64(*v),
            FieldValue::Boolean(v) => serializer.serialize_bool(*v),
            FieldValue::Guid(v) => serde::Serialize::serialize(v, serializer),
            FieldValue::FileTime(v) => serde::Serialize::serialize(v, serializer),
            FieldValue::Pointer(v) => serializer.serialize_u64(**v),
            FieldValue::String(v) => serializer.serialize_str(v),
            FieldValue::Binary(v) => serializer.serialize_bytes(v),
        }
    }
}

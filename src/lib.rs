//! # Decode ETW payloads FTW!
//! This crate provides safe, zero-copy decoding of Event Tracing for Windows (ETW) event payloads.
//!
//! # What's an ETW payload
//! Every ETW event carries a header (which provider emitted it, its id, version, opcode, timestamp...) and a
//! payload: the raw bytes of its fields, laid out back to back, without any separator nor type information.
//! To make sense of these bytes, one needs the *schema* of the event: the ordered list of its fields, along
//! with their sizes.
//!
//! Some fields do not have a fixed size:
//! * pointers are 4 or 8 bytes wide, depending on the process that emitted the event
//! * strings are null-terminated UTF-16, so their length can only be known by scanning the payload
//!
//! Hence, the offset of a field depends on the sizes of every field before it.
//!
//! # Motivation
//! Hardcoding offsets in event structures is brittle: a single new field, or a 32-bit emitter, and every
//! subsequent field is read from the wrong place. Going through TDH for every event is correct, but slow
//! and Windows-only.<br/>
//! This crate decodes payloads from static schemas instead. Offsets are computed lazily and cached, so that
//! accessing a field is cheap, and never reads out of bounds.
//!
//! # Getting started
//! ```
//! use ferrisetw_decoder::envelope::{AddressSize, EventIdentity, RawEventEnvelope};
//! use ferrisetw_decoder::providers::kernel_guids::FILE_IO_GUID;
//! use ferrisetw_decoder::schema::{FieldSchema, FieldSpec, SchemaKey};
//! use ferrisetw_decoder::schema_locator::SchemaRegistry;
//! use ferrisetw_decoder::traits::EncodeUtf16;
//!
//! // Schemas are usually loaded once, from a catalog
//! let registry = SchemaRegistry::builder()
//!     .add(
//!         FieldSchema::builder(SchemaKey::new(FILE_IO_GUID, 0, 2).with_opcode(64))
//!             .named("FileIo/Create")
//!             .field(FieldSpec::pointer("IrpPtr"))
//!             .field(FieldSpec::pointer("FileObject"))
//!             .field(FieldSpec::utf16_string("OpenPath"))
//!             .field(FieldSpec::fixed("Status", 4))
//!             .build()
//!             .unwrap(),
//!     )
//!     .build()
//!     .unwrap();
//!
//! // This is what an event emitted by a 32-bit process looks like
//! let mut payload = Vec::new();
//! payload.extend(&0x1000u32.to_le_bytes());
//! payload.extend(&0x2000u32.to_le_bytes());
//! payload.extend("C:\\f.txt".into_utf16_bytes());
//! payload.extend(&0xc000_0034u32.to_le_bytes());
//!
//! let identity = EventIdentity::new(FILE_IO_GUID, 0, 2).with_opcode(64);
//! let envelope = RawEventEnvelope::new(identity, AddressSize::Bits32, &payload);
//!
//! let schema = registry.resolve(envelope.identity()).unwrap();
//! let view = ferrisetw_decoder::build_view(&envelope, &schema).unwrap();
//!
//! // You'll need type inference to tell the view what type you want to parse into
//! // In actual code, be sure to correctly handle Err values!
//! let path: String = view.try_parse("OpenPath").unwrap();
//! let status: u32 = view.try_parse("Status").unwrap();
//! assert_eq!(path, "C:\\f.txt");
//! assert_eq!(status, 0xc000_0034);
//! ```
//!
//! Event types that are known at compile time can also be declared with [`event_type!`], which generates
//! one typed accessor per field.
//!
//! On Windows, [`native::EventRecord`] turns the `EVENT_RECORD`s received in an ETW consumer callback into
//! [`RawEventEnvelope`]s.
//!
//! # Log messages
//! This crate may occasionally write log messages using the [`log`](https://docs.rs/log/latest/log/) crate
//! (e.g. when a schema is registered twice, or when a field does not fit in its payload).<br/>
//! In case you want them to be printed to the console, your binary should use one of the various logger implementations. [`env_logger`](https://docs.rs/env_logger/latest/env_logger/) is one of them.<br/>
//! You can have a look at how to use it in the `demos/` folder.

#[macro_use]
extern crate bitflags;

#[macro_use]
extern crate num_derive;
extern crate num_traits;

pub mod envelope;
mod field;
pub mod guid;
pub mod native;
pub mod offsets;
pub mod providers;
pub mod schema;
pub mod schema_locator;
pub mod ser;
pub mod string_scanner;
pub mod traits;
pub mod view;

#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::Lazy;
}

// Convenience re-exports.
pub use crate::envelope::{AddressSize, EventIdentity, RawEventEnvelope};
pub use crate::guid::Guid;
pub use crate::schema::{FieldKind, FieldSchema, FieldSpec, SchemaKey};
pub use crate::schema_locator::{resolve_schema, SchemaRegistry};
#[cfg(feature = "serde")]
pub use crate::ser::{EventSerializer, EventSerializerOptions};
pub use crate::view::{build_view, DecodeError, TypedEventView};

//! Abstraction layer for Native functions and types
//!
//! Only [`time`] is available on every platform. The rest of this module wraps Windows types, and should
//! abstract all `unsafe` accesses to them.
pub mod time;

#[cfg(windows)]
mod event_record;
#[cfg(windows)]
pub use event_record::EventRecord;

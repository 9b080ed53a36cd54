//! Safe wrappers over the EVENT_RECORD type

use windows::Win32::System::Diagnostics::Etw::EVENT_RECORD;

use crate::envelope::{AddressSize, CpuTime, EventHeaderFlags, EventIdentity, RawEventEnvelope};

/// A read-only wrapper over an [EVENT_RECORD](https://docs.microsoft.com/en-us/windows/win32/api/evntcons/ns-evntcons-event_record)
///
/// This is what an ETW consumer callback receives. Turn it into a [`RawEventEnvelope`] to decode it.
#[repr(transparent)]
pub struct EventRecord(EVENT_RECORD);

impl EventRecord {
    /// Create a `&self` from a Windows pointer.
    ///
    /// # Safety
    ///
    /// 1. Once an instance of `Self` is created, one should make sure the pointed data does not get modified (or dealloc'ed).
    /// 2. The returned lifetime is arbitray. To restrict the use of the returned reference (and to ensure the first safety guarantee), simply pass it to a sub-function whose signature has no explicit lifetime.
    ///    Thus, the sub-function will not be able to leak this reference.
    pub unsafe fn from_ptr<'a>(p: *const EVENT_RECORD) -> Option<&'a Self> {
        let s = p as *const Self;
        s.as_ref()
    }

    /// Get the wrapped `EVENT_RECORD` (usually to feed Windows API functions)
    pub fn as_raw_ptr(&self) -> *const EVENT_RECORD {
        &self.0 as *const EVENT_RECORD
    }

    /// The `Flags` field from the wrapped `EVENT_RECORD`
    pub fn flags(&self) -> EventHeaderFlags {
        EventHeaderFlags::from_bits_truncate(self.0.EventHeader.Flags)
    }

    /// The identity of the event, from its `EVENT_HEADER` and `EVENT_DESCRIPTOR`
    pub fn identity(&self) -> EventIdentity {
        let descriptor = &self.0.EventHeader.EventDescriptor;
        EventIdentity::new(
            self.0.EventHeader.ProviderId.into(),
            descriptor.Id,
            descriptor.Version,
        )
        .with_opcode(descriptor.Opcode)
        .with_task(descriptor.Task)
        .with_keyword(descriptor.Keyword)
        .with_channel(descriptor.Channel)
        .with_level(descriptor.Level)
    }

    fn user_buffer(&self) -> &[u8] {
        if self.0.UserData.is_null() || self.0.UserDataLength == 0 {
            return &[];
        }

        // Safety: * `UserData` points to `UserDataLength` bytes, as documented by Microsoft
        //         * the pointed data is not supposed to be mutated during the lifetime of `Self`
        unsafe {
            std::slice::from_raw_parts(
                self.0.UserData as *const u8,
                self.0.UserDataLength.into(),
            )
        }
    }

    /// An envelope borrowing the `UserData` of this record
    ///
    /// The pointer width of the payload is inferred from the header flags.
    pub fn as_envelope(&self) -> RawEventEnvelope<'_> {
        let flags = self.flags();
        let header = &self.0.EventHeader;

        // Safety: both members of this union are plain integers. `CpuTime::from_header` decides which one is meaningful
        let raw_cpu_time = unsafe { header.Anonymous.ProcessorTime };
        // Safety: `ProcessorNumber` is always valid, it overlaps the low byte of `ProcessorIndex`
        let processor_number = unsafe { self.0.BufferContext.Anonymous.Anonymous.ProcessorNumber };

        RawEventEnvelope::new(
            self.identity(),
            AddressSize::from_header_flags(flags),
            self.user_buffer(),
        )
        .with_process(header.ProcessId, header.ThreadId)
        .with_timestamp(header.TimeStamp)
        .with_processor_number(processor_number)
        .with_cpu_time(CpuTime::from_header(flags, raw_cpu_time))
    }
}

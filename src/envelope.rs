//! Captured events
//!
//! A [`RawEventEnvelope`] is what a capture source (a real-time session, an ETL file reader, a test...)
//! hands over to this crate: the identity of the event, the context it was emitted in, and the
//! opaque payload bytes. The envelope only borrows the payload, so that decoding never copies it.
use num_traits::FromPrimitive;

use crate::guid::Guid;
use crate::native::time::FileTime;

/// Envelope module errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Pointers can only be 4 or 8 bytes wide
    InvalidAddressSize(u8),
}

impl std::fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAddressSize(s) => write!(f, "invalid address size {}", s),
        }
    }
}

impl std::error::Error for EnvelopeError {}

bitflags! {
    /// Represents the `EVENT_HEADER.Flags` of a captured event
    ///
    /// See: [EVENT_HEADER](https://docs.microsoft.com/en-us/windows/win32/api/evntcons/ns-evntcons-event_header)
    #[derive(Default)]
    pub struct EventHeaderFlags: u16 {
        const EXTENDED_INFO = 0x0001;
        const PRIVATE_SESSION = 0x0002;
        const STRING_ONLY = 0x0004;
        const TRACE_MESSAGE = 0x0008;
        const NO_CPUTIME = 0x0010;
        const HEADER_32_BIT = 0x0020;
        const HEADER_64_BIT = 0x0040;
        const DECODE_GUID = 0x0080;
        const CLASSIC_HEADER = 0x0100;
        const PROCESSOR_INDEX = 0x0200;
    }
}

/// Width of the pointers of the process that emitted an event
#[repr(u8)]
#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive, PartialEq, Eq, Hash)]
pub enum AddressSize {
    Bits32 = 4,
    Bits64 = 8,
}

impl AddressSize {
    /// Size of a pointer, in bytes
    pub fn bytes(self) -> usize {
        self as usize
    }

    /// Infer the pointer width from the header flags
    ///
    /// Events logged from a 32-bit context carry `EVENT_HEADER_FLAG_32_BIT_HEADER`. Anything else is 64-bit.
    pub fn from_header_flags(flags: EventHeaderFlags) -> Self {
        if flags.contains(EventHeaderFlags::HEADER_32_BIT) {
            AddressSize::Bits32
        } else {
            AddressSize::Bits64
        }
    }
}

impl std::convert::TryFrom<u8> for AddressSize {
    type Error = EnvelopeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        FromPrimitive::from_u8(value).ok_or(EnvelopeError::InvalidAddressSize(value))
    }
}

/// Severity of an event, as set in its descriptor
#[repr(u8)]
#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    LogAlways = 0,
    Critical = 1,
    Error = 2,
    Warning = 3,
    Informational = 4,
    Verbose = 5,
}

/// What identifies an event, i.e. its provider and its `EVENT_DESCRIPTOR`
///
/// Only `(provider_id, id, version)` (and the opcode, for providers that reuse ids across shapes)
/// determine the binary layout of the payload. The other members are descriptive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EventIdentity {
    pub provider_id: Guid,
    pub id: u16,
    pub version: u8,
    pub opcode: u8,
    pub task: u16,
    pub keyword: u64,
    pub channel: u8,
    pub level: u8,
}

impl EventIdentity {
    pub fn new(provider_id: Guid, id: u16, version: u8) -> Self {
        EventIdentity {
            provider_id,
            id,
            version,
            ..Default::default()
        }
    }

    pub fn with_opcode(mut self, opcode: u8) -> Self {
        self.opcode = opcode;
        self
    }

    pub fn with_task(mut self, task: u16) -> Self {
        self.task = task;
        self
    }

    pub fn with_keyword(mut self, keyword: u64) -> Self {
        self.keyword = keyword;
        self
    }

    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    /// The level as a [`Level`], if it is one of the standard values
    pub fn standard_level(&self) -> Option<Level> {
        FromPrimitive::from_u8(self.level)
    }
}

/// CPU time charged to the emitting thread
///
/// Each member is independently present: kernel and user times are not tracked for private
/// sessions (that report a processor time instead), and none of them are when the
/// `NO_CPUTIME` flag is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTime {
    pub kernel: Option<u32>,
    pub user: Option<u32>,
    pub processor: Option<u64>,
}

impl CpuTime {
    /// Interpret the `EVENT_HEADER` time union according to the header flags
    pub fn from_header(flags: EventHeaderFlags, raw: u64) -> Self {
        if flags.contains(EventHeaderFlags::NO_CPUTIME) {
            return CpuTime::default();
        }

        if flags.contains(EventHeaderFlags::PRIVATE_SESSION) {
            return CpuTime {
                processor: Some(raw),
                ..Default::default()
            };
        }

        CpuTime {
            kernel: Some(raw as u32),
            user: Some((raw >> 32) as u32),
            processor: None,
        }
    }
}

/// A read-only, borrowed view over one captured event
///
/// # Example
/// ```
/// # use ferrisetw_decoder::envelope::{AddressSize, EventIdentity, RawEventEnvelope};
/// # use ferrisetw_decoder::providers::kernel_guids::FILE_IO_GUID;
/// let payload = [0u8; 24];
/// let envelope = RawEventEnvelope::new(
///     EventIdentity::new(FILE_IO_GUID, 0, 2).with_opcode(67),
///     AddressSize::Bits32,
///     &payload,
/// )
/// .with_process(4, 1234);
/// assert_eq!(envelope.data().len(), 24);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RawEventEnvelope<'a> {
    identity: EventIdentity,
    process_id: u32,
    thread_id: u32,
    timestamp: i64,
    processor_number: u8,
    cpu_time: CpuTime,
    address_size: AddressSize,
    data: &'a [u8],
}

impl<'a> RawEventEnvelope<'a> {
    pub fn new(identity: EventIdentity, address_size: AddressSize, data: &'a [u8]) -> Self {
        RawEventEnvelope {
            identity,
            process_id: 0,
            thread_id: 0,
            timestamp: 0,
            processor_number: 0,
            cpu_time: CpuTime::default(),
            address_size,
            data,
        }
    }

    pub fn with_process(mut self, process_id: u32, thread_id: u32) -> Self {
        self.process_id = process_id;
        self.thread_id = thread_id;
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_processor_number(mut self, processor_number: u8) -> Self {
        self.processor_number = processor_number;
        self
    }

    pub fn with_cpu_time(mut self, cpu_time: CpuTime) -> Self {
        self.cpu_time = cpu_time;
        self
    }

    pub fn identity(&self) -> &EventIdentity {
        &self.identity
    }

    pub fn provider_id(&self) -> Guid {
        self.identity.provider_id
    }

    pub fn event_id(&self) -> u16 {
        self.identity.id
    }

    pub fn version(&self) -> u8 {
        self.identity.version
    }

    pub fn opcode(&self) -> u8 {
        self.identity.opcode
    }

    pub fn level(&self) -> u8 {
        self.identity.level
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }

    /// The time the event occurred at
    ///
    /// This is a [`FileTime`] quad, unless the capture session used raw timestamps (QPC or CPU cycles),
    /// in which case only differences between timestamps are meaningful.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn file_time(&self) -> FileTime {
        FileTime::from_quad(self.timestamp)
    }

    pub fn processor_number(&self) -> u8 {
        self.processor_number
    }

    pub fn cpu_time(&self) -> CpuTime {
        self.cpu_time
    }

    pub fn address_size(&self) -> AddressSize {
        self.address_size
    }

    pub fn pointer_size(&self) -> usize {
        self.address_size.bytes()
    }

    /// The payload of the event (i.e. the `UserData`), without any header
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

#![allow(dead_code)] // every test binary uses a different subset of these helpers

use ferrisetw_decoder::envelope::AddressSize;
use ferrisetw_decoder::traits::EncodeUtf16;

/// Lays out a payload the way an emitter with the given pointer width would
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    address_size: AddressSize,
    bytes: Vec<u8>,
}

impl PayloadBuilder {
    pub fn new(address_size: AddressSize) -> Self {
        Self {
            address_size,
            bytes: Vec::new(),
        }
    }

    pub fn u8(mut self, v: u8) -> Self {
        self.bytes.push(v);
        self
    }

    pub fn u16(mut self, v: u16) -> Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32(mut self, v: u32) -> Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u64(mut self, v: u64) -> Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// A pointer, truncated to the pointer width of the emitter
    pub fn pointer(self, v: u64) -> Self {
        match self.address_size {
            AddressSize::Bits32 => self.u32(v as u32),
            AddressSize::Bits64 => self.u64(v),
        }
    }

    /// A null-terminated UTF-16 string
    pub fn string(mut self, s: &str) -> Self {
        self.bytes.extend(s.into_utf16_bytes());
        self
    }

    pub fn bytes(mut self, b: &[u8]) -> Self {
        self.bytes.extend_from_slice(b);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

/// Print log messages while the tests run (`RUST_LOG=trace cargo test`)
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

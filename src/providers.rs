//! Well-known provider identities
//!
//! Classic (MOF-based) kernel events are emitted by the NT Kernel Logger under one GUID per event class.
//! Schemas for those events are keyed on these GUIDs.
//! Credits: [KrabsETW::kernel_guids](https://github.com/microsoft/krabsetw/blob/master/krabs/krabs/kernel_guids.hpp)

/// GUIDs of the NT kernel logger event classes
pub mod kernel_guids {
    use crate::guid::Guid;

    pub const ALPC_GUID: Guid = Guid::from_values(
        0x45d8cccd, 0x539f, 0x4b72, [0xa8, 0xb7, 0x5c, 0x68, 0x31, 0x42, 0x60, 0x9a]);
    pub const DISK_IO_GUID: Guid = Guid::from_values(
        0x3d6fa8d4, 0xfe05, 0x11d0, [0x9d, 0xda, 0x00, 0xc0, 0x4f, 0xd7, 0xba, 0x7c]);
    pub const FILE_IO_GUID: Guid = Guid::from_values(
        0x90cbdc39, 0x4a3e, 0x11d1, [0x84, 0xf4, 0x00, 0x00, 0xf8, 0x04, 0x64, 0xe3]);
    pub const IMAGE_LOAD_GUID: Guid = Guid::from_values(
        0x2cb15d1d, 0x5fc1, 0x11d2, [0xab, 0xe1, 0x00, 0xa0, 0xc9, 0x11, 0xf5, 0x18]);
    pub const PAGE_FAULT_GUID: Guid = Guid::from_values(
        0x3d6fa8d3, 0xfe05, 0x11d0, [0x9d, 0xda, 0x00, 0xc0, 0x4f, 0xd7, 0xba, 0x7c]);
    pub const PERF_INFO_GUID: Guid = Guid::from_values(
        0xce1dbfb4, 0x137e, 0x4da6, [0x87, 0xb0, 0x3f, 0x59, 0xaa, 0x10, 0x2c, 0xbc]);
    pub const PROCESS_GUID: Guid = Guid::from_values(
        0x3d6fa8d0, 0xfe05, 0x11d0, [0x9d, 0xda, 0x00, 0xc0, 0x4f, 0xd7, 0xba, 0x7c]);
    pub const REGISTRY_GUID: Guid = Guid::from_values(
        0xAE53722E, 0xC863, 0x11d2, [0x86, 0x59, 0x00, 0xC0, 0x4F, 0xA3, 0x21, 0xA1]);
    pub const SPLIT_IO_GUID: Guid = Guid::from_values(
        0xd837ca92, 0x12b9, 0x44a5, [0xad, 0x6a, 0x3a, 0x65, 0xb3, 0x57, 0x8a, 0xa8]);
    pub const STACK_WALK_GUID: Guid = Guid::from_values(
        0xdef2fe46, 0x7bd6, 0x4b80, [0xbd, 0x94, 0xf5, 0x7f, 0xe2, 0x0d, 0x0c, 0xe3]);
    pub const TCP_IP_GUID: Guid = Guid::from_values(
        0x9a280ac0, 0xc8e0, 0x11d1, [0x84, 0xe2, 0x00, 0xc0, 0x4f, 0xb9, 0x98, 0xa2]);
    pub const THREAD_GUID: Guid = Guid::from_values(
        0x3d6fa8d1, 0xfe05, 0x11d0, [0x9d, 0xda, 0x00, 0xc0, 0x4f, 0xd7, 0xba, 0x7c]);
    pub const UDP_IP_GUID: Guid = Guid::from_values(
        0xbf3a50c5, 0xa9c9, 0x4988, [0xa0, 0x05, 0x2d, 0xf0, 0xb7, 0xc8, 0x0f, 0x80]);
}

/// GUIDs of a few manifest-based providers
pub mod manifest_guids {
    use crate::guid::Guid;

    /// Microsoft-Windows-Kernel-Process
    pub const KERNEL_PROCESS_GUID: Guid = Guid::from_values(
        0x22fb2cd6, 0x0e7b, 0x422b, [0xa0, 0xc7, 0x2f, 0xad, 0x1f, 0xd0, 0xe7, 0x16]);
    /// Microsoft-Windows-Kernel-File
    pub const KERNEL_FILE_GUID: Guid = Guid::from_values(
        0xedd08927, 0x9cc4, 0x4e65, [0xb9, 0x70, 0xc2, 0x56, 0x0f, 0xb5, 0xc2, 0x89]);
    /// Microsoft-Windows-DNS-Client
    pub const DNS_CLIENT_GUID: Guid = Guid::from_values(
        0x1c95126e, 0x7eea, 0x49a9, [0xa3, 0xfe, 0xa3, 0x78, 0xb0, 0x3d, 0xdb, 0x4d]);
}

//! Offsets of fields, computed from static schemas against real-looking payloads

use std::sync::Arc;

use ferrisetw_decoder::envelope::{AddressSize, EventIdentity, RawEventEnvelope};
use ferrisetw_decoder::offsets::FieldRange;
use ferrisetw_decoder::providers::kernel_guids::{DISK_IO_GUID, FILE_IO_GUID};
use ferrisetw_decoder::schema::{FieldSchema, FieldSpec, SchemaKey};
use ferrisetw_decoder::view::{DecodeError, FieldValue, Pointer, TypedEventView};

mod utils;
use utils::{init_logger, PayloadBuilder};

/// `FileIo_ReadWrite`, as emitted for opcode 67 (Read)
fn read_write_schema() -> FieldSchema {
    FieldSchema::builder(SchemaKey::new(FILE_IO_GUID, 0, 2).with_opcode(67))
        .named("FileIo/Read")
        .field(FieldSpec::fixed("Offset", 8))
        .field(FieldSpec::pointer("IrpPtr"))
        .field(FieldSpec::pointer("FileObject"))
        .field(FieldSpec::fixed("IoSize", 4))
        .field(FieldSpec::fixed("IoFlags", 4))
        .build()
        .unwrap()
}

fn read_write_identity() -> EventIdentity {
    EventIdentity::new(FILE_IO_GUID, 0, 2).with_opcode(67)
}

fn read_write_payload(address_size: AddressSize) -> Vec<u8> {
    PayloadBuilder::new(address_size)
        .u64(0x1000)
        .pointer(0xaaaa_0000)
        .pointer(0xbbbb_0000)
        .u32(512)
        .u32(0x60900)
        .build()
}

#[test]
fn read_write_on_a_32_bit_emitter() {
    init_logger();

    let schema = read_write_schema();
    let payload = read_write_payload(AddressSize::Bits32);
    assert_eq!(payload.len(), 24);

    let envelope = RawEventEnvelope::new(read_write_identity(), AddressSize::Bits32, &payload);
    let view = TypedEventView::try_new(&envelope, &schema).unwrap();

    assert_eq!(view.field_range("IoSize"), Ok(FieldRange { start: 16, len: 4 }));
    assert_eq!(view.field_range("IoFlags"), Ok(FieldRange { start: 20, len: 4 }));
    assert_eq!(view.try_parse::<u64>("Offset"), Ok(0x1000));
    assert_eq!(view.try_parse::<Pointer>("FileObject"), Ok(Pointer::new(0xbbbb_0000)));
    assert_eq!(view.try_parse::<u32>("IoSize"), Ok(512));
    assert_eq!(view.try_parse::<u32>("IoFlags"), Ok(0x60900));
}

#[test]
fn truncated_payload_keeps_leading_fields() {
    init_logger();

    let schema = read_write_schema();
    let payload = read_write_payload(AddressSize::Bits32);
    let truncated = &payload[..19];

    let envelope = RawEventEnvelope::new(read_write_identity(), AddressSize::Bits32, truncated);
    let view = TypedEventView::try_new(&envelope, &schema).unwrap();

    match view.try_parse::<u32>("IoFlags") {
        Err(DecodeError::TruncatedBuffer {
            field,
            requested,
            offset,
            length,
            available,
        }) => {
            // IoSize is the field that overruns the payload, on the way to IoFlags
            assert_eq!(field, "IoSize");
            assert_eq!(requested, "IoFlags");
            assert_eq!((offset, length, available), (16, 4, 19));
        }
        other => panic!("unexpected result {:?}", other),
    }

    // Fields that fit are still readable, before and after the failure
    assert_eq!(view.try_parse::<u64>("Offset"), Ok(0x1000));
    assert_eq!(view.try_parse::<Pointer>("IrpPtr"), Ok(Pointer::new(0xaaaa_0000)));
    assert_eq!(view.try_parse::<Pointer>("FileObject"), Ok(Pointer::new(0xbbbb_0000)));
    assert!(matches!(
        view.try_parse::<u32>("IoSize"),
        Err(DecodeError::TruncatedBuffer { .. })
    ));
}

#[test]
fn one_byte_short_is_truncation() {
    let schema = read_write_schema();
    for address_size in [AddressSize::Bits32, AddressSize::Bits64].iter().copied() {
        let payload = read_write_payload(address_size);
        let short = &payload[..payload.len() - 1];
        let envelope = RawEventEnvelope::new(read_write_identity(), address_size, short);
        let view = TypedEventView::try_new(&envelope, &schema).unwrap();

        match view.try_parse::<u32>("IoFlags") {
            Err(DecodeError::TruncatedBuffer {
                field,
                requested,
                offset,
                length,
                available,
            }) => {
                assert_eq!(field, "IoFlags");
                assert_eq!(requested, "IoFlags");
                assert_eq!(offset + length, payload.len());
                assert_eq!(available, payload.len() - 1);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}

#[test]
fn pointer_width_shifts_later_fields() {
    let schema = read_write_schema();

    let narrow = read_write_payload(AddressSize::Bits32);
    let narrow = RawEventEnvelope::new(read_write_identity(), AddressSize::Bits32, &narrow);
    let narrow = TypedEventView::try_new(&narrow, &schema).unwrap();

    let wide = read_write_payload(AddressSize::Bits64);
    let wide = RawEventEnvelope::new(read_write_identity(), AddressSize::Bits64, &wide);
    let wide = TypedEventView::try_new(&wide, &schema).unwrap();

    // Fields before the first pointer do not move
    assert_eq!(narrow.field_range_at(0), wide.field_range_at(0));
    assert_eq!(narrow.field_range_at(1).unwrap().start, wide.field_range_at(1).unwrap().start);

    // The second pointer moves by one pointer, everything after it by two
    assert_eq!(narrow.field_range_at(2).unwrap().start + 4, wide.field_range_at(2).unwrap().start);
    for index in 3..schema.len() {
        let n = narrow.field_range_at(index).unwrap();
        let w = wide.field_range_at(index).unwrap();
        assert_eq!(n.start + 8, w.start);
        assert_eq!(n.len, w.len);
    }

    // ...and decode to the same values
    for (n, w) in narrow.values().zip(wide.values()) {
        assert_eq!(n, w);
    }
}

#[test]
fn pointer_width_sensitivity_on_a_single_pointer() {
    let schema = FieldSchema::builder(SchemaKey::new(DISK_IO_GUID, 0, 3))
        .field(FieldSpec::fixed("DiskNumber", 4))
        .field(FieldSpec::pointer("Irp"))
        .field(FieldSpec::fixed("ByteCount", 4))
        .field(FieldSpec::fixed("Flags", 2))
        .build()
        .unwrap();
    let identity = EventIdentity::new(DISK_IO_GUID, 0, 3);

    let ranges = |address_size: AddressSize| -> Vec<FieldRange> {
        let payload = PayloadBuilder::new(address_size)
            .u32(1)
            .pointer(0xffff_fa80_0000_0000)
            .u32(4096)
            .u16(3)
            .build();
        let envelope = RawEventEnvelope::new(identity, address_size, &payload);
        let view = TypedEventView::try_new(&envelope, &schema).unwrap();
        (0..schema.len()).map(|i| view.field_range_at(i).unwrap()).collect()
    };

    let narrow = ranges(AddressSize::Bits32);
    let wide = ranges(AddressSize::Bits64);
    assert_eq!(narrow[0], wide[0]);
    assert_eq!(narrow[1].start, wide[1].start);
    assert_eq!(narrow[1].len + 4, wide[1].len);
    assert_eq!(narrow[2].start + 4, wide[2].start);
    assert_eq!(narrow[3].start + 4, wide[3].start);
}

#[test]
fn pointers_are_zero_extended() {
    let schema = FieldSchema::builder(SchemaKey::new(FILE_IO_GUID, 0, 2))
        .field(FieldSpec::pointer("FileObject"))
        .build()
        .unwrap();
    let payload = PayloadBuilder::new(AddressSize::Bits32).pointer(0xffff_fffe).build();
    let envelope = RawEventEnvelope::new(
        EventIdentity::new(FILE_IO_GUID, 0, 2),
        AddressSize::Bits32,
        &payload,
    );
    let view = TypedEventView::try_new(&envelope, &schema).unwrap();

    assert_eq!(view.try_parse::<u64>("FileObject"), Ok(0xffff_fffe));
    assert_eq!(view.unsigned("FileObject"), Ok(0xffff_fffe));
    assert_eq!(view.value("FileObject"), Ok(FieldValue::Pointer(Pointer::new(0xffff_fffe))));
}

#[test]
fn string_followed_by_an_integer() {
    let text = "\\Device\\HarddiskVolume3\\Windows\\notepad.exe";
    let schema = FieldSchema::builder(SchemaKey::new(FILE_IO_GUID, 0, 2).with_opcode(64))
        .field(FieldSpec::pointer("IrpPtr"))
        .field(FieldSpec::utf16_string("OpenPath"))
        .field(FieldSpec::fixed("Status", 4))
        .build()
        .unwrap();
    let payload = PayloadBuilder::new(AddressSize::Bits64)
        .pointer(0x1122334455667788)
        .string(text)
        .u32(0xc000_0022)
        .build();
    let envelope = RawEventEnvelope::new(
        EventIdentity::new(FILE_IO_GUID, 0, 2).with_opcode(64),
        AddressSize::Bits64,
        &payload,
    );
    let view = TypedEventView::try_new(&envelope, &schema).unwrap();

    let code_units = text.encode_utf16().count();
    let path = view.field_range("OpenPath").unwrap();
    assert_eq!(path.len, 2 * (code_units + 1));
    assert_eq!(view.field_range("Status").unwrap().start, path.start + 2 * (code_units + 1));
    assert_eq!(view.try_parse::<String>("OpenPath"), Ok(text.to_string()));
    assert_eq!(view.try_parse::<u32>("Status"), Ok(0xc000_0022));
}

#[test]
fn non_ascii_strings() {
    let text = "C:\\Users\\Jörg\\日本語 🦀.txt";
    let schema = FieldSchema::builder(SchemaKey::new(FILE_IO_GUID, 0, 2))
        .field(FieldSpec::utf16_string("Path"))
        .field(FieldSpec::fixed("Tail", 1))
        .build()
        .unwrap();
    let payload = PayloadBuilder::new(AddressSize::Bits64).string(text).u8(7).build();
    let envelope = RawEventEnvelope::new(
        EventIdentity::new(FILE_IO_GUID, 0, 2),
        AddressSize::Bits64,
        &payload,
    );
    let view = TypedEventView::try_new(&envelope, &schema).unwrap();

    assert_eq!(view.try_parse::<String>("Path"), Ok(text.to_string()));
    assert_eq!(view.try_parse::<u8>("Tail"), Ok(7));
}

#[test]
fn access_order_does_not_matter() {
    let schema = FieldSchema::builder(SchemaKey::new(FILE_IO_GUID, 0, 3))
        .field(FieldSpec::pointer("IrpPtr"))
        .field(FieldSpec::utf16_string("First"))
        .field(FieldSpec::fixed("Middle", 2))
        .field(FieldSpec::utf16_string("Second"))
        .field(FieldSpec::utf16_string("Empty"))
        .field(FieldSpec::fixed("Last", 8))
        .field(FieldSpec::trailing_blob("Extra"))
        .build()
        .unwrap();
    let payload = PayloadBuilder::new(AddressSize::Bits32)
        .pointer(0xdead_beef)
        .string("first")
        .u16(0xabcd)
        .string("second string")
        .string("")
        .u64(u64::MAX)
        .bytes(&[1, 2, 3])
        .build();
    let envelope = RawEventEnvelope::new(
        EventIdentity::new(FILE_IO_GUID, 0, 3),
        AddressSize::Bits32,
        &payload,
    );

    let forward = TypedEventView::try_new(&envelope, &schema).unwrap();
    let forward: Vec<_> = (0..schema.len()).map(|i| forward.value_at(i)).collect();

    let backward = TypedEventView::try_new(&envelope, &schema).unwrap();
    let mut reversed: Vec<_> = (0..schema.len()).rev().map(|i| backward.value_at(i)).collect();
    reversed.reverse();

    assert_eq!(forward, reversed);
    assert_eq!(forward[4], Ok(FieldValue::String(String::new())));
    assert_eq!(forward[6], Ok(FieldValue::Binary(&[1, 2, 3])));

    // Reading again hits the cache and gives the same results
    let again: Vec<_> = (0..schema.len()).map(|i| backward.value_at(i)).collect();
    assert_eq!(forward, again);
}

#[test]
fn missing_terminator() {
    let schema = FieldSchema::builder(SchemaKey::new(FILE_IO_GUID, 0, 2))
        .field(FieldSpec::fixed("Status", 4))
        .field(FieldSpec::utf16_string("Path"))
        .build()
        .unwrap();
    let payload = PayloadBuilder::new(AddressSize::Bits64)
        .u32(0)
        .bytes(&[b'a', 0, b'b', 0, b'c'])
        .build();
    let envelope = RawEventEnvelope::new(
        EventIdentity::new(FILE_IO_GUID, 0, 2),
        AddressSize::Bits64,
        &payload,
    );
    let view = TypedEventView::try_new(&envelope, &schema).unwrap();

    match view.try_parse::<String>("Path") {
        Err(DecodeError::TruncatedBuffer { field, offset, .. }) => {
            assert_eq!(field, "Path");
            assert_eq!(offset, 4);
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(view.try_parse::<u32>("Status"), Ok(0));
}

#[test]
fn odd_widths_are_laid_out_but_not_read_as_integers() {
    let schema = FieldSchema::builder(SchemaKey::new(FILE_IO_GUID, 0, 2))
        .field(FieldSpec::fixed("Packed", 3))
        .field(FieldSpec::fixed("After", 2))
        .build()
        .unwrap();
    let payload = [1, 2, 3, 0x34, 0x12];
    let envelope = RawEventEnvelope::new(
        EventIdentity::new(FILE_IO_GUID, 0, 2),
        AddressSize::Bits64,
        &payload,
    );
    let view = TypedEventView::try_new(&envelope, &schema).unwrap();

    assert_eq!(
        view.unsigned("Packed"),
        Err(DecodeError::UnsupportedFieldWidth {
            field: "Packed".to_string(),
            width: 3
        })
    );
    assert_eq!(view.raw("Packed"), Ok(&[1u8, 2, 3][..]));
    assert_eq!(view.try_parse::<u16>("After"), Ok(0x1234));
}

#[test]
fn views_on_several_threads() {
    let schema = Arc::new(read_write_schema());
    let payload: Arc<[u8]> = read_write_payload(AddressSize::Bits64).into();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let schema = Arc::clone(&schema);
            let payload = Arc::clone(&payload);
            std::thread::spawn(move || {
                let envelope = RawEventEnvelope::new(
                    read_write_identity(),
                    AddressSize::Bits64,
                    &payload,
                );
                let view = TypedEventView::try_new(&envelope, &schema).unwrap();
                // Each thread walks the payload in its own order
                let mut indices: Vec<usize> = (0..schema.len()).collect();
                indices.rotate_left(i % schema.len());
                let mut values: Vec<_> = indices
                    .iter()
                    .map(|&i| (i, view.value_at(i).unwrap()))
                    .collect();
                values.sort_by_key(|(i, _)| *i);
                values.into_iter().map(|(_, v)| format!("{:?}", v)).collect::<Vec<_>>()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for result in &results[1..] {
        assert_eq!(result, &results[0]);
    }
    assert_eq!(results[0][3], "Unsigned(512)");
}

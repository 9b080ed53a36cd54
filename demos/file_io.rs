use ferrisetw_decoder::envelope::{AddressSize, EventIdentity, RawEventEnvelope};
use ferrisetw_decoder::providers::kernel_guids::FILE_IO_GUID;
use ferrisetw_decoder::schema::{FieldSchema, FieldSpec, SchemaKey};
use ferrisetw_decoder::schema_locator::{resolve_schema, SchemaRegistry};
use ferrisetw_decoder::traits::EncodeUtf16;
use ferrisetw_decoder::view::{FieldValue, TypedEventView};

const CREATE: u8 = 64;
const READ: u8 = 67;

fn catalog() -> Vec<FieldSchema> {
    let create = FieldSchema::builder(SchemaKey::new(FILE_IO_GUID, 0, 2).with_opcode(CREATE))
        .named("FileIo/Create")
        .field(FieldSpec::pointer("IrpPtr"))
        .field(FieldSpec::pointer("TTID"))
        .field(FieldSpec::pointer("FileObject"))
        .field(FieldSpec::fixed("CreateOptions", 4))
        .field(FieldSpec::fixed("FileAttributes", 4))
        .field(FieldSpec::fixed("ShareAccess", 4))
        .field(FieldSpec::utf16_string("OpenPath"))
        .build();

    let read = FieldSchema::builder(SchemaKey::new(FILE_IO_GUID, 0, 2).with_opcode(READ))
        .named("FileIo/Read")
        .field(FieldSpec::fixed("Offset", 8))
        .field(FieldSpec::pointer("IrpPtr"))
        .field(FieldSpec::pointer("FileObject"))
        .field(FieldSpec::fixed("IoSize", 4))
        .field(FieldSpec::fixed("IoFlags", 4))
        .build();

    vec![create.unwrap(), read.unwrap()]
}

/// What a consumer callback would do with every event it receives
fn process_event(envelope: &RawEventEnvelope) {
    let schema = match resolve_schema(envelope.identity()) {
        Some(schema) => schema,
        None => {
            println!("Unknown event {:?}", envelope.identity());
            return;
        }
    };

    let view = match TypedEventView::try_new(envelope, &schema) {
        Ok(view) => view,
        Err(err) => {
            println!("Error: {}", err);
            return;
        }
    };

    println!("{} (pid {})", schema.name(), envelope.process_id());
    for (name, value) in view.values() {
        match value {
            Ok(FieldValue::Pointer(p)) => println!("  {}: {:#x}", name, p),
            Ok(value) => println!("  {}: {:?}", name, value),
            Err(err) => println!("  {}: <{}>", name, err),
        }
    }
}

fn main() {
    // Optional: displays the (rare) log messages of the decoder
    env_logger::init();

    SchemaRegistry::builder()
        .extend(catalog())
        .build()
        .unwrap()
        .install_global()
        .unwrap();

    // A 32-bit process opening a file
    let mut create = Vec::new();
    for pointer in [0x8a10_2000u32, 0x0000_1a2c, 0x8a33_f0e8].iter() {
        create.extend(&pointer.to_le_bytes());
    }
    create.extend(&0x0100_0060u32.to_le_bytes());
    create.extend(&0x80u32.to_le_bytes());
    create.extend(&0x3u32.to_le_bytes());
    create.extend("\\Device\\HarddiskVolume3\\Users\\Public\\notes.txt".into_utf16_bytes());

    let create = RawEventEnvelope::new(
        EventIdentity::new(FILE_IO_GUID, 0, 2).with_opcode(CREATE),
        AddressSize::Bits32,
        &create,
    )
    .with_process(5260, 7121);
    process_event(&create);

    // A 64-bit process reading it, with a truncated payload
    let mut read = Vec::new();
    read.extend(&0u64.to_le_bytes());
    read.extend(&0xffff_c08e_5a3e_1010u64.to_le_bytes());
    read.extend(&0xffff_c08e_5b21_77a0u64.to_le_bytes());
    read.extend(&4096u32.to_le_bytes()[..2]);

    let read = RawEventEnvelope::new(
        EventIdentity::new(FILE_IO_GUID, 0, 2).with_opcode(READ),
        AddressSize::Bits64,
        &read,
    )
    .with_process(4, 96);
    process_event(&read);

    // An event no schema has been registered for
    let close = RawEventEnvelope::new(
        EventIdentity::new(FILE_IO_GUID, 0, 2).with_opcode(66),
        AddressSize::Bits64,
        &[],
    );
    process_event(&close);
}

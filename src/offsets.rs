//! Field offset computation
//!
//! Fields are laid out back to back, so the offset of a field is the sum of the sizes of every field
//! before it. Some of these sizes depend on the pointer width of the emitter, and some (strings) can only
//! be known by reading the payload. Offsets are therefore computed lazily by walking the payload forward,
//! and every offset found along the way is cached, so that each field is measured at most once.
use std::cell::Cell;

use crate::envelope::AddressSize;
use crate::schema::{FieldKind, FieldSchema, FieldSpec};
use crate::string_scanner::{scan_utf16_length, ScanError};
use crate::view::{DecodeError, DecodeResult};

/// Where a field lives in the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRange {
    pub start: usize,
    pub len: usize,
}

impl FieldRange {
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn as_range(&self) -> std::ops::Range<usize> {
        self.start..self.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Unknown,
    Known(FieldRange),
}

/// Cache of the field ranges we've computed already
///
/// There is one slot per field of the schema. A slot is only ever filled once its predecessor is, so the
/// known slots always form a prefix of the schema.
///
/// A cache belongs to a single decode of a single payload and must not be reused for another one.
#[derive(Debug)]
pub struct OffsetCache {
    slots: Vec<Cell<Slot>>,
    /// How many leading slots are known
    known: Cell<usize>,
}

impl OffsetCache {
    pub fn new(field_count: usize) -> Self {
        OffsetCache {
            slots: (0..field_count).map(|_| Cell::new(Slot::Unknown)).collect(),
            known: Cell::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The range of field `index`, if it has been computed already
    pub fn get(&self, index: usize) -> Option<FieldRange> {
        match self.slots.get(index).map(Cell::get) {
            Some(Slot::Known(range)) => Some(range),
            _ => None,
        }
    }

    /// How many fields have been measured so far
    pub fn known(&self) -> usize {
        self.known.get()
    }

    fn push(&self, range: FieldRange) {
        let index = self.known.get();
        self.slots[index].set(Slot::Known(range));
        self.known.set(index + 1);
    }
}

fn truncated(field: &FieldSpec, offset: usize, length: usize, available: usize) -> DecodeError {
    log::debug!(
        "field {} ({} bytes at offset {}) exceeds the {} bytes of the payload",
        field.name,
        length,
        offset,
        available
    );
    DecodeError::TruncatedBuffer {
        field: field.name.clone(),
        requested: field.name.clone(),
        offset,
        length,
        available,
    }
}

/// Report a truncation found while walking towards `requested`
fn requested_by(err: DecodeError, requested: &FieldSpec) -> DecodeError {
    match err {
        DecodeError::TruncatedBuffer {
            field,
            offset,
            length,
            available,
            ..
        } => DecodeError::TruncatedBuffer {
            field,
            requested: requested.name.clone(),
            offset,
            length,
            available,
        },
        other => other,
    }
}

/// Size of a field that starts at `offset`
fn field_length(
    field: &FieldSpec,
    data: &[u8],
    address_size: AddressSize,
    offset: usize,
) -> DecodeResult<usize> {
    match field.kind {
        FieldKind::Fixed(width) => Ok(width as usize),
        FieldKind::Pointer => Ok(address_size.bytes()),
        FieldKind::Utf16String => scan_utf16_length(data, offset).map_err(|err| match err {
            ScanError::OutOfBounds { start, available } => truncated(field, start, 0, available),
            // The string runs up to the end of the payload, and a terminator is missing
            ScanError::Unterminated { start, available } => {
                truncated(field, start, available - start + 2, available)
            }
        }),
        FieldKind::TrailingBlob => match data.len().checked_sub(offset) {
            Some(l) => Ok(l),
            None => Err(truncated(field, offset, 0, data.len())),
        },
    }
}

/// Range of the field at `field_index` in `data`
///
/// Every field before it that has not been measured yet is measured now, and recorded in `cache`.
/// Calling this function again for the same field (or any field before it) is O(1).
///
/// # Errors
/// [`DecodeError::TruncatedBuffer`] in case `field_index` or any field before it does not fit in `data`.
/// Its `field` is the first field that does not fit, its `requested` is the field at `field_index`.
/// Fields that have been measured successfully before stay readable.
///
/// # Example
/// ```
/// # use ferrisetw_decoder::envelope::AddressSize;
/// # use ferrisetw_decoder::offsets::{offset_of, FieldRange, OffsetCache};
/// # use ferrisetw_decoder::schema::{FieldSchema, FieldSpec, SchemaKey};
/// # use ferrisetw_decoder::Guid;
/// let schema = FieldSchema::builder(SchemaKey::new(Guid::default(), 1, 0))
///     .field(FieldSpec::pointer("Object"))
///     .field(FieldSpec::fixed("Status", 4))
///     .build()
///     .unwrap();
/// let data = [0u8; 12];
/// let cache = OffsetCache::new(schema.len());
///
/// let range = offset_of(&schema, &data, AddressSize::Bits64, 1, &cache).unwrap();
/// assert_eq!(range, FieldRange { start: 8, len: 4 });
/// ```
pub fn offset_of(
    schema: &FieldSchema,
    data: &[u8],
    address_size: AddressSize,
    field_index: usize,
    cache: &OffsetCache,
) -> DecodeResult<FieldRange> {
    if let Some(range) = cache.get(field_index) {
        return Ok(range);
    }

    let fields = schema.fields();
    if field_index >= fields.len() || cache.len() != fields.len() {
        return Err(DecodeError::FieldIndexOutOfRange(field_index));
    }

    let mut next = cache.known();
    let mut offset = match next.checked_sub(1).and_then(|last| cache.get(last)) {
        Some(previous) => previous.end(),
        None => 0,
    };

    let requested = &fields[field_index];
    while next <= field_index {
        let field = &fields[next];
        let length = field_length(field, data, address_size, offset)
            .map_err(|err| requested_by(err, requested))?;

        let fits = offset
            .checked_add(length)
            .map_or(false, |end| end <= data.len());
        if !fits {
            let err = truncated(field, offset, length, data.len());
            return Err(requested_by(err, requested));
        }

        let range = FieldRange {
            start: offset,
            len: length,
        };
        log::trace!("field {} ({}) at {:?}", next, field.name, range);
        cache.push(range);

        offset = range.end();
        next += 1;
    }

    cache
        .get(field_index)
        .ok_or(DecodeError::FieldIndexOutOfRange(field_index))
}

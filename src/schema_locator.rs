//! A way to register and retrieve Schemas
//!
//! The [`SchemaRegistry`] is built once, from a catalog of schemas, before decoding begins. It is read-only
//! afterwards, and can be shared freely between threads. A process-wide instance can be installed with
//! [`SchemaRegistry::install_global`].
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::envelope::{EventIdentity, RawEventEnvelope};
use crate::schema::{FieldSchema, SchemaError, SchemaKey};
use crate::view::{DecodeError, DecodeResult, TypedEventView};

/// Registry module errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A global registry has already been installed
    AlreadyInstalled,
    /// Represents an invalid [`FieldSchema`] in the catalog
    InvalidSchema(SchemaKey, SchemaError),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyInstalled => write!(f, "a global schema registry is already installed"),
            Self::InvalidSchema(key, err) => write!(f, "invalid schema for {}: {}", key, err),
        }
    }
}

impl std::error::Error for RegistryError {}

type RegistryResult<T> = Result<T, RegistryError>;

static GLOBAL_REGISTRY: OnceCell<SchemaRegistry> = OnceCell::new();

/// Represents the catalog of known Schemas
///
/// This is implemented as a [HashMap] where the key is a [`SchemaKey`], i.e. a combination of
/// * the provider GUID
/// * the event Id
/// * the event Version
/// * optionally, the event Opcode
///
/// Lookups are exact: there is no fallback from a missing version to a neighbouring one, since versions
/// of the same event may be laid out in completely different ways.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: HashMap<SchemaKey, Arc<FieldSchema>>,
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("len", &self.schemas.len())
            .finish()
    }
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Retrieve the Schema of an event
    ///
    /// A schema registered with an opcode is preferred over one registered without.
    /// `None` means the event is of an unknown kind. This is not an error: the event can still be
    /// handled as an untyped one.
    ///
    /// # Example
    /// ```
    /// # use ferrisetw_decoder::envelope::EventIdentity;
    /// # use ferrisetw_decoder::schema::{FieldSchema, FieldSpec, SchemaKey};
    /// # use ferrisetw_decoder::schema_locator::SchemaRegistry;
    /// # use ferrisetw_decoder::providers::manifest_guids::KERNEL_PROCESS_GUID;
    /// let registry = SchemaRegistry::builder()
    ///     .add(
    ///         FieldSchema::builder(SchemaKey::new(KERNEL_PROCESS_GUID, 1, 3))
    ///             .field(FieldSpec::fixed("ProcessID", 4))
    ///             .build()
    ///             .unwrap(),
    ///     )
    ///     .build()
    ///     .unwrap();
    ///
    /// assert!(registry.resolve(&EventIdentity::new(KERNEL_PROCESS_GUID, 1, 3)).is_some());
    /// assert!(registry.resolve(&EventIdentity::new(KERNEL_PROCESS_GUID, 1, 2)).is_none());
    /// ```
    pub fn resolve(&self, identity: &EventIdentity) -> Option<Arc<FieldSchema>> {
        let key = SchemaKey::from_identity(identity);
        let found = self
            .schemas
            .get(&key)
            .or_else(|| self.schemas.get(&key.without_opcode()));

        if found.is_none() {
            log::debug!("no schema for {}", key);
        }
        found.map(Arc::clone)
    }

    /// Resolve the schema of `envelope` and view the envelope with it
    ///
    /// The view borrows the schema, so the resolved schema is kept in `schema`, which must outlive the view.
    /// Returns [`DecodeError::UnknownSchema`] in case no schema is registered for this event.
    pub fn build_view<'a>(
        &self,
        envelope: &RawEventEnvelope<'a>,
        schema: &'a mut Option<Arc<FieldSchema>>,
    ) -> DecodeResult<TypedEventView<'a>> {
        let resolved = self.resolve(envelope.identity()).ok_or_else(|| {
            DecodeError::UnknownSchema(SchemaKey::from_identity(envelope.identity()))
        })?;
        let schema: &'a FieldSchema = schema.insert(resolved);
        TypedEventView::try_new(envelope, schema)
    }

    /// Make this registry available process-wide
    ///
    /// This can only be done once. Schemas are supposed to be loaded before any decoding begins.
    pub fn install_global(self) -> RegistryResult<&'static SchemaRegistry> {
        GLOBAL_REGISTRY
            .set(self)
            .map_err(|_| RegistryError::AlreadyInstalled)?;
        GLOBAL_REGISTRY.get().ok_or(RegistryError::AlreadyInstalled)
    }
}

/// The process-wide registry, if one has been installed
pub fn global_registry() -> Option<&'static SchemaRegistry> {
    GLOBAL_REGISTRY.get()
}

/// Resolve the schema of an event from the process-wide registry
///
/// Returns `None` if no global registry has been installed, or if it does not know this event.
pub fn resolve_schema(identity: &EventIdentity) -> Option<Arc<FieldSchema>> {
    global_registry().and_then(|registry| registry.resolve(identity))
}

/// Builds a [`SchemaRegistry`]
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    schemas: Vec<FieldSchema>,
}

impl SchemaRegistryBuilder {
    /// Register a schema
    ///
    /// In case several schemas are registered for the same key, the last one wins.
    pub fn add(mut self, schema: FieldSchema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Register several schemas at once, e.g. a deserialized catalog
    pub fn extend<I: IntoIterator<Item = FieldSchema>>(mut self, schemas: I) -> Self {
        self.schemas.extend(schemas);
        self
    }

    pub fn build(self) -> RegistryResult<SchemaRegistry> {
        let mut schemas = HashMap::with_capacity(self.schemas.len());
        for schema in self.schemas {
            let key = *schema.key();
            schema
                .validate()
                .map_err(|err| RegistryError::InvalidSchema(key, err))?;

            if schemas.insert(key, Arc::new(schema)).is_some() {
                log::warn!("schema for {} registered twice, keeping the last one", key);
            }
        }
        Ok(SchemaRegistry { schemas })
    }
}

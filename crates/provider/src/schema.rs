//! Provider schemas: the declared field set a family of records may use

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::debug;

use crate::error::ProviderError;

static NEXT_PROVIDER_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a declared provider
///
/// Two providers that happen to declare the same field list are still
/// distinct; every schema comparison goes through this id, never through
/// the field list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderId(u64);

/// A provider schema
///
/// Holds the printable name used in diagnostics, the field list (sorted
/// ascending, fixed at creation), and the one-time export flag. Records
/// reference their provider through an `Arc` and consult it for position
/// lookups and identity comparison.
#[derive(Debug)]
pub struct Provider {
    id: ProviderId,
    name: String,
    /// Sorted ascending; position lookups rely on this order
    fields: Vec<String>,
    exported: AtomicBool,
}

impl Provider {
    /// Declare a new provider
    ///
    /// Field names are sorted here, once; the schema never re-sorts.
    /// A field listed twice is a malformed declaration.
    pub fn new(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, ProviderError> {
        let name = name.into();
        let mut fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        fields.sort();

        if let Some(pair) = fields.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ProviderError::DuplicateSchemaField {
                field: pair[0].clone(),
                provider: name,
            });
        }

        Ok(Self {
            id: ProviderId(NEXT_PROVIDER_ID.fetch_add(1, Ordering::Relaxed)),
            name,
            fields,
            exported: AtomicBool::new(false),
        })
    }

    /// Identity of this schema
    pub fn id(&self) -> ProviderId {
        self.id
    }

    /// Printable name, as used in diagnostics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared fields, sorted ascending
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Position of `name` in the field list, or `None` if undeclared
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.fields.binary_search_by(|field| field.as_str().cmp(name)).ok()
    }

    /// Whether the export transition has completed
    pub fn is_exported(&self) -> bool {
        self.exported.load(Ordering::Acquire)
    }

    /// One-time export transition
    ///
    /// Exactly one caller wins, even under concurrent attempts. Calling
    /// this on an already-exported provider is a bug in the embedding and
    /// panics rather than returning an error.
    pub fn mark_exported(&self) {
        let result = self
            .exported
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire);
        if result.is_err() {
            panic!("provider '{}' exported twice", self.name);
        }
        debug!("provider '{}' exported", self.name);
    }
}

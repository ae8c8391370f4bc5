//! # Token → service mapping.
//!
//! [`ServiceCollection`] is a pure registry: it maps a [`ServiceId`] to
//! either a live instance or a deferred [`ServiceDescriptor`]. No
//! resolution logic lives here — missing tokens are reported by the
//! instantiation service, not by the collection.
//!
//! Setting a token that already resolved to an instance replaces the
//! mapping but does not rewire consumers built against the old instance:
//! first resolution wins for any already-constructed graph.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::descriptor::ServiceDescriptor;
use super::instantiation::ServiceObject;
use super::registry::ServiceId;

/// What a token currently maps to.
#[derive(Clone)]
pub enum ServiceEntry {
    /// A live, ready-to-hand-out instance.
    Instance(ServiceObject),
    /// A deferred recipe, realized on first resolution.
    Descriptor(Arc<ServiceDescriptor>),
}

impl fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceEntry::Instance(_) => f.write_str("ServiceEntry::Instance"),
            ServiceEntry::Descriptor(d) => {
                write!(f, "ServiceEntry::Descriptor({})", d.component())
            }
        }
    }
}

/// Mapping from service token to instance or descriptor.
#[derive(Default)]
pub struct ServiceCollection {
    entries: HashMap<ServiceId, ServiceEntry>,
}

impl ServiceCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `id` to a live instance, overwriting any existing entry.
    pub fn set(&mut self, id: ServiceId, instance: ServiceObject) -> Option<ServiceEntry> {
        self.entries.insert(id, ServiceEntry::Instance(instance))
    }

    /// Maps `id` to a deferred descriptor, overwriting any existing entry.
    pub fn set_descriptor(
        &mut self,
        id: ServiceId,
        descriptor: ServiceDescriptor,
    ) -> Option<ServiceEntry> {
        self.entries
            .insert(id, ServiceEntry::Descriptor(Arc::new(descriptor)))
    }

    /// Looks up the entry for `id`.
    pub fn get(&self, id: &ServiceId) -> Option<&ServiceEntry> {
        self.entries.get(id)
    }

    /// True if `id` has an entry (instance or descriptor).
    pub fn contains(&self, id: &ServiceId) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of registered tokens.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

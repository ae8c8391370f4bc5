//! # Service tokens and dependency metadata.
//!
//! Two process-wide, append-only tables live here:
//!
//! - the **token interner**: [`service_id`] maps a name to a [`ServiceId`],
//!   returning the *identical* token (pointer identity, not just value
//!   equality) for repeated calls with the same name;
//! - the **dependency side table**: records which constructor parameter of a
//!   component expects which token, keyed by component identity
//!   ([`TypeId`]). Entries accumulate as components declare dependencies.
//!
//! Both tables are populated during composition, before any resolution
//! call, and are never torn down — they hold only metadata, not resources.
//!
//! The source system captured dependencies through parameter decorators;
//! here each component declares them explicitly from
//! [`Component::wiring`](crate::Component::wiring) using the [`Wiring`]
//! builder, which is recorded into the side table exactly once per
//! component.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::Lazy;

struct TokenInner {
    name: Box<str>,
}

/// Opaque, interned handle identifying an injectable capability.
///
/// Tokens with the same name are the same token: equality and hashing go by
/// allocation identity, and [`service_id`] guarantees one allocation per
/// name.
#[derive(Clone)]
pub struct ServiceId {
    inner: Arc<TokenInner>,
}

impl ServiceId {
    /// The name this token was interned under.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// True if both handles refer to the same interned token.
    pub fn same(&self, other: &ServiceId) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for ServiceId {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ServiceId {}

impl Hash for ServiceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.inner) as usize).hash(state);
    }
}

impl fmt::Debug for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceId({})", self.name())
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static TOKENS: Lazy<Mutex<HashMap<String, ServiceId>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Declares (or retrieves) the token for `name`.
///
/// Idempotent by name: repeated calls return the identical token object.
pub fn service_id(name: &str) -> ServiceId {
    let mut tokens = TOKENS.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(id) = tokens.get(name) {
        return id.clone();
    }
    let id = ServiceId {
        inner: Arc::new(TokenInner { name: name.into() }),
    };
    tokens.insert(name.to_string(), id.clone());
    id
}

/// One `(token, parameter index)` pair recorded for a component.
#[derive(Clone, Debug)]
pub struct DependencyRecord {
    /// Token the component expects injected.
    pub id: ServiceId,
    /// Zero-based constructor parameter index of the injection slot.
    pub index: usize,
}

static DEPENDENCIES: Lazy<Mutex<HashMap<TypeId, Vec<DependencyRecord>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Components whose `wiring()` declaration has already been recorded.
static DECLARED: Lazy<Mutex<HashSet<TypeId>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Appends `(id, index)` to the component's dependency list.
///
/// Accumulates across calls; a component with several injected parameters
/// records one entry per parameter.
pub fn record_dependency(component: TypeId, id: &ServiceId, index: usize) {
    DEPENDENCIES
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(component)
        .or_default()
        .push(DependencyRecord {
            id: id.clone(),
            index,
        });
}

/// Returns the accumulated dependency list for a component, ordered by
/// parameter index. Empty if nothing was recorded.
pub fn dependencies_of(component: TypeId) -> Vec<DependencyRecord> {
    let mut deps = DEPENDENCIES
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&component)
        .cloned()
        .unwrap_or_default();
    deps.sort_by_key(|d| d.index);
    deps
}

/// Dependency declaration built at a component's definition site.
///
/// ```rust
/// use lifewire::{service_id, Wiring};
///
/// let wiring = Wiring::new()
///     .depends_on(&service_id("doc-lifecycle"), 1)
///     .depends_on(&service_id("doc-product"), 2);
/// ```
#[derive(Default)]
pub struct Wiring {
    deps: Vec<(ServiceId, usize)>,
}

impl Wiring {
    /// An empty declaration (no injected parameters).
    pub fn new() -> Self {
        Self { deps: Vec::new() }
    }

    /// Declares that the constructor expects `id` at parameter `index`.
    pub fn depends_on(mut self, id: &ServiceId, index: usize) -> Self {
        self.deps.push((id.clone(), index));
        self
    }

    /// Number of declared injection slots.
    pub fn len(&self) -> usize {
        self.deps.len()
    }

    /// True if nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }
}

/// Records a component's wiring into the side table, once per component.
///
/// Direct [`record_dependency`] calls made by the host are untouched and
/// accumulate alongside.
pub(crate) fn ensure_declared(component: TypeId, wiring: Wiring) {
    {
        let mut declared = DECLARED.lock().unwrap_or_else(PoisonError::into_inner);
        if !declared.insert(component) {
            return;
        }
    }
    for (id, index) in wiring.deps {
        record_dependency(component, &id, index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_interned_by_name() {
        let a = service_id("registry-test-interned");
        let b = service_id("registry-test-interned");
        assert!(a.same(&b));
        assert_eq!(a, b);
        assert_eq!(a.name(), "registry-test-interned");
    }

    #[test]
    fn test_distinct_names_are_distinct_tokens() {
        let a = service_id("registry-test-left");
        let b = service_id("registry-test-right");
        assert!(!a.same(&b));
        assert_ne!(a, b);
    }

    struct FakeComponent;

    #[test]
    fn test_dependencies_accumulate_and_sort_by_index() {
        let component = TypeId::of::<FakeComponent>();
        let late = service_id("registry-test-late");
        let early = service_id("registry-test-early");

        record_dependency(component, &late, 3);
        record_dependency(component, &early, 1);

        let deps = dependencies_of(component);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].index, 1);
        assert!(deps[0].id.same(&early));
        assert_eq!(deps[1].index, 3);
        assert!(deps[1].id.same(&late));
    }

    struct Undeclared;

    #[test]
    fn test_unknown_component_has_no_dependencies() {
        assert!(dependencies_of(TypeId::of::<Undeclared>()).is_empty());
    }

    struct DeclaredOnce;

    #[test]
    fn test_ensure_declared_records_only_once() {
        let component = TypeId::of::<DeclaredOnce>();
        let id = service_id("registry-test-once");

        ensure_declared(component, Wiring::new().depends_on(&id, 0));
        ensure_declared(component, Wiring::new().depends_on(&id, 0));

        assert_eq!(dependencies_of(component).len(), 1);
    }
}

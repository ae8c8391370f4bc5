//! # Deferred service recipes.
//!
//! A [`ServiceDescriptor`] bundles a component constructor with fixed
//! leading arguments so a service can be registered without being built.
//! The instantiation service realizes it on first resolution and memoizes
//! the instance back into the collection — a descriptor is realized at most
//! once.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::error::ResolveError;

use super::instantiation::{Component, CtorArg, InstantiationService, ServiceObject};

type BuildFn =
    Box<dyn Fn(&InstantiationService, Vec<CtorArg>) -> Result<ServiceObject, ResolveError> + Send + Sync>;

/// A not-yet-built service: constructor, fixed static arguments, and the
/// delayed-instantiation flag. Immutable once created.
pub struct ServiceDescriptor {
    component: &'static str,
    delayed: bool,
    /// Consumed by the single realization.
    static_args: Mutex<Vec<CtorArg>>,
    build: BuildFn,
}

impl ServiceDescriptor {
    /// Creates a descriptor for component `C` with the given fixed leading
    /// arguments.
    pub fn new<C: Component>(static_args: Vec<CtorArg>) -> Self {
        Self::with_delayed::<C>(static_args, false)
    }

    /// Like [`ServiceDescriptor::new`], additionally setting the
    /// delayed-instantiation flag.
    ///
    /// The flag is advisory: the source system used it to defer realization
    /// to idle time, while here every descriptor is realized lazily on
    /// first resolution anyway. It is preserved for hosts that schedule
    /// their own warm-up passes.
    pub fn with_delayed<C: Component>(static_args: Vec<CtorArg>, delayed: bool) -> Self {
        Self {
            component: std::any::type_name::<C>(),
            delayed,
            static_args: Mutex::new(static_args),
            build: Box::new(|service, args| {
                service
                    .create_instance::<C>(args)
                    .map(|instance| instance as ServiceObject)
            }),
        }
    }

    /// Type name of the component this descriptor builds (diagnostics).
    pub fn component(&self) -> &'static str {
        self.component
    }

    /// Whether the host may defer realization past startup.
    pub fn supports_delayed_instantiation(&self) -> bool {
        self.delayed
    }

    /// Builds the instance, consuming the stored static arguments.
    ///
    /// Called exactly once per descriptor by the instantiation service's
    /// memoizing resolution path.
    pub(crate) fn realize(
        &self,
        service: &InstantiationService,
    ) -> Result<ServiceObject, ResolveError> {
        let args = std::mem::take(
            &mut *self
                .static_args
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        (self.build)(service, args)
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("component", &self.component)
            .field("delayed", &self.delayed)
            .finish()
    }
}

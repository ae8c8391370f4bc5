//! # The resolver: constructors, argument splicing, and memoized services.
//!
//! [`InstantiationService`] turns a [`Component`] plus a
//! [`ServiceCollection`] into a live instance:
//!
//! ```text
//! create_instance::<C>(leading args)
//!   ├─► ensure C's wiring is recorded (definition-site declaration)
//!   ├─► dependencies_of(C), ascending parameter index
//!   │      └─► get_or_create(token)        (depth-first, memoized)
//!   │             ├─ Instance    → return as-is
//!   │             ├─ Descriptor  → realize via create_instance,
//!   │             │                store instance back (at most once)
//!   │             └─ missing     → ResolveError::MissingService
//!   ├─► splice: injected services land in their declared slots,
//!   │           leading args fill the remaining slots in order
//!   └─► C::assemble(CtorArgs)
//! ```
//!
//! A per-thread "currently resolving" stack turns dependency cycles into
//! [`ResolveError::CyclicDependency`] instead of unbounded recursion.
//! Resolution of one token from two threads at once is serialized: the
//! second resolver blocks until the first has memoized (or failed), so the
//! constructor still runs at most once and a concurrent resolver of a valid
//! token never sees a spurious cycle.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use lifewire::{
//!     service_id, Component, CtorArg, CtorArgs, InstantiationService, ResolveError,
//!     ServiceCollection, Wiring,
//! };
//!
//! struct Greeter {
//!     prefix: String,
//!     product: Arc<String>,
//! }
//!
//! impl Component for Greeter {
//!     fn wiring() -> Wiring {
//!         Wiring::new().depends_on(&service_id("doc-greeter-product"), 1)
//!     }
//!
//!     fn assemble(mut args: CtorArgs) -> Result<Self, ResolveError> {
//!         Ok(Self {
//!             prefix: args.take::<String>(0)?,
//!             product: args.service::<String>(1)?,
//!         })
//!     }
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.set(service_id("doc-greeter-product"), Arc::new("ChatEase".to_string()));
//!
//! let instantiation = InstantiationService::new(services);
//! let greeter = instantiation
//!     .create_instance::<Greeter>(vec![Box::new("hello".to_string()) as CtorArg])
//!     .unwrap();
//! assert_eq!(format!("{} {}", greeter.prefix, greeter.product), "hello ChatEase");
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, ThreadId};

use crate::error::ResolveError;

use super::collection::{ServiceCollection, ServiceEntry};
use super::descriptor::ServiceDescriptor;
use super::registry::{dependencies_of, ensure_declared, ServiceId, Wiring};

/// A live service as stored in the collection: type-erased, shared,
/// thread-safe.
pub type ServiceObject = Arc<dyn Any + Send + Sync>;

/// A type-erased constructor argument.
pub type CtorArg = Box<dyn Any + Send + Sync>;

/// Token under which every instantiation service registers itself.
pub const INSTANTIATION_TOKEN: &str = "instantiation";

/// A constructible component.
///
/// Injection slots are declared once at the definition site via
/// [`Component::wiring`]; [`Component::assemble`] is the constructor and
/// pulls each argument out of its slot by index.
pub trait Component: Any + Send + Sync + Sized {
    /// Declares `(token, parameter index)` pairs for injected parameters.
    ///
    /// Recorded into the process-wide dependency table the first time the
    /// component is constructed. Defaults to no dependencies.
    fn wiring() -> Wiring {
        Wiring::new()
    }

    /// Constructs the component from its fully spliced argument list.
    fn assemble(args: CtorArgs) -> Result<Self, ResolveError>;
}

/// Ordered constructor arguments, one slot per parameter.
///
/// Explicit leading arguments and resolved services are already spliced
/// into their final positions; [`CtorArgs::take`] and [`CtorArgs::service`]
/// consume them by index.
pub struct CtorArgs {
    slots: Vec<Option<CtorArg>>,
}

impl CtorArgs {
    pub(crate) fn new(slots: Vec<Option<CtorArg>>) -> Self {
        Self { slots }
    }

    /// Total number of parameter slots (including consumed ones).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if the constructor takes no parameters.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Consumes the plain value at `index`.
    pub fn take<T: Any>(&mut self, index: usize) -> Result<T, ResolveError> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(ResolveError::BadArgument { index })?;
        let boxed = slot.take().ok_or(ResolveError::BadArgument { index })?;
        match boxed.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(original) => {
                // Put it back so diagnostics after the error still see it.
                *slot = Some(original);
                Err(ResolveError::BadArgument { index })
            }
        }
    }

    /// Consumes the injected service at `index`, downcasting it to `T`.
    pub fn service<T: Any + Send + Sync>(&mut self, index: usize) -> Result<Arc<T>, ResolveError> {
        let object = self.take::<ServiceObject>(index)?;
        object
            .downcast::<T>()
            .map_err(|_| ResolveError::BadArgument { index })
    }
}

/// Resolves component dependencies against a [`ServiceCollection`] and
/// constructs instances.
///
/// The service registers itself in the collection under
/// [`INSTANTIATION_TOKEN`], so components may inject the container itself.
/// What a call to `claim` decided for the calling thread.
enum Claim {
    /// The caller owns the realization and must `release` when done.
    Owned,
    /// Another thread finished realizing meanwhile; re-read the collection.
    Waited,
}

/// Tokens currently being realized, and by whom.
///
/// `owners` maps each in-flight token to the thread realizing it; `stacks`
/// holds every thread's resolution chain, outermost first, for cycle
/// diagnostics. A cycle is only ever a repeat *within one thread's* chain.
struct InFlightState {
    owners: HashMap<ServiceId, ThreadId>,
    stacks: HashMap<ThreadId, Vec<ServiceId>>,
}

pub struct InstantiationService {
    services: Mutex<ServiceCollection>,
    in_flight: Mutex<InFlightState>,
    /// Signalled whenever a realization finishes (success or failure).
    settled: Condvar,
}

impl InstantiationService {
    /// Wraps a composed collection. Registers `self` under
    /// [`INSTANTIATION_TOKEN`].
    pub fn new(services: ServiceCollection) -> Arc<Self> {
        let service = Arc::new(Self {
            services: Mutex::new(services),
            in_flight: Mutex::new(InFlightState {
                owners: HashMap::new(),
                stacks: HashMap::new(),
            }),
            settled: Condvar::new(),
        });
        let self_object: ServiceObject = Arc::clone(&service) as ServiceObject;
        service
            .lock_services()
            .set(super::registry::service_id(INSTANTIATION_TOKEN), self_object);
        service
    }

    /// Constructs an instance of `C`.
    ///
    /// `leading` supplies the explicit (non-injected) arguments in order.
    /// Recorded dependencies are resolved depth-first in ascending
    /// parameter index — a dependency's own dependencies are fully resolved
    /// and memoized before it is handed to `C` — and spliced into their
    /// declared slots; `leading` fills the remaining slots front to back.
    ///
    /// Fails with [`ResolveError::ArityMismatch`] when `leading` does not
    /// exactly fill the free slots, and propagates any resolution failure
    /// without constructing a partial instance.
    pub fn create_instance<C: Component>(&self, leading: Vec<CtorArg>) -> Result<Arc<C>, ResolveError> {
        ensure_declared(TypeId::of::<C>(), C::wiring());
        let deps = dependencies_of(TypeId::of::<C>());

        let highest = deps.iter().map(|d| d.index + 1).max().unwrap_or(0);
        let total = std::cmp::max(leading.len() + deps.len(), highest);
        let mut slots: Vec<Option<CtorArg>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);

        for dep in &deps {
            if slots[dep.index].is_some() {
                // Two declarations for one slot.
                return Err(ResolveError::BadArgument { index: dep.index });
            }
            let resolved = self.get_or_create(&dep.id)?;
            slots[dep.index] = Some(Box::new(resolved));
        }

        let free: Vec<usize> = (0..total).filter(|i| slots[*i].is_none()).collect();
        if free.len() != leading.len() {
            return Err(ResolveError::ArityMismatch {
                expected: free.len(),
                got: leading.len(),
            });
        }
        for (index, arg) in free.into_iter().zip(leading) {
            slots[index] = Some(arg);
        }

        C::assemble(CtorArgs::new(slots)).map(Arc::new)
    }

    /// Resolves a token to a live service.
    ///
    /// An instance is returned unchanged. A descriptor is realized through
    /// [`InstantiationService::create_instance`] with its static arguments,
    /// and the result is stored back into the collection under the same
    /// token — the constructor runs exactly once, and every later
    /// resolution observes the same instance. A concurrent resolver of the
    /// same token from another thread blocks until that happens and then
    /// reads the memoized instance.
    pub fn get_or_create(&self, id: &ServiceId) -> Result<ServiceObject, ResolveError> {
        loop {
            let descriptor: Arc<ServiceDescriptor> = {
                let services = self.lock_services();
                match services.get(id) {
                    Some(ServiceEntry::Instance(object)) => return Ok(Arc::clone(object)),
                    Some(ServiceEntry::Descriptor(descriptor)) => Arc::clone(descriptor),
                    None => {
                        return Err(ResolveError::MissingService {
                            token: id.name().into(),
                        })
                    }
                }
            };

            match self.claim(id)? {
                Claim::Waited => continue,
                Claim::Owned => {}
            }
            // Memoize before releasing the claim, so a woken waiter always
            // finds the instance instead of the spent descriptor.
            let result = descriptor.realize(self).map(|instance| {
                let mut services = self.lock_services();
                if let Some(ServiceEntry::Instance(existing)) = services.get(id) {
                    // A re-entrant resolution beat us to it; first wins.
                    return Arc::clone(existing);
                }
                services.set(id.clone(), Arc::clone(&instance));
                instance
            });
            self.release(id);
            return result;
        }
    }

    /// Resolves a token and downcasts it to `T`.
    pub fn get<T: Any + Send + Sync>(&self, id: &ServiceId) -> Result<Arc<T>, ResolveError> {
        self.get_or_create(id)?
            .downcast::<T>()
            .map_err(|_| ResolveError::WrongType {
                token: id.name().into(),
            })
    }

    /// Calls `f` with a scoped accessor to the collection.
    ///
    /// The accessor performs no caching beyond the collection's own
    /// memoization; whatever `f` returns — or panics with — propagates to
    /// the caller unchanged.
    pub fn invoke<R>(&self, f: impl FnOnce(&ServicesAccessor<'_>) -> R) -> R {
        let accessor = ServicesAccessor { service: self };
        f(&accessor)
    }

    /// Takes ownership of realizing `id`, or blocks while another thread
    /// holds it. A repeat of `id` on the *calling thread's* own chain is a
    /// genuine cycle and fails fast.
    fn claim(&self, id: &ServiceId) -> Result<Claim, ResolveError> {
        let me = thread::current().id();
        let mut state = self.lock_in_flight();
        loop {
            match state.owners.get(id).copied() {
                None => {
                    state.owners.insert(id.clone(), me);
                    state.stacks.entry(me).or_default().push(id.clone());
                    return Ok(Claim::Owned);
                }
                Some(owner) if owner == me => {
                    let chain = state
                        .stacks
                        .get(&me)
                        .map(|stack| {
                            stack
                                .iter()
                                .map(ServiceId::name)
                                .chain(std::iter::once(id.name()))
                                .collect::<Vec<_>>()
                                .join(" -> ")
                        })
                        .unwrap_or_else(|| id.name().to_string());
                    return Err(ResolveError::CyclicDependency {
                        token: id.name().into(),
                        chain,
                    });
                }
                Some(_) => {
                    state = self
                        .settled
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                    if !state.owners.contains_key(id) {
                        return Ok(Claim::Waited);
                    }
                }
            }
        }
    }

    /// Drops ownership of `id` and wakes blocked resolvers. Removes exactly
    /// this token from the calling thread's chain, innermost occurrence
    /// first.
    fn release(&self, id: &ServiceId) {
        let me = thread::current().id();
        let mut state = self.lock_in_flight();
        state.owners.remove(id);
        if let Some(stack) = state.stacks.get_mut(&me) {
            if let Some(position) = stack.iter().rposition(|entry| entry.same(id)) {
                stack.remove(position);
            }
            if stack.is_empty() {
                state.stacks.remove(&me);
            }
        }
        self.settled.notify_all();
    }

    fn lock_services(&self) -> std::sync::MutexGuard<'_, ServiceCollection> {
        self.services.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, InFlightState> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scoped view handed to [`InstantiationService::invoke`] callbacks.
pub struct ServicesAccessor<'a> {
    service: &'a InstantiationService,
}

impl ServicesAccessor<'_> {
    /// Resolves a token and downcasts it to `T`. Delegates to the
    /// container's memoizing resolution.
    pub fn get<T: Any + Send + Sync>(&self, id: &ServiceId) -> Result<Arc<T>, ResolveError> {
        self.service.get::<T>(id)
    }

    /// Resolves a token without downcasting.
    pub fn get_object(&self, id: &ServiceId) -> Result<ServiceObject, ResolveError> {
        self.service.get_or_create(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::registry::service_id;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static WIDGET_CTOR_RUNS: AtomicUsize = AtomicUsize::new(0);

    struct Widget {
        label: Arc<str>,
    }

    impl Component for Widget {
        fn assemble(mut args: CtorArgs) -> Result<Self, ResolveError> {
            WIDGET_CTOR_RUNS.fetch_add(1, Ordering::SeqCst);
            Ok(Self {
                label: args.take::<Arc<str>>(0)?,
            })
        }
    }

    #[test]
    fn test_descriptor_is_realized_once_and_memoized() {
        let widget_id = service_id("inst-test-widget");
        let mut services = ServiceCollection::new();
        services.set_descriptor(
            widget_id.clone(),
            ServiceDescriptor::new::<Widget>(vec![Box::new(Arc::<str>::from("w")) as CtorArg]),
        );

        let instantiation = InstantiationService::new(services);
        let first = instantiation
            .get::<Widget>(&widget_id)
            .expect("first resolution");
        let second = instantiation
            .get::<Widget>(&widget_id)
            .expect("second resolution");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.label.as_ref(), "w");
        assert_eq!(WIDGET_CTOR_RUNS.load(Ordering::SeqCst), 1);
    }

    #[derive(Debug)]
    struct Spliced {
        leading: u32,
        first_service: Arc<u32>,
        middle: u32,
        second_service: Arc<String>,
    }

    impl Component for Spliced {
        fn wiring() -> Wiring {
            Wiring::new()
                .depends_on(&service_id("inst-test-splice-a"), 1)
                .depends_on(&service_id("inst-test-splice-b"), 3)
        }

        fn assemble(mut args: CtorArgs) -> Result<Self, ResolveError> {
            Ok(Self {
                leading: args.take::<u32>(0)?,
                first_service: args.service::<u32>(1)?,
                middle: args.take::<u32>(2)?,
                second_service: args.service::<String>(3)?,
            })
        }
    }

    #[test]
    fn test_leading_args_splice_around_injected_slots() {
        let mut services = ServiceCollection::new();
        services.set(service_id("inst-test-splice-a"), Arc::new(11_u32));
        services.set(
            service_id("inst-test-splice-b"),
            Arc::new("b".to_string()),
        );

        let instantiation = InstantiationService::new(services);
        let spliced = instantiation
            .create_instance::<Spliced>(vec![
                Box::new(1_u32) as CtorArg,
                Box::new(2_u32) as CtorArg,
            ])
            .expect("construction succeeds");

        assert_eq!(spliced.leading, 1);
        assert_eq!(*spliced.first_service, 11);
        assert_eq!(spliced.middle, 2);
        assert_eq!(spliced.second_service.as_str(), "b");
    }

    #[test]
    fn test_arity_mismatch_is_rejected() {
        let mut services = ServiceCollection::new();
        services.set(service_id("inst-test-splice-a"), Arc::new(11_u32));
        services.set(
            service_id("inst-test-splice-b"),
            Arc::new("b".to_string()),
        );

        let instantiation = InstantiationService::new(services);
        let err = instantiation
            .create_instance::<Spliced>(vec![Box::new(1_u32) as CtorArg])
            .expect_err("one leading argument is too few");

        assert!(matches!(
            err,
            ResolveError::ArityMismatch {
                expected: 2,
                got: 1
            }
        ));
    }

    #[derive(Debug)]
    struct NeedsMissing {
        _dep: Arc<u32>,
    }

    impl Component for NeedsMissing {
        fn wiring() -> Wiring {
            Wiring::new().depends_on(&service_id("inst-test-never-registered"), 0)
        }

        fn assemble(mut args: CtorArgs) -> Result<Self, ResolveError> {
            Ok(Self {
                _dep: args.service::<u32>(0)?,
            })
        }
    }

    #[test]
    fn test_missing_service_fails_without_partial_construction() {
        let instantiation = InstantiationService::new(ServiceCollection::new());
        let err = instantiation
            .create_instance::<NeedsMissing>(Vec::new())
            .expect_err("token is unregistered");
        match err {
            ResolveError::MissingService { token } => {
                assert_eq!(token.as_ref(), "inst-test-never-registered");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    struct CycleA {
        _b: ServiceObject,
    }

    impl Component for CycleA {
        fn wiring() -> Wiring {
            Wiring::new().depends_on(&service_id("inst-test-cycle-b"), 0)
        }

        fn assemble(mut args: CtorArgs) -> Result<Self, ResolveError> {
            Ok(Self {
                _b: args.take::<ServiceObject>(0)?,
            })
        }
    }

    struct CycleB {
        _a: ServiceObject,
    }

    impl Component for CycleB {
        fn wiring() -> Wiring {
            Wiring::new().depends_on(&service_id("inst-test-cycle-a"), 0)
        }

        fn assemble(mut args: CtorArgs) -> Result<Self, ResolveError> {
            Ok(Self {
                _a: args.take::<ServiceObject>(0)?,
            })
        }
    }

    #[test]
    fn test_cycle_fails_fast_with_chain() {
        let mut services = ServiceCollection::new();
        services.set_descriptor(
            service_id("inst-test-cycle-a"),
            ServiceDescriptor::new::<CycleA>(Vec::new()),
        );
        services.set_descriptor(
            service_id("inst-test-cycle-b"),
            ServiceDescriptor::new::<CycleB>(Vec::new()),
        );

        let instantiation = InstantiationService::new(services);
        let err = match instantiation.get_or_create(&service_id("inst-test-cycle-a")) {
            Err(err) => err,
            Ok(_) => panic!("cycle must fail fast"),
        };

        match err {
            ResolveError::CyclicDependency { token, chain } => {
                assert_eq!(token.as_ref(), "inst-test-cycle-a");
                assert_eq!(
                    chain,
                    "inst-test-cycle-a -> inst-test-cycle-b -> inst-test-cycle-a"
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    static SLOW_CTOR_RUNS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug)]
    struct SlowWidget;

    impl Component for SlowWidget {
        fn assemble(_args: CtorArgs) -> Result<Self, ResolveError> {
            SLOW_CTOR_RUNS.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(200));
            Ok(Self)
        }
    }

    #[test]
    fn test_concurrent_resolution_of_one_token_shares_the_instance() {
        let widget_id = service_id("inst-test-slow-widget");
        let mut services = ServiceCollection::new();
        services.set_descriptor(
            widget_id.clone(),
            ServiceDescriptor::new::<SlowWidget>(Vec::new()),
        );

        let instantiation = InstantiationService::new(services);

        let racing = {
            let instantiation = Arc::clone(&instantiation);
            let widget_id = widget_id.clone();
            std::thread::spawn(move || instantiation.get::<SlowWidget>(&widget_id))
        };
        // Land mid-construction: the first resolver sleeps 200ms inside the
        // constructor.
        std::thread::sleep(std::time::Duration::from_millis(50));

        let second = instantiation
            .get::<SlowWidget>(&widget_id)
            .expect("a concurrent resolver of a valid token must not see a cycle");
        let first = racing
            .join()
            .expect("resolver thread completed")
            .expect("first resolution");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(SLOW_CTOR_RUNS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invoke_gives_scoped_access_and_propagates_result() {
        let mut services = ServiceCollection::new();
        services.set(service_id("inst-test-invoke"), Arc::new(5_u32));

        let instantiation = InstantiationService::new(services);
        let doubled = instantiation.invoke(|accessor| {
            let value = accessor
                .get::<u32>(&service_id("inst-test-invoke"))
                .expect("registered");
            *value * 2
        });
        assert_eq!(doubled, 10);
    }

    #[test]
    fn test_wrong_type_downcast_is_reported() {
        let mut services = ServiceCollection::new();
        services.set(service_id("inst-test-wrong-type"), Arc::new(5_u32));

        let instantiation = InstantiationService::new(services);
        let err = instantiation
            .get::<String>(&service_id("inst-test-wrong-type"))
            .expect_err("stored value is a u32");
        assert!(matches!(err, ResolveError::WrongType { .. }));
    }

    #[test]
    fn test_container_registers_itself() {
        let instantiation = InstantiationService::new(ServiceCollection::new());
        let this = instantiation
            .get::<InstantiationService>(&service_id(INSTANTIATION_TOKEN))
            .expect("self-registered");
        assert!(Arc::ptr_eq(&this, &instantiation));
    }
}

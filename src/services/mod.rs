//! Service wiring: tokens, registration, and memoized resolution.

mod collection;
mod descriptor;
mod instantiation;
mod registry;

pub use collection::{ServiceCollection, ServiceEntry};
pub use descriptor::ServiceDescriptor;
pub use instantiation::{
    Component, CtorArg, CtorArgs, InstantiationService, ServiceObject, ServicesAccessor,
    INSTANTIATION_TOKEN,
};
pub use registry::{
    dependencies_of, record_dependency, service_id, DependencyRecord, ServiceId, Wiring,
};

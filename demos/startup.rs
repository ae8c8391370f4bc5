//! # Example: startup
//!
//! Minimal example of wiring services and driving the startup phases.
//!
//! Demonstrates how to:
//! - Register a service descriptor under an interned token.
//! - Declare injection slots with [`Wiring`] and build through
//!   [`InstantiationService`].
//! - Park background work on a phase with `when()` and release it with
//!   `set_phase()`.
//!
//! ## Flow
//! ```text
//! ServiceCollection ──► InstantiationService::new()
//!     ├─► create_instance::<CacheWarmer>()
//!     │     ├─► resolve "lifecycle" (descriptor ─► LifecycleService)
//!     │     └─► CacheWarmer::assemble()
//!     ├─► spawn: when(Eventually) ─► warm caches
//!     ├─► set_phase(Ready)
//!     └─► set_phase(Eventually) ─► warmer released
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example startup
//! ```

use std::sync::Arc;
use std::time::Duration;

use lifewire::{
    service_id, Component, Config, CtorArg, CtorArgs, InstantiationService, LifecyclePhase,
    LifecycleService, ResolveError, ServiceCollection, ServiceDescriptor, Wiring, LIFECYCLE_TOKEN,
};

struct CacheWarmer {
    lifecycle: Arc<LifecycleService>,
}

impl Component for CacheWarmer {
    fn wiring() -> Wiring {
        Wiring::new().depends_on(&service_id(LIFECYCLE_TOKEN), 0)
    }

    fn assemble(mut args: CtorArgs) -> Result<Self, ResolveError> {
        Ok(Self {
            lifecycle: args.service::<LifecycleService>(0)?,
        })
    }
}

impl CacheWarmer {
    async fn run(&self) {
        println!("[warmer] waiting for the eventually phase");
        self.lifecycle.when(LifecyclePhase::Eventually).await;
        println!("[warmer] warming caches");
        tokio::time::sleep(Duration::from_millis(100)).await;
        println!("[warmer] done");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Compose the collection: the lifecycle service stays a descriptor
    //    until someone actually needs it.
    let mut services = ServiceCollection::new();
    services.set_descriptor(
        service_id(LIFECYCLE_TOKEN),
        ServiceDescriptor::new::<LifecycleService>(vec![Box::new(Config::default()) as CtorArg]),
    );

    // 2. Build the consumer; the lifecycle service is realized on the way.
    let instantiation = InstantiationService::new(services);
    let warmer = instantiation.create_instance::<CacheWarmer>(Vec::new())?;
    let lifecycle = instantiation.get::<LifecycleService>(&service_id(LIFECYCLE_TOKEN))?;

    // 3. Park the warmer on a phase it has not reached yet.
    let background = tokio::spawn(async move { warmer.run().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // 4. Drive the phases forward; skipping AfterWindowOpen is legal.
    println!("[host] phase -> ready");
    lifecycle.set_phase(LifecyclePhase::Ready);
    println!("[host] phase -> eventually");
    lifecycle.set_phase(LifecyclePhase::Eventually);

    background.await?;
    Ok(())
}

//! Foundation primitives: disposal trees, one-shot barriers, and
//! synchronous event emitters.

mod barrier;
mod disposal;
mod emitter;

pub use barrier::Barrier;
pub use disposal::{to_disposable, Disposable, DisposableStore};
pub use emitter::Emitter;

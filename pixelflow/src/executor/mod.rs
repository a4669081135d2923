//! Stage execution.
//!
//! [`StageExecutor`] is the entry point the external graph engine calls once
//! per stage invocation. It ties the resolver, readiness waiter, write lock
//! registry, atomic writer, image engine and progress tracker together.

mod stage;

pub use stage::StageExecutor;

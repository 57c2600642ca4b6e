//! Self-resuming sweep over the repository list

pub mod continuation;
pub mod job;
pub mod scheduler;

pub use continuation::{Continuation, LambdaContinuation, LocalRelay};
pub use job::JobDescriptor;
pub use scheduler::{ChainScheduler, InvocationOutcome};

//! chain-mirror library
//!
//! Incremental container image mirroring from a source registry into Amazon
//! ECR. One repository is mirrored per invocation; the sweep over all
//! repositories continues through chained asynchronous self-invocations.

pub mod chain;
pub mod cli;
pub mod config;
pub mod error;
pub mod image;
pub mod logging;
pub mod mirror;
pub mod registry;
pub mod repolist;

pub use config::MirrorConfig;
pub use error::{MirrorError, Result};
pub use logging::Logger;

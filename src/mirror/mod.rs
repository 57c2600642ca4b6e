//! Mirroring engine
//!
//! Everything needed to bring one source repository up to date at the
//! destination: credentials, tag selection, digest skip decisions and the
//! transfer itself, composed by [`MirrorOrchestrator`].

pub mod credentials;
pub mod decision;
pub mod orchestrator;
pub mod tags;
pub mod transfer;

pub use credentials::{CredentialResolver, ResolvedRegistry};
pub use decision::{DigestSkipEngine, MirrorDecision, TransferReason};
pub use orchestrator::{
    HttpConnector, MirrorOrchestrator, RegistryConnector, RepositoryMirror, RepositoryReport,
    TagAction, TagReport,
};
pub use tags::TagSelector;
pub use transfer::{TransferExecutor, TransferSummary};

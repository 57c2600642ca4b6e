//! Registry operations, one module per API area
//!
//! `RegistryClient` composes these and exposes them through
//! [`RegistryTransport`](crate::registry::transport::RegistryTransport).

pub mod blob_operations;
pub mod manifest_operations;
pub mod repository_operations;

pub use blob_operations::BlobOperations;
pub use manifest_operations::ManifestOperations;
pub use repository_operations::RepositoryOperations;

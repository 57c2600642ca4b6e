//! Registry module for OCI / Docker Registry v2 interactions
//!
//! This module provides the HTTP registry client used on both sides of a
//! mirror (source reads, destination writes), its authentication flow, and
//! the ECR control plane used for the destination.

pub mod auth;
pub mod catalog;
pub mod client;
pub mod ecr;
pub mod operations;
pub mod reference;
pub mod token_manager;
pub mod transport;

pub use auth::{Authorization, RegistryCredential};
pub use catalog::{AuthorizationToken, AuthorizationTokenSource, DestinationCatalog, RepositoryStatus};
pub use client::{RegistryClient, RegistryClientBuilder};
pub use ecr::EcrRegistry;
pub use reference::RepositoryRef;
pub use transport::{BlobStream, ManifestResponse, RegistryTransport};

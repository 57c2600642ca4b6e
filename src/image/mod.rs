//! Image identity: digests, manifests and indices

pub mod digest;
pub mod manifest;

pub use digest::DigestUtils;
pub use manifest::{Descriptor, ImageDescriptor, ManifestDocument, ManifestKind};

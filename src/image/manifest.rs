//! Manifest and index documents
//!
//! Only the fields needed to walk an image graph are modelled: the media
//! type, the config and layer descriptors of an image manifest, and the child
//! descriptors of an index. The raw bytes are always kept alongside so that a
//! manifest can be re-pushed verbatim and keep its digest.

use crate::error::{MirrorError, Result};
use crate::image::digest::DigestUtils;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

/// Accept header sent on every manifest pull
pub const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.index.v1+json, \
     application/vnd.docker.distribution.manifest.list.v2+json, \
     application/vnd.oci.image.manifest.v1+json, \
     application/vnd.docker.distribution.manifest.v2+json";

/// All manifest media types this crate knows how to mirror
pub const SUPPORTED_MEDIA_TYPES: [&str; 4] =
    [OCI_INDEX, DOCKER_MANIFEST_LIST, OCI_MANIFEST, DOCKER_MANIFEST_V2];

/// Single image or multi-platform index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    Image,
    Index,
}

impl ManifestKind {
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type {
            OCI_INDEX | DOCKER_MANIFEST_LIST => Some(ManifestKind::Index),
            OCI_MANIFEST | DOCKER_MANIFEST_V2 => Some(ManifestKind::Image),
            _ => None,
        }
    }
}

/// Content descriptor as it appears inside manifests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub media_type: String,
    pub digest: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
}

impl Descriptor {
    /// Foreign / non-distributable layers are never uploaded to registries
    pub fn is_non_distributable(&self) -> bool {
        self.media_type.contains("foreign") || self.media_type.contains("nondistributable")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDocument {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub config: Option<Descriptor>,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
    #[serde(default)]
    pub manifests: Vec<Descriptor>,
}

impl ManifestDocument {
    pub fn parse(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| MirrorError::Parse(format!("invalid manifest JSON: {}", e)))
    }

    /// Blobs an image manifest references: config first, then layers
    pub fn blobs(&self) -> impl Iterator<Item = &Descriptor> {
        self.config.iter().chain(self.layers.iter())
    }
}

/// Source-side identity of a tag or digest reference
#[derive(Debug, Clone)]
pub struct ImageDescriptor {
    pub digest: String,
    pub media_type: String,
    pub kind: ManifestKind,
    pub raw: Bytes,
}

impl ImageDescriptor {
    /// Build a descriptor from a manifest response.
    ///
    /// The registry-reported digest wins when present; otherwise the digest
    /// is computed from the bytes. The media type falls back from the
    /// Content-Type header to the document's own `mediaType`, then to the
    /// presence of a `manifests` array.
    pub fn from_parts(
        raw: Bytes,
        content_type: Option<&str>,
        reported_digest: Option<&str>,
    ) -> Result<Self> {
        let document = ManifestDocument::parse(&raw)?;

        let header_type = content_type
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
            .filter(|ct| ManifestKind::from_media_type(ct).is_some());

        let media_type = match (header_type, document.media_type.as_deref()) {
            (Some(ct), _) => ct.to_string(),
            (None, Some(mt)) => mt.to_string(),
            (None, None) if !document.manifests.is_empty() => OCI_INDEX.to_string(),
            (None, None) if document.config.is_some() => OCI_MANIFEST.to_string(),
            (None, None) => {
                return Err(MirrorError::Parse(
                    "manifest has no media type and no recognizable structure".to_string(),
                ));
            }
        };

        let kind = ManifestKind::from_media_type(&media_type).ok_or_else(|| {
            MirrorError::Parse(format!("unsupported manifest media type: {}", media_type))
        })?;

        let digest = reported_digest
            .map(DigestUtils::normalize)
            .filter(|d| DigestUtils::is_valid_digest(d))
            .unwrap_or_else(|| DigestUtils::compute_docker_digest(&raw));

        Ok(Self {
            digest,
            media_type,
            kind,
            raw,
        })
    }

    pub fn is_index(&self) -> bool {
        self.kind == ManifestKind::Index
    }

    pub fn document(&self) -> Result<ManifestDocument> {
        ManifestDocument::parse(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMAGE: &str = r#"{
        "schemaVersion": 2,
        "mediaType": "application/vnd.oci.image.manifest.v1+json",
        "config": {"mediaType": "application/vnd.oci.image.config.v1+json", "digest": "sha256:c0", "size": 10},
        "layers": [
            {"mediaType": "application/vnd.oci.image.layer.v1.tar+gzip", "digest": "sha256:l1", "size": 100},
            {"mediaType": "application/vnd.docker.image.rootfs.foreign.diff.tar.gzip", "digest": "sha256:l2", "size": 5, "urls": ["https://example.com/l2"]}
        ]
    }"#;

    const INDEX_WITHOUT_MEDIA_TYPE: &str = r#"{
        "schemaVersion": 2,
        "manifests": [
            {"mediaType": "application/vnd.oci.image.manifest.v1+json", "digest": "sha256:aa", "size": 1},
            {"mediaType": "application/vnd.oci.image.manifest.v1+json", "digest": "sha256:bb", "size": 1}
        ]
    }"#;

    #[test]
    fn detects_image_from_document() {
        let desc = ImageDescriptor::from_parts(Bytes::from_static(IMAGE.as_bytes()), None, None)
            .unwrap();
        assert_eq!(desc.kind, ManifestKind::Image);
        assert_eq!(desc.digest, DigestUtils::compute_docker_digest(IMAGE.as_bytes()));

        let doc = desc.document().unwrap();
        let blobs: Vec<_> = doc.blobs().map(|b| b.digest.as_str()).collect();
        assert_eq!(blobs, vec!["sha256:c0", "sha256:l1", "sha256:l2"]);
        assert!(doc.layers[1].is_non_distributable());
    }

    #[test]
    fn infers_index_from_structure() {
        let desc = ImageDescriptor::from_parts(
            Bytes::from_static(INDEX_WITHOUT_MEDIA_TYPE.as_bytes()),
            Some("application/json"),
            None,
        )
        .unwrap();
        assert!(desc.is_index());
        assert_eq!(desc.media_type, OCI_INDEX);
        assert_eq!(desc.document().unwrap().manifests.len(), 2);
    }

    #[test]
    fn header_content_type_and_digest_win() {
        let reported = "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        let desc = ImageDescriptor::from_parts(
            Bytes::from_static(IMAGE.as_bytes()),
            Some("application/vnd.docker.distribution.manifest.v2+json; charset=utf-8"),
            Some(reported),
        )
        .unwrap();
        assert_eq!(desc.media_type, DOCKER_MANIFEST_V2);
        assert_eq!(desc.digest, reported);
    }

    #[test]
    fn rejects_schema1() {
        let schema1 = r#"{"schemaVersion":1,"mediaType":"application/vnd.docker.distribution.manifest.v1+prettyjws"}"#;
        let err = ImageDescriptor::from_parts(Bytes::from_static(schema1.as_bytes()), None, None)
            .unwrap_err();
        assert!(matches!(err, MirrorError::Parse(_)));
    }
}

//! Storage trait/interface for Swift operations.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ClientError;

/// A container as returned by an account listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerEntry {
    /// Container name (unique within the account).
    pub name: String,
    /// Total bytes stored in the container.
    #[serde(default)]
    pub bytes: u64,
    /// Number of objects in the container.
    #[serde(default)]
    pub count: u64,
}

/// An object as returned by a container listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectEntry {
    /// Object name; `/` acts as a virtual path separator.
    pub name: String,
    /// Object size in bytes.
    #[serde(default)]
    pub bytes: u64,
    /// Last-modified timestamp (UTC). `None` when the backend value does not
    /// parse; such objects are excluded from quota eviction.
    #[serde(default, deserialize_with = "deserialize_swift_timestamp")]
    pub last_modified: Option<DateTime<Utc>>,
}

/// Metadata from a HEAD request, used to verify server-side copies.
#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    /// Object size in bytes.
    pub size: u64,
    /// ETag (MD5 of content for plain uploads).
    pub etag: Option<String>,
    /// Last-modified timestamp.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Low-level object storage operations - implemented by the Swift backend
/// and by in-memory mocks in tests.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a local file. Content type is guessed from the extension.
    async fn put_object_from_file(
        &self,
        container: &str,
        object: &str,
        file_path: &Path,
    ) -> Result<(), ClientError>;

    /// Upload in-memory bytes.
    async fn put_object(
        &self,
        container: &str,
        object: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), ClientError>;

    /// Download an object into memory.
    async fn get_object(&self, container: &str, object: &str) -> Result<Vec<u8>, ClientError>;

    /// Download an object to a local path, creating parent directories.
    async fn get_object_to_file(
        &self,
        container: &str,
        object: &str,
        dest_path: &Path,
    ) -> Result<u64, ClientError>;

    /// Delete an object. Idempotent: a 404 counts as success.
    async fn delete_object(&self, container: &str, object: &str) -> Result<(), ClientError>;

    /// Server-side copy (no client round-trip of the bytes).
    async fn copy_object(
        &self,
        src_container: &str,
        src_object: &str,
        dst_container: &str,
        dst_object: &str,
    ) -> Result<(), ClientError>;

    /// Fetch object metadata. Returns `None` if the object does not exist.
    async fn head_object(
        &self,
        container: &str,
        object: &str,
    ) -> Result<Option<ObjectMetadata>, ClientError>;

    /// Create a container. Succeeds if it already exists.
    async fn create_container(&self, container: &str) -> Result<(), ClientError>;

    /// Delete a container. Fails with [`ClientError::Conflict`] while it
    /// still holds objects.
    async fn delete_container(&self, container: &str) -> Result<(), ClientError>;

    /// List all containers in the account.
    async fn list_containers(&self) -> Result<Vec<ContainerEntry>, ClientError>;

    /// List all objects in a container.
    async fn list_objects(&self, container: &str) -> Result<Vec<ObjectEntry>, ClientError>;
}

/// Swift reports `last_modified` as an ISO timestamp without an offset,
/// implicitly UTC. Unparseable values become `None` rather than an error.
fn deserialize_swift_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_swift_timestamp))
}

/// Parse a Swift `last_modified` value (e.g. `2024-05-01T10:30:00.123456`).
pub(crate) fn parse_swift_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

//! In-memory `ObjectStore` used by the engine tests.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use swiftdesk_client::{ClientError, ContainerEntry, ObjectEntry, ObjectMetadata, ObjectStore};

#[derive(Clone)]
pub(crate) struct StoredObject {
    pub data: Vec<u8>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Mock store: a map of (container, object) -> bytes plus an operation
/// trace, with per-object failure injection.
#[derive(Default)]
pub(crate) struct MockStore {
    pub containers: Mutex<BTreeSet<String>>,
    pub objects: Mutex<BTreeMap<(String, String), StoredObject>>,
    /// Every mutating call in order, e.g. `delete c/o` or `put c/o`.
    pub trace: Mutex<Vec<String>>,
    /// `container/object` keys whose operations fail with HTTP 500.
    pub fail_on: Mutex<HashSet<String>>,
    /// `container/object` keys whose deletes (only) fail with HTTP 500.
    pub fail_delete_on: Mutex<HashSet<String>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(self, name: &str) -> Self {
        self.containers.lock().unwrap().insert(name.to_string());
        self
    }

    pub fn with_object(self, container: &str, object: &str, size: usize, ts: &str) -> Self {
        let last_modified: Option<DateTime<Utc>> = DateTime::parse_from_rfc3339(ts)
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
        self.containers
            .lock()
            .unwrap()
            .insert(container.to_string());
        self.objects.lock().unwrap().insert(
            (container.to_string(), object.to_string()),
            StoredObject {
                data: vec![0u8; size],
                last_modified,
            },
        );
        self
    }

    pub fn fail_on(self, container: &str, object: &str) -> Self {
        self.fail_on
            .lock()
            .unwrap()
            .insert(format!("{container}/{object}"));
        self
    }

    pub fn fail_delete_on(self, container: &str, object: &str) -> Self {
        self.fail_delete_on
            .lock()
            .unwrap()
            .insert(format!("{container}/{object}"));
        self
    }

    pub fn trace(&self) -> Vec<String> {
        self.trace.lock().unwrap().clone()
    }

    pub fn object_names(&self, container: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(c, _)| c == container)
            .map(|(_, o)| o.clone())
            .collect()
    }

    pub fn total_bytes(&self) -> u64 {
        self.objects
            .lock()
            .unwrap()
            .values()
            .map(|o| o.data.len() as u64)
            .sum()
    }

    fn check_failure(&self, container: &str, object: &str) -> Result<(), ClientError> {
        let key: String = format!("{container}/{object}");
        if self.fail_on.lock().unwrap().contains(&key) {
            return Err(ClientError::UnexpectedStatus {
                status: 500,
                url: key,
            });
        }
        Ok(())
    }

    fn record(&self, entry: String) {
        self.trace.lock().unwrap().push(entry);
    }

    fn store(&self, container: &str, object: &str, data: Vec<u8>) {
        self.objects.lock().unwrap().insert(
            (container.to_string(), object.to_string()),
            StoredObject {
                data,
                last_modified: Some(Utc::now()),
            },
        );
    }
}

fn mock_etag(data: &[u8]) -> String {
    // Stable per content length; enough for copy verification.
    format!("etag-{}", data.len())
}

#[async_trait]
impl ObjectStore for MockStore {
    async fn put_object_from_file(
        &self,
        container: &str,
        object: &str,
        file_path: &Path,
    ) -> Result<(), ClientError> {
        self.check_failure(container, object)?;
        let data: Vec<u8> = std::fs::read(file_path)
            .map_err(|e| ClientError::Io {
                path: file_path.display().to_string(),
                message: e.to_string(),
            })?;
        self.record(format!("put {container}/{object}"));
        self.store(container, object, data);
        Ok(())
    }

    async fn put_object(
        &self,
        container: &str,
        object: &str,
        data: Vec<u8>,
        _content_type: Option<&str>,
    ) -> Result<(), ClientError> {
        self.check_failure(container, object)?;
        self.record(format!("put {container}/{object}"));
        self.store(container, object, data);
        Ok(())
    }

    async fn get_object(&self, container: &str, object: &str) -> Result<Vec<u8>, ClientError> {
        self.check_failure(container, object)?;
        self.objects
            .lock()
            .unwrap()
            .get(&(container.to_string(), object.to_string()))
            .map(|o| o.data.clone())
            .ok_or_else(|| ClientError::NotFound {
                container: container.to_string(),
                object: object.to_string(),
            })
    }

    async fn get_object_to_file(
        &self,
        container: &str,
        object: &str,
        dest_path: &Path,
    ) -> Result<u64, ClientError> {
        let data: Vec<u8> = self.get_object(container, object).await?;
        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ClientError::Io {
                path: parent.display().to_string(),
                message: e.to_string(),
            })?;
        }
        std::fs::write(dest_path, &data).map_err(|e| ClientError::Io {
            path: dest_path.display().to_string(),
            message: e.to_string(),
        })?;
        self.record(format!("get {container}/{object}"));
        Ok(data.len() as u64)
    }

    async fn delete_object(&self, container: &str, object: &str) -> Result<(), ClientError> {
        self.check_failure(container, object)?;
        let key: String = format!("{container}/{object}");
        if self.fail_delete_on.lock().unwrap().contains(&key) {
            return Err(ClientError::UnexpectedStatus {
                status: 500,
                url: key,
            });
        }
        self.record(format!("delete {container}/{object}"));
        // Missing object is still success, like the real backend's 404.
        self.objects
            .lock()
            .unwrap()
            .remove(&(container.to_string(), object.to_string()));
        Ok(())
    }

    async fn copy_object(
        &self,
        src_container: &str,
        src_object: &str,
        dst_container: &str,
        dst_object: &str,
    ) -> Result<(), ClientError> {
        self.check_failure(src_container, src_object)?;
        self.check_failure(dst_container, dst_object)?;
        let source: StoredObject = self
            .objects
            .lock()
            .unwrap()
            .get(&(src_container.to_string(), src_object.to_string()))
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                container: src_container.to_string(),
                object: src_object.to_string(),
            })?;
        self.record(format!(
            "copy {src_container}/{src_object} -> {dst_container}/{dst_object}"
        ));
        self.objects.lock().unwrap().insert(
            (dst_container.to_string(), dst_object.to_string()),
            source,
        );
        Ok(())
    }

    async fn head_object(
        &self,
        container: &str,
        object: &str,
    ) -> Result<Option<ObjectMetadata>, ClientError> {
        self.check_failure(container, object)?;
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(&(container.to_string(), object.to_string()))
            .map(|o| ObjectMetadata {
                size: o.data.len() as u64,
                etag: Some(mock_etag(&o.data)),
                last_modified: o.last_modified,
            }))
    }

    async fn create_container(&self, container: &str) -> Result<(), ClientError> {
        self.check_failure(container, "")?;
        self.record(format!("create-container {container}"));
        self.containers
            .lock()
            .unwrap()
            .insert(container.to_string());
        Ok(())
    }

    async fn delete_container(&self, container: &str) -> Result<(), ClientError> {
        self.check_failure(container, "")?;
        let non_empty: bool = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .any(|(c, _)| c == container);
        if non_empty {
            return Err(ClientError::Conflict {
                container: container.to_string(),
                message: "container still holds objects".to_string(),
            });
        }
        self.record(format!("delete-container {container}"));
        self.containers.lock().unwrap().remove(container);
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerEntry>, ClientError> {
        let objects = self.objects.lock().unwrap();
        Ok(self
            .containers
            .lock()
            .unwrap()
            .iter()
            .map(|name| {
                let members = objects.iter().filter(|((c, _), _)| c == name);
                ContainerEntry {
                    name: name.clone(),
                    bytes: members.clone().map(|(_, o)| o.data.len() as u64).sum(),
                    count: members.count() as u64,
                }
            })
            .collect())
    }

    async fn list_objects(&self, container: &str) -> Result<Vec<ObjectEntry>, ClientError> {
        if !self.containers.lock().unwrap().contains(container) {
            return Err(ClientError::NotFound {
                container: container.to_string(),
                object: String::new(),
            });
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((c, _), _)| c == container)
            .map(|((_, name), o)| ObjectEntry {
                name: name.clone(),
                bytes: o.data.len() as u64,
                last_modified: o.last_modified,
            })
            .collect())
    }
}

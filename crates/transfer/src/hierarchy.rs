//! Hierarchical operations over the flat object namespace.
//!
//! A "folder" is nothing but a shared name prefix ending in `/`. Folder and
//! container operations enumerate matching objects fresh (no cached
//! listings) and expand into object-level task batches for the pool.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use thiserror::Error;

use swiftdesk_client::{ClientError, ObjectEntry, ObjectMetadata, ObjectStore};
use swiftdesk_common::{
    download_path, folder_prefix, strip_folder_prefix, validate_container_name, NameError,
    ProgressCallback, BACKUP_CONTAINER,
};
use swiftdesk_filesystem::UploadPlan;

use crate::pool::{run_batch, TransferOptions};
use crate::quota::{check_headroom, QuotaExceeded, StorageQuota};
use crate::task::{BatchProgress, BatchSummary, TransferTask};

/// Errors from folder- and container-level operations.
#[derive(Error, Debug)]
pub enum HierarchyError {
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The copy landed but did not match the source.
    #[error("copy of {container}/{src} to {dst} failed verification: {detail}")]
    CopyMismatch {
        container: String,
        src: String,
        dst: String,
        detail: String,
    },

    /// The rename copied successfully but deleting the original failed:
    /// both names now exist until the caller retries the cleanup.
    #[error("renamed {container}/{src} to {dst} but cleanup of the original failed: {source}")]
    RenamePending {
        container: String,
        src: String,
        dst: String,
        source: ClientError,
    },

    /// Member deletes did not all succeed, so the container was left alone.
    #[error("{remaining} object(s) could not be deleted from '{container}'")]
    ObjectsRemaining { container: String, remaining: usize },
}

/// List the objects under a folder prefix.
pub async fn list_folder(
    store: &dyn ObjectStore,
    container: &str,
    folder: &str,
) -> Result<Vec<ObjectEntry>, ClientError> {
    let prefix: String = folder_prefix(folder);
    let objects: Vec<ObjectEntry> = store.list_objects(container).await?;
    Ok(objects
        .into_iter()
        .filter(|o| o.name.starts_with(&prefix))
        .collect())
}

/// Download every object under a folder into `save_root`.
///
/// The folder keeps its own name locally: downloading `reports/2024` into
/// `/dl` writes `/dl/2024/...`. Returns one summary for the whole batch.
pub async fn download_folder(
    store: &dyn ObjectStore,
    container: &str,
    folder: &str,
    save_root: &Path,
    options: &TransferOptions,
    progress: &dyn ProgressCallback<BatchProgress>,
) -> Result<BatchSummary, ClientError> {
    let prefix: String = folder_prefix(folder);
    let tasks: Vec<TransferTask> = list_folder(store, container, folder)
        .await?
        .into_iter()
        .filter_map(|o| {
            let suffix: &str = strip_folder_prefix(&o.name, &prefix)?;
            let dest: PathBuf = download_path(save_root, folder, suffix);
            Some(TransferTask::download(container, o.name.clone(), dest))
        })
        .collect();
    Ok(run_batch(store, tasks, options, progress).await)
}

/// Delete every object under a folder.
pub async fn delete_folder(
    store: &dyn ObjectStore,
    container: &str,
    folder: &str,
    options: &TransferOptions,
    progress: &dyn ProgressCallback<BatchProgress>,
) -> Result<BatchSummary, ClientError> {
    let tasks: Vec<TransferTask> = list_folder(store, container, folder)
        .await?
        .into_iter()
        .map(|o| TransferTask::delete(container, o.name))
        .collect();
    Ok(run_batch(store, tasks, options, progress).await)
}

/// Delete a container and everything in it.
///
/// Member objects are deleted as one batch; the container DELETE is issued
/// only after that batch has fully joined, and only when every member
/// delete succeeded. A conflict at the container step (objects created
/// concurrently) surfaces as [`ClientError::Conflict`].
pub async fn delete_container_with_objects(
    store: &dyn ObjectStore,
    container: &str,
    options: &TransferOptions,
    progress: &dyn ProgressCallback<BatchProgress>,
) -> Result<BatchSummary, HierarchyError> {
    let tasks: Vec<TransferTask> = store
        .list_objects(container)
        .await?
        .into_iter()
        .map(|o| TransferTask::delete(container, o.name))
        .collect();

    let summary: BatchSummary = run_batch(store, tasks, options, progress).await;
    if !summary.succeeded() {
        return Err(HierarchyError::ObjectsRemaining {
            container: container.to_string(),
            remaining: summary.errors.len() + summary.cancelled,
        });
    }

    store.delete_container(container).await?;
    Ok(summary)
}

/// Rename an object via server-side copy.
///
/// The copy is verified with a HEAD of the destination (size, and etag when
/// both sides report one) before the original is deleted. If the final
/// delete fails, both names exist; that state is reported as
/// [`HierarchyError::RenamePending`] rather than swallowed, and retrying
/// the cleanup delete is safe.
pub async fn rename_object(
    store: &dyn ObjectStore,
    container: &str,
    src: &str,
    dst: &str,
) -> Result<(), HierarchyError> {
    let source_meta: ObjectMetadata =
        store
            .head_object(container, src)
            .await?
            .ok_or_else(|| ClientError::NotFound {
                container: container.to_string(),
                object: src.to_string(),
            })?;

    store.copy_object(container, src, container, dst).await?;

    let copied: ObjectMetadata =
        store
            .head_object(container, dst)
            .await?
            .ok_or_else(|| HierarchyError::CopyMismatch {
                container: container.to_string(),
                src: src.to_string(),
                dst: dst.to_string(),
                detail: "destination missing after copy".to_string(),
            })?;
    if copied.size != source_meta.size {
        return Err(HierarchyError::CopyMismatch {
            container: container.to_string(),
            src: src.to_string(),
            dst: dst.to_string(),
            detail: format!("size {} != {}", copied.size, source_meta.size),
        });
    }
    if let (Some(src_etag), Some(dst_etag)) = (&source_meta.etag, &copied.etag) {
        if src_etag != dst_etag {
            return Err(HierarchyError::CopyMismatch {
                container: container.to_string(),
                src: src.to_string(),
                dst: dst.to_string(),
                detail: "etag mismatch".to_string(),
            });
        }
    }

    store
        .delete_object(container, src)
        .await
        .map_err(|source| HierarchyError::RenamePending {
            container: container.to_string(),
            src: src.to_string(),
            dst: dst.to_string(),
            source,
        })
}

/// Rename a container: create the destination, copy every object
/// server-side, then delete the old container with its objects.
///
/// The destination must not already exist. Copies run with the batch
/// concurrency bound; the first copy failure aborts before anything is
/// deleted, leaving the source intact.
pub async fn rename_container(
    store: &dyn ObjectStore,
    src: &str,
    dst: &str,
    options: &TransferOptions,
    progress: &dyn ProgressCallback<BatchProgress>,
) -> Result<(), HierarchyError> {
    validate_container_name(dst).map_err(|e: NameError| ClientError::InvalidConfig {
        message: e.to_string(),
    })?;
    let existing: bool = store
        .list_containers()
        .await?
        .iter()
        .any(|c| c.name == dst);
    if existing {
        return Err(HierarchyError::Client(ClientError::Conflict {
            container: dst.to_string(),
            message: "destination container already exists".to_string(),
        }));
    }

    store.create_container(dst).await?;

    let objects: Vec<ObjectEntry> = store.list_objects(src).await?;
    let copies: Vec<Result<(), ClientError>> = stream::iter(&objects)
        .map(|o: &ObjectEntry| store.copy_object(src, &o.name, dst, &o.name))
        .buffer_unordered(options.max_concurrency.max(1))
        .collect()
        .await;
    for result in copies {
        result?;
    }

    delete_container_with_objects(store, src, options, progress).await?;
    Ok(())
}

/// Errors from a bulk-drop pre-flight.
#[derive(Error, Debug)]
pub enum DropError {
    #[error(transparent)]
    Name(#[from] NameError),

    #[error(transparent)]
    Quota(#[from] QuotaExceeded),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Upload dropped folders, one container per folder.
///
/// The whole drop is validated before anything is created: container names
/// must not be reserved and must not collide with existing containers, and
/// the combined size must fit in the quota headroom (checked once up
/// front). Only then are containers created and the upload batch submitted.
pub async fn run_drop_upload(
    store: &dyn ObjectStore,
    drops: Vec<(String, UploadPlan)>,
    quota: &StorageQuota,
    options: &TransferOptions,
    progress: &dyn ProgressCallback<BatchProgress>,
) -> Result<BatchSummary, DropError> {
    let existing: Vec<String> = store
        .list_containers()
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect();

    let mut upload_total: u64 = 0;
    for (container, plan) in &drops {
        validate_container_name(container)?;
        if existing.iter().any(|name| name == container) {
            return Err(DropError::Name(NameError::ContainerExists {
                name: container.clone(),
            }));
        }
        upload_total += plan.total_bytes;
    }
    check_headroom(quota, upload_total)?;

    let mut tasks: Vec<TransferTask> = Vec::new();
    for (container, plan) in drops {
        store.create_container(&container).await?;
        for item in plan.items {
            tasks.push(TransferTask::upload(
                container.clone(),
                item.object_name,
                item.local_path,
            ));
        }
    }
    Ok(run_batch(store, tasks, options, progress).await)
}

/// Upload a backup run into the `Backup` container.
///
/// The plan's object names already carry the run's timestamp prefix, so
/// consecutive runs land side by side and never overwrite each other.
pub async fn run_backup_upload(
    store: &dyn ObjectStore,
    plan: UploadPlan,
    options: &TransferOptions,
    progress: &dyn ProgressCallback<BatchProgress>,
) -> Result<BatchSummary, ClientError> {
    store.create_container(BACKUP_CONTAINER).await?;
    let tasks: Vec<TransferTask> = plan
        .items
        .into_iter()
        .map(|item| TransferTask::upload(BACKUP_CONTAINER, item.object_name, item.local_path))
        .collect();
    Ok(run_batch(store, tasks, options, progress).await)
}

#[cfg(test)]
mod tests {
    use swiftdesk_common::NoOpProgress;
    use swiftdesk_filesystem::plan_drop_upload;

    use super::*;
    use crate::testing::MockStore;

    const TS: &str = "2024-05-01T10:00:00Z";

    fn folder_store() -> MockStore {
        MockStore::new()
            .with_object("docs", "reports/2024/a.txt", 10, TS)
            .with_object("docs", "reports/2024/sub/b.txt", 20, TS)
            .with_object("docs", "reports/2023/c.txt", 30, TS)
            .with_object("docs", "reports-other/d.txt", 40, TS)
    }

    #[tokio::test]
    async fn test_list_folder_matches_prefix_not_siblings() {
        let store: MockStore = folder_store();
        let objects: Vec<ObjectEntry> = list_folder(&store, "docs", "reports/2024").await.unwrap();
        let names: Vec<&str> = objects.iter().map(|o| o.name.as_str()).collect();
        // `reports-other/` shares the string prefix `reports` but not the
        // folder prefix `reports/2024/`.
        assert_eq!(names, vec!["reports/2024/a.txt", "reports/2024/sub/b.txt"]);
    }

    #[tokio::test]
    async fn test_download_folder_keeps_own_name() {
        let store: MockStore = folder_store();
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();

        let summary: BatchSummary = download_folder(
            &store,
            "docs",
            "reports/2024",
            dir.path(),
            &TransferOptions::default(),
            &NoOpProgress,
        )
        .await
        .unwrap();

        assert!(summary.succeeded());
        assert_eq!(summary.total, 2);
        assert!(dir.path().join("2024/a.txt").is_file());
        assert!(dir.path().join("2024/sub/b.txt").is_file());
    }

    #[tokio::test]
    async fn test_delete_folder_leaves_siblings() {
        let store: MockStore = folder_store();
        let summary: BatchSummary = delete_folder(
            &store,
            "docs",
            "reports/2024",
            &TransferOptions::default(),
            &NoOpProgress,
        )
        .await
        .unwrap();

        assert!(summary.succeeded());
        assert_eq!(
            store.object_names("docs"),
            vec!["reports-other/d.txt", "reports/2023/c.txt"]
        );
    }

    #[tokio::test]
    async fn test_delete_container_after_members() {
        let store: MockStore = MockStore::new()
            .with_object("old", "a.txt", 10, TS)
            .with_object("old", "b.txt", 20, TS);

        delete_container_with_objects(&store, "old", &TransferOptions::default(), &NoOpProgress)
            .await
            .unwrap();

        let trace: Vec<String> = store.trace();
        // The container delete is last, strictly after every member delete.
        assert_eq!(trace.last().unwrap(), "delete-container old");
        assert_eq!(trace.len(), 3);
        assert!(store.containers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_container_kept_when_member_delete_fails() {
        let store: MockStore = MockStore::new()
            .with_object("old", "a.txt", 10, TS)
            .with_object("old", "b.txt", 20, TS)
            .fail_on("old", "b.txt");

        let err: HierarchyError = delete_container_with_objects(
            &store,
            "old",
            &TransferOptions::default(),
            &NoOpProgress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, HierarchyError::ObjectsRemaining { remaining: 1, .. }));
        assert!(store.containers.lock().unwrap().contains("old"));
    }

    #[tokio::test]
    async fn test_rename_object_copy_verify_delete() {
        let store: MockStore = MockStore::new().with_object("docs", "draft.txt", 10, TS);

        rename_object(&store, "docs", "draft.txt", "final.txt")
            .await
            .unwrap();

        assert_eq!(store.object_names("docs"), vec!["final.txt"]);
        assert_eq!(
            store.trace(),
            vec!["copy docs/draft.txt -> docs/final.txt", "delete docs/draft.txt"]
        );
    }

    #[tokio::test]
    async fn test_rename_object_cleanup_failure_is_distinct() {
        let store: MockStore = MockStore::new()
            .with_object("docs", "draft.txt", 10, TS)
            .fail_delete_on("docs", "draft.txt");

        let err: HierarchyError = rename_object(&store, "docs", "draft.txt", "final.txt")
            .await
            .unwrap_err();

        assert!(matches!(err, HierarchyError::RenamePending { .. }));
        // Both names exist until the cleanup is retried.
        assert_eq!(store.object_names("docs"), vec!["draft.txt", "final.txt"]);
    }

    #[tokio::test]
    async fn test_rename_missing_object_is_not_found() {
        let store: MockStore = MockStore::new().with_container("docs");
        let err: HierarchyError = rename_object(&store, "docs", "ghost.txt", "x.txt")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HierarchyError::Client(ClientError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_rename_container_moves_objects() {
        let store: MockStore = MockStore::new()
            .with_object("old-name", "a.txt", 10, TS)
            .with_object("old-name", "deep/b.txt", 20, TS);

        rename_container(
            &store,
            "old-name",
            "new-name",
            &TransferOptions::default(),
            &NoOpProgress,
        )
        .await
        .unwrap();

        assert_eq!(store.object_names("new-name"), vec!["a.txt", "deep/b.txt"]);
        assert!(store.object_names("old-name").is_empty());
        assert!(!store.containers.lock().unwrap().contains("old-name"));
    }

    #[tokio::test]
    async fn test_rename_container_rejects_existing_destination() {
        let store: MockStore = MockStore::new()
            .with_container("src")
            .with_container("taken");
        let err: HierarchyError = rename_container(
            &store,
            "src",
            "taken",
            &TransferOptions::default(),
            &NoOpProgress,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            HierarchyError::Client(ClientError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_drop_rejects_reserved_container_name() {
        let store: MockStore = MockStore::new();
        let quota: StorageQuota = StorageQuota {
            used_bytes: 0,
            total_bytes: 1000,
        };
        let err: DropError = run_drop_upload(
            &store,
            vec![("Backup".to_string(), UploadPlan::default())],
            &quota,
            &TransferOptions::default(),
            &NoOpProgress,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DropError::Name(_)));
        assert!(store.trace().is_empty());
    }

    #[tokio::test]
    async fn test_drop_rejects_whole_batch_over_quota() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.bin"), vec![0u8; 600]).unwrap();
        let plan: UploadPlan = plan_drop_upload(dir.path()).unwrap();

        let store: MockStore = MockStore::new();
        let quota: StorageQuota = StorageQuota {
            used_bytes: 500,
            total_bytes: 1000,
        };
        let err: DropError = run_drop_upload(
            &store,
            vec![("incoming".to_string(), plan)],
            &quota,
            &TransferOptions::default(),
            &NoOpProgress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DropError::Quota(_)));
        // Nothing was created or uploaded.
        assert!(store.trace().is_empty());
    }

    #[tokio::test]
    async fn test_backup_upload_lands_under_stamp_prefix() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        std::fs::write(dir.path().join("data/notes.txt"), b"hello").unwrap();
        let plan = swiftdesk_filesystem::plan_backup_upload(
            &dir.path().join("data"),
            "01.06.2024.03.00.00",
        )
        .unwrap();

        let store: MockStore = MockStore::new();
        let summary: BatchSummary = run_backup_upload(
            &store,
            plan,
            &TransferOptions::default(),
            &NoOpProgress,
        )
        .await
        .unwrap();

        assert!(summary.succeeded());
        assert_eq!(
            store.object_names("Backup"),
            vec!["01.06.2024.03.00.00/data/notes.txt"]
        );
    }

    #[tokio::test]
    async fn test_drop_uploads_relative_names() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("root.txt"), b"12345").unwrap();
        std::fs::write(dir.path().join("sub/leaf.txt"), b"123").unwrap();
        let plan: UploadPlan = plan_drop_upload(dir.path()).unwrap();

        let store: MockStore = MockStore::new();
        let quota: StorageQuota = StorageQuota {
            used_bytes: 0,
            total_bytes: 1000,
        };
        let summary: BatchSummary = run_drop_upload(
            &store,
            vec![("incoming".to_string(), plan)],
            &quota,
            &TransferOptions::default(),
            &NoOpProgress,
        )
        .await
        .unwrap();

        assert!(summary.succeeded());
        assert_eq!(summary.bytes_transferred, 8);
        assert_eq!(
            store.object_names("incoming"),
            vec!["root.txt", "sub/leaf.txt"]
        );
    }
}

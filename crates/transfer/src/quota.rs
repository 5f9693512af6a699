//! Quota tracking and enforcement.
//!
//! Usage is never tracked incrementally: it is recomputed from a full
//! listing traversal after every mutating batch and on a timer, so changes
//! made outside the client (through the mounted drive, another session)
//! self-correct within one interval.

use chrono::{DateTime, Utc};
use thiserror::Error;

use swiftdesk_client::{ClientError, ContainerEntry, ObjectEntry, ObjectStore};
use swiftdesk_common::{format_bytes, ProgressCallback, DEFAULT_QUOTA_BYTES, USAGE_REFRESH_SECS};

use crate::task::TransferError;

/// Account usage against a fixed quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageQuota {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl Default for StorageQuota {
    /// Empty account against the stock quota.
    fn default() -> Self {
        Self::new(DEFAULT_QUOTA_BYTES)
    }
}

impl StorageQuota {
    pub fn new(total_bytes: u64) -> Self {
        Self {
            used_bytes: 0,
            total_bytes,
        }
    }

    /// Bytes still available, zero when over quota.
    pub fn headroom(&self) -> u64 {
        self.total_bytes.saturating_sub(self.used_bytes)
    }

    pub fn would_exceed(&self, additional: u64) -> bool {
        additional > self.headroom()
    }

    pub fn is_exceeded(&self) -> bool {
        self.used_bytes > self.total_bytes
    }
}

/// An upload rejected up front because it cannot fit.
#[derive(Error, Debug, Clone)]
#[error(
    "upload of {} exceeds the remaining quota of {}",
    format_bytes(*.requested),
    format_bytes(*.headroom)
)]
pub struct QuotaExceeded {
    pub requested: u64,
    pub headroom: u64,
}

/// Pre-flight check before submitting an upload batch.
///
/// Rejection happens before any task is created, so usage is unchanged on
/// the error path.
pub fn check_headroom(quota: &StorageQuota, upload_total: u64) -> Result<(), QuotaExceeded> {
    if quota.would_exceed(upload_total) {
        return Err(QuotaExceeded {
            requested: upload_total,
            headroom: quota.headroom(),
        });
    }
    Ok(())
}

/// Recompute account usage from a fresh full traversal.
pub async fn recompute_usage(store: &dyn ObjectStore) -> Result<u64, ClientError> {
    let containers: Vec<ContainerEntry> = store.list_containers().await?;
    let mut used: u64 = 0;
    for container in &containers {
        let objects: Vec<ObjectEntry> = store.list_objects(&container.name).await?;
        used += objects.iter().map(|o| o.bytes).sum::<u64>();
    }
    Ok(used)
}

/// Result of one enforcement pass.
#[derive(Debug, Clone, Default)]
pub struct EvictionReport {
    pub evicted: usize,
    pub reclaimed_bytes: u64,
    /// Deletes that failed; their objects stay and are skipped over.
    pub errors: Vec<TransferError>,
    /// Estimated usage after the pass.
    pub used_after: u64,
}

/// Delete objects until usage fits under `total_bytes`.
///
/// Candidates are ordered newest first: the most recent uploads are the
/// ones that pushed the account over, so they go before long-lived data.
/// Objects whose `last_modified` did not parse are never evicted. Deletes
/// run one at a time, adjusting the running estimate after each success,
/// and the pass stops as soon as the estimate fits or candidates run out.
pub async fn enforce(
    store: &dyn ObjectStore,
    total_bytes: u64,
) -> Result<EvictionReport, ClientError> {
    let mut used: u64 = recompute_usage(store).await?;
    let mut report: EvictionReport = EvictionReport {
        used_after: used,
        ..EvictionReport::default()
    };
    if used <= total_bytes {
        return Ok(report);
    }

    let mut candidates: Vec<(String, ObjectEntry, DateTime<Utc>)> = Vec::new();
    for container in store.list_containers().await? {
        for object in store.list_objects(&container.name).await? {
            if let Some(ts) = object.last_modified {
                candidates.push((container.name.clone(), object, ts));
            }
        }
    }
    candidates.sort_by(|a, b| b.2.cmp(&a.2));

    for (container, object, _) in candidates {
        if used <= total_bytes {
            break;
        }
        match store.delete_object(&container, &object.name).await {
            Ok(()) => {
                used = used.saturating_sub(object.bytes);
                report.evicted += 1;
                report.reclaimed_bytes += object.bytes;
            }
            Err(err) => {
                log::warn!("eviction of {}/{} failed: {}", container, object.name, err);
                report.errors.push(TransferError {
                    container,
                    object: object.name,
                    message: err.to_string(),
                    retryable: err.is_retryable(),
                });
            }
        }
    }

    report.used_after = used;
    Ok(report)
}

/// Periodically recompute usage and hand it to the callback.
///
/// Runs until the callback returns `false`. Listing failures are logged
/// and skipped; the previous value simply stays current for one more
/// interval.
pub async fn watch_usage(
    store: &dyn ObjectStore,
    total_bytes: u64,
    callback: &dyn ProgressCallback<StorageQuota>,
) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(USAGE_REFRESH_SECS));
    loop {
        ticker.tick().await;
        let used_bytes: u64 = match recompute_usage(store).await {
            Ok(used) => used,
            Err(err) => {
                log::warn!("usage refresh failed: {err}");
                continue;
            }
        };
        let quota: StorageQuota = StorageQuota {
            used_bytes,
            total_bytes,
        };
        if !callback.on_progress(&quota) {
            return;
        }
    }
}

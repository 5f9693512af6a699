//! Concurrent transfer engine for swiftdesk.
//!
//! Everything the UI layer submits eventually becomes a batch of
//! [`TransferTask`]s executed by [`run_batch`] with bounded parallelism:
//!
//! - [`hierarchy`] expands folder- and container-level requests into
//!   object-level tasks (download/delete folder, rename, bulk drop)
//! - [`quota`] recomputes account usage from fresh listings and evicts
//!   newest-first when the account runs over
//! - [`dicom_bridge`] copies an Orthanc study into object storage through
//!   the same pool
//!
//! Tasks never abort their siblings: every task yields exactly one
//! [`TaskOutcome`], and errors are collected into the [`BatchSummary`].

pub mod dicom_bridge;
pub mod hierarchy;
pub mod pool;
pub mod quota;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use dicom_bridge::{bridge_study, BridgePhase, BridgeProgress, BridgeReport};
pub use hierarchy::{
    delete_container_with_objects, delete_folder, download_folder, rename_container,
    rename_object, run_backup_upload, run_drop_upload, DropError, HierarchyError,
};
pub use pool::{run_batch, TransferOptions};
pub use quota::{
    check_headroom, enforce, recompute_usage, watch_usage, EvictionReport, QuotaExceeded,
    StorageQuota,
};
pub use task::{BatchProgress, BatchSummary, TaskKind, TaskOutcome, TransferError, TransferTask};

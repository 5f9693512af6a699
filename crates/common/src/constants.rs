//! Shared constants used across swiftdesk crates.

/// Container names reserved for system features (compared case-insensitively).
///
/// `Backup` receives scheduled backup uploads and `DICOM` receives bridged
/// imaging studies; user-created containers may not shadow either.
pub const RESERVED_CONTAINERS: [&str; 2] = ["backup", "dicom"];

/// Container that scheduled and manual backups upload into.
pub const BACKUP_CONTAINER: &str = "Backup";

/// Container that bridged DICOM studies upload into.
pub const DICOM_CONTAINER: &str = "DICOM";

/// Default number of transfers in flight per batch.
///
/// The pool size is an explicit bound: submitting a 500-file batch must not
/// open 500 concurrent HTTP connections.
pub const DEFAULT_TRANSFER_CONCURRENCY: usize = 8;

/// Default concurrency for DICOM metadata and instance fetches.
pub const DEFAULT_DICOM_CONCURRENCY: usize = 4;

/// Seconds between periodic usage recomputations.
///
/// Usage is replaced wholesale from a fresh listing rather than tracked
/// incrementally, so external changes (e.g. through the mounted drive)
/// self-correct within one interval.
pub const USAGE_REFRESH_SECS: u64 = 10;

/// Default storage quota in bytes (100 MiB).
pub const DEFAULT_QUOTA_BYTES: u64 = 100 * 1024 * 1024;

/// Content type used when the extension is unknown.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Number of studies loaded per DICOM page.
pub const DICOM_PAGE_SIZE: usize = 10;

//! User-facing persistence and desktop integration for swiftdesk.
//!
//! - [`vault`] stores remembered logins encrypted at rest
//! - [`backup`] holds per-user backup schedules and the calendar arithmetic
//!   deciding when the next run fires
//! - [`mount`] drives an external `rclone mount` process as a scoped
//!   resource

pub mod backup;
pub mod mount;
pub mod vault;

pub use backup::{backup_stamp, manual_stamp, BackupConfig, BackupMode};
pub use mount::{MountHandle, MountOptions};
pub use vault::{ProfileError, SavedUser, UserVault};

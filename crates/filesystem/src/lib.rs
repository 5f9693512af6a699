//! Local folder scanning and upload planning.
//!
//! Uploads start from the filesystem: a recursive scan turns a folder into
//! a list of files with sizes, and the planners turn that into object names
//! under the three naming conventions (folder upload, bulk drop, backup).

mod scanner;

pub use scanner::{
    plan_backup_upload, plan_drop_upload, plan_folder_upload, scan_folder, LocalFile, ScanError,
    UploadItem, UploadPlan,
};

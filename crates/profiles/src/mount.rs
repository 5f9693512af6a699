//! Drive mount via an external `rclone mount` process.
//!
//! The mount is a convenience mirror of the account; transfers never depend
//! on it. Everything here is best-effort: failures are logged and the
//! caller proceeds without a mounted drive. The handle owns the child
//! process, so dropping it (logout, panic unwind, process exit) tears the
//! mount down.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::vault::ProfileError;

const REMOTE_NAME: &str = "swiftdesk";

/// Everything rclone needs to mount the account.
#[derive(Debug, Clone)]
pub struct MountOptions {
    pub username: String,
    pub password: String,
    pub project: String,
    /// Keystone base URL; rclone resolves the storage endpoint itself.
    pub auth_url: String,
    /// Local directory (or drive letter on Windows) to mount at.
    pub mount_point: PathBuf,
}

/// A running mount. Unmount explicitly or let the drop kill the process.
pub struct MountHandle {
    child: Option<Child>,
    mount_point: PathBuf,
}

impl MountHandle {
    /// Write the rclone config and spawn `rclone mount`.
    ///
    /// Returns a handle even when the spawn fails; the failure is logged
    /// and the handle is simply inert. Mounting never blocks login.
    pub fn start(options: &MountOptions) -> Self {
        let child: Option<Child> = match spawn_mount(options) {
            Ok(child) => Some(child),
            Err(err) => {
                log::warn!("drive mount unavailable: {err}");
                None
            }
        };
        Self {
            child,
            mount_point: options.mount_point.clone(),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.child.is_some()
    }

    /// Stop the mount process. Safe to call on an inert handle.
    pub async fn unmount(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.kill().await {
                log::warn!(
                    "could not stop mount at {}: {}",
                    self.mount_point.display(),
                    err
                );
            }
        }
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        // kill_on_drop on the child covers abnormal exits; this makes the
        // common path explicit.
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
    }
}

fn spawn_mount(options: &MountOptions) -> Result<Child, ProfileError> {
    let config_path: PathBuf = write_rclone_config(options)?;
    Command::new("rclone")
        .arg("mount")
        .arg(format!("{REMOTE_NAME}:"))
        .arg(&options.mount_point)
        .arg("--config")
        .arg(&config_path)
        .arg("--vfs-cache-mode")
        .arg("writes")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ProfileError::Io {
            path: options.mount_point.clone(),
            message: e.to_string(),
        })
}

/// Render the Swift remote section for rclone.
fn render_rclone_config(options: &MountOptions) -> String {
    format!(
        "[{REMOTE_NAME}]\n\
         type = swift\n\
         env_auth = false\n\
         user = {user}\n\
         key = {key}\n\
         auth = {auth}/identity/v3\n\
         tenant = {tenant}\n\
         domain = default\n\
         tenant_domain = default\n\
         auth_version = 3\n",
        user = options.username,
        key = options.password,
        auth = options.auth_url.trim_end_matches('/'),
        tenant = options.project,
    )
}

fn write_rclone_config(options: &MountOptions) -> Result<PathBuf, ProfileError> {
    let dir: PathBuf = dirs::config_dir()
        .ok_or(ProfileError::NoConfigDir)?
        .join("swiftdesk");
    std::fs::create_dir_all(&dir).map_err(|e| ProfileError::Io {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    let path: PathBuf = dir.join("rclone.conf");
    std::fs::write(&path, render_rclone_config(options)).map_err(|e| ProfileError::Io {
        path: path.clone(),
        message: e.to_string(),
    })?;
    Ok(path)
}

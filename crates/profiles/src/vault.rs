//! Encrypted storage for remembered logins.
//!
//! The vault file holds a JSON list of [`SavedUser`]s encrypted with
//! AES-256-GCM. The key is derived from an application secret with
//! PBKDF2-HMAC-SHA512 over a random per-write salt; salt and nonce are
//! stored alongside the ciphertext, base64-encoded, so every write produces
//! a fresh key and a fresh nonce.

use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use thiserror::Error;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const PBKDF2_ROUNDS: u32 = 100_000;

/// Errors from vault persistence.
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("No platform config directory available")]
    NoConfigDir,

    #[error("I/O error for {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Vault contents could not be decrypted")]
    Decrypt,

    #[error("Vault contents could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A remembered login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedUser {
    pub username: String,
    pub password: String,
    pub project: String,
    pub auth_url: String,
}

impl SavedUser {
    /// Label shown in account pickers.
    pub fn display(&self) -> String {
        format!("{}@{}", self.username, self.project)
    }

    /// Two saved users are the same account when username and project
    /// match; password and endpoint updates replace the old entry.
    fn same_account(&self, other: &SavedUser) -> bool {
        self.username == other.username && self.project == other.project
    }
}

/// The on-disk vault of saved users.
pub struct UserVault {
    path: PathBuf,
    secret: String,
}

impl UserVault {
    /// Vault at the platform config location
    /// (`<config_dir>/swiftdesk/users.enc`).
    pub fn open_default(secret: impl Into<String>) -> Result<Self, ProfileError> {
        let dir: PathBuf = dirs::config_dir()
            .ok_or(ProfileError::NoConfigDir)?
            .join("swiftdesk");
        Ok(Self::at_path(dir.join("users.enc"), secret))
    }

    /// Vault at an explicit path.
    pub fn at_path(path: impl Into<PathBuf>, secret: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            secret: secret.into(),
        }
    }

    /// Load the saved users.
    ///
    /// A missing, unreadable, or undecryptable vault is treated as empty
    /// with a warning: a corrupt vault must never lock the user out of the
    /// login screen.
    pub fn load(&self) -> Vec<SavedUser> {
        let encoded: String = match std::fs::read_to_string(&self.path) {
            Ok(encoded) => encoded,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                log::warn!("could not read vault {}: {}", self.path.display(), err);
                return Vec::new();
            }
        };
        let plaintext: Vec<u8> = match decrypt(&self.secret, encoded.trim()) {
            Ok(plaintext) => plaintext,
            Err(_) => {
                log::warn!("vault {} could not be decrypted, starting empty", self.path.display());
                return Vec::new();
            }
        };
        match serde_json::from_slice(&plaintext) {
            Ok(users) => users,
            Err(err) => {
                log::warn!("vault {} held invalid data: {}", self.path.display(), err);
                Vec::new()
            }
        }
    }

    /// Replace the vault contents.
    pub fn save(&self, users: &[SavedUser]) -> Result<(), ProfileError> {
        let plaintext: Vec<u8> = serde_json::to_vec(users)?;
        let encoded: String = encrypt(&self.secret, &plaintext);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ProfileError::Io {
                path: parent.to_path_buf(),
                message: e.to_string(),
            })?;
        }
        std::fs::write(&self.path, encoded).map_err(|e| ProfileError::Io {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    /// Add or update one login, de-duplicated by username + project.
    pub fn remember(&self, user: SavedUser) -> Result<Vec<SavedUser>, ProfileError> {
        let mut users: Vec<SavedUser> = self.load();
        users.retain(|existing| !existing.same_account(&user));
        users.push(user);
        self.save(&users)?;
        Ok(users)
    }

    /// Remove one login.
    pub fn forget(&self, username: &str, project: &str) -> Result<Vec<SavedUser>, ProfileError> {
        let mut users: Vec<SavedUser> = self.load();
        users.retain(|u| !(u.username == username && u.project == project));
        self.save(&users)?;
        Ok(users)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn derive_key(secret: &str, salt: &[u8]) -> [u8; KEY_LEN] {
    let mut key: [u8; KEY_LEN] = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha512>(secret.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
    key
}

/// Encrypt to `base64(salt || nonce || ciphertext)`.
fn encrypt(secret: &str, plaintext: &[u8]) -> String {
    let mut salt: [u8; SALT_LEN] = [0u8; SALT_LEN];
    let mut nonce_bytes: [u8; NONCE_LEN] = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let key: [u8; KEY_LEN] = derive_key(secret, &salt);
    let cipher: Aes256Gcm = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    // Encryption with a fresh random nonce cannot fail.
    let ciphertext: Vec<u8> = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .unwrap_or_default();

    let mut blob: Vec<u8> = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    BASE64.encode(blob)
}

fn decrypt(secret: &str, encoded: &str) -> Result<Vec<u8>, ProfileError> {
    let blob: Vec<u8> = BASE64.decode(encoded).map_err(|_| ProfileError::Decrypt)?;
    if blob.len() < SALT_LEN + NONCE_LEN {
        return Err(ProfileError::Decrypt);
    }
    let (salt, rest) = blob.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let key: [u8; KEY_LEN] = derive_key(secret, salt);
    let cipher: Aes256Gcm = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| ProfileError::Decrypt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(name: &str) -> SavedUser {
        SavedUser {
            username: name.to_string(),
            password: "hunter2".to_string(),
            project: "lab".to_string(),
            auth_url: "https://cloud.example.org".to_string(),
        }
    }

    #[test]
    fn test_round_trip() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        let vault: UserVault = UserVault::at_path(dir.path().join("users.enc"), "app-secret");

        vault.save(&[sample_user("alice")]).unwrap();
        let users: Vec<SavedUser> = vault.load();
        assert_eq!(users, vec![sample_user("alice")]);
    }

    #[test]
    fn test_stored_file_is_not_plaintext() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        let vault: UserVault = UserVault::at_path(dir.path().join("users.enc"), "app-secret");
        vault.save(&[sample_user("alice")]).unwrap();

        let raw: String = std::fs::read_to_string(vault.path()).unwrap();
        assert!(!raw.contains("alice"));
        assert!(!raw.contains("hunter2"));
    }

    #[test]
    fn test_missing_vault_is_empty() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        let vault: UserVault = UserVault::at_path(dir.path().join("none.enc"), "s");
        assert!(vault.load().is_empty());
    }

    #[test]
    fn test_corrupt_vault_is_empty_not_fatal() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("users.enc");
        std::fs::write(&path, "definitely not base64 ciphertext %%%").unwrap();

        let vault: UserVault = UserVault::at_path(&path, "s");
        assert!(vault.load().is_empty());
    }

    #[test]
    fn test_wrong_secret_reads_empty() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("users.enc");
        UserVault::at_path(&path, "right").save(&[sample_user("alice")]).unwrap();
        assert!(UserVault::at_path(&path, "wrong").load().is_empty());
    }

    #[test]
    fn test_remember_deduplicates_by_account() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        let vault: UserVault = UserVault::at_path(dir.path().join("users.enc"), "s");

        vault.remember(sample_user("alice")).unwrap();
        vault.remember(sample_user("bob")).unwrap();
        let mut updated: SavedUser = sample_user("alice");
        updated.password = "new-password".to_string();
        let users: Vec<SavedUser> = vault.remember(updated.clone()).unwrap();

        assert_eq!(users.len(), 2);
        assert_eq!(users[1], updated);
        assert_eq!(users[0], sample_user("bob"));
    }

    #[test]
    fn test_forget_removes_only_matching_account() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        let vault: UserVault = UserVault::at_path(dir.path().join("users.enc"), "s");
        vault.remember(sample_user("alice")).unwrap();
        vault.remember(sample_user("bob")).unwrap();

        let users: Vec<SavedUser> = vault.forget("alice", "lab").unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "bob");
    }

    #[test]
    fn test_display_label() {
        assert_eq!(sample_user("alice").display(), "alice@lab");
    }
}

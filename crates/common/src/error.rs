//! Shared error types used across swiftdesk crates.

use thiserror::Error;

/// Object/container naming errors shared across crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameError {
    /// Name collides with a reserved system container.
    #[error("'{name}' is a reserved system container name")]
    ReservedContainer {
        /// The rejected name.
        name: String,
    },

    /// Name collides with an existing container.
    #[error("A container named '{name}' already exists")]
    ContainerExists {
        /// The colliding name.
        name: String,
    },

    /// Name is empty or otherwise unusable as an object/container name.
    #[error("Invalid name: {name:?}")]
    InvalidName {
        /// The invalid name.
        name: String,
    },
}

/// Check a candidate container name against the reserved set.
///
/// # Arguments
/// * `name` - Candidate container name
///
/// # Errors
/// Returns `NameError::ReservedContainer` for reserved names (compared
/// case-insensitively) and `NameError::InvalidName` for empty names.
pub fn validate_container_name(name: &str) -> Result<(), NameError> {
    if name.trim().is_empty() {
        return Err(NameError::InvalidName {
            name: name.to_string(),
        });
    }
    let lower: String = name.to_lowercase();
    if crate::constants::RESERVED_CONTAINERS.contains(&lower.as_str()) {
        return Err(NameError::ReservedContainer {
            name: name.to_string(),
        });
    }
    Ok(())
}

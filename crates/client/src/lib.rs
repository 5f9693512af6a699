//! Swift object storage access for swiftdesk.
//!
//! This crate provides everything that talks HTTP:
//!
//! - **Keystone session** - password authentication against an OpenStack
//!   identity endpoint, producing an immutable [`Session`] (token + storage
//!   URL) shared read-only by every transfer task
//! - **`ObjectStore` trait** - the seam the transfer engine is written
//!   against; [`SwiftClient`] is the reqwest-backed implementation
//! - **Orthanc client** - read-only DICOM source for the bridge feature
//!
//! There is no local caching: every listing is fetched fresh so that changes
//! made outside the client (e.g. through the mounted drive) are always
//! visible.

pub mod auth;
pub mod content_type;
pub mod dicom;
mod error;
mod swift;
mod traits;

pub use auth::{authenticate, AuthEndpoint, Credentials, Session};
pub use content_type::content_type_for;
pub use dicom::{DicomClient, DicomSource, InstanceId, SeriesInfo, StudyId, StudySummary};
pub use error::ClientError;
pub use swift::SwiftClient;
pub use traits::{ContainerEntry, ObjectEntry, ObjectMetadata, ObjectStore};

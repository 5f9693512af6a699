//! Swift object storage client implementation over reqwest.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, Response, StatusCode};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::auth::Session;
use crate::content_type::content_type_for;
use crate::error::ClientError;
use crate::traits::{
    parse_swift_timestamp, ContainerEntry, ObjectEntry, ObjectMetadata, ObjectStore,
};

/// Path segments keep `/` (it separates virtual path components) and the
/// unreserved characters; everything else is percent-encoded.
const PATH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const COPY_FROM_HEADER: &str = "X-Copy-From";

/// ObjectStore implementation for an OpenStack Swift endpoint.
///
/// Every call attaches the session's bearer token. The client holds no
/// mutable state; it is cheap to clone and safe to share across tasks.
#[derive(Clone)]
pub struct SwiftClient {
    http: Client,
    session: Session,
}

impl SwiftClient {
    /// Create a client for an authenticated session.
    pub fn new(session: Session) -> Result<Self, ClientError> {
        let http: Client = Client::builder()
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ClientError::InvalidConfig {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http, session })
    }

    /// Create a client reusing an existing HTTP connection pool (for tests
    /// and for sharing a pool with the DICOM client).
    pub fn with_http(http: Client, session: Session) -> Self {
        Self { http, session }
    }

    /// The session this client was built from.
    pub fn session(&self) -> &Session {
        &self.session
    }

    fn object_url(&self, container: &str, object: &str) -> String {
        format!(
            "{}/{}/{}",
            self.session.storage_url,
            encode_segment(container),
            encode_segment(object)
        )
    }

    fn container_url(&self, container: &str) -> String {
        format!("{}/{}", self.session.storage_url, encode_segment(container))
    }

    fn token(&self) -> &str {
        &self.session.token
    }
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_ENCODE_SET).to_string()
}

/// Map a non-success status to the error taxonomy. 401 stays distinct so
/// token expiry is tellable from a generic failure.
fn status_error(status: StatusCode, url: &str, container: &str, object: &str) -> ClientError {
    match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        StatusCode::NOT_FOUND => ClientError::NotFound {
            container: container.to_string(),
            object: object.to_string(),
        },
        StatusCode::CONFLICT => ClientError::Conflict {
            container: container.to_string(),
            message: "conflict reported by backend".to_string(),
        },
        other => ClientError::UnexpectedStatus {
            status: other.as_u16(),
            url: url.to_string(),
        },
    }
}

#[async_trait]
impl ObjectStore for SwiftClient {
    async fn put_object_from_file(
        &self,
        container: &str,
        object: &str,
        file_path: &Path,
    ) -> Result<(), ClientError> {
        let file: tokio::fs::File = tokio::fs::File::open(file_path)
            .await
            .map_err(|e| ClientError::from_io(file_path.display().to_string(), e))?;

        let url: String = self.object_url(container, object);
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let response: Response = self
            .http
            .put(&url)
            .header(AUTH_TOKEN_HEADER, self.token())
            .header(reqwest::header::CONTENT_TYPE, content_type_for(file_path))
            .body(body)
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => Ok(()),
            status => Err(status_error(status, &url, container, object)),
        }
    }

    async fn put_object(
        &self,
        container: &str,
        object: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), ClientError> {
        let url: String = self.object_url(container, object);
        let content_type: &str =
            content_type.unwrap_or(swiftdesk_common::DEFAULT_CONTENT_TYPE);
        let response: Response = self
            .http
            .put(&url)
            .header(AUTH_TOKEN_HEADER, self.token())
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => Ok(()),
            status => Err(status_error(status, &url, container, object)),
        }
    }

    async fn get_object(&self, container: &str, object: &str) -> Result<Vec<u8>, ClientError> {
        let url: String = self.object_url(container, object);
        let response: Response = self
            .http
            .get(&url)
            .header(AUTH_TOKEN_HEADER, self.token())
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(status_error(response.status(), &url, container, object));
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn get_object_to_file(
        &self,
        container: &str,
        object: &str,
        dest_path: &Path,
    ) -> Result<u64, ClientError> {
        let url: String = self.object_url(container, object);
        let response: Response = self
            .http
            .get(&url)
            .header(AUTH_TOKEN_HEADER, self.token())
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(status_error(response.status(), &url, container, object));
        }

        if let Some(parent) = dest_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ClientError::from_io(parent.display().to_string(), e))?;
        }

        let mut file: tokio::fs::File = tokio::fs::File::create(dest_path)
            .await
            .map_err(|e| ClientError::from_io(dest_path.display().to_string(), e))?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| ClientError::from_io(dest_path.display().to_string(), e))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| ClientError::from_io(dest_path.display().to_string(), e))?;

        Ok(written)
    }

    async fn delete_object(&self, container: &str, object: &str) -> Result<(), ClientError> {
        let url: String = self.object_url(container, object);
        let response: Response = self
            .http
            .delete(&url)
            .header(AUTH_TOKEN_HEADER, self.token())
            .send()
            .await?;

        match response.status() {
            // 404 counts as success: the object is gone either way.
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(()),
            status => Err(status_error(status, &url, container, object)),
        }
    }

    async fn copy_object(
        &self,
        src_container: &str,
        src_object: &str,
        dst_container: &str,
        dst_object: &str,
    ) -> Result<(), ClientError> {
        let url: String = self.object_url(dst_container, dst_object);
        let copy_source: String = format!(
            "/{}/{}",
            encode_segment(src_container),
            encode_segment(src_object)
        );
        let response: Response = self
            .http
            .put(&url)
            .header(AUTH_TOKEN_HEADER, self.token())
            .header(COPY_FROM_HEADER, copy_source)
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => Ok(()),
            status => Err(status_error(status, &url, src_container, src_object)),
        }
    }

    async fn head_object(
        &self,
        container: &str,
        object: &str,
    ) -> Result<Option<ObjectMetadata>, ClientError> {
        let url: String = self.object_url(container, object);
        let response: Response = self
            .http
            .head(&url)
            .header(AUTH_TOKEN_HEADER, self.token())
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => {
                let headers = response.headers();
                let size: u64 = headers
                    .get(reqwest::header::CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
                let etag: Option<String> = headers
                    .get(reqwest::header::ETAG)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.trim_matches('"').to_string());
                let last_modified = headers
                    .get(reqwest::header::LAST_MODIFIED)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| {
                        chrono::DateTime::parse_from_rfc2822(v)
                            .ok()
                            .map(|dt| dt.with_timezone(&chrono::Utc))
                            .or_else(|| parse_swift_timestamp(v))
                    });
                Ok(Some(ObjectMetadata {
                    size,
                    etag,
                    last_modified,
                }))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(status_error(status, &url, container, object)),
        }
    }

    async fn create_container(&self, container: &str) -> Result<(), ClientError> {
        let url: String = self.container_url(container);
        let response: Response = self
            .http
            .put(&url)
            .header(AUTH_TOKEN_HEADER, self.token())
            .body(Vec::new())
            .send()
            .await?;

        match response.status() {
            // 202/204/409 when the container already exists; creation is
            // idempotent from the caller's point of view.
            StatusCode::CREATED
            | StatusCode::ACCEPTED
            | StatusCode::NO_CONTENT
            | StatusCode::CONFLICT => Ok(()),
            status => Err(status_error(status, &url, container, "")),
        }
    }

    async fn delete_container(&self, container: &str) -> Result<(), ClientError> {
        let url: String = self.container_url(container);
        let response: Response = self
            .http
            .delete(&url)
            .header(AUTH_TOKEN_HEADER, self.token())
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(()),
            StatusCode::CONFLICT => Err(ClientError::Conflict {
                container: container.to_string(),
                message: "container still holds objects".to_string(),
            }),
            status => Err(status_error(status, &url, container, "")),
        }
    }

    async fn list_containers(&self) -> Result<Vec<ContainerEntry>, ClientError> {
        let url: String = format!("{}?format=json", self.session.storage_url);
        let response: Response = self
            .http
            .get(&url)
            .header(AUTH_TOKEN_HEADER, self.token())
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            // An account with no containers answers 204 with an empty body.
            StatusCode::NO_CONTENT => Ok(Vec::new()),
            status => Err(status_error(status, &url, "", "")),
        }
    }

    async fn list_objects(&self, container: &str) -> Result<Vec<ObjectEntry>, ClientError> {
        let url: String = format!("{}?format=json", self.container_url(container));
        let response: Response = self
            .http
            .get(&url)
            .header(AUTH_TOKEN_HEADER, self.token())
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::NO_CONTENT => Ok(Vec::new()),
            status => Err(status_error(status, &url, container, "")),
        }
    }
}

//! Read-only client for an Orthanc DICOM server.
//!
//! The bridge feature copies whole studies into object storage. This client
//! only ever reads: study/series metadata and raw instance files. Study
//! listings are paginated client-side because Orthanc returns the full id
//! list in one response.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use swiftdesk_common::{DEFAULT_DICOM_CONCURRENCY, DICOM_PAGE_SIZE};

use crate::error::ClientError;

/// Orthanc identifier of a study.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StudyId(pub String);

/// Orthanc identifier of a single DICOM instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstanceId(pub String);

impl std::fmt::Display for StudyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Study metadata assembled from `MainDicomTags` / `PatientMainDicomTags`.
#[derive(Debug, Clone)]
pub struct StudySummary {
    pub id: StudyId,
    pub patient_name: String,
    pub patient_id: String,
    /// Raw DICOM date (`YYYYMMDD`), empty when the tag is absent.
    pub study_date: String,
    pub description: String,
    /// Orthanc ids of the series belonging to this study.
    pub series: Vec<String>,
}

/// Series metadata: its instances plus a human-readable description.
#[derive(Debug, Clone)]
pub struct SeriesInfo {
    pub id: String,
    pub description: String,
    pub instances: Vec<InstanceId>,
}

#[derive(Deserialize)]
struct StudyResponse {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "MainDicomTags", default)]
    main_tags: StudyTags,
    #[serde(rename = "PatientMainDicomTags", default)]
    patient_tags: PatientTags,
    #[serde(rename = "Series", default)]
    series: Vec<String>,
}

#[derive(Deserialize, Default)]
struct StudyTags {
    #[serde(rename = "StudyDate", default)]
    study_date: String,
    #[serde(rename = "StudyDescription", default)]
    description: String,
}

#[derive(Deserialize, Default)]
struct PatientTags {
    #[serde(rename = "PatientName", default)]
    name: String,
    #[serde(rename = "PatientID", default)]
    id: String,
}

#[derive(Deserialize)]
struct SeriesResponse {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "MainDicomTags", default)]
    main_tags: SeriesTags,
    #[serde(rename = "Instances", default)]
    instances: Vec<InstanceId>,
}

#[derive(Deserialize, Default)]
struct SeriesTags {
    #[serde(rename = "SeriesDescription", default)]
    description: String,
}

/// HTTP client for one Orthanc endpoint.
#[derive(Clone)]
pub struct DicomClient {
    http: Client,
    base_url: String,
}

impl DicomClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http: Client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ClientError::InvalidConfig {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        let mut base_url: String = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self { http, base_url })
    }

    async fn get_checked(&self, url: &str, kind: &str, id: &str) -> Result<Response, ClientError> {
        let response: Response = self.http.get(url).send().await?;
        match response.status() {
            StatusCode::OK => Ok(response),
            StatusCode::NOT_FOUND => Err(ClientError::NotFound {
                container: kind.to_string(),
                object: id.to_string(),
            }),
            status => Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }

    /// All study ids known to the server.
    pub async fn list_study_ids(&self) -> Result<Vec<StudyId>, ClientError> {
        let url: String = format!("{}/studies", self.base_url);
        let response: Response = self.get_checked(&url, "studies", "").await?;
        Ok(response.json().await?)
    }

    /// Metadata for one study.
    pub async fn study(&self, id: &StudyId) -> Result<StudySummary, ClientError> {
        let url: String = format!("{}/studies/{}", self.base_url, id.0);
        let response: Response = self.get_checked(&url, "studies", &id.0).await?;
        let body: StudyResponse = response.json().await?;
        Ok(StudySummary {
            id: StudyId(body.id),
            patient_name: body.patient_tags.name,
            patient_id: body.patient_tags.id,
            study_date: body.main_tags.study_date,
            description: body.main_tags.description,
            series: body.series,
        })
    }

    /// Metadata for one series.
    pub async fn series(&self, id: &str) -> Result<SeriesInfo, ClientError> {
        let url: String = format!("{}/series/{}", self.base_url, id);
        let response: Response = self.get_checked(&url, "series", id).await?;
        let body: SeriesResponse = response.json().await?;
        Ok(SeriesInfo {
            id: body.id,
            description: body.main_tags.description,
            instances: body.instances,
        })
    }

    /// One page of study summaries.
    ///
    /// Orthanc only lists ids; summaries require a metadata request per
    /// study, so the page is fetched with a small bounded fan-out. Order
    /// within the page matches the server's id order.
    pub async fn list_studies(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<StudySummary>, ClientError> {
        let ids: Vec<StudyId> = self.list_study_ids().await?;
        let page: Vec<StudyId> = ids.into_iter().skip(offset).take(limit).collect();

        let summaries: Vec<Result<StudySummary, ClientError>> = stream::iter(page)
            .map(|id| async move { self.study(&id).await })
            .buffered(DEFAULT_DICOM_CONCURRENCY)
            .collect()
            .await;

        summaries.into_iter().collect()
    }

    /// Page `page` (zero-based) of study summaries at the default page
    /// size.
    pub async fn list_studies_page(&self, page: usize) -> Result<Vec<StudySummary>, ClientError> {
        self.list_studies(page_offset(page), DICOM_PAGE_SIZE).await
    }

    /// Every instance id in a study, across all its series.
    pub async fn instance_ids(&self, study: &StudyId) -> Result<Vec<InstanceId>, ClientError> {
        let summary: StudySummary = self.study(study).await?;
        let mut instances: Vec<InstanceId> = Vec::new();
        for series_id in &summary.series {
            let series: SeriesInfo = self.series(series_id).await?;
            instances.extend(series.instances);
        }
        Ok(instances)
    }

    /// Download one instance's DICOM file to a local path.
    pub async fn get_instance_file(
        &self,
        id: &InstanceId,
        dest_path: &Path,
    ) -> Result<u64, ClientError> {
        let url: String = format!("{}/instances/{}/file", self.base_url, id.0);
        let response: Response = self.get_checked(&url, "instances", &id.0).await?;

        if let Some(parent) = dest_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ClientError::from_io(parent.display().to_string(), e))?;
        }
        let mut file: tokio::fs::File = tokio::fs::File::create(dest_path)
            .await
            .map_err(|e| ClientError::from_io(dest_path.display().to_string(), e))?;

        let mut written: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
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
}

fn page_offset(page: usize) -> usize {
    page * DICOM_PAGE_SIZE
}

/// The subset of DICOM operations the bridge feature consumes.
///
/// The seam exists so the bridge can run against an in-memory source in
/// tests; [`DicomClient`] is the HTTP implementation.
#[async_trait]
pub trait DicomSource: Send + Sync {
    async fn study(&self, id: &StudyId) -> Result<StudySummary, ClientError>;

    async fn instance_ids(&self, study: &StudyId) -> Result<Vec<InstanceId>, ClientError>;

    async fn get_instance_file(
        &self,
        id: &InstanceId,
        dest_path: &Path,
    ) -> Result<u64, ClientError>;
}

#[async_trait]
impl DicomSource for DicomClient {
    async fn study(&self, id: &StudyId) -> Result<StudySummary, ClientError> {
        DicomClient::study(self, id).await
    }

    async fn instance_ids(&self, study: &StudyId) -> Result<Vec<InstanceId>, ClientError> {
        DicomClient::instance_ids(self, study).await
    }

    async fn get_instance_file(
        &self,
        id: &InstanceId,
        dest_path: &Path,
    ) -> Result<u64, ClientError> {
        DicomClient::get_instance_file(self, id, dest_path).await
    }
}

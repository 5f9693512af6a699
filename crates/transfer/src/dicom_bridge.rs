//! Bridge: copy an Orthanc study into object storage.
//!
//! Instances are downloaded to a temporary directory first and uploaded as
//! regular files through the standard batch machinery, so the `DICOM`
//! container ends up with ordinary objects named
//! `{patient}.{date}/{instance}.dcm`. Progress spans both phases: the
//! download half maps to 0-50 %, the upload half to 50-100 %.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures::stream::{self, StreamExt};

use swiftdesk_client::{ClientError, DicomSource, InstanceId, ObjectStore, StudyId, StudySummary};
use swiftdesk_common::{progress_fn, ProgressCallback, DEFAULT_DICOM_CONCURRENCY, DICOM_CONTAINER};

use crate::pool::{run_batch, TransferOptions};
use crate::task::{BatchProgress, BatchSummary, TransferError, TransferTask};

/// Which half of the bridge is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgePhase {
    Download,
    Upload,
}

/// Progress of a bridge run, spanning both phases.
#[derive(Debug, Clone)]
pub struct BridgeProgress {
    pub phase: BridgePhase,
    pub completed: u64,
    pub total: u64,
}

impl BridgeProgress {
    /// Overall percentage: downloads cover 0-50, uploads 50-100. An empty
    /// download phase reports 0 (no work has happened yet); an empty upload
    /// phase reports 100 (nothing left to do).
    pub fn percent(&self) -> u8 {
        match (self.phase, self.total) {
            (BridgePhase::Download, 0) => 0,
            (BridgePhase::Download, total) => ((self.completed * 50) / total) as u8,
            (BridgePhase::Upload, 0) => 100,
            (BridgePhase::Upload, total) => (50 + (self.completed * 50) / total) as u8,
        }
    }
}

/// What a bridge run did.
#[derive(Debug, Clone)]
pub struct BridgeReport {
    /// Folder prefix the study landed under.
    pub folder: String,
    /// Instances found in the study.
    pub instances: usize,
    /// Instances that failed to download and were not uploaded.
    pub download_errors: Vec<TransferError>,
    /// Summary of the upload batch.
    pub upload: BatchSummary,
}

/// Folder name for a bridged study: `{patient}.{date}`.
///
/// The patient name is sanitized to `[A-Za-z0-9_-]`, the date reduced to
/// its digits and capped at 8 (DICOM `YYYYMMDD`).
pub fn study_folder_name(patient_name: &str, study_date: &str) -> String {
    let mut patient: String = patient_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if patient.is_empty() {
        patient.push_str("unknown");
    }
    let date: String = study_date
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(8)
        .collect();
    if date.is_empty() {
        patient
    } else {
        format!("{patient}.{date}")
    }
}

/// Copy one study into the `DICOM` container.
///
/// Downloads run with the DICOM fan-out bound (4), uploads with the batch
/// options. A download failure skips that instance but never aborts the
/// run; the callback returning `false` cancels both remaining downloads
/// and the upload batch. Temporary files are removed when the run returns.
pub async fn bridge_study(
    store: &dyn ObjectStore,
    source: &dyn DicomSource,
    study_id: &StudyId,
    options: &TransferOptions,
    progress: &dyn ProgressCallback<BridgeProgress>,
) -> Result<BridgeReport, ClientError> {
    let summary: StudySummary = source.study(study_id).await?;
    let folder: String = study_folder_name(&summary.patient_name, &summary.study_date);
    let instances: Vec<InstanceId> = source.instance_ids(study_id).await?;

    store.create_container(DICOM_CONTAINER).await?;

    let temp: tempfile::TempDir = tempfile::tempdir().map_err(|e| ClientError::Io {
        path: "tempdir".to_string(),
        message: e.to_string(),
    })?;

    let total: u64 = instances.len() as u64;
    let cancelled: AtomicBool = AtomicBool::new(false);
    let done: AtomicU64 = AtomicU64::new(0);

    let downloads: Vec<(InstanceId, PathBuf, Option<Result<u64, ClientError>>)> =
        stream::iter(instances)
            .map(|id: InstanceId| {
                let dest: PathBuf = temp.path().join(format!("{id}.dcm"));
                let cancelled: &AtomicBool = &cancelled;
                async move {
                    if cancelled.load(Ordering::SeqCst) {
                        return (id, dest, None);
                    }
                    let result: Result<u64, ClientError> =
                        source.get_instance_file(&id, &dest).await;
                    (id, dest, Some(result))
                }
            })
            .buffer_unordered(DEFAULT_DICOM_CONCURRENCY)
            .map(|item| {
                let completed: u64 = done.fetch_add(1, Ordering::SeqCst) + 1;
                let tick: BridgeProgress = BridgeProgress {
                    phase: BridgePhase::Download,
                    completed,
                    total,
                };
                if !progress.on_progress(&tick) {
                    cancelled.store(true, Ordering::SeqCst);
                }
                item
            })
            .collect()
            .await;

    let mut download_errors: Vec<TransferError> = Vec::new();
    let mut tasks: Vec<TransferTask> = Vec::new();
    let instance_count: usize = downloads.len();
    for (id, dest, result) in downloads {
        match result {
            Some(Ok(_)) => {
                tasks.push(TransferTask::upload(
                    DICOM_CONTAINER,
                    format!("{folder}/{id}.dcm"),
                    dest,
                ));
            }
            Some(Err(err)) => {
                log::warn!("instance {id} download failed: {err}");
                download_errors.push(TransferError {
                    container: DICOM_CONTAINER.to_string(),
                    object: id.to_string(),
                    message: err.to_string(),
                    retryable: err.is_retryable(),
                });
            }
            None => {}
        }
    }

    let upload_total: u64 = tasks.len() as u64;
    let upload_progress = progress_fn(move |p: &BatchProgress| {
        progress.on_progress(&BridgeProgress {
            phase: BridgePhase::Upload,
            completed: p.completed,
            total: upload_total,
        })
    });
    let upload: BatchSummary = if cancelled.load(Ordering::SeqCst) {
        BatchSummary::default()
    } else {
        run_batch(store, tasks, options, &upload_progress).await
    };

    Ok(BridgeReport {
        folder,
        instances: instance_count,
        download_errors,
        upload,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use swiftdesk_common::NoOpProgress;

    use super::*;
    use crate::testing::MockStore;

    struct MockDicom {
        summary: StudySummary,
        /// instance id -> file bytes; missing means download failure.
        instances: HashMap<String, Option<Vec<u8>>>,
        order: Vec<String>,
        fetches: Mutex<Vec<String>>,
    }

    impl MockDicom {
        fn new(patient: &str, date: &str, instances: &[(&str, Option<&[u8]>)]) -> Self {
            Self {
                summary: StudySummary {
                    id: StudyId("study-1".to_string()),
                    patient_name: patient.to_string(),
                    patient_id: "P001".to_string(),
                    study_date: date.to_string(),
                    description: String::new(),
                    series: vec!["se1".to_string()],
                },
                instances: instances
                    .iter()
                    .map(|(id, data)| (id.to_string(), data.map(|d| d.to_vec())))
                    .collect(),
                order: instances.iter().map(|(id, _)| id.to_string()).collect(),
                fetches: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DicomSource for MockDicom {
        async fn study(&self, _id: &StudyId) -> Result<StudySummary, ClientError> {
            Ok(self.summary.clone())
        }

        async fn instance_ids(&self, _study: &StudyId) -> Result<Vec<InstanceId>, ClientError> {
            Ok(self.order.iter().cloned().map(InstanceId).collect())
        }

        async fn get_instance_file(
            &self,
            id: &InstanceId,
            dest_path: &Path,
        ) -> Result<u64, ClientError> {
            self.fetches.lock().unwrap().push(id.to_string());
            match self.instances.get(&id.0) {
                Some(Some(data)) => {
                    std::fs::write(dest_path, data).map_err(|e| ClientError::Io {
                        path: dest_path.display().to_string(),
                        message: e.to_string(),
                    })?;
                    Ok(data.len() as u64)
                }
                _ => Err(ClientError::NotFound {
                    container: "instances".to_string(),
                    object: id.to_string(),
                }),
            }
        }
    }

    #[test]
    fn test_study_folder_name_sanitizes() {
        assert_eq!(study_folder_name("DOE^JANE", "20240501"), "DOE_JANE.20240501");
        assert_eq!(study_folder_name("", "20240501"), "unknown.20240501");
        assert_eq!(study_folder_name("Smith", ""), "Smith");
        // Date keeps digits only, capped at eight.
        assert_eq!(study_folder_name("A", "2024-05-01extra"), "A.20240501");
    }

    #[test]
    fn test_bridge_progress_percent_spans_phases() {
        let download: BridgeProgress = BridgeProgress {
            phase: BridgePhase::Download,
            completed: 2,
            total: 4,
        };
        assert_eq!(download.percent(), 25);
        let upload: BridgeProgress = BridgeProgress {
            phase: BridgePhase::Upload,
            completed: 4,
            total: 4,
        };
        assert_eq!(upload.percent(), 100);
    }

    #[test]
    fn test_empty_phases_report_idle_and_done() {
        let empty_download: BridgeProgress = BridgeProgress {
            phase: BridgePhase::Download,
            completed: 0,
            total: 0,
        };
        assert_eq!(empty_download.percent(), 0);
        let empty_upload: BridgeProgress = BridgeProgress {
            phase: BridgePhase::Upload,
            completed: 0,
            total: 0,
        };
        assert_eq!(empty_upload.percent(), 100);
    }

    #[tokio::test]
    async fn test_bridge_uploads_all_instances() {
        let dicom: MockDicom = MockDicom::new(
            "DOE^JANE",
            "20240501",
            &[("i1", Some(b"one".as_slice())), ("i2", Some(b"twos".as_slice()))],
        );
        let store: MockStore = MockStore::new();

        let report: BridgeReport = bridge_study(
            &store,
            &dicom,
            &StudyId("study-1".to_string()),
            &TransferOptions::default(),
            &NoOpProgress,
        )
        .await
        .unwrap();

        assert_eq!(report.folder, "DOE_JANE.20240501");
        assert_eq!(report.instances, 2);
        assert!(report.download_errors.is_empty());
        assert!(report.upload.succeeded());
        assert_eq!(report.upload.bytes_transferred, 7);

        let mut names: Vec<String> = store.object_names("DICOM");
        names.sort();
        assert_eq!(
            names,
            vec!["DOE_JANE.20240501/i1.dcm", "DOE_JANE.20240501/i2.dcm"]
        );
    }

    #[tokio::test]
    async fn test_bridge_skips_failed_downloads() {
        let dicom: MockDicom = MockDicom::new(
            "Smith",
            "20240101",
            &[("ok", Some(b"data".as_slice())), ("broken", None)],
        );
        let store: MockStore = MockStore::new();

        let report: BridgeReport = bridge_study(
            &store,
            &dicom,
            &StudyId("study-1".to_string()),
            &TransferOptions::default(),
            &NoOpProgress,
        )
        .await
        .unwrap();

        assert_eq!(report.download_errors.len(), 1);
        assert_eq!(report.download_errors[0].object, "broken");
        assert_eq!(report.upload.total, 1);
        assert!(report.upload.succeeded());
        assert_eq!(store.object_names("DICOM"), vec!["Smith.20240101/ok.dcm"]);
    }

    #[tokio::test]
    async fn test_bridge_cancel_during_download_skips_upload() {
        let dicom: MockDicom = MockDicom::new(
            "A",
            "20240101",
            &[
                ("i1", Some(b"x".as_slice())),
                ("i2", Some(b"x".as_slice())),
                ("i3", Some(b"x".as_slice())),
            ],
        );
        let store: MockStore = MockStore::new();
        let cancel_immediately = progress_fn(|_: &BridgeProgress| false);

        let report: BridgeReport = bridge_study(
            &store,
            &dicom,
            &StudyId("study-1".to_string()),
            &TransferOptions::default(),
            &cancel_immediately,
        )
        .await
        .unwrap();

        assert_eq!(report.upload.total, 0);
        assert!(store.object_names("DICOM").is_empty());
    }
}

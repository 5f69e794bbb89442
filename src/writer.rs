use std::fs;
use std::path::PathBuf;

use log::{error, info};

use crate::record::CanonicalRecord;
use crate::store::ClubStore;

/// Outcome of one batch submission. Success or failure is reported at this
/// granularity, never per record.
#[derive(Debug)]
pub struct BatchResult {
    /// Index of the batch's first record within the input sequence.
    pub first: usize,
    pub size: usize,
    pub error: Option<String>,
    /// Where the failed batch's payload was kept, if it failed.
    pub artifact: Option<PathBuf>,
}

impl BatchResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

pub struct BatchWriter {
    batch_size: usize,
    artifact_dir: PathBuf,
}

impl BatchWriter {
    pub fn new(batch_size: usize, artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            batch_size: batch_size.max(1),
            artifact_dir: artifact_dir.into(),
        }
    }

    /// Write `records` in contiguous batches of at most `batch_size`. A
    /// failed batch is kept on disk for inspection and replay, and the loop
    /// moves on; one bad batch must not block the ones after it.
    pub async fn write_all<S: ClubStore + ?Sized>(
        &self,
        records: &[CanonicalRecord],
        store: &S,
    ) -> Vec<BatchResult> {
        let mut results = Vec::new();
        for (index, batch) in records.chunks(self.batch_size).enumerate() {
            let first = index * self.batch_size;
            let last = first + batch.len();
            match store.insert_clubs(batch).await {
                Ok(()) => {
                    info!("batch {first}-{last} committed ({} clubs)", batch.len());
                    results.push(BatchResult {
                        first,
                        size: batch.len(),
                        error: None,
                        artifact: None,
                    });
                }
                Err(e) => {
                    error!("batch {first}-{last} failed: {e:#}");
                    results.push(BatchResult {
                        first,
                        size: batch.len(),
                        error: Some(format!("{e:#}")),
                        artifact: self.preserve(first, last, batch),
                    });
                }
            }
        }
        results
    }

    fn preserve(&self, first: usize, last: usize, batch: &[CanonicalRecord]) -> Option<PathBuf> {
        let path = self
            .artifact_dir
            .join(format!("failed_batch_{first}_{last}.json"));
        let payload = match serde_json::to_string_pretty(batch) {
            Ok(payload) => payload,
            Err(e) => {
                error!("could not serialize failed batch {first}-{last}: {e}");
                return None;
            }
        };
        if let Err(e) = fs::create_dir_all(&self.artifact_dir) {
            error!("could not create artifact dir: {e}");
            return None;
        }
        match fs::write(&path, payload) {
            Ok(()) => {
                info!("kept failed batch at {}", path.display());
                Some(path)
            }
            Err(e) => {
                error!("could not keep failed batch {first}-{last}: {e}");
                None
            }
        }
    }
}

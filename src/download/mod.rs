pub mod pdf_merge;

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::scraping::http_client::HttpExecutor;
use crate::scraping::models::{QueryContext, Record};

// ============================================================================
// DOWNLOAD SERVICE
// ============================================================================

/// Fetches one PDF per record and persists it under the run's output
/// directory. Download failures are per-record: a bad status or a non-PDF
/// response is logged and skipped without touching the rest of the batch.
pub struct DownloadService<'a> {
    executor: &'a HttpExecutor,
    pdf_url: &'a str,
}

impl<'a> DownloadService<'a> {
    pub fn new(executor: &'a HttpExecutor, pdf_url: &'a str) -> Self {
        Self { executor, pdf_url }
    }

    /// Returns the number of files written.
    pub async fn download_all(
        &self,
        records: &[Record],
        query: &QueryContext,
        out_dir: &Path,
    ) -> usize {
        let mut downloaded = 0;
        for record in records {
            if self.download_record(record, query, out_dir).await {
                downloaded += 1;
            }
        }
        downloaded
    }

    async fn download_record(
        &self,
        record: &Record,
        query: &QueryContext,
        out_dir: &Path,
    ) -> bool {
        let response = match self
            .executor
            .get(self.pdf_url, &query.pdf_query(&record.itu))
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!("Failed to download {}: {}", record.itu, err);
                return false;
            }
        };

        if !is_pdf_response(&response) {
            warn!("Unexpected content type for {}", record.itu);
            return false;
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("Failed to read PDF body for {}: {}", record.itu, err);
                return false;
            }
        };

        let path = record_path(out_dir, record);
        match tokio::fs::write(&path, &bytes).await {
            Ok(()) => {
                info!("Downloaded: {}", path.display());
                true
            }
            Err(err) => {
                warn!("Failed to write {}: {}", path.display(), err);
                false
            }
        }
    }
}

fn is_pdf_response(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains("application/pdf"))
        .unwrap_or(false)
}

pub fn record_path(out_dir: &Path, record: &Record) -> PathBuf {
    out_dir.join(format!("{}.pdf", record.itu))
}

// ============================================================================
// MERGE & CLEANUP
// ============================================================================

/// Merges every per-record file that exists on disk, in ascending record
/// date order, into one `merged_invoices_<timestamp>.pdf`. Only the files
/// actually merged are deleted afterwards; any merge-stage error keeps the
/// individual files untouched.
pub fn assemble_merged(
    records: &[Record],
    out_dir: &Path,
    timestamp: &str,
) -> Option<(PathBuf, usize)> {
    let mut sorted: Vec<&Record> = records.iter().collect();
    sorted.sort_by_key(|record| record.date);

    let inputs: Vec<PathBuf> = sorted
        .iter()
        .map(|record| record_path(out_dir, record))
        .filter(|path| path.exists())
        .collect();
    if inputs.is_empty() {
        return None;
    }

    let output = out_dir.join(format!("merged_invoices_{timestamp}.pdf"));
    match pdf_merge::merge_documents(&inputs, &output) {
        Ok(merged) => {
            for path in &inputs {
                if let Err(err) = std::fs::remove_file(path) {
                    warn!("Could not remove merged input {}: {}", path.display(), err);
                }
            }
            info!("Merged {} files into {}", merged, output.display());
            Some((output, merged))
        }
        Err(err) => {
            warn!("Merge failed, keeping individual files: {}", err);
            None
        }
    }
}

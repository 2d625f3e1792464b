use anyhow::{Context, Result};
use chrono::Local;
use std::path::PathBuf;
use tracing::info;

pub mod cli;
pub mod config;
pub mod download;
pub mod scraping;

use config::{build_client, PortalConfig, RetryPolicy};
use download::{assemble_merged, DownloadService};
use scraping::form_state::{extract_session_state, FieldSet};
use scraping::http_client::HttpExecutor;
use scraping::models::{QueryContext, RunSummary, SessionState, TargetPeriod};
use scraping::paginator::{NextLinkDiscovery, PaginationWalker};

/// Everything one run needs: the target period, the portal endpoints and
/// the pacing policy. Built from the CLI in `main`, or directly in tests.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub rfc_rec: String,
    pub month: u32,
    pub year: i32,
    pub out_parent: PathBuf,
    pub field_set: FieldSet,
    pub next_link: NextLinkDiscovery,
    pub portal: PortalConfig,
    pub policy: RetryPolicy,
}

/// One full run: bootstrap the session, walk the listing pages, download
/// the in-range documents and assemble the merged artifact.
///
/// Bootstrap failures abort immediately; page-local and record-local
/// failures degrade as described on each component.
pub async fn run(options: RunOptions) -> Result<RunSummary> {
    let target = TargetPeriod::new(options.month, options.year)
        .context("invalid target month/year combination")?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let out_dir = options.out_parent.join(format!("Invoices_{timestamp}"));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("could not create output directory {}", out_dir.display()))?;

    let client = build_client(&options.portal, &options.policy)
        .context("could not build the HTTP client")?;
    let listing_executor = HttpExecutor::new(client.clone())
        .with_max_attempts(options.policy.max_attempts)
        .with_retry_delay(options.policy.listing_retry_delay);
    let document_executor = HttpExecutor::new(client)
        .with_max_attempts(options.policy.max_attempts)
        .with_retry_delay(options.policy.document_retry_delay);

    let query = QueryContext::new(options.rfc_rec.clone(), &options.portal);

    let initial = bootstrap_session(
        &listing_executor,
        &options.portal.listing_url,
        &query,
        options.field_set,
    )
    .await?;

    let walker = PaginationWalker::new(&listing_executor, &options.portal.listing_url, target)
        .with_field_set(options.field_set)
        .with_next_link(options.next_link.clone())
        .with_page_cooldown(options.policy.page_cooldown);
    let records = walker.walk(&query, initial).await?;

    info!("Found {} matching records", records.len());
    let mut summary = RunSummary {
        records_found: records.len(),
        ..Default::default()
    };
    if records.is_empty() {
        return Ok(summary);
    }

    let downloader = DownloadService::new(&document_executor, &options.portal.pdf_url);
    summary.files_downloaded = downloader.download_all(&records, &query, &out_dir).await;
    info!(
        "Successfully downloaded {}/{} files",
        summary.files_downloaded,
        records.len()
    );

    if summary.files_downloaded > 0 {
        if let Some((artifact, merged)) = assemble_merged(&records, &out_dir, &timestamp) {
            summary.files_merged = merged;
            info!("Merged artifact: {}", artifact.display());
        }
    }

    info!("All files saved in: {}", out_dir.display());
    Ok(summary)
}

/// Initial GET against the listing endpoint plus the first field
/// extraction. No further progress is possible if this fails, so errors
/// here are terminal.
async fn bootstrap_session(
    executor: &HttpExecutor,
    listing_url: &str,
    query: &QueryContext,
    field_set: FieldSet,
) -> Result<SessionState> {
    let response = executor
        .get(listing_url, &query.bootstrap_query())
        .await
        .context("session bootstrap request failed")?;
    let body = response
        .text()
        .await
        .context("could not read the bootstrap page")?;
    let state = extract_session_state(&body, field_set)
        .context("bootstrap page is missing session fields")?;
    Ok(state)
}

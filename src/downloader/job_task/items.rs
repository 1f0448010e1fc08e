//! Work items: resolving a request into URLs and downloading them in order.

use futures::FutureExt;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::path::Path;

use crate::extractor::{DownloadRequest, ExtractorError, MediaMetadata, OutputFile};
use crate::types::{
    DownloadOptions, Event, FailureKind, ItemResult, ItemStatus, JobFailure, JobRequest,
};

use super::JobOutcome;
use super::context::JobTaskContext;

/// One URL to download within a job
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct WorkItem {
    /// Request position, or playlist entry index for playlists
    pub(super) index: usize,
    pub(super) url: String,
    pub(super) title: Option<String>,
    pub(super) options: DownloadOptions,
}

impl WorkItem {
    fn new(index: usize, url: impl Into<String>, options: DownloadOptions) -> Self {
        Self {
            index,
            url: url.into(),
            title: None,
            options,
        }
    }
}

/// Turn the job's request into work items
///
/// Playlists are expanded through the collaborator's metadata lookup.
pub(super) async fn resolve_items(ctx: &JobTaskContext) -> Result<Vec<WorkItem>, JobOutcome> {
    match &ctx.request {
        JobRequest::Single { url, options } => Ok(vec![WorkItem::new(0, url.trim(), options.clone())]),
        JobRequest::Batch { urls, options, .. } => Ok(urls
            .iter()
            .enumerate()
            .map(|(i, url)| WorkItem::new(i, url.trim(), options.clone()))
            .collect()),
        JobRequest::Platform {
            platform,
            items,
            options,
            ..
        } => Ok(items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let options = DownloadOptions {
                    content: Some(item.content),
                    ..options.clone()
                };
                WorkItem::new(i, platform.resolve_url(&item.target, item.content), options)
            })
            .collect()),
        JobRequest::PlaylistAll { url, options } => {
            let metadata = fetch_playlist(ctx, url).await?;
            let limit = ctx.config.download.max_playlist_items.unwrap_or(usize::MAX);
            let items: Vec<WorkItem> = metadata
                .entries
                .into_iter()
                .take(limit)
                .enumerate()
                .map(|(i, entry)| WorkItem {
                    title: entry.title,
                    ..WorkItem::new(i, entry.url, options.clone())
                })
                .collect();
            non_empty(items)
        }
        JobRequest::PlaylistSelect {
            url,
            indices,
            options,
        } => {
            let metadata = fetch_playlist(ctx, url).await?;
            let limit = ctx.config.download.max_playlist_items.unwrap_or(usize::MAX);
            let selected: BTreeSet<usize> = indices
                .iter()
                .copied()
                .filter(|&i| i < metadata.entries.len())
                .collect();
            let items: Vec<WorkItem> = selected
                .into_iter()
                .take(limit)
                .map(|i| {
                    let entry = &metadata.entries[i];
                    WorkItem {
                        title: entry.title.clone(),
                        ..WorkItem::new(i, entry.url.clone(), options.clone())
                    }
                })
                .collect();
            if items.len() < indices.len() {
                tracing::debug!(
                    job_id = %ctx.id,
                    requested = indices.len(),
                    available = metadata.entries.len(),
                    "dropped unavailable playlist indices"
                );
            }
            non_empty(items)
        }
    }
}

fn non_empty(items: Vec<WorkItem>) -> Result<Vec<WorkItem>, JobOutcome> {
    if items.is_empty() {
        Err(JobOutcome::Failed(JobFailure::new(
            FailureKind::NotFound,
            "playlist has no matching entries",
        )))
    } else {
        Ok(items)
    }
}

async fn fetch_playlist(ctx: &JobTaskContext, url: &str) -> Result<MediaMetadata, JobOutcome> {
    let result = AssertUnwindSafe(ctx.extractor.fetch_metadata(url.trim()))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err(ExtractorError::internal("collaborator panicked")));

    if ctx.is_cancelled() {
        return Err(JobOutcome::Cancelled);
    }
    match result {
        Ok(metadata) => {
            if let Err(e) = ctx.registry.set_title(ctx.id, metadata.title.clone()) {
                tracing::error!(job_id = %ctx.id, error = %e, "failed to record playlist title");
            }
            tracing::debug!(
                job_id = %ctx.id,
                entries = metadata.entries.len(),
                "playlist metadata fetched"
            );
            Ok(metadata)
        }
        Err(e) if e.kind == FailureKind::Cancelled => Err(JobOutcome::Cancelled),
        Err(e) => {
            tracing::warn!(job_id = %ctx.id, error = %e, "playlist lookup failed");
            Err(JobOutcome::Failed(e.into()))
        }
    }
}

/// Download items in index order
///
/// The cancellation flag is checked before every item and inside the
/// progress callback. Without `continue_on_error` the first failure aborts
/// the remaining items; otherwise every item is attempted and the job
/// completes if any item produced output.
pub(super) async fn run_items(
    ctx: &JobTaskContext,
    items: Vec<WorkItem>,
    work_dir: &Path,
) -> JobOutcome {
    let total = items.len();
    let multi = ctx.request.is_multi_item();
    let continue_on_error = ctx.request.continue_on_error();

    let mut artifacts = Vec::new();
    let mut first_error: Option<JobFailure> = None;
    let mut seq = 0;

    for (position, item) in items.into_iter().enumerate() {
        if ctx.is_cancelled() {
            return JobOutcome::Cancelled;
        }

        let result = match download_item(ctx, position, total, &item, work_dir).await {
            Ok(files) if files.is_empty() => Err(ExtractorError::not_found("no media produced")),
            other => other,
        };

        match result {
            Ok(files) => {
                let mut produced = Vec::with_capacity(files.len());
                for file in &files {
                    seq += 1;
                    let output = OutputFile {
                        path: file.path.clone(),
                        title: file.title.clone().or_else(|| item.title.clone()),
                    };
                    match ctx
                        .artifacts
                        .adopt(ctx.id, seq, multi.then_some(item.index), &output)
                        .await
                    {
                        Ok(artifact) => produced.push(artifact),
                        Err(e) => {
                            tracing::error!(job_id = %ctx.id, error = %e, "failed to register artifact");
                            return JobOutcome::Failed(JobFailure::new(
                                e.failure_kind(),
                                format!("failed to register artifact: {e}"),
                            ));
                        }
                    }
                }

                if !multi
                    && let Some(title) = produced.iter().find_map(|a| a.title.clone())
                    && let Err(e) = ctx.registry.set_title(ctx.id, Some(title))
                {
                    tracing::error!(job_id = %ctx.id, error = %e, "failed to record title");
                }
                if multi {
                    record_item(
                        ctx,
                        ItemResult {
                            index: item.index,
                            url: item.url.clone(),
                            title: produced
                                .iter()
                                .find_map(|a| a.title.clone())
                                .or(item.title.clone()),
                            status: ItemStatus::Succeeded,
                            error: None,
                            files: produced.iter().map(|a| a.filename.clone()).collect(),
                        },
                    );
                }
                artifacts.extend(produced);
            }
            Err(e) if e.kind == FailureKind::Cancelled => return JobOutcome::Cancelled,
            Err(e) => {
                if ctx.is_cancelled() {
                    return JobOutcome::Cancelled;
                }
                tracing::warn!(
                    job_id = %ctx.id,
                    item = item.index,
                    url = %item.url,
                    error = %e,
                    "item failed"
                );
                let failure = JobFailure::from(e);
                if multi {
                    record_item(
                        ctx,
                        ItemResult {
                            index: item.index,
                            url: item.url.clone(),
                            title: item.title.clone(),
                            status: ItemStatus::Failed,
                            error: Some(failure.clone()),
                            files: Vec::new(),
                        },
                    );
                }
                if !continue_on_error {
                    return JobOutcome::Failed(failure);
                }
                first_error.get_or_insert(failure);
            }
        }

        ctx.publish_progress(((position + 1) * 100 / total) as u8);
    }

    if artifacts.is_empty() {
        JobOutcome::Failed(first_error.unwrap_or_else(|| {
            JobFailure::new(FailureKind::NotFound, "no media produced")
        }))
    } else {
        JobOutcome::Completed(artifacts)
    }
}

async fn download_item(
    ctx: &JobTaskContext,
    position: usize,
    total: usize,
    item: &WorkItem,
    work_dir: &Path,
) -> Result<Vec<OutputFile>, ExtractorError> {
    let item_dir = work_dir.join(format!("item-{position}"));
    tokio::fs::create_dir_all(&item_dir).await?;

    let request = DownloadRequest {
        url: item.url.clone(),
        format: item.options.format_selector(),
        options: item.options.clone(),
        work_dir: item_dir,
    };
    let progress = ctx.progress_handle(position, total);

    tracing::debug!(
        job_id = %ctx.id,
        item = item.index,
        url = %item.url,
        format = %request.format,
        "downloading item"
    );
    AssertUnwindSafe(ctx.extractor.download(&request, &progress))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err(ExtractorError::internal("collaborator panicked")))
}

fn record_item(ctx: &JobTaskContext, item: ItemResult) {
    let event = Event::ItemFinished {
        id: ctx.id,
        index: item.index,
        status: item.status,
    };
    if let Err(e) = ctx.registry.record_item(ctx.id, item) {
        tracing::error!(job_id = %ctx.id, error = %e, "failed to record item result");
    }
    ctx.emit(event);
}

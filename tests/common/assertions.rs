//! Custom test assertions for integration tests

use media_dl::{JobId, JobSnapshot, MediaDownloader, Status};
use std::time::Duration;

/// Poll a job until it reaches a terminal status
///
/// Returns `None` on timeout.
pub async fn wait_for_terminal(
    downloader: &MediaDownloader,
    id: JobId,
    timeout: Duration,
) -> Option<JobSnapshot> {
    tokio::time::timeout(timeout, async {
        loop {
            let job = downloader.get_status(id).ok()?;
            if job.status.is_terminal() {
                return Some(job);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .ok()
    .flatten()
}

/// Assert the job completed and return its snapshot
pub async fn assert_completes(
    downloader: &MediaDownloader,
    id: JobId,
    timeout: Duration,
) -> JobSnapshot {
    let job = wait_for_terminal(downloader, id, timeout)
        .await
        .unwrap_or_else(|| panic!("job {id} did not finish within {timeout:?}"));
    assert_eq!(
        job.status,
        Status::Completed,
        "job {id} ended {} with {:?}",
        job.status,
        job.error
    );
    job
}

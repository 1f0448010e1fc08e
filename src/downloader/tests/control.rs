use super::*;
use crate::types::{Event, JobId};
use tokio::io::AsyncReadExt;

#[tokio::test]
async fn unknown_job_is_not_found() {
    let (downloader, _extractor, _temp_dir) = create_test_downloader().await;
    let missing = JobId::new();

    assert!(matches!(
        downloader.get_status(missing),
        Err(Error::Job(JobError::NotFound { .. }))
    ));
    assert!(matches!(
        downloader.cancel(missing).await,
        Err(Error::Job(JobError::NotFound { .. }))
    ));
}

#[tokio::test]
async fn cancel_pending_job_goes_straight_to_cancelled() {
    let (downloader, _extractor, _temp_dir) = create_test_downloader().await;
    let id = downloader.submit("client", single(1)).await.unwrap();
    let mut events = downloader.subscribe();

    let outcome = downloader.cancel(id).await.unwrap();

    assert_eq!(outcome, CancelOutcome::Cancelled);
    let job = downloader.get_status(id).unwrap();
    assert_eq!(job.status, Status::Cancelled);
    assert!(job.started_at.is_none());
    assert_eq!(downloader.queue_len().await, 0);
    assert!(matches!(
        events.recv().await.unwrap(),
        Event::Cancelled { id: event_id } if event_id == id
    ));
}

#[tokio::test]
async fn terminal_jobs_are_not_cancelable() {
    let (downloader, _extractor, _temp_dir) = create_test_downloader().await;
    let _tasks = downloader.start();
    let id = downloader.submit("client", single(1)).await.unwrap();
    wait_for_terminal(&downloader, id).await;

    let result = downloader.cancel(id).await;
    assert!(matches!(
        result,
        Err(Error::Job(JobError::NotCancelable {
            status: Status::Completed,
            ..
        }))
    ));

    let cancelled = downloader.submit("client", single(2)).await;
    let cancelled = cancelled.unwrap();
    downloader.cancel(cancelled).await.ok();
    wait_for_terminal(&downloader, cancelled).await;
    assert!(matches!(
        downloader.cancel(cancelled).await,
        Err(Error::Job(JobError::NotCancelable { .. }))
    ));
}

#[tokio::test]
async fn list_jobs_filters_and_pages_newest_first() {
    let (downloader, _extractor, _temp_dir) = create_test_downloader().await;
    let mut ids = Vec::new();
    for n in 0..4 {
        ids.push(downloader.submit("client", single(n)).await.unwrap());
    }
    let batch = downloader
        .submit(
            "client",
            JobRequest::batch(vec![url(8), url(9)], DownloadOptions::default(), true),
        )
        .await
        .unwrap();
    downloader.cancel(ids[0]).await.unwrap();

    let page = downloader.list_jobs(&JobFilter {
        limit: 2,
        ..JobFilter::default()
    });
    assert_eq!(page.total, 5);
    assert_eq!(page.jobs.len(), 2);
    assert_eq!(page.jobs[0].id, batch);
    assert_eq!(page.jobs[1].id, ids[3]);

    let page = downloader.list_jobs(&JobFilter {
        status: Some(Status::Cancelled),
        ..JobFilter::default()
    });
    assert_eq!(page.total, 1);
    assert_eq!(page.jobs[0].id, ids[0]);

    let page = downloader.list_jobs(&JobFilter {
        kind: Some(JobKind::Batch),
        ..JobFilter::default()
    });
    assert_eq!(page.jobs.iter().map(|j| j.id).collect::<Vec<_>>(), vec![batch]);
}

#[tokio::test]
async fn artifact_streams_file_contents() {
    let (downloader, _extractor, _temp_dir) = create_test_downloader().await;
    let _tasks = downloader.start();
    let id = downloader.submit("client", single(1)).await.unwrap();
    let job = wait_for_terminal(&downloader, id).await;
    let filename = job.artifacts[0].filename.clone();

    let mut stream = downloader.get_artifact(&filename).await.unwrap();
    let mut body = String::new();
    stream.file.read_to_string(&mut body).await.unwrap();

    assert_eq!(body, format!("{}#0", url(1)));
    assert_eq!(stream.content_type, "video/mp4");
    assert_eq!(stream.artifact.job_id, id);
    assert_eq!(stream.artifact.size_bytes, body.len() as u64);
}

#[tokio::test]
async fn missing_or_malformed_artifacts_are_not_found() {
    let (downloader, _extractor, _temp_dir) = create_test_downloader().await;

    for name in ["nope.mp4", "../secret", "a/b.mp4", ""] {
        assert!(
            matches!(
                downloader.get_artifact(name).await,
                Err(Error::Artifact(ArtifactError::NotFound { .. }))
            ),
            "{name} should be not found"
        );
    }
}

#[tokio::test]
async fn stats_reflect_engine_state() {
    let (downloader, extractor, _temp_dir) =
        create_test_downloader_with(|c| c.download.max_concurrent_jobs = 4).await;
    extractor.script(&url(2), Script::Gated { title: "slow" });
    let _tasks = downloader.start();

    let done = downloader.submit("client", single(1)).await.unwrap();
    wait_for_terminal(&downloader, done).await;
    let running = downloader.submit("client", single(2)).await.unwrap();
    eventually(|| extractor.running() == 1).await;

    let stats = downloader.stats().await;
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.processing, 1);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.queued, 0);
    assert_eq!(stats.max_concurrent_jobs, 4);
    assert_eq!(stats.artifacts, 1);
    assert!(stats.storage_bytes > 0);
    assert!(stats.uptime_secs >= 0);

    extractor.release(1);
    wait_for_terminal(&downloader, running).await;
    assert_eq!(downloader.stats().await.artifacts, 2);
}

#[tokio::test]
async fn probe_returns_metadata() {
    let (downloader, _extractor, _temp_dir) = create_test_downloader().await;

    let metadata = downloader.probe("client", &url(1)).await.unwrap();

    assert_eq!(metadata.id.as_deref(), Some("fake-id"));
    assert!(!metadata.is_playlist());
    assert!(downloader.registry.is_empty());
}

#[tokio::test]
async fn list_formats_groups_collaborator_formats() {
    let (downloader, extractor, _temp_dir) = create_test_downloader().await;
    extractor.script(&url(2), Script::Fail(ExtractorError::not_found("gone")));

    let groups = downloader.list_formats("client", &url(1)).await.unwrap();

    assert!(groups.video_only.is_empty());
    assert_eq!(groups.combined.len(), 1);
    assert_eq!(groups.combined[0].format_id, "18");
    assert_eq!(groups.audio_only.len(), 1);
    assert_eq!(groups.audio_only[0].format_id, "140");
    assert_eq!(groups.audio_only[0].filesize, Some(1_048_576));
    assert!(matches!(
        downloader.list_formats("client", &url(2)).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn probe_maps_collaborator_errors() {
    let (downloader, extractor, _temp_dir) = create_test_downloader().await;
    extractor.script(&url(1), Script::Fail(ExtractorError::forbidden("private")));
    extractor.script(&url(2), Script::Fail(ExtractorError::unsupported("no extractor")));

    assert!(matches!(
        downloader.probe("client", &url(1)).await,
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        downloader.probe("client", &url(2)).await,
        Err(Error::Extraction(_))
    ));
    assert!(matches!(
        downloader.probe("client", "javascript:alert(1)").await,
        Err(Error::Validation(_))
    ));
}

#[tokio::test]
async fn probe_is_rate_limited() {
    let (downloader, _extractor, _temp_dir) =
        create_test_downloader_with(|c| c.rate_limit.max_requests = 1).await;

    downloader.probe("client", &url(1)).await.unwrap();
    assert!(matches!(
        downloader.probe("client", &url(1)).await,
        Err(Error::RateLimitExceeded { .. })
    ));
    assert!(matches!(
        downloader.submit("client", single(1)).await,
        Err(Error::RateLimitExceeded { .. })
    ));
}

#[tokio::test]
async fn expired_artifact_is_swept_and_job_purged() {
    let (downloader, _extractor, _temp_dir) = create_test_downloader().await;
    let _tasks = downloader.start();
    let id = downloader.submit("client", single(1)).await.unwrap();
    let job = wait_for_terminal(&downloader, id).await;
    let artifact = job.artifacts[0].clone();

    let scheduler = downloader.cleanup_scheduler();
    let report = scheduler
        .sweep_once_at(artifact.expires_at + chrono::Duration::seconds(1))
        .await;

    assert_eq!(report.artifacts_removed, 1);
    assert_eq!(report.jobs_purged, 1);
    assert!(matches!(
        downloader.get_artifact(&artifact.filename).await,
        Err(Error::Artifact(ArtifactError::NotFound { .. }))
    ));
    assert!(matches!(
        downloader.get_status(id),
        Err(Error::Job(JobError::NotFound { .. }))
    ));
    assert!(!artifact.path.exists());
}

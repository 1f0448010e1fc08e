//! Shared test helpers: a scripted collaborator and engine constructors.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::downloader::MediaDownloader;
use crate::extractor::{
    DownloadRequest, ExtractorError, MediaExtractor, MediaFormat, MediaMetadata, OutputFile,
    PlaylistEntry, ProgressHandle,
};
use crate::types::{JobId, JobSnapshot};

/// What the fake collaborator does for one URL
#[derive(Clone, Debug)]
pub(crate) enum Script {
    /// Write `files` output files named after `title`
    Succeed { title: &'static str, files: usize },
    /// Return the error
    Fail(ExtractorError),
    /// Succeed without writing anything
    Empty,
    /// Panic inside the collaborator
    Panic,
    /// Write a partial file, then wait for a gate permit (or cancellation)
    Gated { title: &'static str },
    /// Ignore cancellation and never return
    Hang,
}

/// Scripted in-process collaborator
pub(crate) struct FakeExtractor {
    scripts: Mutex<HashMap<String, Script>>,
    playlists: Mutex<HashMap<String, MediaMetadata>>,
    progress_steps: Mutex<Vec<u8>>,
    gate: Semaphore,
    running: AtomicUsize,
    max_running: AtomicUsize,
    started: Mutex<Vec<String>>,
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeExtractor {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(HashMap::new()),
            playlists: Mutex::new(HashMap::new()),
            progress_steps: Mutex::new(vec![25, 50, 75, 100]),
            gate: Semaphore::new(0),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
        })
    }

    /// Script the outcome for `url`; unscripted URLs succeed with one file
    pub(crate) fn script(&self, url: &str, script: Script) {
        self.scripts.lock().insert(url.to_string(), script);
    }

    /// Register a playlist with `count` entries at `url/<i>`
    pub(crate) fn playlist(&self, url: &str, title: &str, count: usize) -> Vec<String> {
        let entries: Vec<PlaylistEntry> = (0..count)
            .map(|i| PlaylistEntry {
                url: format!("{url}/{i}"),
                title: Some(format!("entry {i}")),
            })
            .collect();
        let urls = entries.iter().map(|e| e.url.clone()).collect();
        self.playlists.lock().insert(
            url.to_string(),
            MediaMetadata {
                title: Some(title.to_string()),
                entries,
                ..MediaMetadata::default()
            },
        );
        urls
    }

    pub(crate) fn set_progress_steps(&self, steps: Vec<u8>) {
        *self.progress_steps.lock() = steps;
    }

    /// Let `n` gated downloads proceed
    pub(crate) fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Downloads currently inside the collaborator
    pub(crate) fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous downloads seen
    pub(crate) fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    /// URLs in the order their downloads started
    pub(crate) fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    async fn write_outputs(
        &self,
        request: &DownloadRequest,
        title: &str,
        files: usize,
    ) -> Result<Vec<OutputFile>, ExtractorError> {
        let mut outputs = Vec::with_capacity(files);
        for i in 0..files {
            let path = request.work_dir.join(format!("{i}.mp4"));
            tokio::fs::write(&path, format!("{}#{i}", request.url)).await?;
            outputs.push(OutputFile {
                path,
                title: Some(title.to_string()),
            });
        }
        Ok(outputs)
    }
}

#[async_trait]
impl MediaExtractor for FakeExtractor {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch_metadata(&self, url: &str) -> Result<MediaMetadata, ExtractorError> {
        if let Some(metadata) = self.playlists.lock().get(url) {
            return Ok(metadata.clone());
        }
        match self.scripts.lock().get(url) {
            Some(Script::Fail(e)) => Err(e.clone()),
            _ => Ok(MediaMetadata {
                id: Some("fake-id".to_string()),
                title: Some(format!("title of {url}")),
                formats: vec![
                    MediaFormat {
                        format_id: "18".to_string(),
                        ext: Some("mp4".to_string()),
                        resolution: Some("640x360".to_string()),
                        vcodec: Some("avc1.42001E".to_string()),
                        acodec: Some("mp4a.40.2".to_string()),
                        ..MediaFormat::default()
                    },
                    MediaFormat {
                        format_id: "140".to_string(),
                        ext: Some("m4a".to_string()),
                        resolution: Some("audio only".to_string()),
                        vcodec: Some("none".to_string()),
                        acodec: Some("mp4a.40.2".to_string()),
                        filesize: Some(1_048_576),
                        ..MediaFormat::default()
                    },
                ],
                ..MediaMetadata::default()
            }),
        }
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        progress: &ProgressHandle,
    ) -> Result<Vec<OutputFile>, ExtractorError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        let _guard = RunningGuard(&self.running);
        self.started.lock().push(request.url.clone());

        let script = self
            .scripts
            .lock()
            .get(&request.url)
            .cloned()
            .unwrap_or(Script::Succeed {
                title: "video",
                files: 1,
            });
        let steps = self.progress_steps.lock().clone();

        match script {
            Script::Succeed { title, files } => {
                for step in steps {
                    progress.report_percent(step)?;
                    tokio::task::yield_now().await;
                }
                self.write_outputs(request, title, files).await
            }
            Script::Fail(e) => Err(e),
            Script::Empty => Ok(Vec::new()),
            Script::Panic => panic!("scripted collaborator panic"),
            Script::Gated { title } => {
                tokio::fs::write(request.work_dir.join("partial.part"), b"partial").await?;
                progress.report_percent(10)?;
                tokio::select! {
                    _ = progress.cancelled() => return Err(crate::extractor::Cancelled.into()),
                    permit = self.gate.acquire() => {
                        permit.map_err(|e| ExtractorError::internal(e.to_string()))?.forget();
                    }
                }
                progress.report_percent(90)?;
                self.write_outputs(request, title, 1).await
            }
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }
    }
}

/// Test config rooted in `temp_dir`
pub(crate) fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.download.download_dir = temp_dir.path().join("downloads");
    config.download.max_concurrent_jobs = 3;
    config.download.progress_min_interval = Duration::ZERO;
    config.download.cancel_grace_period = Duration::from_millis(300);
    config
}

/// Engine backed by a fresh fake collaborator and temp directory.
/// The tempdir must be kept alive for the duration of the test.
pub(crate) async fn create_test_downloader() -> (MediaDownloader, Arc<FakeExtractor>, TempDir) {
    create_test_downloader_with(|_| {}).await
}

/// Like [`create_test_downloader`] with config adjustments
pub(crate) async fn create_test_downloader_with(
    adjust: impl FnOnce(&mut Config),
) -> (MediaDownloader, Arc<FakeExtractor>, TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(&temp_dir);
    adjust(&mut config);

    let extractor = FakeExtractor::new();
    let downloader = MediaDownloader::new(config, extractor.clone())
        .await
        .unwrap();
    (downloader, extractor, temp_dir)
}

/// Poll until the job is terminal; panics after 5 seconds
pub(crate) async fn wait_for_terminal(downloader: &MediaDownloader, id: JobId) -> JobSnapshot {
    wait_for(downloader, id, |job| job.status.is_terminal()).await
}

/// Poll until `done` holds for the job; panics after 5 seconds
pub(crate) async fn wait_for(
    downloader: &MediaDownloader,
    id: JobId,
    done: impl Fn(&JobSnapshot) -> bool,
) -> JobSnapshot {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let job = downloader.get_status(id).unwrap();
            if done(&job) {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job did not reach the expected state in time")
}

/// Poll until `done` holds; panics after 5 seconds
pub(crate) async fn eventually(done: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time")
}

//! Test fixtures: an in-process collaborator and engine setup

use async_trait::async_trait;
use media_dl::{
    Config, DownloadRequest, ExtractorError, MediaDownloader, MediaExtractor, MediaMetadata,
    OutputFile, ProgressHandle,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Collaborator that writes a small file per URL after a short delay
///
/// URLs registered with [`LocalExtractor::fail`] return a network error.
pub struct LocalExtractor {
    delay: Duration,
    failing: Mutex<HashSet<String>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
    formats: Mutex<Vec<String>>,
}

impl LocalExtractor {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            failing: Mutex::new(HashSet::new()),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            formats: Mutex::new(Vec::new()),
        })
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    /// Format selectors the engine asked for, in call order
    pub fn formats(&self) -> Vec<String> {
        self.formats.lock().unwrap().clone()
    }

    async fn produce(
        &self,
        request: &DownloadRequest,
        progress: &ProgressHandle,
    ) -> Result<Vec<OutputFile>, ExtractorError> {
        for step in 1..=4u64 {
            tokio::time::sleep(self.delay / 4).await;
            progress.report(step * 256, Some(1024))?;
        }
        if self.failing.lock().unwrap().contains(&request.url) {
            return Err(ExtractorError::network("connection reset by peer"));
        }
        let path = request.work_dir.join("media.mp4");
        tokio::fs::write(&path, request.url.as_bytes()).await?;
        Ok(vec![OutputFile {
            path,
            title: Some("Sample Video".to_string()),
        }])
    }
}

#[async_trait]
impl MediaExtractor for LocalExtractor {
    fn name(&self) -> &str {
        "local"
    }

    async fn fetch_metadata(&self, url: &str) -> Result<MediaMetadata, ExtractorError> {
        Ok(MediaMetadata {
            title: Some(format!("Title for {url}")),
            ..MediaMetadata::default()
        })
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        progress: &ProgressHandle,
    ) -> Result<Vec<OutputFile>, ExtractorError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        self.formats.lock().unwrap().push(request.format.clone());

        let result = self.produce(request, progress).await;

        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Engine with its download dir in a fresh temp dir
///
/// The tempdir must be kept alive for the duration of the test.
pub async fn create_engine(
    extractor: Arc<LocalExtractor>,
    adjust: impl FnOnce(&mut Config),
) -> (MediaDownloader, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.download.download_dir = temp_dir.path().join("downloads");
    config.download.cancel_grace_period = Duration::from_millis(500);
    adjust(&mut config);

    let downloader = MediaDownloader::new(config, extractor).await.unwrap();
    (downloader, temp_dir)
}

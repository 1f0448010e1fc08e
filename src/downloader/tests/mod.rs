use super::*;
use crate::downloader::test_helpers::{
    Script, create_test_downloader, create_test_downloader_with, eventually,
    wait_for, wait_for_terminal,
};
use crate::error::{ArtifactError, JobError};
use crate::extractor::ExtractorError;
use crate::types::{
    CancelOutcome, DownloadOptions, FailureKind, ItemStatus, JobFilter, JobKind, JobRequest,
    Quality, Status,
};
use std::time::Duration;

mod control;

fn url(n: usize) -> String {
    format!("https://media.example.com/watch/{n}")
}

fn single(n: usize) -> JobRequest {
    JobRequest::single(url(n), DownloadOptions::default())
}

/// Files directly inside the download directory (staging excluded)
fn output_files(downloader: &MediaDownloader) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(downloader.artifacts.root())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

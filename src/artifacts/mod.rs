//! Artifact store
//!
//! Tracks finished output files in the download directory, hands them out
//! while their retention window is open and deletes them once it closes.
//! Collaborators write into a per-job staging directory; files are moved
//! into the download directory under a collision-free name when adopted.

mod naming;

pub use naming::{artifact_filename, content_type_for, is_plain_filename, sanitize_title};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ArtifactError, Error, Result};
use crate::extractor::OutputFile;
use crate::types::{Artifact, JobId};

const STAGING_DIR: &str = ".staging";

/// Open handle to an artifact for streaming to a client
#[derive(Debug)]
pub struct ArtifactStream {
    /// Artifact metadata
    pub artifact: Artifact,
    /// MIME type derived from the extension
    pub content_type: &'static str,
    /// Open file positioned at the start
    pub file: tokio::fs::File,
}

/// Store of artifacts keyed by filename
pub struct ArtifactStore {
    root: PathBuf,
    staging: PathBuf,
    ttl: chrono::Duration,
    entries: DashMap<String, Artifact>,
    /// Names claimed by an adoption whose file is being moved into place
    reserved: DashMap<String, JobId>,
}

impl ArtifactStore {
    /// Open the store rooted at `root`, creating directories as needed
    ///
    /// Leftover staging directories from a previous process are removed.
    pub async fn open(root: impl Into<PathBuf>, ttl: Duration) -> Result<Self> {
        let root = root.into();
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| Error::Config {
            message: format!("artifact_ttl out of range: {e}"),
            key: Some("artifact_ttl".to_string()),
        })?;
        let staging = root.join(STAGING_DIR);
        remove_dir_if_exists(&staging).await?;
        tokio::fs::create_dir_all(&staging).await?;
        Ok(Self {
            root,
            staging,
            ttl,
            entries: DashMap::new(),
            reserved: DashMap::new(),
        })
    }

    /// Download directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Retention window
    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Staging directory for a job
    pub fn staging_dir(&self, id: JobId) -> PathBuf {
        self.staging.join(id.to_string())
    }

    /// Create (if needed) and return the staging directory for a job
    pub async fn prepare_staging(&self, id: JobId) -> Result<PathBuf> {
        let dir = self.staging_dir(id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Delete a job's staging directory and any partial files in it
    pub async fn discard_staging(&self, id: JobId) {
        if let Err(e) = remove_dir_if_exists(&self.staging_dir(id)).await {
            tracing::warn!(job_id = %id, error = %e, "failed to remove staging directory");
        }
    }

    /// Move a collaborator output into the store and register it
    pub async fn adopt(
        &self,
        id: JobId,
        seq: usize,
        item_index: Option<usize>,
        output: &OutputFile,
    ) -> Result<Artifact> {
        self.adopt_at(id, seq, item_index, output, Utc::now()).await
    }

    /// Move a collaborator output into the store, registered at `now`
    pub async fn adopt_at(
        &self,
        id: JobId,
        seq: usize,
        item_index: Option<usize>,
        output: &OutputFile,
        now: DateTime<Utc>,
    ) -> Result<Artifact> {
        let meta = tokio::fs::metadata(&output.path).await.map_err(|e| {
            Error::Internal(format!(
                "collaborator output {} unreadable: {e}",
                output.path.display()
            ))
        })?;
        if !meta.is_file() {
            return Err(Error::Internal(format!(
                "collaborator output {} is not a file",
                output.path.display()
            )));
        }

        let title = output.title.clone().or_else(|| {
            output
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        });
        let extension = output.path.extension().map(|e| e.to_string_lossy());
        let expires_at = now.checked_add_signed(self.ttl).ok_or_else(|| {
            Error::Internal(format!("artifact expiry out of range for {now}"))
        })?;
        let (filename, dest) = self.reserve_destination(
            id,
            seq,
            title.as_deref().unwrap_or_default(),
            extension.as_deref(),
        );

        // the name stays reserved until the entry exists so the untracked
        // sweep never sees the moved file as a stray
        let moved = async {
            move_file(&output.path, &dest).await?;
            Ok::<_, Error>(tokio::fs::metadata(&dest).await?.len())
        }
        .await;
        let size_bytes = match moved {
            Ok(size_bytes) => size_bytes,
            Err(e) => {
                self.release(&filename);
                return Err(e);
            }
        };

        let artifact = Artifact {
            filename: filename.clone(),
            path: dest,
            size_bytes,
            job_id: id,
            item_index,
            title,
            created_at: now,
            expires_at,
        };
        self.entries.insert(filename.clone(), artifact.clone());
        self.release(&filename);
        tracing::debug!(
            job_id = %id,
            filename = %artifact.filename,
            size_bytes,
            "artifact registered"
        );
        Ok(artifact)
    }

    /// Claim a free artifact name for a job
    ///
    /// The claim is released by [`ArtifactStore::release`] or when the
    /// adopted artifact is registered.
    fn reserve_destination(
        &self,
        id: JobId,
        seq: usize,
        title: &str,
        extension: Option<&str>,
    ) -> (String, PathBuf) {
        let mut filename = artifact_filename(id, seq, title, extension);
        let mut n = 1;
        loop {
            let path = self.root.join(&filename);
            if !self.entries.contains_key(&filename) && !path.exists() {
                if let Entry::Vacant(slot) = self.reserved.entry(filename.clone()) {
                    slot.insert(id);
                    return (filename, path);
                }
            }
            filename = artifact_filename(id, seq, &format!("{title} {n}"), extension);
            n += 1;
        }
    }

    fn release(&self, filename: &str) {
        self.reserved.remove(filename);
    }

    /// Resolve a filename to a retrievable artifact
    pub fn lookup(&self, filename: &str) -> Result<Artifact> {
        self.lookup_at(filename, Utc::now())
    }

    /// Resolve a filename as of `now`
    ///
    /// Artifacts past `expires_at` that the sweep has not removed yet are
    /// reported as [`ArtifactError::Expired`]; unknown names (including any
    /// containing path separators) as [`ArtifactError::NotFound`].
    pub fn lookup_at(&self, filename: &str, now: DateTime<Utc>) -> Result<Artifact> {
        let not_found = || {
            Error::Artifact(ArtifactError::NotFound {
                filename: filename.to_string(),
            })
        };
        if !is_plain_filename(filename) {
            return Err(not_found());
        }
        let artifact = self.entries.get(filename).ok_or_else(not_found)?;
        if now >= artifact.expires_at {
            return Err(Error::Artifact(ArtifactError::Expired {
                filename: filename.to_string(),
            }));
        }
        if !artifact.is_live_at(now) {
            return Err(not_found());
        }
        Ok(artifact.clone())
    }

    /// Open an artifact for streaming
    pub async fn open_stream(&self, filename: &str) -> Result<ArtifactStream> {
        self.open_stream_at(filename, Utc::now()).await
    }

    /// Open an artifact for streaming as of `now`
    pub async fn open_stream_at(&self, filename: &str, now: DateTime<Utc>) -> Result<ArtifactStream> {
        let artifact = self.lookup_at(filename, now)?;
        let file = match tokio::fs::File::open(&artifact.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::Artifact(ArtifactError::NotFound {
                    filename: filename.to_string(),
                }));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(ArtifactStream {
            content_type: content_type_for(&artifact.filename),
            artifact,
            file,
        })
    }

    /// Artifacts owned by a job, in registration order
    pub fn for_job(&self, id: JobId) -> Vec<Artifact> {
        let mut artifacts: Vec<Artifact> = self
            .entries
            .iter()
            .filter(|e| e.job_id == id)
            .map(|e| e.value().clone())
            .collect();
        artifacts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.filename.cmp(&b.filename)));
        artifacts
    }

    /// Whether a job still owns any tracked artifact
    pub fn has_artifacts(&self, id: JobId) -> bool {
        self.entries.iter().any(|e| e.job_id == id)
    }

    /// Delete every artifact of a job; returns how many were removed
    pub async fn remove_job(&self, id: JobId) -> usize {
        let filenames: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.job_id == id)
            .map(|e| e.key().clone())
            .collect();

        let mut removed = 0;
        for filename in filenames {
            if let Some((_, artifact)) = self.entries.remove(&filename) {
                if let Err(e) = remove_file_if_exists(&artifact.path).await {
                    tracing::warn!(
                        job_id = %id,
                        filename = %filename,
                        error = %e,
                        "failed to delete artifact"
                    );
                }
                removed += 1;
            }
        }
        removed
    }

    /// Delete every artifact past its expiry; returns what was removed
    ///
    /// Files that cannot be deleted stay registered and are retried on the
    /// next sweep. Files already gone are not an error.
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> Vec<Artifact> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| now >= e.expires_at)
            .map(|e| e.key().clone())
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for filename in expired {
            let Some(path) = self.entries.get(&filename).map(|e| e.path.clone()) else {
                continue;
            };
            match remove_file_if_exists(&path).await {
                Ok(()) => {
                    if let Some((_, artifact)) = self.entries.remove(&filename) {
                        removed.push(artifact);
                    }
                }
                Err(e) => {
                    tracing::warn!(filename = %filename, error = %e, "failed to delete expired artifact");
                }
            }
        }
        removed
    }

    /// Delete untracked files in the download directory older than the TTL
    ///
    /// Only plain files at the top level are considered; the staging area is
    /// never touched.
    pub async fn sweep_untracked_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        let mut removed = 0;
        while let Some(entry) = dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            if !file_type.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.entries.contains_key(&name) || self.reserved.contains_key(&name) {
                continue;
            }
            let modified: DateTime<Utc> = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(t) => t.into(),
                Err(_) => continue,
            };
            if modified
                .checked_add_signed(self.ttl)
                .is_none_or(|stale_at| stale_at > now)
            {
                continue;
            }
            match remove_file_if_exists(&entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(filename = %name, error = %e, "failed to delete untracked file")
                }
            }
        }
        Ok(removed)
    }

    /// Number of tracked artifacts
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no artifact is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total size of tracked artifacts
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size_bytes).sum()
    }
}

async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    // rename fails across filesystems
    tokio::fs::copy(from, to).await?;
    remove_file_if_exists(from).await?;
    Ok(())
}

async fn remove_file_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

async fn remove_dir_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

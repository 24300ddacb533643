//! Model downloading, caching, and remote probes via hf-hub.

use crate::config::ModelConfig;
use crate::error::{ChatError, Result};
use crate::progress::{ProgressCallback, ProgressEvent};
use hf_hub::api::Progress;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Manages downloading and caching of ML models.
pub struct ModelManager {
    cache_dir: PathBuf,
}

impl ModelManager {
    /// Create a new model manager.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.cache_dir)?;
        info!("model cache directory: {}", config.cache_dir.display());

        Ok(Self {
            cache_dir: config.cache_dir.clone(),
        })
    }

    /// Check whether a file is already cached locally for a HuggingFace repo.
    pub fn is_file_cached(repo_id: &str, filename: &str) -> bool {
        hf_hub::Cache::default()
            .model(repo_id.to_owned())
            .get(filename)
            .is_some()
    }

    /// Download a model file, forwarding byte-level progress to `callback`.
    ///
    /// If the file is already cached, a [`ProgressEvent::Cached`] is emitted
    /// and no download happens.
    ///
    /// # Errors
    ///
    /// Returns an error if the download fails.
    pub fn download_with_progress(
        &self,
        repo_id: &str,
        filename: &str,
        callback: Option<&ProgressCallback>,
    ) -> Result<PathBuf> {
        let cache = hf_hub::Cache::default();
        if let Some(path) = cache.model(repo_id.to_owned()).get(filename) {
            if let Some(cb) = callback {
                cb(ProgressEvent::Cached {
                    repo_id: repo_id.to_owned(),
                    filename: filename.to_owned(),
                });
            }
            return Ok(path);
        }

        let api = hf_hub::api::sync::Api::new()
            .map_err(|e| ChatError::Model(format!("failed to create HF API: {e}")))?;

        let progress = CallbackProgress {
            repo_id: repo_id.to_owned(),
            filename: filename.to_owned(),
            total_bytes: None,
            bytes_downloaded: 0,
            callback,
        };

        let repo = api.model(repo_id.to_owned());
        let path = repo
            .download_with_progress(filename, progress)
            .map_err(|e| ChatError::Model(format!("failed to download {filename}: {e}")))?;

        if let Some(cb) = callback {
            cb(ProgressEvent::DownloadComplete {
                repo_id: repo_id.to_owned(),
                filename: filename.to_owned(),
            });
        }

        Ok(path)
    }

    /// Download several files from one repo, returning the snapshot directory.
    ///
    /// # Errors
    ///
    /// Returns an error if any download fails.
    pub fn download_repo_with_progress(
        &self,
        repo_id: &str,
        filenames: &[&str],
        callback: Option<&ProgressCallback>,
    ) -> Result<PathBuf> {
        let mut last: Option<PathBuf> = None;
        for filename in filenames {
            last = Some(self.download_with_progress(repo_id, filename, callback)?);
        }

        // hf-hub stores all files of a repo under one snapshot directory.
        last.and_then(|p| p.parent().map(std::path::Path::to_path_buf))
            .ok_or_else(|| {
                ChatError::Model(format!("could not determine repo directory for {repo_id}"))
            })
    }

    /// Get the cache directory path.
    pub fn cache_dir(&self) -> &PathBuf {
        &self.cache_dir
    }
}

/// Bridges hf-hub's pull-style progress reporting onto a [`ProgressCallback`].
struct CallbackProgress<'a> {
    repo_id: String,
    filename: String,
    total_bytes: Option<u64>,
    bytes_downloaded: u64,
    callback: Option<&'a ProgressCallback>,
}

impl Progress for CallbackProgress<'_> {
    fn init(&mut self, size: usize, _filename: &str) {
        self.total_bytes = Some(size as u64);
        if let Some(cb) = self.callback {
            cb(ProgressEvent::DownloadStarted {
                repo_id: self.repo_id.clone(),
                filename: self.filename.clone(),
                total_bytes: self.total_bytes,
            });
        }
    }

    fn update(&mut self, size: usize) {
        self.bytes_downloaded += size as u64;
        if let Some(cb) = self.callback {
            cb(ProgressEvent::DownloadProgress {
                repo_id: self.repo_id.clone(),
                filename: self.filename.clone(),
                bytes_downloaded: self.bytes_downloaded,
                total_bytes: self.total_bytes,
            });
        }
    }

    fn finish(&mut self) {}
}

fn http_agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(10))
        .timeout_read(Duration::from_secs(20))
        .timeout_write(Duration::from_secs(20))
        .build()
}

fn head_follow_location(
    agent: &ureq::Agent,
    url: &str,
    max_hops: usize,
) -> Result<ureq::Response> {
    let mut current = url.to_owned();
    for _ in 0..=max_hops {
        let resp = agent
            .head(&current)
            .set("User-Agent", "kotoba/0.1")
            .call()
            .map_err(|e| ChatError::Model(e.to_string()))?;
        let status = resp.status();
        if (300..400).contains(&status)
            && let Some(loc) = resp.header("Location")
        {
            current = loc.to_owned();
            continue;
        }
        return Ok(resp);
    }
    Err(ChatError::Model("too many redirects".to_owned()))
}

/// Best-effort remote file size via `HEAD` on the `resolve/main/...` URL.
///
/// Returns `Ok(None)` when the server answers but provides no length. An
/// `Err` means the file could not be reached at all.
pub fn remote_file_size_bytes(repo_id: &str, filename: &str) -> Result<Option<u64>> {
    let agent = http_agent();
    let url = format!("https://huggingface.co/{repo_id}/resolve/main/{filename}");

    let resp = head_follow_location(&agent, &url, 3)?;
    if let Some(len) = resp.header("Content-Length")
        && let Ok(v) = len.parse::<u64>()
    {
        return Ok(Some(v));
    }
    Ok(None)
}

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{FetchError, MediaFetcher};
use crate::job::Source;

/// Fetch backend for sources that are already files on disk: validates the
/// file and copies it into the job's scratch location so the pipeline owns
/// (and may delete) its artifact without touching the operator's original.
pub struct LocalFetcher;

impl LocalFetcher {
    pub fn new() -> Self {
        Self
    }

    async fn validate_file(path: &Path) -> Result<(), FetchError> {
        if !path.is_file() {
            return Err(FetchError::Unreadable(format!(
                "not a readable file: {}",
                path.display()
            )));
        }

        let metadata = fs::metadata(path)
            .await
            .map_err(|e| FetchError::Unreadable(format!("{}: {}", path.display(), e)))?;
        if metadata.len() == 0 {
            return Err(FetchError::Unreadable(format!(
                "file is empty: {}",
                path.display()
            )));
        }

        Ok(())
    }
}

impl Default for LocalFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaFetcher for LocalFetcher {
    fn supports(&self, source: &Source) -> bool {
        matches!(source, Source::LocalFile(_))
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn fetch(
        &self,
        source: &Source,
        _format_hint: Option<&str>,
        dest_base: &Path,
    ) -> Result<PathBuf, FetchError> {
        let path = match source {
            Source::LocalFile(path) => path,
            Source::Url(url) => return Err(FetchError::Unsupported(url.clone())),
        };

        Self::validate_file(path).await?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp3")
            .to_ascii_lowercase();
        let dest = dest_base.with_extension(ext);

        fs::copy(path, &dest)
            .await
            .map_err(|e| FetchError::Unreadable(format!("{}: {}", path.display(), e)))?;

        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn copies_local_file_into_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("clip.mp3");
        fs_err::write(&src, b"not really audio").unwrap();

        let fetcher = LocalFetcher::new();
        let source = Source::LocalFile(src.clone());
        let dest_base = dir.path().join("audio_job_0_0");

        let artifact = fetcher.fetch(&source, None, &dest_base).await.unwrap();
        assert_eq!(artifact, dir.path().join("audio_job_0_0.mp3"));
        assert!(artifact.exists());
        assert!(src.exists());
    }

    #[tokio::test]
    async fn missing_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = LocalFetcher::new();
        let source = Source::LocalFile(dir.path().join("nope.wav"));
        let err = fetcher
            .fetch(&source, None, &dir.path().join("audio_x"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Unreadable(_)));
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("empty.wav");
        fs_err::write(&src, b"").unwrap();

        let fetcher = LocalFetcher::new();
        let err = fetcher
            .fetch(
                &Source::LocalFile(src),
                None,
                &dir.path().join("audio_y"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Unreadable(_)));
    }
}

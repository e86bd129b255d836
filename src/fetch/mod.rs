use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::job::Source;
use crate::utils::format_file_size;

pub mod direct;
pub mod local;
pub mod ytdlp;

/// Failure modes of the fetch capability.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("no fetcher supports source: {0}")]
    Unsupported(String),

    #[error("{tool} is not available: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    #[error("download failed: {0}")]
    Download(String),

    #[error("requested format '{0}' is unavailable")]
    FormatUnavailable(String),

    #[error("unreadable source file: {0}")]
    Unreadable(String),
}

/// One audio stream offered by a remote source.
#[derive(Debug, Clone, Serialize)]
pub struct AudioFormatInfo {
    pub format_id: String,
    pub ext: String,
    /// Average audio bitrate in kbit/s, when reported.
    pub abr: Option<f64>,
    pub filesize: Option<u64>,
    pub note: String,
}

/// The fetch capability: turns a source reference into a local audio artifact.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Materialize `source` as a local audio file.
    ///
    /// `dest_base` is a per-job path without extension; the fetcher appends
    /// the artifact's actual extension and returns the full path.
    async fn fetch(
        &self,
        source: &Source,
        format_hint: Option<&str>,
        dest_base: &Path,
    ) -> Result<PathBuf, FetchError>;

    /// Enumerate the audio formats available for a remote source, highest
    /// bitrate first.
    async fn list_formats(&self, url: &str) -> Result<Vec<AudioFormatInfo>, FetchError>;
}

/// A single fetch backend that may or may not handle a given source.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    fn supports(&self, source: &Source) -> bool;

    fn backend_name(&self) -> &'static str;

    async fn fetch(
        &self,
        source: &Source,
        format_hint: Option<&str>,
        dest_base: &Path,
    ) -> Result<PathBuf, FetchError>;
}

/// Dispatches each source to the first backend that supports it.
///
/// Local files go to the local backend; direct media URLs (recognizable audio
/// or video extension) are streamed over HTTP; everything else is handed to
/// yt-dlp, which knows the platform-specific extraction.
pub struct FetcherRegistry {
    local: local::LocalFetcher,
    direct: direct::DirectFetcher,
    ytdlp: ytdlp::YtDlpFetcher,
}

impl FetcherRegistry {
    pub fn new(yt_dlp_path: &str) -> Self {
        Self {
            local: local::LocalFetcher::new(),
            direct: direct::DirectFetcher::new(),
            ytdlp: ytdlp::YtDlpFetcher::new(yt_dlp_path),
        }
    }

    fn backend_for(&self, source: &Source) -> Option<&dyn MediaFetcher> {
        [
            &self.local as &dyn MediaFetcher,
            &self.direct as &dyn MediaFetcher,
            &self.ytdlp as &dyn MediaFetcher,
        ]
        .into_iter()
        .find(|b| b.supports(source))
    }
}

#[async_trait]
impl Fetcher for FetcherRegistry {
    async fn fetch(
        &self,
        source: &Source,
        format_hint: Option<&str>,
        dest_base: &Path,
    ) -> Result<PathBuf, FetchError> {
        let backend = self
            .backend_for(source)
            .ok_or_else(|| FetchError::Unsupported(source.to_string()))?;

        tracing::debug!("fetching {} via {}", source, backend.backend_name());
        backend.fetch(source, format_hint, dest_base).await
    }

    async fn list_formats(&self, url: &str) -> Result<Vec<AudioFormatInfo>, FetchError> {
        self.ytdlp.list_formats(url).await
    }
}

/// Render a format listing as the table shown by `formats` / `--list-formats`.
pub fn render_format_table(formats: &[AudioFormatInfo]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<10} {:<5} {:<8} {:<10} {}\n",
        "ID", "EXT", "ABR", "SIZE", "NOTE"
    ));
    out.push_str(&"-".repeat(50));
    out.push('\n');
    for fmt in formats {
        let abr = fmt
            .abr
            .map(|a| format!("{:.0}k", a))
            .unwrap_or_else(|| "N/A".to_string());
        let size = fmt
            .filesize
            .map(format_file_size)
            .unwrap_or_else(|| "N/A".to_string());
        out.push_str(&format!(
            "{:<10} {:<5} {:<8} {:<10} {}\n",
            fmt.format_id, fmt.ext, abr, size, fmt.note
        ));
    }
    out
}

/// Extensions we treat as directly downloadable media.
pub(crate) const MEDIA_EXTENSIONS: &[&str] = &[
    "mp3", "m4a", "aac", "wav", "flac", "ogg", "opus", "webm", "mp4", "mkv", "mov", "avi",
];

pub(crate) fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_table_lists_every_entry() {
        let formats = vec![
            AudioFormatInfo {
                format_id: "251".into(),
                ext: "webm".into(),
                abr: Some(160.0),
                filesize: Some(3_400_000),
                note: "audio only".into(),
            },
            AudioFormatInfo {
                format_id: "140".into(),
                ext: "m4a".into(),
                abr: None,
                filesize: None,
                note: String::new(),
            },
        ];
        let table = render_format_table(&formats);
        assert!(table.contains("251"));
        assert!(table.contains("160k"));
        assert!(table.contains("140"));
        assert!(table.contains("N/A"));
    }

    #[test]
    fn extension_detection() {
        assert_eq!(extension_of("https://x.test/a.MP3"), Some("mp3".into()));
        assert_eq!(extension_of("https://x.test/watch?v=abc"), None);
    }
}

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{AudioFormatInfo, FetchError, MediaFetcher};
use crate::job::Source;

/// Platform-aware fetch backend driven by the yt-dlp executable.
///
/// Handles every URL the direct backend does not claim; yt-dlp itself decides
/// whether the platform is supported.
pub struct YtDlpFetcher {
    yt_dlp_path: String,
}

impl YtDlpFetcher {
    pub fn new(yt_dlp_path: &str) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.to_string(),
        }
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> bool {
        Command::new(&self.yt_dlp_path)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    async fn dump_info(&self, url: &str) -> Result<Value, FetchError> {
        tracing::debug!("extracting media info for: {}", url);

        let output = Command::new(&self.yt_dlp_path)
            .args(["--dump-json", "--no-playlist", url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| FetchError::ToolUnavailable {
                tool: self.yt_dlp_path.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::Download(format!("yt-dlp failed: {}", error)));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| FetchError::Download(format!("unparseable yt-dlp output: {}", e)))
    }

    pub async fn list_formats(&self, url: &str) -> Result<Vec<AudioFormatInfo>, FetchError> {
        let info = self.dump_info(url).await?;
        let empty = Vec::new();
        let formats = info["formats"].as_array().unwrap_or(&empty);

        let mut audio_formats: Vec<AudioFormatInfo> = formats
            .iter()
            .filter(|fmt| {
                fmt["vcodec"].as_str() == Some("none")
                    || fmt["format_note"]
                        .as_str()
                        .is_some_and(|n| n.contains("audio only"))
            })
            .map(|fmt| AudioFormatInfo {
                format_id: fmt["format_id"].as_str().unwrap_or("").to_string(),
                ext: fmt["ext"].as_str().unwrap_or("").to_string(),
                abr: fmt["abr"].as_f64(),
                filesize: fmt["filesize"].as_u64(),
                note: fmt["format_note"].as_str().unwrap_or("").to_string(),
            })
            .collect();

        audio_formats.sort_by(|a, b| {
            b.abr
                .unwrap_or(0.0)
                .partial_cmp(&a.abr.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(audio_formats)
    }

    /// Locate the file yt-dlp produced for the `{base}.%(ext)s` template.
    fn resolve_artifact(dest_base: &Path) -> Option<PathBuf> {
        const CANDIDATES: &[&str] = &["mp3", "m4a", "wav", "webm", "ogg", "opus"];
        CANDIDATES
            .iter()
            .map(|ext| dest_base.with_extension(ext))
            .find(|p| p.exists())
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    fn supports(&self, source: &Source) -> bool {
        // Catch-all backend for URLs; registered last.
        source.is_url()
    }

    fn backend_name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch(
        &self,
        source: &Source,
        format_hint: Option<&str>,
        dest_base: &Path,
    ) -> Result<PathBuf, FetchError> {
        let url = source.to_string();
        let template = format!("{}.%(ext)s", dest_base.display());
        let selector = format_hint.unwrap_or("bestaudio/best");

        tracing::debug!("downloading audio for: {}", url);

        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--output",
                &template,
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--format",
                selector,
                "--no-playlist",
                "--no-warnings",
                "--newline",
                &url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| FetchError::ToolUnavailable {
                tool: self.yt_dlp_path.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            if let Some(hint) = format_hint {
                if error.contains("Requested format is not available") {
                    return Err(FetchError::FormatUnavailable(hint.to_string()));
                }
            }
            return Err(FetchError::Download(format!("yt-dlp failed: {}", error)));
        }

        Self::resolve_artifact(dest_base)
            .ok_or_else(|| FetchError::Download("downloaded audio file not found".to_string()))
    }
}

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::job::LanguageHint;

/// Failure modes of the transcribe capability.
#[derive(thiserror::Error, Debug)]
pub enum TranscribeError {
    #[error("{tool} is not available: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    #[error("unreadable audio artifact: {0}")]
    UnreadableArtifact(String),

    #[error("transcription process failed: {0}")]
    ProcessFailed(String),
}

/// The transcribe capability: local audio artifact in, text out.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language_hint: &LanguageHint,
    ) -> Result<String, TranscribeError>;
}

/// Speech-to-text via a whisper.cpp command-line binary.
///
/// Each call spawns a fresh process, so a single instance is safe to share
/// across concurrent workers; model memory is paid per in-flight job, which
/// makes the worker count the operator's lever for resource pressure.
pub struct WhisperCliTranscriber {
    binary: String,
    model: PathBuf,
}

impl WhisperCliTranscriber {
    pub fn new(binary: &str, model: &Path) -> Self {
        Self {
            binary: binary.to_string(),
            model: model.to_path_buf(),
        }
    }

    /// Check if the whisper binary is available
    pub async fn check_availability(&self) -> bool {
        Command::new(&self.binary)
            .arg("--help")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .is_ok()
    }
}

#[async_trait]
impl Transcriber for WhisperCliTranscriber {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language_hint: &LanguageHint,
    ) -> Result<String, TranscribeError> {
        if !audio_path.is_file() {
            return Err(TranscribeError::UnreadableArtifact(
                audio_path.display().to_string(),
            ));
        }

        tracing::debug!("transcribing {}", audio_path.display());

        let output = Command::new(&self.binary)
            .args([
                "-m",
                &self.model.to_string_lossy(),
                "-f",
                &audio_path.to_string_lossy(),
                "-l",
                language_hint.code(),
                // Plain text on stdout: no progress prints, no timestamps.
                "-np",
                "-nt",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| TranscribeError::ToolUnavailable {
                tool: self.binary.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(TranscribeError::ProcessFailed(error.trim().to_string()));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(TranscribeError::ProcessFailed(
                "transcriber produced no text".to_string(),
            ));
        }

        Ok(text)
    }
}

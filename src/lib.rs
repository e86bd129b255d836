//! Mediascribe - a CLI tool for turning media references into text transcripts
//!
//! This library provides the job orchestration core: a job registry, a bounded
//! worker pool running a fetch-then-transcribe pipeline per job, and batch /
//! interactive session controllers. Audio extraction is delegated to yt-dlp
//! and speech-to-text to a whisper.cpp binary, both behind narrow traits.

pub mod cli;
pub mod config;
pub mod fetch;
pub mod job;
pub mod output;
pub mod pool;
pub mod registry;
pub mod session;
pub mod transcribe;
pub mod utils;

pub use cli::Cli;
pub use config::Config;
pub use fetch::{AudioFormatInfo, FetchError, Fetcher, FetcherRegistry};
pub use job::{Job, JobError, JobId, JobState, LanguageHint, Source};
pub use output::{OutputRecord, OutputRouter};
pub use pool::{PoolSummary, StageRunner, WorkerPool};
pub use registry::JobRegistry;
pub use session::{BatchReport, Command, Session, SessionOptions};
pub use transcribe::{TranscribeError, Transcriber, WhisperCliTranscriber};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the orchestration core
#[derive(thiserror::Error, Debug)]
pub enum ScribeError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("transcription failed: {0}")]
    Transcribe(String),

    #[error("clipboard unavailable: {0}")]
    Clipboard(String),

    #[error("output target already exists and cannot be disambiguated: {0}")]
    RoutingConflict(std::path::PathBuf),

    #[error("no such job: {0}")]
    NotFound(String),

    #[error("usage: {0}")]
    Usage(String),
}

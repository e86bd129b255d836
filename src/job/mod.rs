use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Unique job identifier, stable for the lifetime of a session.
///
/// Ids combine the session epoch (milliseconds) with a submission sequence
/// number, so jobs created concurrently never collide and sort in submission
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct JobId(String);

impl JobId {
    pub(crate) fn new(epoch_ms: i64, seq: u64) -> Self {
        Self(format!("job_{}_{}", epoch_ms, seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A media reference: either a remote URL or a local file path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Source {
    Url(String),
    LocalFile(PathBuf),
}

impl Source {
    /// Classify raw operator input as a URL or a local file path.
    ///
    /// Local paths are resolved to absolute form at submission time so that
    /// workers are insensitive to later working-directory changes.
    pub fn parse(input: &str) -> Self {
        if input.starts_with("http://") || input.starts_with("https://") {
            return Self::Url(input.to_string());
        }

        let path = Path::new(input);
        let absolute = path
            .canonicalize()
            .unwrap_or_else(|_| std::env::current_dir().unwrap_or_default().join(path));
        Self::LocalFile(absolute)
    }

    pub fn is_url(&self) -> bool {
        matches!(self, Self::Url(_))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::LocalFile(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Language selection passed through to the transcribe capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum LanguageHint {
    /// Let the transcriber detect the language.
    #[default]
    Auto,
    /// An explicit language code, e.g. "en" or "de".
    Tagged(String),
}

impl LanguageHint {
    pub fn parse(code: Option<&str>) -> Self {
        match code {
            None => Self::Auto,
            Some(c) if c.eq_ignore_ascii_case("auto") => Self::Auto,
            Some(c) => Self::Tagged(c.to_string()),
        }
    }

    /// The code to hand to the transcriber; whisper.cpp accepts "auto".
    pub fn code(&self) -> &str {
        match self {
            Self::Auto => "auto",
            Self::Tagged(code) => code,
        }
    }
}

impl fmt::Display for LanguageHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto-detected"),
            Self::Tagged(code) => f.write_str(code),
        }
    }
}

/// Job lifecycle state. Transitions are strictly forward:
/// `Pending -> Fetching -> Transcribing -> Succeeded | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    Pending,
    Fetching,
    Transcribing,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Transcribing => "transcribing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Fetching => 1,
            Self::Transcribing => 2,
            Self::Succeeded | Self::Failed => 3,
        }
    }

    /// Whether `next` is a legal forward transition from this state.
    pub fn can_advance_to(&self, next: JobState) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure reason recorded on a failed job.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum JobError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("transcription failed: {0}")]
    Transcribe(String),

    #[error("worker aborted: {0}")]
    Aborted(String),
}

/// One requested transcription unit of work, tracked from submission to its
/// terminal outcome.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub source: Source,
    pub format_hint: Option<String>,
    pub language_hint: LanguageHint,
    pub state: JobState,
    pub artifact_path: Option<PathBuf>,
    pub transcript: Option<String>,
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub(crate) fn new(
        id: JobId,
        source: Source,
        format_hint: Option<String>,
        language_hint: LanguageHint,
    ) -> Self {
        Self {
            id,
            source,
            format_hint,
            language_hint,
            state: JobState::Pending,
            artifact_path: None,
            transcript: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Advance to a later non-terminal state. Illegal (backwards or repeated)
    /// transitions are ignored and logged; the state machine never rewinds.
    pub fn advance(&mut self, next: JobState) {
        if self.state.can_advance_to(next) {
            self.state = next;
        } else {
            tracing::warn!(
                "ignoring illegal state transition {} -> {} for {}",
                self.state,
                next,
                self.id
            );
        }
    }

    /// Terminal success: records the transcript, clears the artifact path.
    pub fn succeed(&mut self, transcript: String) {
        self.advance(JobState::Succeeded);
        self.transcript = Some(transcript);
        self.artifact_path = None;
        self.finished_at = Some(Utc::now());
    }

    /// Terminal failure: records the reason, clears the artifact path.
    pub fn fail(&mut self, error: JobError) {
        self.advance(JobState::Failed);
        self.error = Some(error);
        self.artifact_path = None;
        self.finished_at = Some(Utc::now());
    }

    /// Short single-line summary of the outcome for `list` output.
    pub fn outcome_preview(&self) -> Option<String> {
        match self.state {
            JobState::Succeeded => self.transcript.as_ref().map(|t| {
                let flat = t.split_whitespace().collect::<Vec<_>>().join(" ");
                if flat.chars().count() > 60 {
                    let cut: String = flat.chars().take(60).collect();
                    format!("{}...", cut)
                } else {
                    flat
                }
            }),
            JobState::Failed => self.error.as_ref().map(|e| e.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_classifies_urls_and_paths() {
        assert!(Source::parse("https://example.com/a.mp3").is_url());
        assert!(Source::parse("http://example.com/watch?v=x").is_url());
        assert!(!Source::parse("clip.mp3").is_url());
        match Source::parse("clip.mp3") {
            Source::LocalFile(p) => assert!(p.is_absolute()),
            Source::Url(_) => panic!("expected a local file"),
        }
    }

    #[test]
    fn language_hint_parses_auto_marker() {
        assert_eq!(LanguageHint::parse(None), LanguageHint::Auto);
        assert_eq!(LanguageHint::parse(Some("auto")), LanguageHint::Auto);
        assert_eq!(
            LanguageHint::parse(Some("en")),
            LanguageHint::Tagged("en".into())
        );
        assert_eq!(LanguageHint::Auto.code(), "auto");
    }

    #[test]
    fn state_transitions_are_monotonic() {
        assert!(JobState::Pending.can_advance_to(JobState::Fetching));
        assert!(JobState::Fetching.can_advance_to(JobState::Transcribing));
        assert!(JobState::Fetching.can_advance_to(JobState::Failed));
        assert!(!JobState::Transcribing.can_advance_to(JobState::Fetching));
        assert!(!JobState::Succeeded.can_advance_to(JobState::Failed));
        assert!(!JobState::Failed.can_advance_to(JobState::Pending));
    }

    #[test]
    fn terminal_jobs_hold_exactly_one_outcome() {
        let mut job = Job::new(
            JobId::new(0, 0),
            Source::parse("https://example.com/a"),
            None,
            LanguageHint::Auto,
        );
        job.advance(JobState::Fetching);
        job.artifact_path = Some(PathBuf::from("/tmp/a.mp3"));
        job.advance(JobState::Transcribing);
        job.succeed("hello".into());

        assert_eq!(job.state, JobState::Succeeded);
        assert_eq!(job.transcript.as_deref(), Some("hello"));
        assert!(job.error.is_none());
        assert!(job.artifact_path.is_none());
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn failed_jobs_clear_artifact_and_record_reason() {
        let mut job = Job::new(
            JobId::new(0, 1),
            Source::parse("https://example.com/b"),
            None,
            LanguageHint::Auto,
        );
        job.advance(JobState::Fetching);
        job.fail(JobError::Fetch("unreachable".into()));

        assert_eq!(job.state, JobState::Failed);
        assert!(job.transcript.is_none());
        assert!(job.artifact_path.is_none());
        assert_eq!(job.error, Some(JobError::Fetch("unreachable".into())));
    }
}

use anyhow::bail;
use std::path::{Path, PathBuf};

use crate::job::{Job, JobId, JobState, LanguageHint};
use crate::{Result, ScribeError};

/// Ephemeral "source + transcript" pair derived from a terminal-success job.
/// Producing and routing a record never mutates the job, so routing the same
/// job repeatedly yields identical output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    job_id: JobId,
    source: String,
    language: LanguageHint,
    transcript: String,
}

impl OutputRecord {
    pub fn from_job(job: &Job) -> Result<Self> {
        match job.state {
            JobState::Succeeded => {}
            JobState::Failed => {
                let reason = job
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown failure".to_string());
                bail!("job {} failed: {}", job.id, reason);
            }
            state => bail!("job {} is still {}", job.id, state),
        }

        let Some(transcript) = job.transcript.clone() else {
            bail!("job {} succeeded without a transcript", job.id);
        };

        Ok(Self {
            job_id: job.id.clone(),
            source: job.source.to_string(),
            language: job.language_hint.clone(),
            transcript,
        })
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Clipboard form: source reference prepended for easy pasting.
    pub fn clipboard_text(&self) -> String {
        format!("Source: {}\n\n{}", self.source, self.transcript)
    }

    /// File form: header block plus transcript.
    pub fn file_text(&self) -> String {
        format!(
            "Source: {}\nJob ID: {}\nLanguage: {}\n{}\n{}\n",
            self.source,
            self.job_id,
            self.language,
            "=".repeat(50),
            self.transcript
        )
    }
}

/// Delivers output records to their sinks: the system clipboard and/or files
/// on disk. Sink failures are reported to the caller and never touch job
/// state.
pub struct OutputRouter;

impl OutputRouter {
    pub fn new() -> Self {
        Self
    }

    /// Overwrite the system clipboard with the record.
    ///
    /// The clipboard handle is opened per call; `arboard::Clipboard` is not
    /// `Send` on all platforms and is cheap to create.
    pub fn copy_to_clipboard(&self, record: &OutputRecord) -> Result<()> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| ScribeError::Clipboard(e.to_string()))?;
        clipboard
            .set_text(record.clipboard_text())
            .map_err(|e| ScribeError::Clipboard(e.to_string()))?;
        Ok(())
    }

    /// Write the record to `target`, disambiguating rather than overwriting:
    /// an existing `name.txt` becomes `name_1.txt`, then `name_2.txt`, and so
    /// on; the first free name wins. Returns the path actually written.
    pub fn save_to_file(&self, record: &OutputRecord, target: &Path) -> Result<PathBuf> {
        let path = Self::disambiguate(target)?;
        fs_err::write(&path, record.file_text())?;
        Ok(path)
    }

    /// The default file-sink target for a job under a user-supplied base name.
    pub fn batch_target(base: &Path, job_id: &JobId) -> PathBuf {
        PathBuf::from(format!("{}_{}.txt", base.display(), job_id))
    }

    fn disambiguate(target: &Path) -> Result<PathBuf> {
        if !target.exists() {
            return Ok(target.to_path_buf());
        }

        let stem = target
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("transcript");
        let ext = target.extension().and_then(|e| e.to_str());

        for n in 1..1000u32 {
            let name = match ext {
                Some(ext) => format!("{}_{}.{}", stem, n, ext),
                None => format!("{}_{}", stem, n),
            };
            let candidate = target.with_file_name(name);
            if !candidate.exists() {
                return Ok(candidate);
            }
        }

        Err(ScribeError::RoutingConflict(target.to_path_buf()).into())
    }
}

impl Default for OutputRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobError, Source};

    fn succeeded_job(text: &str) -> Job {
        let mut job = Job::new(
            JobId::from("job_0_0"),
            Source::parse("https://example.com/talk"),
            None,
            LanguageHint::Auto,
        );
        job.advance(JobState::Fetching);
        job.advance(JobState::Transcribing);
        job.succeed(text.to_string());
        job
    }

    #[test]
    fn record_prepends_source_reference() {
        let record = OutputRecord::from_job(&succeeded_job("hello world")).unwrap();
        let text = record.clipboard_text();
        assert!(text.starts_with("Source: https://example.com/talk\n\n"));
        assert!(text.ends_with("hello world"));
    }

    #[test]
    fn failed_job_routes_as_error_naming_the_reason() {
        let mut job = Job::new(
            JobId::from("job_0_1"),
            Source::parse("https://example.com/x"),
            None,
            LanguageHint::Auto,
        );
        job.advance(JobState::Fetching);
        job.fail(JobError::Fetch("host unreachable".into()));

        let err = OutputRecord::from_job(&job).unwrap_err();
        assert!(err.to_string().contains("host unreachable"));
    }

    #[test]
    fn pending_job_cannot_be_routed() {
        let job = Job::new(
            JobId::from("job_0_2"),
            Source::parse("https://example.com/y"),
            None,
            LanguageHint::Auto,
        );
        assert!(OutputRecord::from_job(&job).is_err());
    }

    #[test]
    fn routing_is_idempotent() {
        let job = succeeded_job("same text");
        let first = OutputRecord::from_job(&job).unwrap();
        let second = OutputRecord::from_job(&job).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn file_sink_disambiguates_instead_of_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let record = OutputRecord::from_job(&succeeded_job("contents")).unwrap();
        let router = OutputRouter::new();

        let first = router.save_to_file(&record, &target).unwrap();
        let second = router.save_to_file(&record, &target).unwrap();

        assert_eq!(first, target);
        assert_eq!(second, dir.path().join("out_1.txt"));
        assert_eq!(
            fs_err::read_to_string(&first).unwrap(),
            fs_err::read_to_string(&second).unwrap()
        );
    }

    #[test]
    fn batch_target_embeds_job_id() {
        let target = OutputRouter::batch_target(Path::new("minutes"), &JobId::from("job_9_3"));
        assert_eq!(target, PathBuf::from("minutes_job_9_3.txt"));
    }
}

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::fetch::{render_format_table, Fetcher};
use crate::job::{JobId, JobState, LanguageHint, Source};
use crate::output::{OutputRecord, OutputRouter};
use crate::pool::{PoolSummary, StageRunner, WorkerPool};
use crate::registry::JobRegistry;
use crate::transcribe::Transcriber;
use crate::{Result, ScribeError};

/// Shared options for a session, resolved from CLI flags and config.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Maximum concurrently in-flight jobs.
    pub workers: usize,
    /// Format id applied to every submitted URL, unless overridden per job.
    pub format_hint: Option<String>,
    /// Language applied to every submitted job, unless overridden per job.
    pub language: LanguageHint,
    /// Base name for batch-mode transcript files; no file sink when absent.
    pub output_base: Option<PathBuf>,
}

/// Outcome of a batch run, used for the process exit code.
#[derive(Debug, Clone, Copy)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// One interactive command, decoded from a line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add {
        source: String,
        format: Option<String>,
        language: Option<String>,
    },
    List,
    Process,
    Copy(JobId),
    Save { id: JobId, path: PathBuf },
    Formats(String),
    Quit,
}

impl Command {
    /// Decode a command line. Malformed input is a [`ScribeError::Usage`];
    /// the interactive loop reports it and keeps running.
    pub fn parse(line: &str) -> std::result::Result<Command, ScribeError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&verb) = tokens.first() else {
            return Err(ScribeError::Usage("empty command".to_string()));
        };

        match verb.to_ascii_lowercase().as_str() {
            "add" => match tokens.len() {
                2..=4 => Ok(Command::Add {
                    source: tokens[1].to_string(),
                    format: tokens.get(2).map(|s| s.to_string()),
                    language: tokens.get(3).map(|s| s.to_string()),
                }),
                _ => Err(ScribeError::Usage(
                    "add <source> [format_id] [language]".to_string(),
                )),
            },
            "list" => Ok(Command::List),
            "process" => Ok(Command::Process),
            "copy" => match tokens.len() {
                2 => Ok(Command::Copy(JobId::from(tokens[1]))),
                _ => Err(ScribeError::Usage("copy <job_id>".to_string())),
            },
            "save" => match tokens.len() {
                3 => Ok(Command::Save {
                    id: JobId::from(tokens[1]),
                    path: PathBuf::from(tokens[2]),
                }),
                _ => Err(ScribeError::Usage("save <job_id> <path>".to_string())),
            },
            "formats" => match tokens.len() {
                2 => Ok(Command::Formats(tokens[1].to_string())),
                _ => Err(ScribeError::Usage("formats <url>".to_string())),
            },
            "quit" | "q" | "exit" => Ok(Command::Quit),
            other => Err(ScribeError::Usage(format!(
                "unknown command '{}'. Available: add, list, process, copy, save, formats, quit",
                other
            ))),
        }
    }
}

/// Owns the registry, worker pool, and output router for one program run.
/// Both front ends (batch and interactive) drive the same machinery.
pub struct Session {
    registry: Arc<JobRegistry>,
    pool: WorkerPool,
    fetcher: Arc<dyn Fetcher>,
    router: OutputRouter,
    options: SessionOptions,
    // Scratch space for audio artifacts; removed when the session drops, so
    // artifacts owed by abandoned jobs go with it.
    _scratch: TempDir,
}

impl Session {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        transcriber: Arc<dyn Transcriber>,
        options: SessionOptions,
    ) -> Result<Self> {
        let scratch = TempDir::new().context("failed to create scratch directory")?;
        let registry = Arc::new(JobRegistry::new());
        let runner = Arc::new(StageRunner::new(
            fetcher.clone(),
            transcriber,
            scratch.path(),
        ));
        let pool = WorkerPool::new(registry.clone(), runner, options.workers);

        Ok(Self {
            registry,
            pool,
            fetcher,
            router: OutputRouter::new(),
            options,
            _scratch: scratch,
        })
    }

    /// Create one pending job from raw operator input.
    pub fn submit(
        &self,
        raw_source: &str,
        format: Option<String>,
        language: Option<String>,
    ) -> JobId {
        let source = Source::parse(raw_source);
        let format_hint = format.or_else(|| self.options.format_hint.clone());
        let language_hint = match language {
            Some(code) => LanguageHint::parse(Some(&code)),
            None => self.options.language.clone(),
        };
        self.registry.create(source, format_hint, language_hint)
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    async fn process_pending(&self) -> PoolSummary {
        let batch = self.registry.pending_ids();
        if batch.is_empty() {
            return PoolSummary::default();
        }

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap(),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message(format!(
            "Processing {} job(s) with {} worker(s)...",
            batch.len(),
            self.pool.workers()
        ));

        let summary = self.pool.run(batch).await;
        spinner.finish_and_clear();
        summary
    }

    /// Batch front end: submit every source, run the pool to completion,
    /// route outputs in submission order, report a tally.
    pub async fn run_batch(&self, sources: &[String]) -> Result<BatchReport> {
        for raw in sources {
            let id = self.submit(raw, None, None);
            println!("Added {} for {}", id, raw);
        }

        let summary = self.process_pending().await;

        println!();
        println!("{}", "=".repeat(60));
        println!("TRANSCRIPTION RESULTS");
        println!("{}", "=".repeat(60));

        for job in self.registry.list() {
            println!();
            println!("Job ID: {}", job.id);
            println!("Source: {}", job.source);
            println!("Status: {}", job.state);

            match job.state {
                JobState::Succeeded => {
                    if let Some(transcript) = &job.transcript {
                        println!("Transcript:\n{}", transcript);
                    }

                    let record = OutputRecord::from_job(&job)?;
                    match self.router.copy_to_clipboard(&record) {
                        Ok(()) => println!("✓ Transcript (with source) copied to clipboard"),
                        Err(e) => eprintln!("clipboard unavailable: {}", e),
                    }

                    if let Some(base) = &self.options.output_base {
                        let target = OutputRouter::batch_target(base, &job.id);
                        match self.router.save_to_file(&record, &target) {
                            Ok(path) => println!("✓ Transcript saved to {}", path.display()),
                            Err(e) => eprintln!("failed to save transcript: {}", e),
                        }
                    }
                }
                JobState::Failed => {
                    if let Some(error) = &job.error {
                        println!("Error: {}", error);
                    }
                }
                _ => {}
            }
            println!("{}", "-".repeat(40));
        }

        if summary.failed > 0 {
            eprintln!(
                "{} of {} job(s) failed:",
                summary.failed,
                summary.total()
            );
            for job in self.registry.list() {
                if job.state == JobState::Failed {
                    if let Some(error) = &job.error {
                        eprintln!("  {} ({}): {}", job.id, job.source, error);
                    }
                }
            }
        } else {
            eprintln!("All {} job(s) succeeded", summary.total());
        }

        Ok(BatchReport {
            succeeded: summary.succeeded,
            failed: summary.failed,
        })
    }

    /// Interactive front end: a line-oriented command loop. Command errors
    /// are reported inline; only `quit` or end-of-input ends the loop.
    pub async fn run_interactive(&self) -> Result<()> {
        println!("=== mediascribe - Interactive Mode ===");
        println!("Commands: add, list, process, copy, save, formats, quit");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("\n> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            let command = match Command::parse(&line) {
                Ok(command) => command,
                Err(e) => {
                    println!("{}", e);
                    continue;
                }
            };

            match command {
                Command::Quit => break,
                other => {
                    if let Err(e) = self.dispatch(other).await {
                        println!("Error: {}", e);
                    }
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    async fn dispatch(&self, command: Command) -> Result<()> {
        match command {
            Command::Add {
                source,
                format,
                language,
            } => {
                let id = self.submit(&source, format, language);
                println!("Added {}", id);
            }
            Command::List => {
                let jobs = self.registry.list();
                if jobs.is_empty() {
                    println!("No jobs");
                    return Ok(());
                }
                println!("{:<24} {:<13} {}", "Job ID", "Status", "Source");
                println!("{}", "-".repeat(70));
                for job in jobs {
                    let mut line =
                        format!("{:<24} {:<13} {}", job.id, job.state.as_str(), job.source);
                    if let Some(preview) = job.outcome_preview() {
                        line.push_str(&format!("  | {}", preview));
                    }
                    println!("{}", line);
                }
            }
            Command::Process => {
                let summary = self.process_pending().await;
                if summary.total() == 0 {
                    println!("No pending jobs");
                } else {
                    println!(
                        "Processing completed: {} succeeded, {} failed",
                        summary.succeeded, summary.failed
                    );
                }
            }
            Command::Copy(id) => {
                let job = self.registry.get(&id)?;
                let record = OutputRecord::from_job(&job)?;
                self.router.copy_to_clipboard(&record)?;
                println!("Transcript copied to clipboard");
            }
            Command::Save { id, path } => {
                let job = self.registry.get(&id)?;
                let record = OutputRecord::from_job(&job)?;
                let written = self.router.save_to_file(&record, &path)?;
                println!("Transcript saved to {}", written.display());
            }
            Command::Formats(url) => {
                let formats = self.fetcher.list_formats(&url).await?;
                if formats.is_empty() {
                    println!("No audio formats found");
                } else {
                    print!("{}", render_format_table(&formats));
                }
            }
            Command::Quit => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_vocabulary_word() {
        assert_eq!(
            Command::parse("add https://example.com/v 140 en").unwrap(),
            Command::Add {
                source: "https://example.com/v".into(),
                format: Some("140".into()),
                language: Some("en".into()),
            }
        );
        assert_eq!(Command::parse("list").unwrap(), Command::List);
        assert_eq!(Command::parse("process").unwrap(), Command::Process);
        assert_eq!(
            Command::parse("copy job_1_0").unwrap(),
            Command::Copy(JobId::from("job_1_0"))
        );
        assert_eq!(
            Command::parse("save job_1_0 out.txt").unwrap(),
            Command::Save {
                id: JobId::from("job_1_0"),
                path: PathBuf::from("out.txt"),
            }
        );
        assert_eq!(
            Command::parse("formats https://example.com/v").unwrap(),
            Command::Formats("https://example.com/v".into())
        );
        assert_eq!(Command::parse("quit").unwrap(), Command::Quit);
        assert_eq!(Command::parse("Q").unwrap(), Command::Quit);
    }

    #[test]
    fn arity_errors_are_usage_errors() {
        for line in ["add", "copy", "copy a b", "save job_1_0", "formats", ""] {
            assert!(
                matches!(Command::parse(line), Err(ScribeError::Usage(_))),
                "expected usage error for {:?}",
                line
            );
        }
    }

    #[test]
    fn unknown_verbs_are_usage_errors() {
        let err = Command::parse("frobnicate x").unwrap_err();
        assert!(err.to_string().contains("unknown command"));
    }

    #[test]
    fn verbs_are_case_insensitive() {
        assert_eq!(Command::parse("LIST").unwrap(), Command::List);
        assert_eq!(Command::parse("Process").unwrap(), Command::Process);
    }
}

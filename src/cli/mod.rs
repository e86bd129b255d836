use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "mediascribe",
    about = "Transcribe remote and local media to text using yt-dlp and whisper.cpp",
    version,
    long_about = "Turns media references (URLs or local files) into text transcripts. \
Runs jobs through a bounded worker pool, copies results to the clipboard and \
optionally to disk, and offers an interactive session for managing many jobs at once."
)]
pub struct Cli {
    /// Media URLs or local file paths to transcribe
    #[arg(value_name = "SOURCE", required_unless_present = "interactive")]
    pub sources: Vec<String>,

    /// Number of concurrently processed jobs (each in-flight job may run its
    /// own whisper process; raise with care on memory-constrained machines)
    #[arg(short, long, value_name = "COUNT")]
    pub workers: Option<usize>,

    /// Whisper model file to use (e.g. ggml-base.bin)
    #[arg(short, long, value_name = "FILE")]
    pub model: Option<PathBuf>,

    /// Language code for transcription, or "auto" (default: auto-detect)
    #[arg(short, long, value_name = "LANG")]
    pub language: Option<String>,

    /// Explicit audio format id to download (see --list-formats)
    #[arg(short, long, value_name = "ID")]
    pub format_id: Option<String>,

    /// Base name for saved transcript files (one file per job)
    #[arg(short, long, value_name = "BASE")]
    pub output: Option<PathBuf>,

    /// Start an interactive session instead of a batch run
    #[arg(short, long)]
    pub interactive: bool,

    /// List available audio formats for the given sources and exit
    #[arg(long)]
    pub list_formats: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_invocation_parses() {
        let cli = Cli::try_parse_from([
            "mediascribe",
            "-w",
            "2",
            "-l",
            "en",
            "-o",
            "notes",
            "https://example.com/a",
            "clip.mp3",
        ])
        .unwrap();
        assert_eq!(cli.sources.len(), 2);
        assert_eq!(cli.workers, Some(2));
        assert_eq!(cli.language.as_deref(), Some("en"));
        assert!(!cli.interactive);
    }

    #[test]
    fn interactive_mode_needs_no_sources() {
        let cli = Cli::try_parse_from(["mediascribe", "--interactive"]).unwrap();
        assert!(cli.interactive);
        assert!(cli.sources.is_empty());
    }

    #[test]
    fn sources_are_required_without_interactive() {
        assert!(Cli::try_parse_from(["mediascribe"]).is_err());
    }
}

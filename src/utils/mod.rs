use crate::config::Config;
use crate::fetch::ytdlp::YtDlpFetcher;
use crate::transcribe::WhisperCliTranscriber;

/// Probe the configured external tools, returning a warning line for each one
/// that cannot be spawned. Missing tools are reported, not fatal: they only
/// matter once a job actually needs them.
pub async fn check_dependencies(config: &Config) -> Vec<String> {
    let mut missing = Vec::new();

    let ytdlp = YtDlpFetcher::new(&config.tools.yt_dlp_path);
    if !ytdlp.check_availability().await {
        missing.push(format!(
            "{} not found - URL sources will fail to fetch (install: https://github.com/yt-dlp/yt-dlp)",
            config.tools.yt_dlp_path
        ));
    }

    let whisper = WhisperCliTranscriber::new(&config.tools.whisper_path, &config.tools.whisper_model);
    if !whisper.check_availability().await {
        missing.push(format!(
            "{} not found - transcription will fail (install whisper.cpp and its CLI)",
            config.tools.whisper_path
        ));
    }

    if !config.tools.whisper_model.exists() {
        missing.push(format!(
            "whisper model {} not found",
            config.tools.whisper_model.display()
        ));
    }

    missing
}

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let value = bytes_f / THRESHOLD.powi(unit_index as i32);
    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", value, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sizes_format_human_readably() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(2048), "2.0 KB");
        assert_eq!(format_file_size(3_400_000), "3.2 MB");
    }
}

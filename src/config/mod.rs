use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// External tool configuration
    pub tools: ToolsConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the yt-dlp executable
    pub yt_dlp_path: String,

    /// Path to the whisper.cpp CLI executable
    pub whisper_path: String,

    /// Whisper model file
    pub whisper_model: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default number of concurrently processed jobs
    pub max_workers: usize,

    /// Default language code (auto-detect if not set)
    pub default_language: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools: ToolsConfig {
                yt_dlp_path: "yt-dlp".to_string(),
                whisper_path: "whisper-cli".to_string(),
                whisper_model: PathBuf::from("ggml-base.bin"),
            },
            app: AppConfig {
                max_workers: 4,
                default_language: None,
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content =
                fs_err::read_to_string(&config_path).context("Failed to read config file")?;

            let config: Config =
                serde_yaml::from_str(&content).context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("mediascribe").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.app.max_workers == 0 {
            anyhow::bail!("max_workers must be at least 1");
        }

        if self.tools.yt_dlp_path.is_empty() || self.tools.whisper_path.is_empty() {
            anyhow::bail!("tool paths must not be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut config = Config::default();
        config.app.max_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.tools.yt_dlp_path, config.tools.yt_dlp_path);
        assert_eq!(parsed.app.max_workers, config.app.max_workers);
    }
}

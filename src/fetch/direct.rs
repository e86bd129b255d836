use async_trait::async_trait;
use futures_util::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{extension_of, FetchError, MediaFetcher, MEDIA_EXTENSIONS};
use crate::job::Source;

/// Streams direct media URLs (URLs whose path already names an audio or video
/// file) straight over HTTP, bypassing yt-dlp.
pub struct DirectFetcher {
    client: reqwest::Client,
}

impl DirectFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn media_extension(url: &str) -> Option<String> {
        let path = url::Url::parse(url).ok().map(|u| u.path().to_string())?;
        extension_of(&path).filter(|ext| MEDIA_EXTENSIONS.contains(&ext.as_str()))
    }
}

impl Default for DirectFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaFetcher for DirectFetcher {
    fn supports(&self, source: &Source) -> bool {
        match source {
            Source::Url(url) => Self::media_extension(url).is_some(),
            Source::LocalFile(_) => false,
        }
    }

    fn backend_name(&self) -> &'static str {
        "direct"
    }

    async fn fetch(
        &self,
        source: &Source,
        _format_hint: Option<&str>,
        dest_base: &Path,
    ) -> Result<PathBuf, FetchError> {
        let url = source.to_string();
        let ext = Self::media_extension(&url).unwrap_or_else(|| "mp3".to_string());
        let dest = dest_base.with_extension(ext);

        tracing::debug!("streaming {} -> {}", url, dest.display());

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Download(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Download(format!(
                "HTTP {} for {}",
                response.status(),
                url
            )));
        }

        let mut file =
            fs_err::File::create(&dest).map_err(|e| FetchError::Download(e.to_string()))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::Download(e.to_string()))?;
            file.write_all(&chunk)
                .map_err(|e| FetchError::Download(e.to_string()))?;
        }

        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supports_only_urls_with_media_extensions() {
        let fetcher = DirectFetcher::new();
        assert!(fetcher.supports(&Source::Url("https://cdn.test/ep1.mp3".into())));
        assert!(fetcher.supports(&Source::Url("https://cdn.test/talk.M4A".into())));
        assert!(!fetcher.supports(&Source::Url("https://youtube.com/watch?v=abc".into())));
        assert!(!fetcher.supports(&Source::parse("/tmp/ep1.mp3")));
    }
}

use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use url::Url;

use super::{MediaExtractor, ResolvedStream, StreamHandle, TrackMetadata};
use crate::ConvertError;

const MEDIA_EXTENSIONS: &[&str] = &[
    "mp3", "m4a", "aac", "wav", "flac", "ogg", "opus", "webm", "mp4", "mkv", "mov",
];

/// Direct URL extractor for audio and video files
pub struct DirectExtractor {
    client: Client,
}

impl DirectExtractor {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Determine the container extension from URL or content type
    fn determine_ext(url: &str, content_type: Option<&str>) -> String {
        if let Some(ext) = url_extension(url) {
            if MEDIA_EXTENSIONS.contains(&ext.as_str()) {
                return ext;
            }
        }

        if let Some(content_type) = content_type {
            match content_type {
                ct if ct.contains("mpeg") || ct.contains("mp3") => return "mp3".to_string(),
                ct if ct.contains("mp4") || ct.contains("m4a") => return "m4a".to_string(),
                ct if ct.contains("wav") => return "wav".to_string(),
                ct if ct.contains("flac") => return "flac".to_string(),
                ct if ct.contains("ogg") => return "ogg".to_string(),
                ct if ct.contains("webm") => return "webm".to_string(),
                _ => {}
            }
        }

        "mp3".to_string()
    }

    /// Get content information via HEAD request
    async fn get_content_info(&self, url: &str) -> Result<Option<String>, ConvertError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| ConvertError::Extraction(format!("cannot reach {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(ConvertError::Extraction(format!(
                "cannot access {url}: HTTP {}",
                response.status()
            )));
        }

        Ok(response
            .headers()
            .get("content-type")
            .and_then(|ct| ct.to_str().ok())
            .map(|s| s.to_string()))
    }
}

#[async_trait]
impl MediaExtractor for DirectExtractor {
    async fn resolve(&self, url: &str) -> Result<ResolvedStream, ConvertError> {
        let parsed_url = Url::parse(url)
            .map_err(|_| ConvertError::Extraction(format!("invalid URL: {url}")))?;

        let content_type = self.get_content_info(url).await?;
        let ext = Self::determine_ext(url, content_type.as_deref());

        // Derive a human title from the final path segment
        let title = parsed_url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|filename| !filename.is_empty())
            .map(|filename| {
                let name = match filename.rfind('.') {
                    Some(dot_pos) => &filename[..dot_pos],
                    None => filename,
                };
                urlencoding::decode(name)
                    .unwrap_or_else(|_| name.into())
                    .replace(['_', '-'], " ")
            })
            .unwrap_or_default();

        Ok(ResolvedStream {
            handle: StreamHandle::Http {
                url: url.to_string(),
                ext,
            },
            metadata: TrackMetadata {
                title,
                author: String::new(),
                thumbnail_url: None,
            },
        })
    }

    async fn download(
        &self,
        handle: &StreamHandle,
        dest_dir: &Path,
        base_name: &str,
    ) -> Result<PathBuf, ConvertError> {
        let StreamHandle::Http { url, ext } = handle else {
            return Err(ConvertError::Download(
                "stream handle does not belong to the direct extractor".to_string(),
            ));
        };

        let dest = dest_dir.join(format!("{base_name}.{ext}"));
        tracing::debug!(url = %url, dest = %dest.display(), "downloading direct media url");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ConvertError::Download(format!("request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ConvertError::Download(format!(
                "failed to download audio: HTTP {}",
                response.status()
            )));
        }

        let mut file = fs_err::File::create(&dest)?;
        let mut stream = response.bytes_stream();

        use futures_util::StreamExt;
        use std::io::Write;

        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| ConvertError::Download(format!("download interrupted: {e}")))?;
            file.write_all(&chunk)?;
        }

        Ok(dest)
    }

    fn supports_url(&self, url: &str) -> bool {
        if Url::parse(url).is_err() {
            return false;
        }

        url_extension(url)
            .map(|ext| MEDIA_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    fn platform_name(&self) -> &'static str {
        "Direct URL"
    }
}

impl Default for DirectExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercased extension of the URL's final path segment, query ignored
fn url_extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let filename = parsed.path_segments()?.next_back()?;
    let ext = Path::new(filename).extension()?;
    Some(ext.to_string_lossy().to_lowercase())
}

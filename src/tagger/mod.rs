use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{Tag, TagType};
use std::path::Path;
use std::time::Duration;

use crate::extractors::TrackMetadata;

/// Failures while writing tags or fetching cover art.
///
/// This type is intentionally separate from [`crate::ConvertError`]: the
/// pipeline treats tagging as best-effort, so these errors are logged and
/// never abort a conversion.
#[derive(thiserror::Error, Debug)]
pub enum TagError {
    #[error("cover art fetch failed: {0}")]
    ArtworkFetch(String),

    #[error("tag write failed: {0}")]
    Write(String),
}

/// Trait for injecting title/artist/cover-art metadata into a finished MP3
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TagWrite: Send + Sync {
    async fn inject(&self, mp3_path: &Path, metadata: &TrackMetadata) -> Result<(), TagError>;
}

/// ID3v2 tag writer backed by lofty, with an HTTP client for cover art
pub struct TagWriter {
    client: reqwest::Client,
}

impl TagWriter {
    pub fn new(artwork_timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(artwork_timeout_secs))
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// Fetch the thumbnail and report its bytes plus embedded MIME type
    async fn fetch_artwork(&self, url: &str) -> Result<(Vec<u8>, MimeType), TagError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TagError::ArtworkFetch(format!("request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(TagError::ArtworkFetch(format!(
                "HTTP {} from {url}",
                response.status()
            )));
        }

        let mime = match response
            .headers()
            .get("content-type")
            .and_then(|ct| ct.to_str().ok())
        {
            Some(ct) if ct.contains("png") => MimeType::Png,
            _ => MimeType::Jpeg,
        };

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TagError::ArtworkFetch(format!("reading image body failed: {e}")))?;

        Ok((bytes.to_vec(), mime))
    }

    /// Existing primary tag of the file, or a fresh ID3v2 tag
    fn open_tag(mp3_path: &Path) -> Tag {
        Probe::open(mp3_path)
            .ok()
            .and_then(|probe| probe.read().ok())
            .and_then(|tagged| tagged.primary_tag().cloned())
            .unwrap_or_else(|| Tag::new(TagType::Id3v2))
    }
}

#[async_trait]
impl TagWrite for TagWriter {
    async fn inject(&self, mp3_path: &Path, metadata: &TrackMetadata) -> Result<(), TagError> {
        let mut tag = Self::open_tag(mp3_path);

        if !metadata.title.is_empty() {
            tag.set_title(metadata.title.clone());
        }
        if !metadata.author.is_empty() {
            tag.set_artist(metadata.author.clone());
        }

        if let Some(url) = &metadata.thumbnail_url {
            let (bytes, mime) = self.fetch_artwork(url).await?;
            tag.push_picture(Picture::new_unchecked(
                PictureType::CoverFront,
                Some(mime),
                None,
                bytes,
            ));
        }

        tag.save_to_path(mp3_path, WriteOptions::default())
            .map_err(|e| TagError::Write(e.to_string()))?;

        tracing::debug!(path = %mp3_path.display(), "metadata written");
        Ok(())
    }
}

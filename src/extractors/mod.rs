use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub mod direct;
pub mod youtube;

use crate::ConvertError;

/// Descriptive metadata for a resolved track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    /// Track or video title
    pub title: String,

    /// Uploader, channel or artist name
    pub author: String,

    /// Cover-art image URL if the platform provides one
    pub thumbnail_url: Option<String>,
}

/// Opaque reference to a remote audio stream, valid for one request.
///
/// The handle carries everything the owning extractor needs to perform the
/// actual download later; callers never look inside it.
#[derive(Debug, Clone)]
pub enum StreamHandle {
    /// Directly fetchable media URL with a container extension hint
    Http { url: String, ext: String },

    /// Page URL whose audio is fetched through yt-dlp's own downloader
    YtDlp { url: String, format: String },
}

/// Result of resolving a URL: a downloadable stream plus its metadata
#[derive(Debug, Clone)]
pub struct ResolvedStream {
    pub handle: StreamHandle,
    pub metadata: TrackMetadata,
}

/// Trait for resolving and downloading audio from different platforms
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Resolve a URL into the best available audio-only stream and metadata
    async fn resolve(&self, url: &str) -> Result<ResolvedStream, ConvertError>;

    /// Download the stream into `dest_dir` under the given name stem,
    /// returning the path of the written file
    async fn download(
        &self,
        handle: &StreamHandle,
        dest_dir: &Path,
        base_name: &str,
    ) -> Result<PathBuf, ConvertError>;

    /// Check if this extractor supports the given URL
    fn supports_url(&self, url: &str) -> bool;

    /// Get the name of this platform
    fn platform_name(&self) -> &'static str;
}

/// Registry for managing multiple extractors
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn MediaExtractor>>,
}

impl ExtractorRegistry {
    /// Create a new registry with default extractors
    pub fn new() -> Self {
        let mut registry = Self {
            extractors: Vec::new(),
        };

        registry.register(Box::new(youtube::YoutubeExtractor::new()));
        registry.register(Box::new(direct::DirectExtractor::new()));

        registry
    }

    /// Create an empty registry (callers register their own extractors)
    pub fn empty() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Register a new extractor
    pub fn register(&mut self, extractor: Box<dyn MediaExtractor>) {
        self.extractors.push(extractor);
    }

    /// Find an extractor that supports the given URL
    pub fn find_extractor(&self, url: &str) -> Option<&dyn MediaExtractor> {
        self.extractors
            .iter()
            .find(|extractor| extractor.supports_url(url))
            .map(|boxed| boxed.as_ref())
    }

    /// List all supported platforms
    pub fn list_platforms(&self) -> Vec<&'static str> {
        self.extractors
            .iter()
            .map(|extractor| extractor.platform_name())
            .collect()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

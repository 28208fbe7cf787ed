use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::extractors::ExtractorRegistry;
use crate::tagger::{TagWrite, TagWriter};
use crate::transcode::{FfmpegTranscoder, Transcode};
use crate::utils::sanitize_title;
use crate::ConvertError;

/// Finished conversion: an MP3 on disk plus the name it should be served as.
///
/// Whoever receives the artifact owns deleting `path` once it has been
/// delivered; the pipeline itself only cleans up intermediate files.
#[derive(Debug, Clone)]
pub struct Mp3Artifact {
    pub path: PathBuf,
    pub display_name: String,
    pub id: String,
}

/// Trait for anything that can turn a URL into an [`Mp3Artifact`]
#[async_trait]
pub trait Converter: Send + Sync {
    async fn process_url(&self, url: &str, quality: &str) -> Result<Mp3Artifact, ConvertError>;
}

/// The conversion pipeline: extract, download, transcode, tag, clean up
pub struct ConversionPipeline {
    registry: ExtractorRegistry,
    transcoder: Arc<dyn Transcode>,
    tagger: Arc<dyn TagWrite>,
    download_dir: PathBuf,
}

impl ConversionPipeline {
    /// Build the default pipeline from configuration
    pub fn new(config: &Config) -> Self {
        Self {
            registry: ExtractorRegistry::new(),
            transcoder: Arc::new(FfmpegTranscoder::new(config.conversion.transcode_timeout_secs)),
            tagger: Arc::new(TagWriter::new(config.conversion.artwork_timeout_secs)),
            download_dir: config.storage.download_dir.clone(),
        }
    }

    /// Build a pipeline from explicit components
    pub fn with_components(
        registry: ExtractorRegistry,
        transcoder: Arc<dyn Transcode>,
        tagger: Arc<dyn TagWrite>,
        download_dir: PathBuf,
    ) -> Self {
        Self {
            registry,
            transcoder,
            tagger,
            download_dir,
        }
    }
}

#[async_trait]
impl Converter for ConversionPipeline {
    async fn process_url(&self, url: &str, quality: &str) -> Result<Mp3Artifact, ConvertError> {
        if !crate::transcode::is_valid_quality(quality) {
            return Err(ConvertError::InvalidQuality(quality.to_string()));
        }

        let id = Uuid::new_v4().to_string();

        let extractor = self.registry.find_extractor(url).ok_or_else(|| {
            ConvertError::Extraction(format!("no extractor supports this URL: {url}"))
        })?;

        tracing::info!(url = %url, platform = extractor.platform_name(), id = %id, "resolving url");
        let resolved = extractor.resolve(url).await?;

        let base_name = format!("{id}_base");
        let raw_path = extractor
            .download(&resolved.handle, &self.download_dir, &base_name)
            .await?;
        // The raw download is removed on every exit path from here on.
        let _raw_guard = TempGuard::armed(raw_path.clone());

        let sanitized = sanitize_title(&resolved.metadata.title);
        let display_name = if sanitized.is_empty() {
            format!("{id}.mp3")
        } else {
            format!("{sanitized}.mp3")
        };

        let mp3_path = self.download_dir.join(format!("{id}.mp3"));
        let mut mp3_guard = TempGuard::armed(mp3_path.clone());

        self.transcoder
            .convert(&raw_path, &mp3_path, quality)
            .await?;

        if let Err(error) = self.tagger.inject(&mp3_path, &resolved.metadata).await {
            tracing::warn!(
                error = %error,
                path = %mp3_path.display(),
                "metadata injection failed, delivering untagged file"
            );
        }

        mp3_guard.disarm();

        tracing::info!(
            id = %id,
            path = %mp3_path.display(),
            display_name = %display_name,
            "conversion finished"
        );

        Ok(Mp3Artifact {
            path: mp3_path,
            display_name,
            id,
        })
    }
}

/// Removes a file when dropped, unless disarmed first.
///
/// Guarantees intermediate files are cleaned up on every exit path of
/// `process_url` instead of per-branch delete calls.
struct TempGuard {
    path: PathBuf,
    armed: bool,
}

impl TempGuard {
    fn armed(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "temp file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove temp file")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::extractors::{
        MockMediaExtractor, ResolvedStream, StreamHandle, TrackMetadata,
    };
    use crate::tagger::{MockTagWrite, TagError};
    use crate::transcode::MockTranscode;

    fn resolved(title: &str) -> ResolvedStream {
        ResolvedStream {
            handle: StreamHandle::Http {
                url: "https://cdn.example.com/a.m4a".to_string(),
                ext: "m4a".to_string(),
            },
            metadata: TrackMetadata {
                title: title.to_string(),
                author: "Some Artist".to_string(),
                thumbnail_url: None,
            },
        }
    }

    fn mock_extractor(title: &'static str) -> MockMediaExtractor {
        let mut extractor = MockMediaExtractor::new();
        extractor.expect_supports_url().return_const(true);
        extractor.expect_platform_name().return_const("Mock");
        extractor
            .expect_resolve()
            .returning(move |_| Ok(resolved(title)));
        extractor
            .expect_download()
            .returning(|_, dest_dir, base_name| {
                let path = dest_dir.join(format!("{base_name}.m4a"));
                fs_err::write(&path, b"raw audio").unwrap();
                Ok(path)
            });
        extractor
    }

    fn writing_transcoder() -> MockTranscode {
        let mut transcoder = MockTranscode::new();
        transcoder.expect_convert().returning(|_, output, _| {
            fs_err::write(output, b"mp3 bytes").unwrap();
            Ok(())
        });
        transcoder
    }

    fn ok_tagger() -> MockTagWrite {
        let mut tagger = MockTagWrite::new();
        tagger.expect_inject().returning(|_, _| Ok(()));
        tagger
    }

    fn pipeline_with(
        extractor: MockMediaExtractor,
        transcoder: MockTranscode,
        tagger: MockTagWrite,
        dir: &Path,
    ) -> ConversionPipeline {
        let mut registry = ExtractorRegistry::empty();
        registry.register(Box::new(extractor));
        ConversionPipeline::with_components(
            registry,
            Arc::new(transcoder),
            Arc::new(tagger),
            dir.to_path_buf(),
        )
    }

    #[tokio::test]
    async fn test_success_removes_raw_file_and_keeps_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(
            mock_extractor("My Track"),
            writing_transcoder(),
            ok_tagger(),
            dir.path(),
        );

        let artifact = pipeline
            .process_url("https://example.com/watch", "192k")
            .await
            .unwrap();

        assert_eq!(artifact.display_name, "My Track.mp3");
        assert!(artifact.path.exists());

        let raw_path = dir.path().join(format!("{}_base.m4a", artifact.id));
        assert!(!raw_path.exists(), "raw temp file must be removed");
    }

    #[tokio::test]
    async fn test_transcode_failure_cleans_everything_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut transcoder = MockTranscode::new();
        transcoder.expect_convert().returning(|_, output, _| {
            // ffmpeg may leave a partial output behind before failing
            fs_err::write(output, b"partial").unwrap();
            Err(ConvertError::Transcode("boom".to_string()))
        });

        let pipeline = pipeline_with(
            mock_extractor("My Track"),
            transcoder,
            ok_tagger(),
            dir.path(),
        );

        let result = pipeline.process_url("https://example.com/watch", "192k").await;
        assert!(matches!(result, Err(ConvertError::Transcode(_))));

        let leftovers: Vec<_> = fs_err::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert!(leftovers.is_empty(), "storage dir not clean: {leftovers:?}");
    }

    #[tokio::test]
    async fn test_tag_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let mut tagger = MockTagWrite::new();
        tagger
            .expect_inject()
            .returning(|_, _| Err(TagError::ArtworkFetch("unreachable".to_string())));

        let pipeline = pipeline_with(
            mock_extractor("My Track"),
            writing_transcoder(),
            tagger,
            dir.path(),
        );

        let artifact = pipeline
            .process_url("https://example.com/watch", "192k")
            .await
            .expect("tagging is best-effort");
        assert!(artifact.path.exists());
    }

    #[tokio::test]
    async fn test_invalid_quality_is_rejected_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(
            mock_extractor("My Track"),
            writing_transcoder(),
            ok_tagger(),
            dir.path(),
        );

        let result = pipeline.process_url("https://example.com/watch", "best").await;
        assert!(matches!(result, Err(ConvertError::InvalidQuality(_))));
    }

    #[tokio::test]
    async fn test_quality_reaches_transcoder_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let mut transcoder = MockTranscode::new();
        transcoder
            .expect_convert()
            .withf(|_, _, quality| quality == "320k")
            .returning(|_, output, _| {
                fs_err::write(output, b"mp3 bytes").unwrap();
                Ok(())
            });

        let pipeline = pipeline_with(
            mock_extractor("My Track"),
            transcoder,
            ok_tagger(),
            dir.path(),
        );

        pipeline
            .process_url("https://example.com/watch", "320k")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ids_are_unique_across_requests() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(
            mock_extractor("Same Title"),
            writing_transcoder(),
            ok_tagger(),
            dir.path(),
        );

        let first = pipeline
            .process_url("https://example.com/watch", "192k")
            .await
            .unwrap();
        let second = pipeline
            .process_url("https://example.com/watch", "192k")
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_ne!(first.path, second.path);
    }

    #[tokio::test]
    async fn test_empty_title_falls_back_to_id() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(
            mock_extractor("!!!"),
            writing_transcoder(),
            ok_tagger(),
            dir.path(),
        );

        let artifact = pipeline
            .process_url("https://example.com/watch", "192k")
            .await
            .unwrap();
        assert_eq!(artifact.display_name, format!("{}.mp3", artifact.id));
    }

    #[tokio::test]
    async fn test_unsupported_url_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = ConversionPipeline::with_components(
            ExtractorRegistry::empty(),
            Arc::new(writing_transcoder()),
            Arc::new(ok_tagger()),
            dir.path().to_path_buf(),
        );

        let result = pipeline.process_url("https://example.com/watch", "192k").await;
        assert!(matches!(result, Err(ConvertError::Extraction(_))));
    }
}

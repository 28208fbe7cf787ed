use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{MediaExtractor, ResolvedStream, StreamHandle, TrackMetadata};
use crate::ConvertError;

/// YouTube audio extractor using yt-dlp
pub struct YoutubeExtractor {
    yt_dlp_path: String,
}

impl YoutubeExtractor {
    pub fn new() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
        }
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> bool {
        Command::new(&self.yt_dlp_path)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Get video information using yt-dlp
    async fn get_video_info(&self, url: &str) -> Result<Value, ConvertError> {
        tracing::debug!(url = %url, "extracting video info");

        let output = Command::new(&self.yt_dlp_path)
            .args(["--dump-json", "--no-playlist", url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ConvertError::Extraction(format!("failed to run yt-dlp: {e}")))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(ConvertError::Extraction(format!(
                "yt-dlp failed: {}",
                error.trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ConvertError::Extraction(format!("unreadable yt-dlp output: {e}")))
    }

    /// Pick the extension of the best audio-only format, if any exists
    fn best_audio_ext(info: &Value) -> Option<String> {
        let formats = info["formats"].as_array()?;

        formats
            .iter()
            .filter(|f| {
                let acodec = f["acodec"].as_str().unwrap_or("none");
                let vcodec = f["vcodec"].as_str().unwrap_or("none");
                acodec != "none" && vcodec == "none"
            })
            .max_by(|a, b| {
                let abr_a = a["abr"].as_f64().unwrap_or(0.0);
                let abr_b = b["abr"].as_f64().unwrap_or(0.0);
                abr_a.total_cmp(&abr_b)
            })
            .map(|f| f["ext"].as_str().unwrap_or("m4a").to_string())
    }
}

#[async_trait]
impl MediaExtractor for YoutubeExtractor {
    async fn resolve(&self, url: &str) -> Result<ResolvedStream, ConvertError> {
        if !self.check_availability().await {
            return Err(ConvertError::Extraction(
                "yt-dlp is not available. Please install it: https://github.com/yt-dlp/yt-dlp"
                    .to_string(),
            ));
        }

        let info = self.get_video_info(url).await?;

        let title = info["title"].as_str().unwrap_or("").to_string();
        let author = info["artist"]
            .as_str()
            .or_else(|| info["uploader"].as_str())
            .or_else(|| info["channel"].as_str())
            .unwrap_or("")
            .to_string();
        let thumbnail_url = info["thumbnail"].as_str().map(|s| s.to_string());

        if Self::best_audio_ext(&info).is_none() {
            return Err(ConvertError::Extraction(format!(
                "no audio-only stream available for {url}"
            )));
        }

        Ok(ResolvedStream {
            handle: StreamHandle::YtDlp {
                url: url.to_string(),
                format: "bestaudio".to_string(),
            },
            metadata: TrackMetadata {
                title,
                author,
                thumbnail_url,
            },
        })
    }

    async fn download(
        &self,
        handle: &StreamHandle,
        dest_dir: &Path,
        base_name: &str,
    ) -> Result<PathBuf, ConvertError> {
        let StreamHandle::YtDlp { url, format } = handle else {
            return Err(ConvertError::Download(
                "stream handle does not belong to the YouTube extractor".to_string(),
            ));
        };

        let output_template = format!("{}/{}.%(ext)s", dest_dir.to_string_lossy(), base_name);

        tracing::debug!(url = %url, template = %output_template, "downloading audio stream");

        let output = Command::new(&self.yt_dlp_path)
            .args([
                "-f",
                format.as_str(),
                "--no-playlist",
                "--no-warnings",
                "-o",
                output_template.as_str(),
                url.as_str(),
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ConvertError::Download(format!("failed to run yt-dlp: {e}")))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(ConvertError::Download(format!(
                "yt-dlp download failed: {}",
                error.trim()
            )));
        }

        find_downloaded_file(dest_dir, base_name)
    }

    fn supports_url(&self, url: &str) -> bool {
        // Support various YouTube URL formats
        let url_lower = url.to_lowercase();
        url_lower.contains("youtube.com/watch")
            || url_lower.contains("youtu.be/")
            || url_lower.contains("youtube.com/embed/")
            || url_lower.contains("youtube.com/v/")
            || url_lower.contains("m.youtube.com/")
    }

    fn platform_name(&self) -> &'static str {
        "YouTube"
    }
}

impl Default for YoutubeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Locate the file yt-dlp actually wrote. The `%(ext)s` placeholder means the
/// final extension is only known after the download, so scan for the stem.
fn find_downloaded_file(dest_dir: &Path, base_name: &str) -> Result<PathBuf, ConvertError> {
    let prefix = format!("{base_name}.");

    let entries = fs_err::read_dir(dest_dir).map_err(|e| {
        ConvertError::Download(format!("cannot read download directory: {e}"))
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConvertError::Download(e.to_string()))?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(&prefix) {
            return Ok(entry.path());
        }
    }

    Err(ConvertError::Download(format!(
        "downloaded file not found under {} for {base_name}",
        dest_dir.display()
    )))
}

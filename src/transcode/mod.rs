use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::ConvertError;

/// Trait for converting a downloaded audio file into an MP3
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcode: Send + Sync {
    /// Convert `input` into an MP3 at `output` with the given bitrate
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        quality: &str,
    ) -> Result<(), ConvertError>;
}

/// ffmpeg-based transcoder with a bounded wait per invocation
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
    timeout_secs: u64,
}

impl FfmpegTranscoder {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            timeout_secs,
        }
    }

    /// Argument list for one conversion: drop video, resample to 44.1kHz
    /// stereo, target bitrate, overwrite the destination
    fn build_args(input: &Path, output: &Path, quality: &str) -> Vec<String> {
        vec![
            "-i".to_string(),
            input.to_string_lossy().into_owned(),
            "-vn".to_string(),
            "-ar".to_string(),
            "44100".to_string(),
            "-ac".to_string(),
            "2".to_string(),
            "-b:a".to_string(),
            quality.to_string(),
            "-y".to_string(),
            output.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl Transcode for FfmpegTranscoder {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        quality: &str,
    ) -> Result<(), ConvertError> {
        let args = Self::build_args(input, output, quality);

        tracing::debug!(
            input = %input.display(),
            output = %output.display(),
            quality = %quality,
            "invoking ffmpeg"
        );

        let command_future = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        let result = timeout(Duration::from_secs(self.timeout_secs), command_future)
            .await
            .map_err(|_| ConvertError::TranscodeTimeout(self.timeout_secs))?
            .map_err(|e| ConvertError::Transcode(format!("failed to run ffmpeg: {e}")))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ConvertError::Transcode(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

/// Accepts bitrate strings of the form `<digits>k`, e.g. "128k" or "320k"
pub fn is_valid_quality(quality: &str) -> bool {
    match quality.strip_suffix('k') {
        Some(digits) => {
            !digits.is_empty() && digits.len() <= 4 && digits.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_is_valid_quality() {
        assert!(is_valid_quality("128k"));
        assert!(is_valid_quality("192k"));
        assert!(is_valid_quality("320k"));
        assert!(!is_valid_quality("192"));
        assert!(!is_valid_quality("k"));
        assert!(!is_valid_quality("fastk"));
        assert!(!is_valid_quality("192K"));
        assert!(!is_valid_quality(""));
        assert!(!is_valid_quality("1; rm -rf /k"));
    }

    #[test]
    fn test_build_args_shape() {
        let input = PathBuf::from("/tmp/abc_base.webm");
        let output = PathBuf::from("/tmp/abc.mp3");
        let args = FfmpegTranscoder::build_args(&input, &output, "320k");

        assert_eq!(
            args,
            vec![
                "-i",
                "/tmp/abc_base.webm",
                "-vn",
                "-ar",
                "44100",
                "-ac",
                "2",
                "-b:a",
                "320k",
                "-y",
                "/tmp/abc.mp3",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_transcode_error() {
        let transcoder = FfmpegTranscoder {
            ffmpeg_path: "ffmpeg-binary-that-does-not-exist".to_string(),
            timeout_secs: 5,
        };

        let result = transcoder
            .convert(
                Path::new("/tmp/in.webm"),
                Path::new("/tmp/out.mp3"),
                "192k",
            )
            .await;

        assert!(matches!(result, Err(ConvertError::Transcode(_))));
    }
}

use anyhow::Result;
use url::Url;

/// Validate a URL and return normalized version
pub fn validate_and_normalize_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url)
        .map_err(|_| anyhow::anyhow!("Invalid URL format: {}", url))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("URL must use HTTP or HTTPS protocol");
    }

    Ok(parsed.to_string())
}

/// Sanitize a media title for use as a download filename.
///
/// Keeps only ASCII alphanumerics, spaces, hyphens and underscores; everything
/// else is dropped. The result may be empty for titles made entirely of
/// unsupported characters.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim()
        .to_string()
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

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Extract domain from URL for display purposes
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(|host| {
            if host.starts_with("www.") {
                host[4..].to_string()
            } else {
                host.to_string()
            }
        })
}

/// Check if the current environment has required tools
pub async fn check_dependencies() -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available("yt-dlp", "--version").await {
        missing.push("yt-dlp - required for YouTube extraction".to_string());
    }

    if !check_command_available("ffmpeg", "-version").await {
        missing.push("ffmpeg - required for MP3 transcoding".to_string());
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str, version_flag: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg(version_flag)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_title_keeps_safe_characters() {
        assert_eq!(sanitize_title("My Song - Remix_2024"), "My Song - Remix_2024");
        assert_eq!(sanitize_title("Hello World!"), "Hello World");
        assert_eq!(sanitize_title("a/b\\c:d*e?f"), "abcdef");
    }

    #[test]
    fn test_sanitize_title_trims_whitespace() {
        assert_eq!(sanitize_title("  spaced  "), "spaced");
        assert_eq!(sanitize_title("!!!...???"), "");
    }

    #[test]
    fn test_sanitize_title_drops_non_ascii() {
        assert_eq!(sanitize_title("Canção Nº 9"), "Cano N 9");
        assert_eq!(sanitize_title("日本語タイトル"), "");
    }

    #[test]
    fn test_sanitized_titles_match_allowed_charset() {
        let inputs = [
            "Track #1 (Official Video) [HD]",
            "emoji 🎵 title",
            "tabs\tand\nnewlines",
        ];
        for input in inputs {
            let sanitized = sanitize_title(input);
            assert!(
                sanitized
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_')),
                "unexpected character in {:?}",
                sanitized
            );
            assert_eq!(sanitized, sanitized.trim());
        }
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1048576), "1.0 MB");
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://www.youtube.com/watch?v=123"),
            Some("youtube.com".to_string())
        );
        assert_eq!(extract_domain("invalid-url"), None);
    }

    #[test]
    fn test_validate_and_normalize_url() {
        assert!(validate_and_normalize_url("https://example.com").is_ok());
        assert!(validate_and_normalize_url("http://example.com").is_ok());
        assert!(validate_and_normalize_url("ftp://example.com").is_err());
        assert!(validate_and_normalize_url("not-a-url").is_err());
    }
}

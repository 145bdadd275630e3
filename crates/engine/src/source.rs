// Media source resolution: local files and HTTP downloads

use playhead_core::EngineError;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use symphonia::core::io::MediaSource;
use symphonia::core::probe::Hint;

const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Where a source URI points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    File(PathBuf),
    Http(String),
}

impl SourceLocation {
    pub fn parse(uri: &str) -> Result<Self, EngineError> {
        if uri.trim().is_empty() {
            return Err(EngineError::Source("Empty source URI".to_string()));
        }
        if let Some(path) = uri.strip_prefix("file://") {
            return Ok(SourceLocation::File(PathBuf::from(path)));
        }
        if uri.starts_with("http://") || uri.starts_with("https://") {
            return Ok(SourceLocation::Http(uri.to_string()));
        }
        match uri.split_once("://") {
            Some((scheme, _)) => Err(EngineError::Source(format!(
                "Unsupported URI scheme: {}",
                scheme
            ))),
            None => Ok(SourceLocation::File(PathBuf::from(uri))),
        }
    }

    /// Format hint from the path or URL extension, ignoring any query string
    pub fn hint(&self) -> Hint {
        let path = match self {
            SourceLocation::File(path) => path.to_string_lossy().into_owned(),
            SourceLocation::Http(url) => url
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        };

        let mut hint = Hint::new();
        if let Some(extension) = Path::new(&path).extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }
        hint
    }
}

/// Create a configured HTTP agent with proper timeouts and settings
pub fn create_http_agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(30))
        .timeout_read(Duration::from_secs(60))
        .user_agent(concat!("playhead/", env!("CARGO_PKG_VERSION")))
        .redirects(10)
        .build()
}

/// Open `location` for decoding.
///
/// Remote sources are fetched fully into memory; `progress` receives the
/// buffered percentage as chunks arrive. Returns `Ok(None)` if `cancelled`
/// was raised while downloading.
pub fn open_source(
    location: &SourceLocation,
    cancelled: &AtomicBool,
    progress: &mut dyn FnMut(u8),
) -> Result<Option<Box<dyn MediaSource>>, EngineError> {
    match location {
        SourceLocation::File(path) => {
            let file = File::open(path).map_err(|e| {
                EngineError::Source(format!("Failed to open {}: {}", path.display(), e))
            })?;
            progress(100);
            Ok(Some(Box::new(file)))
        }
        SourceLocation::Http(url) => {
            let bytes = download(&create_http_agent(), url, cancelled, progress)?;
            Ok(bytes.map(|bytes| Box::new(Cursor::new(bytes)) as Box<dyn MediaSource>))
        }
    }
}

fn download(
    agent: &ureq::Agent,
    url: &str,
    cancelled: &AtomicBool,
    progress: &mut dyn FnMut(u8),
) -> Result<Option<Vec<u8>>, EngineError> {
    log::info!("Starting download from: {}", url);

    let response = agent
        .get(url)
        .call()
        .map_err(|e| EngineError::Source(format!("HTTP GET failed: {}", e)))?;

    let content_length = response
        .header("Content-Length")
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);
    log::debug!("Content length: {} bytes", content_length);

    let mut reader = response.into_reader();
    let mut bytes = Vec::with_capacity(content_length.min(64 * 1024 * 1024) as usize);
    let mut chunk = vec![0u8; DOWNLOAD_CHUNK_SIZE];
    let mut last_percent = None;

    loop {
        if cancelled.load(Ordering::Acquire) {
            log::debug!("Download of {} cancelled", url);
            return Ok(None);
        }

        let read = reader
            .read(&mut chunk)
            .map_err(|e| EngineError::Source(format!("Download failed: {}", e)))?;
        if read == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..read]);

        if content_length > 0 {
            let percent = ((bytes.len() as u64 * 100) / content_length).min(100) as u8;
            if last_percent != Some(percent) {
                progress(percent);
                last_percent = Some(percent);
            }
        }
    }

    if last_percent != Some(100) {
        progress(100);
    }
    log::info!("Download complete: {} bytes", bytes.len());
    Ok(Some(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_locations() {
        assert_eq!(
            SourceLocation::parse("/music/a.mp3").unwrap(),
            SourceLocation::File(PathBuf::from("/music/a.mp3"))
        );
        assert_eq!(
            SourceLocation::parse("file:///music/a.mp3").unwrap(),
            SourceLocation::File(PathBuf::from("/music/a.mp3"))
        );
        assert_eq!(
            SourceLocation::parse("https://example.com/a.mp3").unwrap(),
            SourceLocation::Http("https://example.com/a.mp3".into())
        );
    }

    #[test]
    fn test_unsupported_scheme() {
        assert!(matches!(
            SourceLocation::parse("rtsp://example.com/live"),
            Err(EngineError::Source(_))
        ));
        assert!(SourceLocation::parse("  ").is_err());
    }

    #[test]
    fn test_missing_file_is_a_source_error() {
        let location = SourceLocation::parse("/definitely/not/here.wav").unwrap();
        let cancelled = AtomicBool::new(false);
        let result = open_source(&location, &cancelled, &mut |_| {});
        assert!(matches!(result, Err(EngineError::Source(_))));
    }

    #[test]
    fn test_local_file_reports_full_buffer() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let location = SourceLocation::File(file.path().to_path_buf());
        let cancelled = AtomicBool::new(false);
        let mut seen = Vec::new();
        let source = open_source(&location, &cancelled, &mut |p| seen.push(p)).unwrap();
        assert!(source.is_some());
        assert_eq!(seen, vec![100]);
    }
}

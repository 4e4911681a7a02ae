//! Transports that serve dataset files by relative path.
//!
//! The retriever only ever asks for paths relative to a dataset root
//! (`manifest.json`, `test.txt`, `apple/001.zip`). [`HttpTransport`] maps them
//! onto a base URL; [`FileTransport`] maps them onto a local mirror, which is
//! also what the integration tests use.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use tracing::debug;

use super::error::{RetrieveError, RetrieveResult};

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// A successful response body.
pub struct TransportResponse {
    /// `Content-Type` as reported by the server, if any.
    pub content_type: Option<String>,
    /// Body length, if known in advance. Checked against the manifest size
    /// before an archive is staged.
    pub content_length: Option<u64>,
    body: Box<dyn Read + Send>,
}

impl TransportResponse {
    pub fn new(body: Box<dyn Read + Send>) -> Self {
        Self {
            content_type: None,
            content_length: None,
            body,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_content_length(mut self, length: u64) -> Self {
        self.content_length = Some(length);
        self
    }

    /// Consume the response, yielding the streaming body.
    pub fn into_reader(self) -> Box<dyn Read + Send> {
        self.body
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Source of dataset files.
pub trait Transport: Send + Sync {
    /// Fetch the file at `path`, relative to the dataset root.
    ///
    /// Non-success responses are errors; a returned response is always a
    /// body to stream.
    fn get(&self, path: &str) -> RetrieveResult<TransportResponse>;

    /// Human-readable location of `path`, for logs and errors.
    fn location(&self, path: &str) -> String {
        path.to_string()
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get(&self, path: &str) -> RetrieveResult<TransportResponse> {
        (**self).get(path)
    }

    fn location(&self, path: &str) -> String {
        (**self).location(path)
    }
}

/// Fetches files over HTTP(S) relative to a base URL.
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport rooted at `base_url`.
    ///
    /// A trailing slash is added if missing so relative paths resolve below
    /// the base rather than replacing its last segment.
    pub fn new(base_url: &str, timeout: Duration) -> RetrieveResult<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| RetrieveError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(RetrieveError::InvalidUrl(normalized));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RetrieveError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn url_for(&self, path: &str) -> RetrieveResult<Url> {
        if !is_relative_path(path) {
            return Err(RetrieveError::InvalidUrl(path.to_string()));
        }
        self.base_url
            .join(path)
            .map_err(|e| RetrieveError::InvalidUrl(format!("{}: {}", path, e)))
    }
}

impl Transport for HttpTransport {
    fn get(&self, path: &str) -> RetrieveResult<TransportResponse> {
        let url = self.url_for(path)?;
        debug!(url = %url, "GET");

        let response = self.client.get(url.clone()).send().map_err(|e| {
            if e.is_timeout() {
                RetrieveError::Timeout {
                    url: url.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                RetrieveError::FetchFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrieveError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = response.content_length();

        let mut result = TransportResponse::new(Box::new(response));
        if let Some(content_type) = content_type {
            result = result.with_content_type(content_type);
        }
        if let Some(length) = content_length {
            result = result.with_content_length(length);
        }
        Ok(result)
    }

    fn location(&self, path: &str) -> String {
        self.url_for(path)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| path.to_string())
    }
}

/// Serves files from a local directory laid out like the published dataset.
#[derive(Debug, Clone)]
pub struct FileTransport {
    root: PathBuf,
}

impl FileTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Transport for FileTransport {
    fn get(&self, path: &str) -> RetrieveResult<TransportResponse> {
        if !is_relative_path(path) {
            return Err(RetrieveError::InvalidUrl(path.to_string()));
        }
        let full = self.root.join(path);
        let file = File::open(&full).map_err(|e| RetrieveError::FetchFailed {
            url: full.display().to_string(),
            reason: e.to_string(),
        })?;
        let length = file.metadata().map(|m| m.len()).ok();

        let mut response = TransportResponse::new(Box::new(BufReader::new(file)));
        if let Some(length) = length {
            response = response.with_content_length(length);
        }
        if full.extension().and_then(|e| e.to_str()) == Some("json") {
            response = response.with_content_type("application/json");
        }
        Ok(response)
    }

    fn location(&self, path: &str) -> String {
        self.root.join(path).display().to_string()
    }
}

/// Whether `path` is a relative path that stays below its root.
fn is_relative_path(path: &str) -> bool {
    !path.is_empty()
        && !path.contains('\\')
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_http_transport_normalizes_base() {
        let transport = HttpTransport::new("http://example.com/hoot/v1_0/HD", Duration::from_secs(5))
            .unwrap();
        assert_eq!(transport.base_url(), "http://example.com/hoot/v1_0/HD/");
        assert_eq!(
            transport.location("apple/001.zip"),
            "http://example.com/hoot/v1_0/HD/apple/001.zip"
        );
        assert_eq!(transport.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_http_transport_rejects_bad_urls() {
        assert!(matches!(
            HttpTransport::new("not a url", Duration::from_secs(5)),
            Err(RetrieveError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpTransport::new("ftp://example.com/", Duration::from_secs(5)),
            Err(RetrieveError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_http_transport_rejects_escaping_paths() {
        let transport =
            HttpTransport::new("http://example.com/hoot/", Duration::from_secs(5)).unwrap();
        assert!(transport.url_for("../secret").is_err());
        assert!(transport.url_for("/etc/passwd").is_err());
    }

    #[test]
    fn test_file_transport_reads_files() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("apple")).unwrap();
        fs::write(temp.path().join("apple/001.zip"), b"zipbytes").unwrap();
        fs::write(temp.path().join("manifest.json"), b"{}").unwrap();

        let transport = FileTransport::new(temp.path());
        let response = transport.get("apple/001.zip").unwrap();
        assert_eq!(response.content_length, Some(8));
        assert_eq!(response.content_type, None);
        let mut body = Vec::new();
        response.into_reader().read_to_end(&mut body).unwrap();
        assert_eq!(body, b"zipbytes");

        let manifest = transport.get("manifest.json").unwrap();
        assert_eq!(manifest.content_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn test_file_transport_missing_file() {
        let temp = TempDir::new().unwrap();
        let transport = FileTransport::new(temp.path());
        assert!(matches!(
            transport.get("apple/404.zip"),
            Err(RetrieveError::FetchFailed { .. })
        ));
        assert!(matches!(
            transport.get("../outside.zip"),
            Err(RetrieveError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_is_relative_path() {
        assert!(is_relative_path("manifest.json"));
        assert!(is_relative_path("apple/001.zip"));
        assert!(!is_relative_path(""));
        assert!(!is_relative_path("./x"));
        assert!(!is_relative_path("a/../b"));
        assert!(!is_relative_path("a\\b"));
    }
}

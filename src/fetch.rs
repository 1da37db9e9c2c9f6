use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue, SET_COOKIE, USER_AGENT};
use tracing::{debug, info};

use crate::domain::RemoteSource;
use crate::error::ProvisionError;

pub const CONFIRM_BASE_URL: &str = "https://docs.google.com/uc";

const CONFIRM_PAGE_LIMIT: u64 = 1 << 20;

pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub cookies: Vec<(String, String)>,
    pub body: Box<dyn Read + Send>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|value| value.contains("text/html"))
            .unwrap_or(false)
    }
}

pub trait Transport: Send + Sync {
    fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        cookies: &[(String, String)],
    ) -> Result<TransportResponse, ProvisionError>;
}

pub trait Fetcher {
    fn fetch(&self, source: &RemoteSource, destination: &Path) -> Result<u64, ProvisionError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, ProvisionError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-provision/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ProvisionError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(None)
            .build()
            .map_err(|err| ProvisionError::Http(err.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        cookies: &[(String, String)],
    ) -> Result<TransportResponse, ProvisionError> {
        let mut request = self.client.get(url).query(query);
        if !cookies.is_empty() {
            let header = cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            request = request.header(COOKIE, header);
        }
        let response = request
            .send()
            .map_err(|err| ProvisionError::Http(err.to_string()))?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(parse_set_cookie)
            .collect();

        Ok(TransportResponse {
            status: response.status().as_u16(),
            content_type,
            content_length: response.content_length(),
            cookies,
            body: Box::new(response),
        })
    }
}

#[derive(Clone)]
pub struct RemoteFetcher<T: Transport> {
    transport: T,
    confirm_base: String,
}

impl<T: Transport> RemoteFetcher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            confirm_base: CONFIRM_BASE_URL.to_string(),
        }
    }

    pub fn with_confirm_base(mut self, base: impl Into<String>) -> Self {
        self.confirm_base = base.into();
        self
    }

    pub fn fetch_url(&self, url: &str, destination: &Path) -> Result<u64, ProvisionError> {
        info!(url, destination = %destination.display(), "downloading");
        let response = self.transport.get(url, &[], &[])?;
        write_response(response, url, destination)
    }

    /// Two-step download for hosts that answer with a confirmation page: the first request
    /// yields a session token, the second repeats it as `confirm=<token>`.
    pub fn fetch_large_file(&self, id: &str, destination: &Path) -> Result<u64, ProvisionError> {
        info!(id, destination = %destination.display(), "downloading via confirmation");
        let url = self.confirm_base.as_str();
        let first = self
            .transport
            .get(url, &[("export", "download"), ("id", id)], &[])?;
        if !first.is_success() {
            return Err(ProvisionError::HttpStatus {
                status: first.status,
                url: format!("{url}?id={id}"),
            });
        }

        let session = ConfirmSession {
            cookies: first.cookies.clone(),
        };
        let token = match session.token() {
            Some(token) => token,
            None if first.is_html() => {
                let mut page = String::new();
                first
                    .body
                    .take(CONFIRM_PAGE_LIMIT)
                    .read_to_string(&mut page)
                    .map_err(|err| ProvisionError::Http(err.to_string()))?;
                scrape_confirm_token(&page)
                    .ok_or_else(|| ProvisionError::MissingConfirmToken(id.to_string()))?
            }
            None => {
                debug!(id, "provider served the file without confirmation");
                return write_response(first, url, destination);
            }
        };

        debug!(id, "confirmation token captured");
        let second = self.transport.get(
            url,
            &[("export", "download"), ("id", id), ("confirm", token.as_str())],
            &session.cookies,
        )?;
        if second.is_success() && second.is_html() {
            return Err(ProvisionError::MissingConfirmToken(id.to_string()));
        }
        write_response(second, url, destination)
    }
}

impl<T: Transport> Fetcher for RemoteFetcher<T> {
    fn fetch(&self, source: &RemoteSource, destination: &Path) -> Result<u64, ProvisionError> {
        match source {
            RemoteSource::Url(url) => self.fetch_url(url, destination),
            RemoteSource::ConfirmId(id) => self.fetch_large_file(id, destination),
        }
    }
}

struct ConfirmSession {
    cookies: Vec<(String, String)>,
}

impl ConfirmSession {
    fn token(&self) -> Option<String> {
        self.cookies
            .iter()
            .find(|(name, value)| name.starts_with("download_warning") && !value.is_empty())
            .map(|(_, value)| value.clone())
    }
}

pub fn scrape_confirm_token(page: &str) -> Option<String> {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            Regex::new(r"confirm=([0-9A-Za-z_\-]+)").expect("valid regex"),
            Regex::new(r#"name="confirm"\s+value="([^"]+)""#).expect("valid regex"),
        ]
    });
    patterns
        .iter()
        .find_map(|pattern| pattern.captures(page))
        .and_then(|caps| caps.get(1))
        .map(|token| token.as_str().to_string())
}

fn parse_set_cookie(value: &str) -> Option<(String, String)> {
    let pair = value.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    Some((name.trim().to_string(), value.trim().to_string()))
}

fn write_response(
    mut response: TransportResponse,
    url: &str,
    destination: &Path,
) -> Result<u64, ProvisionError> {
    if !response.is_success() {
        return Err(ProvisionError::HttpStatus {
            status: response.status,
            url: url.to_string(),
        });
    }
    let parent = destination
        .parent()
        .ok_or_else(|| ProvisionError::Filesystem("invalid destination path".to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix(".kira-provision-download")
        .tempfile_in(parent)
        .map_err(|err| ProvisionError::Filesystem(err.to_string()))?;

    let received = copy_body(&mut response.body, temp.as_file_mut(), url)?;
    if let Some(expected) = response.content_length {
        if expected != received {
            return Err(ProvisionError::TruncatedTransfer {
                url: url.to_string(),
                expected,
                received,
            });
        }
    }

    if destination.exists() {
        fs::remove_file(destination).map_err(|err| ProvisionError::Filesystem(err.to_string()))?;
    }
    temp.persist(destination)
        .map_err(|err| ProvisionError::Filesystem(err.to_string()))?;
    debug!(url, bytes = received, "download complete");
    Ok(received)
}

// network read errors and local write errors surface differently
fn copy_body(
    body: &mut dyn Read,
    out: &mut dyn Write,
    url: &str,
) -> Result<u64, ProvisionError> {
    let mut buf = [0u8; 64 * 1024];
    let mut received = 0u64;
    loop {
        let n = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(ProvisionError::Http(format!("{url}: {err}"))),
        };
        out.write_all(&buf[..n])
            .map_err(|err| ProvisionError::Filesystem(format!("write download: {err}")))?;
        received += n as u64;
    }
    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrape_token_from_link() {
        let page = r#"<a href="/uc?export=download&amp;confirm=Ab_3-x&amp;id=1">Download</a>"#;
        assert_eq!(scrape_confirm_token(page).as_deref(), Some("Ab_3-x"));
    }

    #[test]
    fn scrape_token_from_form() {
        let page = r#"<input type="hidden" name="confirm" value="t">"#;
        assert_eq!(scrape_confirm_token(page).as_deref(), Some("t"));
    }

    #[test]
    fn parse_cookie_pair() {
        let parsed = parse_set_cookie("download_warning_13058876669334088843_1=abcd; Path=/uc");
        assert_eq!(
            parsed,
            Some((
                "download_warning_13058876669334088843_1".to_string(),
                "abcd".to_string()
            ))
        );
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer"))
        }
    }

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn body_read_failure_is_http_error() {
        let mut out = Vec::new();
        let err = copy_body(&mut Broken, &mut out, "https://x/y").unwrap_err();
        assert!(matches!(err, ProvisionError::Http(_)));
    }

    #[test]
    fn local_write_failure_is_filesystem_error() {
        let mut body: &[u8] = b"payload";
        let err = copy_body(&mut body, &mut Broken, "https://x/y").unwrap_err();
        assert!(matches!(err, ProvisionError::Filesystem(_)));
    }
}

//! Bundle transport
//!
//! Bundles are plain files published next to each other on a server, named
//! after the escaped repository URL. They are fetched over HTTP(S) or read
//! from a local path / `file://` URL.

use crate::deadline::Deadline;
use crate::error::{MorphError, MorphResult};
use crate::escape::escape_url;
use std::fs::File;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

const CHUNK_SIZE: usize = 64 * 1024;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Location of the bundle for `repo_url` on the server at `base_url`
pub fn bundle_url(base_url: &str, repo_url: &str) -> String {
    let mut url = base_url.to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    url.push_str(&escape_url(repo_url));
    url.push_str(".bndl");
    url
}

/// Downloads a bundle into a writer
pub trait BundleFetcher: Send + Sync {
    /// Copy the resource at `url` into `out`, returning the number of bytes
    /// written.
    fn fetch(&self, url: &str, out: &mut dyn Write, deadline: &Deadline) -> MorphResult<u64>;
}

/// Fetches over HTTP(S) with ureq, or from the local filesystem
#[derive(Debug, Clone, Default)]
pub struct HttpBundleFetcher;

impl HttpBundleFetcher {
    pub fn new() -> Self {
        Self
    }

    fn fetch_http(&self, url: &str, out: &mut dyn Write, deadline: &Deadline) -> MorphResult<u64> {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(CONNECT_TIMEOUT))
            .timeout_global(deadline.remaining())
            .http_status_as_error(true)
            .build();
        let agent = ureq::Agent::new_with_config(config);

        let mut response = agent.get(url).call().map_err(|e| {
            // ureq's own timeout is derived from the deadline
            if matches!(e, ureq::Error::Timeout(_)) && deadline.is_expired() {
                MorphError::DeadlineExceeded(format!("fetching {}", url))
            } else {
                fetch_error(url, e)
            }
        })?;

        let mut body = response.body_mut().as_reader();
        copy_chunked(url, &mut body, out, deadline)
    }

    fn fetch_file(
        &self,
        url: &str,
        path: &str,
        out: &mut dyn Write,
        deadline: &Deadline,
    ) -> MorphResult<u64> {
        let mut file = File::open(path).map_err(|e| fetch_error(url, e))?;
        copy_chunked(url, &mut file, out, deadline)
    }
}

impl BundleFetcher for HttpBundleFetcher {
    fn fetch(&self, url: &str, out: &mut dyn Write, deadline: &Deadline) -> MorphResult<u64> {
        deadline.check(&format!("fetching {}", url))?;
        debug!("Fetching {}", url);

        if url.starts_with("http://") || url.starts_with("https://") {
            self.fetch_http(url, out, deadline)
        } else if let Some(path) = url.strip_prefix("file://") {
            self.fetch_file(url, path, out, deadline)
        } else if url.contains("://") {
            Err(fetch_error(url, "unsupported URL scheme"))
        } else {
            self.fetch_file(url, url, out, deadline)
        }
    }
}

fn fetch_error(url: &str, reason: impl ToString) -> MorphError {
    MorphError::BundleFetch {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

/// Copy in fixed-size chunks, checking the deadline between them
fn copy_chunked(
    url: &str,
    reader: &mut dyn Read,
    out: &mut dyn Write,
    deadline: &Deadline,
) -> MorphResult<u64> {
    let activity = format!("fetching {}", url);
    let mut buffer = vec![0_u8; CHUNK_SIZE];
    let mut written: u64 = 0;
    loop {
        deadline.check(&activity)?;
        let read = reader.read(&mut buffer).map_err(|e| fetch_error(url, e))?;
        if read == 0 {
            break;
        }
        out.write_all(&buffer[..read])
            .map_err(|e| MorphError::io(format!("writing bundle from {}", url), e))?;
        written += read as u64;
    }
    out.flush()
        .map_err(|e| MorphError::io(format!("writing bundle from {}", url), e))?;

    debug!("Fetched {} bytes from {}", written, url);
    Ok(written)
}

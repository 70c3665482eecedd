//! Remote application retrieval.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap, HeaderName, LAST_MODIFIED};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{Error, Result};

/// Timeout applied to the advisory HEAD request.
pub const HEAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Downloads slower than this get a throughput line in the log.
pub const SLOW_DOWNLOAD_THRESHOLD: Duration = Duration::from_secs(2);

/// Headers the resolver cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteHeaders {
	pub last_modified: Option<String>,
	pub content_type: Option<String>,
	pub content_disposition: Option<String>,
}

impl RemoteHeaders {
	pub fn from_header_map(headers: &HeaderMap) -> Self {
		let get = |name: HeaderName| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
		Self {
			last_modified: get(LAST_MODIFIED),
			content_type: get(CONTENT_TYPE),
			content_disposition: get(CONTENT_DISPOSITION),
		}
	}

	/// `Last-Modified` parsed as an HTTP date.
	pub fn last_modified_at(&self) -> Option<DateTime<Utc>> {
		let raw = self.last_modified.as_deref()?;
		DateTime::parse_from_rfc2822(raw).ok().map(|dt| dt.with_timezone(&Utc))
	}
}

/// Transport used to retrieve remote applications.
#[async_trait]
pub trait Fetcher: Send + Sync {
	/// Issues a HEAD request for `url`.
	async fn head(&self, url: &str) -> Result<RemoteHeaders>;

	/// Streams the body of `url` into `target`, returning the number of bytes written.
	async fn download(&self, url: &str, target: &Path) -> Result<u64>;
}

/// [`Fetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
	client: reqwest::Client,
	head_timeout: Duration,
}

impl Default for HttpFetcher {
	fn default() -> Self {
		Self::new()
	}
}

impl HttpFetcher {
	pub fn new() -> Self {
		Self {
			client: reqwest::Client::new(),
			head_timeout: HEAD_TIMEOUT,
		}
	}

	pub fn with_client(client: reqwest::Client) -> Self {
		Self {
			client,
			head_timeout: HEAD_TIMEOUT,
		}
	}

	pub fn with_head_timeout(mut self, timeout: Duration) -> Self {
		self.head_timeout = timeout;
		self
	}
}

#[async_trait]
impl Fetcher for HttpFetcher {
	async fn head(&self, url: &str) -> Result<RemoteHeaders> {
		let response = self
			.client
			.head(url)
			.timeout(self.head_timeout)
			.send()
			.await
			.map_err(|e| download_error(url, e))?;
		Ok(RemoteHeaders::from_header_map(response.headers()))
	}

	async fn download(&self, url: &str, target: &Path) -> Result<u64> {
		let started = Instant::now();

		let response = self.client.get(url).send().await.map_err(|e| download_error(url, e))?;
		let status = response.status();
		if status.as_u16() >= 400 {
			return Err(Error::DownloadFailed {
				url: url.to_string(),
				reason: format!("{} - {}", status.as_u16(), status.canonical_reason().unwrap_or("Unknown")),
			});
		}

		let mut file = tokio::fs::File::create(target).await?;
		let mut stream = response.bytes_stream();
		let mut size: u64 = 0;
		while let Some(chunk) = stream.next().await {
			let chunk = chunk.map_err(|e| download_error(url, e))?;
			file.write_all(&chunk).await?;
			size += chunk.len() as u64;
		}
		file.flush().await?;

		let elapsed = started.elapsed();
		debug!(
			"'{url}' ({}) has been downloaded to '{}' in {:.3}s",
			readable_size(size),
			target.display(),
			elapsed.as_secs_f64()
		);
		if elapsed >= SLOW_DOWNLOAD_THRESHOLD {
			let bytes_per_sec = (size as f64 / elapsed.as_secs_f64()) as u64;
			debug!("Approximate download speed: {}/s", readable_size(bytes_per_sec));
		}

		Ok(size)
	}
}

fn download_error(url: &str, err: reqwest::Error) -> Error {
	Error::DownloadFailed {
		url: url.to_string(),
		reason: err.to_string(),
	}
}

/// Human readable byte count (`1.50 MB`).
pub fn readable_size(bytes: u64) -> String {
	const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
	let mut value = bytes as f64;
	let mut unit = 0;
	while value >= 1024.0 && unit < UNITS.len() - 1 {
		value /= 1024.0;
		unit += 1;
	}
	if unit == 0 {
		format!("{bytes} B")
	} else {
		format!("{value:.2} {}", UNITS[unit])
	}
}

//! Application artifact resolution.
//!
//! Turns an application reference (local path or http(s) URL) into a local,
//! extension-checked path:
//!
//! 1. Remote references are probed with HEAD and downloaded to a fresh temp path
//! 2. Archives (`.zip`, `.ipa`, zip MIME types) are hashed and unpacked
//! 3. The bundle path is verified against the accepted extensions
//! 4. Results are remembered per reference so unchanged sources are reused
//!
//! All work for one reference runs under a [`KeyedGuard`], so concurrent
//! requests for the same reference download and unpack at most once.

mod cache;
mod extract;
mod fetch;
mod guard;
mod naming;


use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use url::Url;

pub use cache::{AppCache, CacheEntry, DEFAULT_CAPACITY};
pub use extract::{Extractor, ZipExtractor, hash_file, is_supported_item, remove_path, walk_dir};
pub use fetch::{Fetcher, HEAD_TIMEOUT, HttpFetcher, RemoteHeaders, SLOW_DOWNLOAD_THRESHOLD, readable_size};
pub use guard::{KeyedGuard, ResolutionGuard};
pub use naming::{
	ARCHIVE_EXTENSIONS, DEFAULT_BASENAME, DownloadName, ZIP_MIME_TYPES, derive_download_name, extname,
	is_archive_extension, path_extname, sanitize_file_name,
};

use crate::error::{Error, Result};

/// Resolves application references to verified local paths.
///
/// Owns its cache and guard; construct one per process, or one per test for
/// isolation.
pub struct AppResolver {
	cache: AppCache,
	guard: KeyedGuard,
	fetcher: Arc<dyn Fetcher>,
	extractor: Arc<dyn Extractor>,
	scratch_root: Option<PathBuf>,
}

impl Default for AppResolver {
	fn default() -> Self {
		Self::new()
	}
}

enum Reference {
	Remote(Url),
	Local(PathBuf),
}

impl AppResolver {
	pub fn new() -> Self {
		Self {
			cache: AppCache::default(),
			guard: KeyedGuard::new(),
			fetcher: Arc::new(HttpFetcher::new()),
			extractor: Arc::new(ZipExtractor::new()),
			scratch_root: None,
		}
	}

	pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
		self.fetcher = fetcher;
		self
	}

	pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
		self.extractor = extractor;
		self
	}

	pub fn with_capacity(mut self, capacity: usize) -> Self {
		self.cache = AppCache::new(capacity);
		self
	}

	/// Allocates downloads and extraction targets under `root` instead of the system temp dir.
	pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
		self.scratch_root = Some(root.into());
		self
	}

	pub fn cache(&self) -> &AppCache {
		&self.cache
	}

	/// Resolves `app` when it is a string and returns anything else unchanged.
	pub async fn resolve_value<S: AsRef<str>>(&self, app: &Value, accepted: &[S]) -> Result<Value> {
		match app {
			Value::String(reference) => {
				let path = self.resolve(reference, accepted).await?;
				Ok(Value::String(path.to_string_lossy().into_owned()))
			}
			other => Ok(other.clone()),
		}
	}

	/// Resolves `reference` to a local path whose extension is one of `accepted`.
	pub async fn resolve<S: AsRef<str>>(&self, reference: &str, accepted: &[S]) -> Result<PathBuf> {
		let accepted = normalize_extensions(accepted);
		if accepted.is_empty() {
			return Err(Error::NoAcceptedExtensions(reference.to_string()));
		}
		let _guard = self.guard.acquire(reference).await;
		self.resolve_exclusive(reference, &accepted).await
	}

	async fn resolve_exclusive(&self, reference: &str, accepted: &[String]) -> Result<PathBuf> {
		let mut cache_key = reference.to_string();
		let mut archive_hash: Option<String> = None;
		let mut current_modified: Option<DateTime<Utc>> = None;
		// Removed on drop unless the download itself is the final app.
		let mut download_dir: Option<TempDir> = None;

		let (mut app_path, should_unzip) = match classify(reference).await? {
			Reference::Remote(url) => {
				info!("Using downloadable app '{reference}'");
				let headers = match self.fetcher.head(reference).await {
					Ok(headers) => headers,
					Err(e) => {
						debug!("Cannot send HEAD request to '{reference}'. Original error: {e}");
						RemoteHeaders::default()
					}
				};
				if let Some(raw) = headers.last_modified.as_deref() {
					debug!(last_modified = raw, "Last-Modified");
					current_modified = headers.last_modified_at();
				}

				if let Some(cached) = self.cached_download(reference, current_modified) {
					if path_exists(&cached).await {
						info!("Reusing the previously downloaded application at '{}'", cached.display());
						return verify_extension(cached, accepted);
					}
					info!(
						"The application at '{}' does not exist anymore. Deleting it from the cache",
						cached.display()
					);
					self.cache.remove(reference);
				}

				let name = derive_download_name(url.path(), &headers, accepted);
				let dir = download_dir.insert(self.scratch_dir("youi-download-")?);
				let target = dir.path().join(&name.file_name);
				self.fetcher.download(url.as_str(), &target).await?;
				(target, name.is_archive)
			}
			Reference::Local(path) => {
				info!("Using local app '{reference}'");
				let is_archive = is_archive_extension(&path_extname(&path));
				(path, is_archive)
			}
		};

		if should_unzip {
			let archive = app_path.clone();
			let hash = hash_file(&archive).await?;

			if let Some(entry) = self.cache.get(&cache_key).filter(|e| e.hash.as_deref() == Some(hash.as_str())) {
				if path_exists(&entry.full_path).await {
					discard_download(download_dir.take());
					info!("Will reuse previously cached application at '{}'", entry.full_path.display());
					return verify_extension(entry.full_path, accepted);
				}
				info!(
					"The application at '{}' does not exist anymore. Deleting it from the cache",
					entry.full_path.display()
				);
				self.cache.remove(&cache_key);
			}
			archive_hash = Some(hash);

			let dst_root = self.allocate_dir("youi-app-")?;
			let extracted = self.extractor.extract(&archive, &dst_root, accepted).await;
			app_path = match extracted {
				Ok(bundle) => bundle,
				Err(e) => {
					if let Err(cleanup) = remove_path(&dst_root) {
						warn!("Cannot remove '{}': {cleanup}", dst_root.display());
					}
					discard_download(download_dir.take());
					return Err(e);
				}
			};
			discard_download(download_dir.take());
			info!("Unzipped local app to '{}'", app_path.display());
		} else if !app_path.is_absolute() {
			app_path = std::path::absolute(&app_path)?;
			warn!(
				"The current application path '{reference}' is not absolute and has been rewritten to '{}'. Consider using absolute paths rather than relative",
				app_path.display()
			);
			cache_key = app_path.to_string_lossy().into_owned();
		}

		let app_path = verify_extension(app_path, accepted)?;
		if let Some(dir) = download_dir {
			// A non-archive download is the app itself; cached entries point into it.
			let _ = dir.keep();
		}

		if Path::new(&cache_key) != app_path && (archive_hash.is_some() || current_modified.is_some()) {
			self.cache.insert(
				cache_key,
				CacheEntry {
					hash: archive_hash,
					last_modified: current_modified,
					full_path: app_path.clone(),
				},
			);
		}

		Ok(app_path)
	}

	/// Cached download for `reference` when the remote copy has not changed since.
	fn cached_download(&self, reference: &str, current_modified: Option<DateTime<Utc>>) -> Option<PathBuf> {
		let current = current_modified?;
		let entry = self.cache.get(reference)?;
		match entry.last_modified {
			Some(cached) if current <= cached => {
				debug!("Reusing already downloaded application at '{}'", entry.full_path.display());
				Some(entry.full_path)
			}
			_ => {
				debug!(
					"'Last-Modified' timestamp of '{reference}' has been updated. An updated copy of the application is going to be downloaded."
				);
				None
			}
		}
	}

	fn scratch_dir(&self, prefix: &str) -> Result<TempDir> {
		let mut builder = tempfile::Builder::new();
		builder.prefix(prefix);
		let dir = match &self.scratch_root {
			Some(root) => builder.tempdir_in(root)?,
			None => builder.tempdir()?,
		};
		Ok(dir)
	}

	fn allocate_dir(&self, prefix: &str) -> Result<PathBuf> {
		Ok(self.scratch_dir(prefix)?.keep())
	}
}

/// Deletes a download directory whose archive is no longer needed.
fn discard_download(dir: Option<TempDir>) {
	let Some(dir) = dir else {
		return;
	};
	let path = dir.path().to_path_buf();
	if let Err(e) = dir.close() {
		warn!("Cannot remove downloaded archive at '{}': {e}", path.display());
	}
}

async fn classify(reference: &str) -> Result<Reference> {
	let parsed = Url::parse(reference).ok();
	if let Some(url) = parsed.as_ref().filter(|u| matches!(u.scheme(), "http" | "https")) {
		return Ok(Reference::Remote(url.clone()));
	}

	if path_exists(Path::new(reference)).await {
		return Ok(Reference::Local(PathBuf::from(reference)));
	}

	match parsed {
		Some(url) if url.scheme().len() > 1 => Err(Error::UnsupportedProtocol {
			protocol: format!("{}:", url.scheme()),
			reference: reference.to_string(),
		}),
		_ => Err(Error::NotFound(reference.to_string())),
	}
}

async fn path_exists(path: &Path) -> bool {
	tokio::fs::try_exists(path).await.unwrap_or(false)
}

fn verify_extension(path: PathBuf, accepted: &[String]) -> Result<PathBuf> {
	let ext = path_extname(&path);
	if accepted.iter().any(|a| *a == ext) {
		return Ok(path);
	}
	Err(Error::ExtensionMismatch {
		path,
		extensions: accepted.to_vec(),
	})
}

/// Ensures a leading dot on every extension and drops blanks and duplicates.
fn normalize_extensions<S: AsRef<str>>(accepted: &[S]) -> Vec<String> {
	let mut out: Vec<String> = Vec::with_capacity(accepted.len());
	for ext in accepted {
		let ext = ext.as_ref().trim();
		if ext.is_empty() {
			continue;
		}
		let ext = if ext.starts_with('.') { ext.to_string() } else { format!(".{ext}") };
		if !out.contains(&ext) {
			out.push(ext);
		}
	}
	out
}

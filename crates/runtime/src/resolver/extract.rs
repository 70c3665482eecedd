//! Archive hashing and bundle extraction.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::naming::extname;
use crate::error::{Error, Result};

/// Unpacks an application archive and picks the bundle inside it.
#[async_trait]
pub trait Extractor: Send + Sync {
	/// Extracts `archive` and moves the chosen bundle under `dst_root`.
	///
	/// Returns the absolute path of the bundle.
	async fn extract(&self, archive: &Path, dst_root: &Path, accepted: &[String]) -> Result<PathBuf>;
}

/// [`Extractor`] for zip archives (`.zip`, `.ipa`).
#[derive(Debug, Clone, Default)]
pub struct ZipExtractor {
	scratch_root: Option<PathBuf>,
}

impl ZipExtractor {
	pub fn new() -> Self {
		Self::default()
	}

	/// Places temporary extraction directories under `root` instead of the system temp dir.
	pub fn with_scratch_root(root: impl Into<PathBuf>) -> Self {
		Self {
			scratch_root: Some(root.into()),
		}
	}
}

#[async_trait]
impl Extractor for ZipExtractor {
	async fn extract(&self, archive: &Path, dst_root: &Path, accepted: &[String]) -> Result<PathBuf> {
		let archive = archive.to_path_buf();
		let dst_root = dst_root.to_path_buf();
		let accepted = accepted.to_vec();
		let scratch_root = self.scratch_root.clone();

		tokio::task::spawn_blocking(move || unzip_app(&archive, &dst_root, &accepted, scratch_root.as_deref()))
			.await
			.map_err(io::Error::other)?
	}
}

fn unzip_app(archive: &Path, dst_root: &Path, accepted: &[String], scratch_root: Option<&Path>) -> Result<PathBuf> {
	let invalid = |reason: String| Error::InvalidArchive {
		path: archive.to_path_buf(),
		reason,
	};

	let mut zip = zip::ZipArchive::new(fs::File::open(archive)?).map_err(|e| invalid(e.to_string()))?;

	// Removed together with everything left in it when this function returns.
	let tmp_root = match scratch_root {
		Some(root) => tempfile::Builder::new().prefix("youi-unzip-").tempdir_in(root)?,
		None => tempfile::Builder::new().prefix("youi-unzip-").tempdir()?,
	};

	debug!("Unzipping '{}'", archive.display());
	zip.extract(tmp_root.path()).map_err(|e| invalid(e.to_string()))?;

	let all_items = walk_dir(tmp_root.path())?;
	debug!("Extracted {} item(s) from '{}'", all_items.len(), archive.display());

	let keep: Vec<&PathBuf> = all_items
		.iter()
		.filter(|item| is_supported_item(relative_to(item, tmp_root.path()), accepted))
		.collect();

	for item in &all_items {
		let kept = keep.iter().any(|k| *k == item);
		let holds_kept = keep.iter().any(|k| k.starts_with(item));
		if kept || holds_kept {
			continue;
		}
		remove_path(item)?;
	}

	let mut bundles: Vec<PathBuf> = walk_dir(tmp_root.path())?
		.iter()
		.map(|item| relative_to(item, tmp_root.path()).to_path_buf())
		.filter(|rel| is_supported_item(rel, accepted))
		.collect();
	bundles.sort_by_key(|rel| rel.components().count());

	let Some(matched) = bundles.first() else {
		return Err(Error::NoBundleFound {
			archive: archive.to_path_buf(),
			extensions: accepted.to_vec(),
		});
	};
	debug!(
		"Matched {} item(s) in the extracted archive. Assuming '{}' is the correct bundle",
		bundles.len(),
		matched.display()
	);

	let destination = dst_root.join(matched);
	if let Some(parent) = destination.parent() {
		fs::create_dir_all(parent)?;
	}
	move_path(&tmp_root.path().join(matched), &destination)?;
	Ok(destination)
}

/// Whether an extracted item belongs to an accepted bundle.
///
/// Matches on the item's own extension, or on any parent segment carrying an
/// accepted extension so the contents of directory bundles (`Foo.app/...`) are kept.
pub fn is_supported_item(relative: &Path, accepted: &[String]) -> bool {
	let own_ext = relative
		.file_name()
		.map(|name| extname(&name.to_string_lossy()).to_string())
		.unwrap_or_default();
	if accepted.iter().any(|ext| *ext == own_ext) {
		return true;
	}

	let mut parents: Vec<_> = relative.components().collect();
	parents.pop();
	parents.iter().any(|segment| {
		let segment = segment.as_os_str().to_string_lossy();
		accepted.iter().any(|ext| segment.ends_with(ext.as_str()))
	})
}

/// Every file and directory below `dir`, parents before children.
pub fn walk_dir(dir: &Path) -> io::Result<Vec<PathBuf>> {
	let mut entries: Vec<PathBuf> = fs::read_dir(dir)?.map(|e| e.map(|e| e.path())).collect::<io::Result<_>>()?;
	entries.sort();

	let mut result = Vec::with_capacity(entries.len());
	for path in entries {
		let is_dir = fs::symlink_metadata(&path)?.is_dir();
		result.push(path.clone());
		if is_dir {
			result.extend(walk_dir(&path)?);
		}
	}
	Ok(result)
}

/// Hex encoded SHA-256 of a file's contents.
pub async fn hash_file(path: &Path) -> Result<String> {
	let path = path.to_path_buf();
	let digest = tokio::task::spawn_blocking(move || -> io::Result<String> {
		let mut file = fs::File::open(&path)?;
		let mut hasher = Sha256::new();
		let mut buf = [0u8; 64 * 1024];
		loop {
			let n = file.read(&mut buf)?;
			if n == 0 {
				break;
			}
			hasher.update(&buf[..n]);
		}
		Ok(hex::encode(hasher.finalize()))
	})
	.await
	.map_err(io::Error::other)??;
	Ok(digest)
}

/// Removes a file or directory tree, ignoring paths that are already gone.
pub fn remove_path(path: &Path) -> io::Result<()> {
	let result = match fs::symlink_metadata(path) {
		Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
		Ok(_) => fs::remove_file(path),
		Err(e) => Err(e),
	};
	match result {
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
		other => other,
	}
}

fn relative_to<'a>(path: &'a Path, root: &Path) -> &'a Path {
	path.strip_prefix(root).unwrap_or(path)
}

fn move_path(from: &Path, to: &Path) -> io::Result<()> {
	if fs::rename(from, to).is_ok() {
		return Ok(());
	}
	copy_recursive(from, to)?;
	remove_path(from)
}

fn copy_recursive(from: &Path, to: &Path) -> io::Result<()> {
	if fs::symlink_metadata(from)?.is_dir() {
		fs::create_dir_all(to)?;
		for entry in fs::read_dir(from)? {
			let entry = entry?;
			copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
		}
		Ok(())
	} else {
		fs::copy(from, to).map(|_| ())
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use zip::write::SimpleFileOptions;

	use super::*;

	fn exts(list: &[&str]) -> Vec<String> {
		list.iter().map(|s| s.to_string()).collect()
	}

	fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
		let mut writer = zip::ZipWriter::new(fs::File::create(path).unwrap());
		for (name, data) in entries {
			if name.ends_with('/') {
				writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
			} else {
				writer.start_file(*name, SimpleFileOptions::default()).unwrap();
				writer.write_all(data).unwrap();
			}
		}
		writer.finish().unwrap();
	}

	#[test]
	fn supported_item_matches_extension_or_bundle_segment() {
		let accepted = exts(&[".app"]);
		assert!(is_supported_item(Path::new("Payload/Foo.app"), &accepted));
		assert!(is_supported_item(Path::new("Payload/Foo.app/Info.plist"), &accepted));
		assert!(!is_supported_item(Path::new("Payload"), &accepted));
		assert!(!is_supported_item(Path::new("readme.txt"), &accepted));
	}

	#[tokio::test]
	async fn extracts_single_matching_file() {
		let dir = tempfile::tempdir().unwrap();
		let archive = dir.path().join("bundle.zip");
		write_zip(&archive, &[("app-release.apk", b"apk"), ("notes.txt", b"x")]);
		let dst = dir.path().join("out");
		fs::create_dir(&dst).unwrap();

		let bundle = ZipExtractor::new().extract(&archive, &dst, &exts(&[".apk"])).await.unwrap();

		assert_eq!(bundle, dst.join("app-release.apk"));
		assert_eq!(fs::read(&bundle).unwrap(), b"apk");
	}

	#[tokio::test]
	async fn shallowest_directory_bundle_wins() {
		let dir = tempfile::tempdir().unwrap();
		let archive = dir.path().join("Payload.ipa");
		write_zip(
			&archive,
			&[
				("Payload/", b""),
				("Payload/Foo.app/", b""),
				("Payload/Foo.app/Info.plist", b"plist"),
				("Payload/Foo.app/Plugins/Ext.app/Info.plist", b"nested"),
				("Symbols/junk.dSYM", b"junk"),
			],
		);
		let dst = dir.path().join("out");
		fs::create_dir(&dst).unwrap();

		let bundle = ZipExtractor::new().extract(&archive, &dst, &exts(&[".app"])).await.unwrap();

		assert_eq!(bundle, dst.join("Payload").join("Foo.app"));
		assert!(bundle.join("Info.plist").is_file());
		assert!(bundle.join("Plugins/Ext.app/Info.plist").is_file());
	}

	#[tokio::test]
	async fn archive_without_bundle_fails() {
		let dir = tempfile::tempdir().unwrap();
		let archive = dir.path().join("empty.zip");
		write_zip(&archive, &[("readme.txt", b"nothing here")]);

		let err = ZipExtractor::new()
			.extract(&archive, dir.path(), &exts(&[".app"]))
			.await
			.unwrap_err();

		assert!(matches!(err, Error::NoBundleFound { .. }), "unexpected error: {err}");
	}

	#[tokio::test]
	async fn scratch_directory_is_removed_on_failure() {
		let dir = tempfile::tempdir().unwrap();
		let scratch = dir.path().join("scratch");
		fs::create_dir(&scratch).unwrap();
		let archive = dir.path().join("empty.zip");
		write_zip(&archive, &[("readme.txt", b"nothing here")]);

		let result = ZipExtractor::with_scratch_root(&scratch)
			.extract(&archive, dir.path(), &exts(&[".app"]))
			.await;

		assert!(result.is_err());
		assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
	}

	#[tokio::test]
	async fn non_zip_input_is_rejected() {
		let dir = tempfile::tempdir().unwrap();
		let archive = dir.path().join("broken.zip");
		fs::write(&archive, b"definitely not a zip").unwrap();

		let err = ZipExtractor::new()
			.extract(&archive, dir.path(), &exts(&[".app"]))
			.await
			.unwrap_err();

		assert!(matches!(err, Error::InvalidArchive { .. }), "unexpected error: {err}");
	}

	#[tokio::test]
	async fn hash_is_stable_and_content_sensitive() {
		let dir = tempfile::tempdir().unwrap();
		let a = dir.path().join("a");
		let b = dir.path().join("b");
		fs::write(&a, b"same").unwrap();
		fs::write(&b, b"different").unwrap();

		let first = hash_file(&a).await.unwrap();
		assert_eq!(first, hash_file(&a).await.unwrap());
		assert_ne!(first, hash_file(&b).await.unwrap());
		assert_eq!(first.len(), 64);
	}
}

//! File naming rules for downloaded applications.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use super::fetch::RemoteHeaders;

/// Extensions that mark an application as an archive to be unpacked.
pub const ARCHIVE_EXTENSIONS: &[&str] = &[".zip", ".ipa"];

/// MIME types that mark a download as a zip archive.
pub const ZIP_MIME_TYPES: &[&str] = &["application/zip", "application/x-zip-compressed", "multipart/x-zip"];

/// Basename used when neither the URL nor the headers yield one.
pub const DEFAULT_BASENAME: &str = "youi-app";

const SANITIZE_REPLACEMENT: &str = "-";
const MAX_FILE_NAME_BYTES: usize = 255;

static ZIP_MIME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	ZIP_MIME_TYPES
		.iter()
		.filter_map(|mime| Regex::new(&format!(r"\b{}\b", regex::escape(mime))).ok())
		.collect()
});
static ATTACHMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^attachment").expect("valid regex"));
static DISPOSITION_FILENAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?i)filename="([^"]+)"#).expect("valid regex"));
static ILLEGAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[/\?<>\\:\*\|"]"#).expect("valid regex"));
static CONTROL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\x00-\x1f\x7f\u{80}-\u{9f}]").expect("valid regex"));
static RESERVED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\.+$").expect("valid regex"));
static WINDOWS_RESERVED: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?i)^(con|prn|aux|nul|com[0-9]|lpt[0-9])(\..*)?$").expect("valid regex"));
static WINDOWS_TRAILING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\. ]+$").expect("valid regex"));

/// Extension of the last path segment, including the leading dot.
///
/// Leading dots of hidden files do not count: `.profile` has no extension.
pub fn extname(name: &str) -> &str {
	let base = name.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
	match base.rfind('.') {
		Some(0) | None => "",
		Some(idx) => &base[idx..],
	}
}

/// [`extname`] for filesystem paths.
pub fn path_extname(path: &Path) -> String {
	path.file_name()
		.map(|name| extname(&name.to_string_lossy()).to_string())
		.unwrap_or_default()
}

pub fn is_archive_extension(ext: &str) -> bool {
	ARCHIVE_EXTENSIONS.contains(&ext)
}

/// Makes `input` safe to use as a single file name.
pub fn sanitize_file_name(input: &str) -> String {
	let mut name = ILLEGAL.replace_all(input, SANITIZE_REPLACEMENT).into_owned();
	name = CONTROL.replace_all(&name, SANITIZE_REPLACEMENT).into_owned();
	name = RESERVED.replace_all(&name, SANITIZE_REPLACEMENT).into_owned();
	name = WINDOWS_RESERVED.replace_all(&name, SANITIZE_REPLACEMENT).into_owned();
	name = WINDOWS_TRAILING.replace_all(&name, SANITIZE_REPLACEMENT).into_owned();

	if name.len() > MAX_FILE_NAME_BYTES {
		let mut end = MAX_FILE_NAME_BYTES;
		while !name.is_char_boundary(end) {
			end -= 1;
		}
		name.truncate(end);
	}
	name
}

/// Decoded and sanitised last segment of a URL path.
pub fn url_basename(url_path: &str) -> String {
	let segment = url_path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
	let decoded = urlencoding::decode(segment)
		.map(|s| s.into_owned())
		.unwrap_or_else(|_| segment.to_string());
	if decoded.is_empty() {
		return decoded;
	}
	sanitize_file_name(&decoded)
}

/// Name under which a remote application is stored, and whether it must be unpacked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadName {
	pub file_name: String,
	pub is_archive: bool,
}

/// Derives the local file name for a download.
///
/// An archive extension on the URL basename wins first, then a zip
/// `Content-Type`. An `attachment` `Content-Disposition` carrying a file name
/// overrides either. Without any of these the URL basename is reused, with
/// its extension swapped for the first accepted one when it is not accepted.
pub fn derive_download_name(url_path: &str, headers: &RemoteHeaders, accepted: &[String]) -> DownloadName {
	let basename = url_basename(url_path);
	let ext = extname(&basename).to_string();
	let mut file_name = None;
	let mut is_archive = false;

	if is_archive_extension(&ext) {
		file_name = Some(basename.clone());
		is_archive = true;
	}

	if let Some(content_type) = headers.content_type.as_deref() {
		debug!(content_type, "Content-Type");
		if ZIP_MIME_PATTERNS.iter().any(|re| re.is_match(content_type)) {
			file_name.get_or_insert_with(|| format!("{DEFAULT_BASENAME}.zip"));
			is_archive = true;
		}
	}

	if let Some(disposition) = headers.content_disposition.as_deref() {
		if ATTACHMENT.is_match(disposition) {
			debug!(disposition, "Content-Disposition");
			if let Some(captures) = DISPOSITION_FILENAME.captures(disposition) {
				let name = sanitize_file_name(&captures[1]);
				is_archive = is_archive || is_archive_extension(extname(&name));
				file_name = Some(name);
			}
		}
	}

	let file_name = file_name.unwrap_or_else(|| {
		let stem = if basename.is_empty() {
			DEFAULT_BASENAME.to_string()
		} else {
			basename[..basename.len() - ext.len()].to_string()
		};
		let resulting_ext = if accepted.iter().any(|a| *a == ext) {
			ext.clone()
		} else {
			let fallback = accepted.first().cloned().unwrap_or_default();
			info!(
				"The current file extension '{ext}' is not supported. Defaulting to '{fallback}'"
			);
			fallback
		};
		format!("{stem}{resulting_ext}")
	});

	DownloadName { file_name, is_archive }
}

#[cfg(test)]
mod tests {
	use super::*;

	fn accepted(exts: &[&str]) -> Vec<String> {
		exts.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn extname_matches_path_semantics() {
		assert_eq!(extname("app.zip"), ".zip");
		assert_eq!(extname("/a/b/My.app/"), ".app");
		assert_eq!(extname("archive.tar.gz"), ".gz");
		assert_eq!(extname(".profile"), "");
		assert_eq!(extname("README"), "");
	}

	#[test]
	fn sanitize_replaces_illegal_characters() {
		assert_eq!(sanitize_file_name("a/b:c*d?.zip"), "a-b-c-d-.zip");
		assert_eq!(sanitize_file_name(".."), "-");
		assert_eq!(sanitize_file_name("con.txt"), "-");
		assert_eq!(sanitize_file_name("name. "), "name-");
	}

	#[test]
	fn url_basename_decodes_percent_escapes() {
		assert_eq!(url_basename("/builds/My%20App.ipa"), "My App.ipa");
		assert_eq!(url_basename("/"), "");
	}

	#[test]
	fn archive_extension_on_url_wins() {
		let name = derive_download_name("/builds/app.zip", &RemoteHeaders::default(), &accepted(&[".app"]));
		assert_eq!(name, DownloadName { file_name: "app.zip".into(), is_archive: true });
	}

	#[test]
	fn zip_content_type_marks_archive() {
		let headers = RemoteHeaders {
			content_type: Some("application/zip; charset=binary".into()),
			..Default::default()
		};
		let name = derive_download_name("/download", &headers, &accepted(&[".app"]));
		assert_eq!(name, DownloadName { file_name: "youi-app.zip".into(), is_archive: true });
	}

	#[test]
	fn content_type_must_match_whole_word() {
		let headers = RemoteHeaders {
			content_type: Some("application/zipper".into()),
			..Default::default()
		};
		let name = derive_download_name("/download.apk", &headers, &accepted(&[".apk"]));
		assert_eq!(name, DownloadName { file_name: "download.apk".into(), is_archive: false });
	}

	#[test]
	fn attachment_disposition_overrides_name() {
		let headers = RemoteHeaders {
			content_disposition: Some(r#"attachment; filename="Build 42.ipa""#.into()),
			..Default::default()
		};
		let name = derive_download_name("/get?id=42", &headers, &accepted(&[".app", ".ipa"]));
		assert_eq!(name, DownloadName { file_name: "Build 42.ipa".into(), is_archive: true });
	}

	#[test]
	fn inline_disposition_is_ignored() {
		let headers = RemoteHeaders {
			content_disposition: Some(r#"inline; filename="other.zip""#.into()),
			..Default::default()
		};
		let name = derive_download_name("/app.apk", &headers, &accepted(&[".apk"]));
		assert_eq!(name.file_name, "app.apk");
		assert!(!name.is_archive);
	}

	#[test]
	fn unsupported_extension_falls_back_to_first_accepted() {
		let name = derive_download_name("/latest.bin", &RemoteHeaders::default(), &accepted(&[".apk", ".aab"]));
		assert_eq!(name, DownloadName { file_name: "latest.apk".into(), is_archive: false });
	}

	#[test]
	fn empty_basename_uses_default() {
		let name = derive_download_name("/", &RemoteHeaders::default(), &accepted(&[".apk"]));
		assert_eq!(name.file_name, "youi-app.apk");
	}
}

//! Resolver against a real HTTP server.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::{Method, header};
use axum::response::IntoResponse;
use axum::routing::get;
use youi_runtime::{AppResolver, Error};
use zip::write::SimpleFileOptions;

const LAST_MODIFIED: &str = "Wed, 21 Oct 2015 07:28:00 GMT";

#[derive(Clone)]
struct Served {
	archive: Arc<Vec<u8>>,
	gets: Arc<AtomicUsize>,
}

impl Served {
	fn count(&self, method: &Method) {
		if *method == Method::GET {
			self.gets.fetch_add(1, Ordering::SeqCst);
		}
	}
}

async fn nightly(State(served): State<Served>, method: Method) -> impl IntoResponse {
	served.count(&method);
	(
		[(header::LAST_MODIFIED, LAST_MODIFIED), (header::CONTENT_TYPE, "application/octet-stream")],
		served.archive.as_ref().clone(),
	)
}

async fn attachment(State(served): State<Served>, method: Method) -> impl IntoResponse {
	served.count(&method);
	(
		[
			(header::CONTENT_TYPE, "application/zip"),
			(header::CONTENT_DISPOSITION, r#"attachment; filename="Game Build.zip""#),
		],
		served.archive.as_ref().clone(),
	)
}

fn app_archive() -> Vec<u8> {
	let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
	writer.start_file("Payload/Game.app/Info.plist", SimpleFileOptions::default()).unwrap();
	writer.write_all(b"<plist/>").unwrap();
	writer.start_file("Payload/Game.app/Game", SimpleFileOptions::default()).unwrap();
	writer.write_all(b"binary").unwrap();
	writer.start_file("Symbols/Game.dSYM", SimpleFileOptions::default()).unwrap();
	writer.write_all(b"symbols").unwrap();
	writer.finish().unwrap().into_inner()
}

async fn serve() -> (String, Served) {
	let served = Served {
		archive: Arc::new(app_archive()),
		gets: Arc::new(AtomicUsize::new(0)),
	};
	let app = Router::new()
		.route("/builds/app.zip", get(nightly))
		.route("/download", get(attachment))
		.with_state(served.clone());

	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});
	(format!("http://{addr}"), served)
}

#[tokio::test]
async fn remote_archive_is_downloaded_once_and_reused() {
	let (base, served) = serve().await;
	let scratch = tempfile::tempdir().unwrap();
	let resolver = AppResolver::new().with_scratch_root(scratch.path());
	let url = format!("{base}/builds/app.zip");

	let first = resolver.resolve(&url, &[".app"]).await.unwrap();
	let second = resolver.resolve(&url, &[".app"]).await.unwrap();

	assert_eq!(first, second);
	assert!(first.ends_with("Payload/Game.app"));
	assert!(first.join("Info.plist").is_file());
	assert_eq!(served.gets.load(Ordering::SeqCst), 1);

	let entry = resolver.cache().get(&url).unwrap();
	assert!(entry.hash.is_some());
	assert_eq!(entry.last_modified.unwrap().to_rfc2822(), "Wed, 21 Oct 2015 07:28:00 +0000");
}

#[tokio::test]
async fn attachment_header_names_the_archive() {
	let (base, served) = serve().await;
	let scratch = tempfile::tempdir().unwrap();
	let resolver = AppResolver::new().with_scratch_root(scratch.path());
	let url = format!("{base}/download?build=42");

	let first = resolver.resolve(&url, &["app"]).await.unwrap();
	// No Last-Modified: downloaded again, but the archive hash matches.
	let second = resolver.resolve(&url, &["app"]).await.unwrap();

	assert_eq!(first, second);
	assert_eq!(first.file_name().unwrap(), "Game.app");
	assert_eq!(served.gets.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn http_error_status_fails_download() {
	let (base, _served) = serve().await;
	let scratch = tempfile::tempdir().unwrap();
	let resolver = AppResolver::new().with_scratch_root(scratch.path());
	let url = format!("{base}/builds/missing.zip");

	let err = resolver.resolve(&url, &[".app"]).await.unwrap_err();

	match &err {
		Error::DownloadFailed { url: failed, reason } => {
			assert_eq!(failed, &url);
			assert_eq!(reason, "404 - Not Found");
		}
		other => panic!("unexpected error: {other}"),
	}
	assert!(err.is_resolution());
}

#[tokio::test]
async fn json_reference_resolves_in_place() {
	let (base, _served) = serve().await;
	let scratch = tempfile::tempdir().unwrap();
	let resolver = AppResolver::new().with_scratch_root(scratch.path());
	let app = serde_json::Value::String(format!("{base}/builds/app.zip"));

	let resolved = resolver.resolve_value(&app, &[".app"]).await.unwrap();

	let path = resolved.as_str().unwrap();
	assert!(path.ends_with("Game.app"));
	assert!(std::path::Path::new(path).is_dir());
}

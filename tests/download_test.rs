//! Staged download and watchdog tests
//!
//! A download writes into a `Downloading_`-prefixed sibling and publishes
//! under the final name only after success, so the target never references
//! partial data. The timed variant races a best-effort abort watchdog
//! against the transfer.

mod common;

use common::*;
use pullr::config::TransportRegistry;
use pullr::error::{ConnectionError, ProtocolError};
use pullr::handler::ProtocolHandler;
use pullr::protocol::Session;
use pullr::types::RemoteFile;
use pullr::SharedSession;
use std::time::Duration;
use tempfile::TempDir;

async fn handler_with_session(server: &MockServer) -> (ProtocolHandler, SharedSession) {
	let mut registry = TransportRegistry::new();
	registry.register("ftp", MockFactory::new("ftp", server.clone()));
	let handler = ProtocolHandler::new(registry, fast_config(4));
	let dir = RemoteFile::directory(test_site(), "/pub/data");
	let session = handler.get_appropriate_protocol(&dir, true, true).await.unwrap();
	(handler, session)
}

fn data_file(name: &str) -> RemoteFile {
	RemoteFile::file(test_site(), &format!("/pub/data/{}", name))
}

#[tokio::test]
async fn test_download_publishes_complete_content() {
	let server = MockServer::new();
	seed_data_dir(&server, 3);
	let (handler, session) = handler_with_session(&server).await;
	let local = TempDir::new().unwrap();
	let target = local.path().join("f1.dat");

	handler.download(&session, &data_file("f1.dat"), &target, false).await.unwrap();

	assert_eq!(std::fs::read(&target).unwrap(), b"data-1");
	assert!(!local.path().join("Downloading_f1.dat").exists());
	// Remote source untouched without delete_after
	assert!(server.has_file("/pub/data/f1.dat"));
}

#[tokio::test]
async fn test_download_overwrites_preexisting_target() {
	let server = MockServer::new();
	seed_data_dir(&server, 3);
	let (handler, session) = handler_with_session(&server).await;
	let local = TempDir::new().unwrap();
	let target = local.path().join("f2.dat");
	std::fs::write(&target, b"stale").unwrap();

	handler.download(&session, &data_file("f2.dat"), &target, false).await.unwrap();

	assert_eq!(std::fs::read(&target).unwrap(), b"data-2");
	assert!(!local.path().join("Downloading_f2.dat").exists());
}

#[tokio::test]
async fn test_failed_download_leaves_no_partial_file() {
	let server = MockServer::new();
	seed_data_dir(&server, 3);
	server.set_fail_fetch(true);
	let (handler, session) = handler_with_session(&server).await;
	let local = TempDir::new().unwrap();
	let target = local.path().join("f1.dat");

	let result = handler.download(&session, &data_file("f1.dat"), &target, false).await;
	match result {
		Err(ConnectionError::DownloadFailed { file, .. }) => {
			assert!(file.contains("f1.dat"));
		}
		other => panic!("Expected DownloadFailed, got {:?}", other.map(|_| ())),
	}

	assert!(!target.exists());
	assert!(!local.path().join("Downloading_f1.dat").exists());
}

#[tokio::test]
async fn test_download_with_delete_after_removes_remote_source() {
	let server = MockServer::new();
	seed_data_dir(&server, 3);
	let (handler, session) = handler_with_session(&server).await;
	let local = TempDir::new().unwrap();
	let target = local.path().join("f0.dat");

	handler.download(&session, &data_file("f0.dat"), &target, true).await.unwrap();

	assert_eq!(std::fs::read(&target).unwrap(), b"data-0");
	assert!(!server.has_file("/pub/data/f0.dat"));
}

#[tokio::test]
async fn test_remote_delete_refusal_does_not_fail_download() {
	let server = MockServer::new();
	seed_data_dir(&server, 3);
	server.set_fail_delete(true);
	let (handler, session) = handler_with_session(&server).await;
	let local = TempDir::new().unwrap();
	let target = local.path().join("f0.dat");

	// Failure to delete the remote source is logged, not raised
	handler.download(&session, &data_file("f0.dat"), &target, true).await.unwrap();

	assert_eq!(std::fs::read(&target).unwrap(), b"data-0");
	assert!(server.has_file("/pub/data/f0.dat"));
}

#[tokio::test]
async fn test_configured_timeout_applies_to_handler_downloads() {
	let server = MockServer::new();
	seed_data_dir(&server, 1);
	server.set_fetch_delay(Duration::from_secs(30));

	let mut registry = TransportRegistry::new();
	registry.register("ftp", MockFactory::new("ftp", server.clone()));
	let mut config = fast_config(4);
	config.download_timeout_secs = Some(1);
	let handler = ProtocolHandler::new(registry, config);
	let dir = RemoteFile::directory(test_site(), "/pub/data");
	let session = handler.get_appropriate_protocol(&dir, true, true).await.unwrap();

	let local = TempDir::new().unwrap();
	let target = local.path().join("f0.dat");
	match handler.download(&session, &data_file("f0.dat"), &target, false).await {
		Err(ConnectionError::DownloadFailed { file, .. }) => assert!(file.contains("f0.dat")),
		other => panic!("Expected DownloadFailed, got {:?}", other.map(|_| ())),
	}
	assert!(!target.exists());
	assert!(!local.path().join("Downloading_f0.dat").exists());
}

#[tokio::test]
async fn test_staging_rename_failure_carries_file_context() {
	let server = MockServer::new();
	seed_data_dir(&server, 3);
	let (handler, session) = handler_with_session(&server).await;
	let local = TempDir::new().unwrap();
	let target = local.path().join("f1.dat");
	std::fs::write(&target, b"stale").unwrap();
	// A directory squatting on the staging name makes the first rename fail
	std::fs::create_dir(local.path().join("Downloading_f1.dat")).unwrap();

	match handler.download(&session, &data_file("f1.dat"), &target, false).await {
		Err(ConnectionError::DownloadFailed { file, .. }) => assert!(file.contains("f1.dat")),
		other => panic!("Expected DownloadFailed, got {:?}", other.map(|_| ())),
	}
	// The failure happened before any transfer: the stale target is untouched
	assert_eq!(std::fs::read(&target).unwrap(), b"stale");
}

#[tokio::test]
async fn test_watchdog_aborts_slow_transfer() {
	let server = MockServer::new();
	seed_data_dir(&server, 1);
	server.set_fetch_delay(Duration::from_secs(5));

	let mut session = Session::new(Box::new(MockTransport::new(server.clone())), "ftp");
	session.connect(&test_site()).await.unwrap();
	let local = TempDir::new().unwrap();
	let dest = local.path().join("f0.dat");

	let result = session
		.download(&data_file("f0.dat"), &dest, Duration::from_millis(50))
		.await;
	match result {
		Err(ProtocolError::TransferAborted { path }) => assert_eq!(path, "/pub/data/f0.dat"),
		other => panic!("Expected TransferAborted, got {:?}", other),
	}
	assert!(!dest.exists());
}

#[tokio::test]
async fn test_watchdog_is_noop_for_fast_transfer() {
	let server = MockServer::new();
	seed_data_dir(&server, 1);

	let mut session = Session::new(Box::new(MockTransport::new(server.clone())), "ftp");
	session.connect(&test_site()).await.unwrap();
	let local = TempDir::new().unwrap();
	let dest = local.path().join("f0.dat");

	session.download(&data_file("f0.dat"), &dest, Duration::from_secs(30)).await.unwrap();
	assert_eq!(std::fs::read(&dest).unwrap(), b"data-0");
}

// vim: ts=4

#![allow(dead_code)]

//! Shared in-memory transport for integration tests
//!
//! `MockServer` holds one fake remote site's directory tree plus the fault
//! switches the tests flip (failing connects, lying pwd, slow transfers).
//! `MockTransport`/`MockFactory` plug it into the handler through the real
//! `Transport`/`TransportFactory` boundary.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;

use pullr::error::ProtocolError;
use pullr::protocol::{AbortHandle, DirEntry, Transport, TransportFactory, TransportResult};
use pullr::types::RemoteSite;
use pullr::util;
use pullr::HandlerConfig;

pub const HOME: &str = "/home/crawl";

#[derive(Debug, Clone)]
struct MockEntry {
	name: String,
	is_dir: bool,
}

#[derive(Debug, Default)]
struct ServerInner {
	dirs: HashMap<String, Vec<MockEntry>>,
	files: HashMap<String, Vec<u8>>,
	/// Connect calls left to fail before one succeeds
	connect_failures: usize,
	connect_attempts: usize,
	chdir_calls: usize,
	pwd_calls: usize,
	/// pwd lies with this value from the second call on (home recapture)
	home_drift: Option<String>,
	fail_listing: bool,
	fail_fetch: bool,
	fail_delete: bool,
	fetch_delay: Option<Duration>,
}

/// One fake remote site shared by every transport a factory hands out
#[derive(Clone)]
pub struct MockServer {
	inner: Arc<Mutex<ServerInner>>,
}

impl MockServer {
	pub fn new() -> Self {
		let mut inner = ServerInner::default();
		inner.dirs.insert("/".to_string(), Vec::new());
		inner.dirs.insert(HOME.to_string(), Vec::new());
		MockServer { inner: Arc::new(Mutex::new(inner)) }
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, ServerInner> {
		self.inner.lock().unwrap()
	}

	pub fn add_dir(&self, path: &str) {
		let mut inner = self.lock();
		if inner.dirs.contains_key(path) {
			return;
		}
		inner.dirs.insert(path.to_string(), Vec::new());
		let parent = util::parent_path(path);
		let name = util::file_name(path).to_string();
		if let Some(entries) = inner.dirs.get_mut(&parent) {
			entries.push(MockEntry { name, is_dir: true });
		}
	}

	pub fn add_file(&self, path: &str, content: &[u8]) {
		let mut inner = self.lock();
		inner.files.insert(path.to_string(), content.to_vec());
		let parent = util::parent_path(path);
		let name = util::file_name(path).to_string();
		if let Some(entries) = inner.dirs.get_mut(&parent) {
			entries.push(MockEntry { name, is_dir: false });
		}
	}

	/// Remote-side churn: drop an entry without going through the handler
	pub fn drop_entry(&self, path: &str) {
		let mut inner = self.lock();
		inner.files.remove(path);
		let parent = util::parent_path(path);
		let name = util::file_name(path);
		if let Some(entries) = inner.dirs.get_mut(&parent) {
			entries.retain(|e| e.name != name);
		}
	}

	pub fn has_file(&self, path: &str) -> bool {
		self.lock().files.contains_key(path)
	}

	pub fn set_connect_failures(&self, n: usize) {
		self.lock().connect_failures = n;
	}

	pub fn set_home_drift(&self, lie: &str) {
		self.lock().home_drift = Some(lie.to_string());
	}

	pub fn set_fail_listing(&self, fail: bool) {
		self.lock().fail_listing = fail;
	}

	pub fn set_fail_fetch(&self, fail: bool) {
		self.lock().fail_fetch = fail;
	}

	pub fn set_fail_delete(&self, fail: bool) {
		self.lock().fail_delete = fail;
	}

	pub fn set_fetch_delay(&self, delay: Duration) {
		self.lock().fetch_delay = Some(delay);
	}

	pub fn connect_attempts(&self) -> usize {
		self.lock().connect_attempts
	}

	pub fn chdir_calls(&self) -> usize {
		self.lock().chdir_calls
	}
}

pub struct MockTransport {
	server: MockServer,
	connected: bool,
	cwd: String,
	abort: AbortHandle,
}

impl MockTransport {
	pub fn new(server: MockServer) -> Self {
		MockTransport {
			server,
			connected: false,
			cwd: HOME.to_string(),
			abort: AbortHandle::new(),
		}
	}
}

#[async_trait]
impl Transport for MockTransport {
	async fn connect(&mut self, host: &str, _u: &str, _p: &str) -> TransportResult<()> {
		let mut inner = self.server.lock();
		inner.connect_attempts += 1;
		if inner.connect_failures > 0 {
			inner.connect_failures -= 1;
			return Err(ProtocolError::Connect {
				host: host.to_string(),
				message: "injected connect failure".to_string(),
			});
		}
		drop(inner);
		self.connected = true;
		self.cwd = HOME.to_string();
		Ok(())
	}

	async fn disconnect(&mut self) -> TransportResult<()> {
		self.connected = false;
		Ok(())
	}

	async fn is_connected(&self) -> bool {
		self.connected
	}

	async fn chdir(&mut self, path: &str) -> TransportResult<()> {
		let mut inner = self.server.lock();
		inner.chdir_calls += 1;
		if !inner.dirs.contains_key(path) {
			return Err(ProtocolError::Navigation {
				path: path.to_string(),
				message: "no such directory".to_string(),
			});
		}
		drop(inner);
		self.cwd = path.to_string();
		Ok(())
	}

	async fn cd_root(&mut self) -> TransportResult<()> {
		self.chdir("/").await
	}

	async fn pwd(&mut self) -> TransportResult<String> {
		let mut inner = self.server.lock();
		inner.pwd_calls += 1;
		if inner.pwd_calls >= 2 {
			if let Some(lie) = &inner.home_drift {
				return Ok(lie.clone());
			}
		}
		Ok(self.cwd.clone())
	}

	async fn list(&mut self) -> TransportResult<Vec<DirEntry>> {
		let inner = self.server.lock();
		if inner.fail_listing {
			return Err(ProtocolError::Listing {
				path: self.cwd.clone(),
				message: "injected listing failure".to_string(),
			});
		}
		let entries = inner.dirs.get(&self.cwd).cloned().unwrap_or_default();
		Ok(entries
			.into_iter()
			.map(|e| DirEntry { path: e.name, is_directory: e.is_dir })
			.collect())
	}

	async fn fetch(&mut self, path: &str, dest: &Path) -> TransportResult<()> {
		self.abort.reset();
		let (content, delay, fail) = {
			let inner = self.server.lock();
			(inner.files.get(path).cloned(), inner.fetch_delay, inner.fail_fetch)
		};
		if let Some(delay) = delay {
			let start = Instant::now();
			while start.elapsed() < delay {
				if self.abort.is_aborted() {
					return Err(ProtocolError::TransferAborted { path: path.to_string() });
				}
				tokio::time::sleep(Duration::from_millis(5)).await;
			}
		}
		if fail {
			return Err(ProtocolError::Transfer {
				path: path.to_string(),
				message: "injected transfer failure".to_string(),
			});
		}
		let content = content.ok_or_else(|| ProtocolError::Transfer {
			path: path.to_string(),
			message: "no such file".to_string(),
		})?;
		tokio::fs::write(dest, content).await.map_err(ProtocolError::Io)
	}

	async fn remove(&mut self, path: &str) -> bool {
		let mut inner = self.server.lock();
		if inner.fail_delete {
			return false;
		}
		if inner.files.remove(path).is_none() {
			return false;
		}
		let parent = util::parent_path(path);
		let name = util::file_name(path).to_string();
		if let Some(entries) = inner.dirs.get_mut(&parent) {
			entries.retain(|e| e.name != name);
		}
		true
	}

	fn abort_handle(&self) -> AbortHandle {
		self.abort.clone()
	}
}

pub struct MockFactory {
	scheme: String,
	server: MockServer,
	created: Arc<AtomicUsize>,
}

impl MockFactory {
	pub fn new(scheme: &str, server: MockServer) -> Arc<Self> {
		Arc::new(MockFactory {
			scheme: scheme.to_string(),
			server,
			created: Arc::new(AtomicUsize::new(0)),
		})
	}

	pub fn created(&self) -> usize {
		self.created.load(Ordering::SeqCst)
	}
}

impl TransportFactory for MockFactory {
	fn scheme(&self) -> &str {
		&self.scheme
	}

	fn new_transport(&self) -> Box<dyn Transport> {
		self.created.fetch_add(1, Ordering::SeqCst);
		Box::new(MockTransport::new(self.server.clone()))
	}
}

pub fn test_site() -> RemoteSite {
	RemoteSite::new("mirror", Url::parse("ftp://data.example.org").unwrap(), "crawl", "secret")
}

/// Small pages and a fast retry delay so tests stay quick
pub fn fast_config(page_size: usize) -> HandlerConfig {
	HandlerConfig { page_size, retry_delay_ms: 10, download_timeout_secs: None }
}

/// Populate `/pub/data` with `count` files named f0.dat .. f{count-1}.dat
pub fn seed_data_dir(server: &MockServer, count: usize) {
	server.add_dir("/pub");
	server.add_dir("/pub/data");
	for i in 0..count {
		server.add_file(&format!("/pub/data/f{}.dat", i), format!("data-{}", i).as_bytes());
	}
}

// vim: ts=4

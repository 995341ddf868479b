//! Pluggable transport boundary
//!
//! A `Transport` is one wire client (FTP, SFTP, HTTP, ...) already stripped
//! of any session bookkeeping: it navigates, lists, fetches and removes, and
//! nothing else. The session layer owns home/cwd tracking, the handler layer
//! owns pooling and retries. Concrete wire clients live outside this crate;
//! they plug in through `TransportFactory`.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::ProtocolError;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, ProtocolError>;

/// Raw listing entry as reported by a transport
///
/// `path` may be absolute or a bare name; the session resolves bare names
/// against its current working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
	pub path: String,
	pub is_directory: bool,
}

impl DirEntry {
	pub fn file(path: &str) -> Self {
		DirEntry { path: path.to_string(), is_directory: false }
	}

	pub fn directory(path: &str) -> Self {
		DirEntry { path: path.to_string(), is_directory: true }
	}
}

/// Cooperative cancellation flag for in-flight transfers
///
/// Transports reset the flag when a transfer starts and poll it inside the
/// transfer loop, failing with `ProtocolError::TransferAborted` when it is
/// set. An abort requested after a transfer has completed is a no-op until
/// the next transfer resets the flag.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
	aborted: Arc<AtomicBool>,
}

impl AbortHandle {
	pub fn new() -> Self {
		AbortHandle { aborted: Arc::new(AtomicBool::new(false)) }
	}

	/// Request best-effort abort of the current transfer
	pub fn abort(&self) {
		self.aborted.store(true, Ordering::SeqCst);
	}

	pub fn is_aborted(&self) -> bool {
		self.aborted.load(Ordering::SeqCst)
	}

	/// Called by transports at the start of each transfer
	pub fn reset(&self) {
		self.aborted.store(false, Ordering::SeqCst);
	}
}

/// One connected wire client
///
/// Implementations need no internal locking; each transport is owned by a
/// single `Session` whose own lock fully serializes use.
#[async_trait]
pub trait Transport: Send + Sync {
	/// Authenticate against a host
	async fn connect(&mut self, host: &str, username: &str, password: &str)
		-> TransportResult<()>;

	async fn disconnect(&mut self) -> TransportResult<()>;

	async fn is_connected(&self) -> bool;

	/// Remote change-directory to an absolute path
	async fn chdir(&mut self, path: &str) -> TransportResult<()>;

	async fn cd_root(&mut self) -> TransportResult<()>;

	/// Current remote working directory
	async fn pwd(&mut self) -> TransportResult<String>;

	/// Entries of the current working directory, in remote order
	async fn list(&mut self) -> TransportResult<Vec<DirEntry>>;

	/// Stream remote bytes to a local destination
	async fn fetch(&mut self, path: &str, local_dest: &Path) -> TransportResult<()>;

	/// Remove a remote file; advisory boolean, never an error
	async fn remove(&mut self, path: &str) -> bool;

	/// Handle for best-effort abort of the in-flight transfer
	fn abort_handle(&self) -> AbortHandle;
}

/// Constructs transports for one wire protocol implementation
pub trait TransportFactory: Send + Sync {
	/// Lowercase scheme tag this factory serves (used for logging only;
	/// candidate selection is the registry's job)
	fn scheme(&self) -> &str;

	fn new_transport(&self) -> Box<dyn Transport>;
}


// vim: ts=4

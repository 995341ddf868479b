//! Connected protocol session state machine
//!
//! A `Session` wraps one transport and tracks what the wire client does not:
//! the bound site, the home directory captured right after connect, and the
//! current working directory. States are Disconnected -> Connected (after
//! authenticate + home capture) -> Disconnected (close or failure); the home
//! directory never changes between a connect and the next reconnect, and the
//! cwd only moves after a remote navigation call succeeds.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::{ConnectionError, ProtocolError};
use crate::logging::*;
use crate::types::{FileFilter, RemoteFile, RemoteSite};
use crate::util;

use super::traits::{DirEntry, Transport};

/// A session shared between polling loops; the lock fully serializes every
/// operation against the one underlying connection
pub type SharedSession = Arc<Mutex<Session>>;

/// One logical connection to a remote site
pub struct Session {
	transport: Box<dyn Transport>,
	protocol_type: String,
	remote_site: Option<RemoteSite>,
	home_dir: Option<RemoteFile>,
	cwd: Option<RemoteFile>,
}

impl Session {
	pub fn new(transport: Box<dyn Transport>, protocol_type: &str) -> Self {
		Session {
			transport,
			protocol_type: protocol_type.to_lowercase(),
			remote_site: None,
			home_dir: None,
			cwd: None,
		}
	}

	pub fn into_shared(self) -> SharedSession {
		Arc::new(Mutex::new(self))
	}

	/// Authenticate and capture the home directory
	pub async fn connect(&mut self, site: &RemoteSite) -> Result<(), ConnectionError> {
		self.remote_site = Some(site.clone());
		self.transport
			.connect(site.host(), &site.username, &site.password)
			.await
			.map_err(|e| ConnectionError::ConnectFailed {
				site: site.to_string(),
				source: Box::new(e),
			})?;
		let home_path = self.transport.pwd().await.map_err(|e| ConnectionError::ConnectFailed {
			site: site.to_string(),
			source: Box::new(ProtocolError::Other(format!(
				"Failed to pwd after connect to store cwd: {}",
				e
			))),
		})?;
		let home = RemoteFile::directory(site.clone(), &home_path);
		self.home_dir = Some(home.clone());
		self.cwd = Some(home);
		Ok(())
	}

	/// Best-effort disconnect, then connect to the same site again
	///
	/// Only valid on a session that has been connected at least once.
	pub async fn reconnect(&mut self) -> Result<(), ConnectionError> {
		let site = match &self.remote_site {
			Some(site) => site.clone(),
			None => return Err(ProtocolError::NotConnected.into()),
		};
		if let Err(e) = self.disconnect().await {
			debug!("Ignoring disconnect failure during reconnect: {}", e);
		}
		self.connect(&site).await
	}

	pub async fn disconnect(&mut self) -> Result<(), ProtocolError> {
		self.transport.disconnect().await
	}

	pub async fn is_connected(&self) -> bool {
		self.transport.is_connected().await
	}

	/// Change directory; a no-op when already there
	pub async fn cd(&mut self, file: &RemoteFile) -> Result<(), ProtocolError> {
		let cwd = self.cwd.as_ref().ok_or(ProtocolError::NotConnected)?;
		let target = if file.relative_to_home {
			let home = self.home_dir.as_ref().ok_or(ProtocolError::NotConnected)?;
			file.absolute_from(&home.path)
		} else {
			file.clone()
		};
		if *cwd == target {
			return Ok(());
		}
		info!("Changing to directory '{}'", target);
		self.transport.chdir(&target.path).await?;
		self.cwd = Some(target);
		Ok(())
	}

	/// Unconditional navigation back to the captured home directory
	pub async fn cd_to_home(&mut self) -> Result<(), ProtocolError> {
		let home = self.home_dir.clone().ok_or(ProtocolError::NotConnected)?;
		info!("Changing to HOME directory '{}'", home);
		self.transport.chdir(&home.path).await?;
		self.cwd = Some(home);
		Ok(())
	}

	/// Unconditional navigation to "/"
	pub async fn cd_to_root(&mut self) -> Result<(), ProtocolError> {
		let site = self.remote_site.clone().ok_or(ProtocolError::NotConnected)?;
		info!("Changing to ROOT directory '/'");
		self.transport.cd_root().await?;
		self.cwd = Some(RemoteFile::directory(site, "/"));
		Ok(())
	}

	/// Current working directory as tracked by the session
	pub fn pwd(&self) -> Result<RemoteFile, ProtocolError> {
		self.cwd.clone().ok_or(ProtocolError::NotConnected)
	}

	/// Working directory as reported by the remote server, not the tracked
	/// cwd; the compatibility test uses this to catch transports that lie
	/// about navigation
	pub async fn remote_pwd(&mut self) -> Result<String, ProtocolError> {
		self.transport.pwd().await
	}

	/// Entries of the current working directory, in remote order
	pub async fn ls(&mut self) -> Result<Vec<RemoteFile>, ProtocolError> {
		let cwd = self.cwd.clone().ok_or(ProtocolError::NotConnected)?;
		let entries = self.transport.list().await?;
		Ok(entries.iter().map(|e| self.resolve_entry(&cwd, e)).collect())
	}

	/// Listing of the current working directory with rejected entries dropped
	pub async fn ls_filtered(
		&mut self,
		filter: &dyn FileFilter,
	) -> Result<Vec<RemoteFile>, ProtocolError> {
		Ok(self.ls().await?.into_iter().filter(|f| filter.accept(f)).collect())
	}

	/// Listing of an arbitrary directory
	///
	/// When `dir` is not the cwd the transport navigates there, lists, and
	/// navigates back; the tracked cwd is unchanged either way.
	pub async fn ls_dir(&mut self, dir: &RemoteFile) -> Result<Vec<RemoteFile>, ProtocolError> {
		let cwd = self.cwd.clone().ok_or(ProtocolError::NotConnected)?;
		let target = self.resolve(dir)?;
		if cwd == target {
			return self.ls().await;
		}
		self.transport.chdir(&target.path).await?;
		let entries = self.transport.list().await?;
		self.transport.chdir(&cwd.path).await?;
		Ok(entries.iter().map(|e| self.resolve_entry(&target, e)).collect())
	}

	/// Stream a remote file's bytes to a local destination
	pub async fn get(&mut self, file: &RemoteFile, local_dest: &Path) -> Result<(), ProtocolError> {
		let target = self.resolve(file)?;
		self.transport.fetch(&target.path, local_dest).await
	}

	/// Timed transfer with a best-effort abort watchdog
	///
	/// A detached task requests abort through the transport's `AbortHandle`
	/// once `timeout` elapses; the transfer itself runs on the caller's task.
	/// This is a race by design: the watchdog may fire just as the transfer
	/// legitimately completes, in which case the abort is a no-op.
	pub async fn download(
		&mut self,
		file: &RemoteFile,
		local_dest: &Path,
		timeout: Duration,
	) -> Result<(), ProtocolError> {
		let handle = self.transport.abort_handle();
		let path = file.path.clone();
		let watchdog = tokio::spawn(async move {
			tokio::time::sleep(timeout).await;
			warn!("Transfer watchdog fired for '{}' after {:?}, requesting abort", path, timeout);
			handle.abort();
		});
		let result = self.get(file, local_dest).await;
		watchdog.abort();
		result
	}

	/// Remove a remote file; advisory boolean, never an error
	pub async fn delete(&mut self, file: &RemoteFile) -> bool {
		let target = match self.resolve(file) {
			Ok(target) => target,
			Err(_) => return false,
		};
		self.transport.remove(&target.path).await
	}

	/// Build a `RemoteFile` for a path string, resolving home-relative paths
	pub fn remote_file_for(&self, path: &str, is_dir: bool) -> Result<RemoteFile, ProtocolError> {
		let site = self.remote_site.clone().ok_or(ProtocolError::NotConnected)?;
		Ok(RemoteFile::new(site, &self.abs_path_for(path)?, is_dir))
	}

	/// Absolute form of a possibly home-relative path string
	pub fn abs_path_for(&self, path: &str) -> Result<String, ProtocolError> {
		if path.starts_with('/') {
			return Ok(path.to_string());
		}
		let home = self.home_dir.as_ref().ok_or(ProtocolError::NotConnected)?;
		Ok(util::join_path(&home.path, path))
	}

	pub fn protocol_type(&self) -> &str {
		&self.protocol_type
	}

	pub fn remote_site(&self) -> Option<&RemoteSite> {
		self.remote_site.as_ref()
	}

	pub fn home_dir(&self) -> Option<&RemoteFile> {
		self.home_dir.as_ref()
	}

	fn resolve(&self, file: &RemoteFile) -> Result<RemoteFile, ProtocolError> {
		if file.relative_to_home {
			let home = self.home_dir.as_ref().ok_or(ProtocolError::NotConnected)?;
			Ok(file.absolute_from(&home.path))
		} else {
			Ok(file.clone())
		}
	}

	fn resolve_entry(&self, dir: &RemoteFile, entry: &DirEntry) -> RemoteFile {
		let path = if entry.path.starts_with('/') {
			entry.path.clone()
		} else {
			util::join_path(&dir.path, &entry.path)
		};
		RemoteFile::new(dir.site.clone(), &path, entry.is_directory)
	}
}

/// Two sessions are interchangeable when they speak the same protocol to the
/// same site and sit in the same directory
impl PartialEq for Session {
	fn eq(&self, other: &Self) -> bool {
		self.protocol_type == other.protocol_type
			&& self.remote_site == other.remote_site
			&& self.cwd == other.cwd
	}
}

impl std::fmt::Debug for Session {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("protocol_type", &self.protocol_type)
			.field("remote_site", &self.remote_site)
			.field("home_dir", &self.home_dir)
			.field("cwd", &self.cwd)
			.finish()
	}
}


// vim: ts=4

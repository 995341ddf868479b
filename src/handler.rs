//! Protocol orchestration: factory resolution, pooling, retrying connects,
//! paginated listings and staged downloads
//!
//! One `ProtocolHandler` is created per ingestion process and called
//! concurrently by the independent polling loops, one per configured site.
//! All shared state lives in explicit fields (reuse pool, factory cache,
//! paging table, dynamic-listing snapshots) guarded by short-held locks that
//! cover only map lookups and inserts, never the remote I/O itself. Remote
//! I/O serializes on each session's own lock instead, so a long listing or
//! transfer on a shared connection blocks every other caller of that same
//! connection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::fs;

use crate::config::{HandlerConfig, TransportRegistry};
use crate::error::{ConnectionError, ProtocolError};
use crate::logging::*;
use crate::paging::PagingInfo;
use crate::protocol::{Session, SharedSession, TransportFactory};
use crate::types::{FileFilter, RemoteFile, RemoteSite};

/// Connect attempts per `connect` call; the delay between them is fixed and
/// linear (outer schedulers impose their own cadence across polling cycles)
const CONNECT_ATTEMPTS: usize = 3;

/// Prefix marking an in-progress staged download in the local directory
const STAGING_PREFIX: &str = "Downloading_";

/// Top-level orchestrator for remote-site protocol sessions
pub struct ProtocolHandler {
	registry: TransportRegistry,
	config: HandlerConfig,

	/// site URL -> live session, for callers that allow reuse
	reuse_pool: StdMutex<HashMap<String, SharedSession>>,

	/// site URL -> factory that passed the compatibility test
	factory_cache: StdMutex<HashMap<String, Arc<dyn TransportFactory>>>,

	/// directory identity -> paging cursor state
	paging_table: StdMutex<HashMap<RemoteFile, Arc<StdMutex<PagingInfo>>>>,

	/// directory identity -> frozen listing, populated once drift is seen
	dynamic_listings: StdMutex<HashMap<RemoteFile, Vec<RemoteFile>>>,
}

impl ProtocolHandler {
	pub fn new(registry: TransportRegistry, config: HandlerConfig) -> Self {
		ProtocolHandler {
			registry,
			config,
			reuse_pool: StdMutex::new(HashMap::new()),
			factory_cache: StdMutex::new(HashMap::new()),
			paging_table: StdMutex::new(HashMap::new()),
			dynamic_listings: StdMutex::new(HashMap::new()),
		}
	}

	pub fn config(&self) -> &HandlerConfig {
		&self.config
	}

	// === Factory resolution & connection management ===

	/// Resolve a connected session for a file's site, optionally navigating
	/// to the file's directory (or its parent for a plain file)
	pub async fn get_appropriate_protocol(
		&self,
		file: &RemoteFile,
		allow_reuse: bool,
		navigate_to_path: bool,
	) -> Result<SharedSession, ConnectionError> {
		let session = self
			.get_appropriate_protocol_by_site(&file.site, allow_reuse)
			.await
			.map_err(|e| ConnectionError::Resolution {
				file: file.to_string(),
				source: Box::new(e),
			})?;
		if navigate_to_path {
			let target = if file.is_directory { file.clone() } else { file.parent_file() };
			let mut guard = session.lock().await;
			guard.cd(&target).await.map_err(|e| ConnectionError::Resolution {
				file: file.to_string(),
				source: Box::new(e),
			})?;
		}
		Ok(session)
	}

	/// Resolve a connected session for a site
	///
	/// Resolution order: pooled session (when reuse is allowed), then a
	/// factory already proven compatible for this URL (connected without
	/// re-testing), then the ordered candidate factories for the URL scheme,
	/// probed with the compatibility test until one passes. Per-candidate
	/// failures are logged and swallowed; only full exhaustion escalates.
	pub async fn get_appropriate_protocol_by_site(
		&self,
		site: &RemoteSite,
		allow_reuse: bool,
	) -> Result<SharedSession, ProtocolError> {
		let url_key = site.url.as_str().to_string();

		if allow_reuse {
			let pooled = {
				let pool = self.reuse_pool.lock().unwrap_or_else(|e| e.into_inner());
				pool.get(&url_key).cloned()
			};
			if let Some(session) = pooled {
				return Ok(session);
			}
		}

		let proven = {
			let cache = self.factory_cache.lock().unwrap_or_else(|e| e.into_inner());
			cache.get(&url_key).cloned()
		};

		let session = match proven {
			Some(factory) => {
				let mut session = Session::new(factory.new_transport(), factory.scheme());
				if !self.connect(&mut session, site, false).await {
					return Err(ProtocolError::Connect {
						host: site.host().to_string(),
						message: format!("Connect retries exhausted for {}", site),
					});
				}
				session
			}
			None => self.probe_candidates(site, &url_key).await?,
		};

		let shared = session.into_shared();
		if allow_reuse {
			let mut pool = self.reuse_pool.lock().unwrap_or_else(|e| e.into_inner());
			pool.insert(url_key, shared.clone());
		}
		Ok(shared)
	}

	/// Try the registered candidate factories in order, caching the winner
	async fn probe_candidates(
		&self,
		site: &RemoteSite,
		url_key: &str,
	) -> Result<Session, ProtocolError> {
		for factory in self.registry.factories_for(&site.scheme()) {
			let mut session = Session::new(factory.new_transport(), factory.scheme());
			if self.connect(&mut session, site, true).await {
				let mut cache = self.factory_cache.lock().unwrap_or_else(|e| e.into_inner());
				cache.insert(url_key.to_string(), factory);
				return Ok(session);
			}
			warn!(
				"Transport factory '{}' is not compatible with server at {}",
				factory.scheme(),
				site.url
			);
		}
		Err(ProtocolError::NoCompatibleProtocol { site: site.to_string() })
	}

	/// Connect a session with bounded retries
	///
	/// Up to 3 attempts with a fixed wait between them; each attempt
	/// force-closes any stale connection first. Success requires the
	/// transport reporting connected plus, when `test` is set, passing the
	/// compatibility test. A connection that authenticates but fails the
	/// test returns `false` immediately; retries only cover connect errors.
	/// Exhaustion returns `false`, never an error.
	pub async fn connect(&self, session: &mut Session, site: &RemoteSite, test: bool) -> bool {
		for attempt in 0..CONNECT_ATTEMPTS {
			if attempt > 0 {
				info!("Will retry connecting to {} in {:?}", site, self.config.retry_delay());
				tokio::time::sleep(self.config.retry_delay()).await;
			}

			if let Err(e) = session.disconnect().await {
				debug!("Ignoring stale disconnect failure for {}: {}", site, e);
			}

			match session.connect(site).await {
				Ok(()) => {
					if session.is_connected().await
						&& (!test || self.is_ok_protocol(session, site).await)
					{
						info!(
							"Successfully connected to {} with protocol '{}' and username '{}'",
							site.url,
							session.protocol_type(),
							site.username
						);
						return true;
					}
					return false;
				}
				Err(e) => warn!("Error occurred while connecting to {}: {}", site, e),
			}
		}
		false
	}

	/// Scripted cd/ls/cd probe confirming a candidate transport actually
	/// works against this server; run once per URL, on the first attempt
	async fn is_ok_protocol(&self, session: &mut Session, site: &RemoteSite) -> bool {
		info!(
			"Testing protocol '{}' against {} . . . this may take a few minutes . . .",
			session.protocol_type(),
			site
		);
		match self.run_compatibility_test(session, site).await {
			Ok(()) => true,
			Err(e) => {
				error!(
					"Protocol '{}' failed compatibility test: {}",
					session.protocol_type(),
					e
				);
				false
			}
		}
	}

	async fn run_compatibility_test(
		&self,
		session: &mut Session,
		site: &RemoteSite,
	) -> Result<(), ProtocolError> {
		session.cd_to_home().await?;
		let home = session.pwd()?;
		session.ls().await?;
		match &site.cd_test_dir {
			Some(dir) => session.cd(&RemoteFile::directory(site.clone(), dir)).await?,
			None => session.cd_to_root().await?,
		}
		session.cd_to_home().await?;
		let reported = session.remote_pwd().await?;
		if reported != home.path {
			return Err(ProtocolError::HomeMismatch { expected: home.path, actual: reported });
		}
		Ok(())
	}

	// === Pagination engine ===

	/// Next bounded page of the session's current directory
	///
	/// The page is an ordered slice of the directory listing, at most
	/// `page_size` entries after filtering. Each call performs at most one
	/// remote listing; a filtered request may scan more raw entries than the
	/// page size. When the directory is observed to mutate between calls the
	/// fresh listing is frozen into a snapshot, the cursor resets to 0, and
	/// all later pages for this directory are served from the snapshot until
	/// the handler is closed, so entries are neither skipped nor duplicated
	/// despite further remote churn.
	pub async fn next_page(
		&self,
		session: &SharedSession,
		filter: Option<&dyn FileFilter>,
	) -> Result<Vec<RemoteFile>, ConnectionError> {
		let mut guard = session.lock().await;
		let cwd = guard.pwd().map_err(ConnectionError::Protocol)?;
		let info = self.paging_info_for(&cwd);

		let listing = match self.dynamic_listing_for(&cwd) {
			Some(snapshot) => snapshot,
			None => {
				let fresh = guard.ls().await.map_err(|e| {
					let page_loc =
						info.lock().unwrap_or_else(|p| p.into_inner()).page_loc();
					ConnectionError::PagingFailed {
						dir: cwd.to_string(),
						page_loc,
						source: Box::new(e),
					}
				})?;
				// Each map lock is taken on its own, never nested, to keep
				// the lock order trivially consistent with delete()
				let (drifted, last_size) = {
					let info_guard = info.lock().unwrap_or_else(|e| e.into_inner());
					(info_guard.drifted(&fresh), info_guard.size_of_last_ls())
				};
				if drifted {
					error!(
						"Remote directory '{}' mutated between paging calls (size {:?} -> {}); marking dynamic and resetting page location",
						cwd,
						last_size,
						fresh.len()
					);
					self.put_dynamic_listing(cwd.clone(), fresh.clone());
					info.lock().unwrap_or_else(|e| e.into_inner()).update(0, &fresh);
				}
				fresh
			}
		};

		let mut info_guard = info.lock().unwrap_or_else(|e| e.into_inner());
		let mut page = Vec::new();
		let mut cur_loc = info_guard.page_loc();
		while page.len() < self.config.page_size && cur_loc < listing.len() {
			let file = &listing[cur_loc];
			if filter.map_or(true, |f| f.accept(file)) {
				page.push(file.clone());
			}
			cur_loc += 1;
		}
		info_guard.update(cur_loc, &listing);
		debug!("Served page of {} entries from '{}', page_loc now {}", page.len(), cwd, cur_loc);

		Ok(page)
	}

	// === Deletion with cursor reconciliation ===

	/// Delete a remote file, keeping the parent directory's paging cursor
	/// consistent with the shrunken listing
	///
	/// The cursor counts entries already emitted; removing an entry strictly
	/// before it, or the listing's last entry, shifts that count down by one.
	/// Best-effort: any failure along the way reports `false`.
	pub async fn delete(&self, session: &SharedSession, file: &RemoteFile) -> bool {
		match self.delete_inner(session, file).await {
			Ok(deleted) => deleted,
			Err(e) => {
				warn!("Delete of {} failed: {}", file, e);
				false
			}
		}
	}

	async fn delete_inner(
		&self,
		session: &SharedSession,
		file: &RemoteFile,
	) -> Result<bool, ProtocolError> {
		let mut guard = session.lock().await;
		let parent = file.parent_file();
		let info = self.paging_info_for(&parent);

		let mut listing = match self.dynamic_listing_for(&parent) {
			Some(snapshot) => snapshot,
			None => guard.ls_dir(&parent).await?,
		};
		let index = match listing.iter().position(|f| f == file) {
			Some(index) => index,
			None => return Ok(false),
		};
		if !guard.delete(file).await {
			return Ok(false);
		}

		let last_index = listing.len() - 1;
		listing.remove(index);
		self.replace_dynamic_listing_if_cached(&parent, &listing);

		let mut info_guard = info.lock().unwrap_or_else(|e| e.into_inner());
		let page_loc = info_guard.page_loc();
		let new_loc = if index < page_loc || index == last_index {
			page_loc.saturating_sub(1)
		} else {
			page_loc
		};
		info_guard.update(new_loc, &listing);
		debug!("Deleted {} (index {}), page_loc {} -> {}", file, index, page_loc, new_loc);

		Ok(true)
	}

	// === Staged download ===

	/// Transfer a remote file into `local_target` via a staged rename
	///
	/// The target is renamed to a `Downloading_`-prefixed sibling before the
	/// transfer, marking the in-progress state for any local directory
	/// watcher and reserving the final name. Publishing under the final name
	/// is the single rename after success, so the target never references
	/// partial data. When the configuration carries a download timeout the
	/// transfer runs under the session's abort watchdog. Failure to delete
	/// the remote source afterwards is logged, not raised.
	pub async fn download(
		&self,
		session: &SharedSession,
		from: &RemoteFile,
		local_target: &Path,
		delete_after: bool,
	) -> Result<(), ConnectionError> {
		let staging = staging_path(local_target).map_err(|e| {
			ConnectionError::DownloadFailed { file: from.to_string(), source: Box::new(e) }
		})?;
		if fs::metadata(local_target).await.is_ok() {
			fs::rename(local_target, &staging).await.map_err(|e| {
				ConnectionError::DownloadFailed { file: from.to_string(), source: Box::new(e) }
			})?;
		}

		info!("Starting to download {}", from);
		let transfer = {
			let mut guard = session.lock().await;
			match self.config.download_timeout() {
				Some(timeout) => guard.download(from, &staging, timeout).await,
				None => guard.get(from, &staging).await,
			}
		};

		match transfer {
			Ok(()) => {
				if delete_after {
					if self.delete(session, from).await {
						info!("Successfully deleted file '{}' from server", from);
					} else {
						warn!("Failed to delete file '{}' from server", from);
					}
				}
				fs::rename(&staging, local_target).await.map_err(|e| {
					ConnectionError::DownloadFailed {
						file: from.to_string(),
						source: Box::new(e),
					}
				})?;
				info!("Finished downloading {} to {}", from, local_target.display());
				Ok(())
			}
			Err(e) => {
				if let Err(cleanup) = fs::remove_file(&staging).await {
					debug!(
						"Could not remove partial file {}: {}",
						staging.display(),
						cleanup
					);
				}
				Err(ConnectionError::DownloadFailed {
					file: from.to_string(),
					source: Box::new(e),
				})
			}
		}
	}

	// === Session pass-throughs used by the retrieval layer ===

	pub async fn pwd(&self, session: &SharedSession) -> Result<RemoteFile, ProtocolError> {
		session.lock().await.pwd()
	}

	pub async fn cd(&self, session: &SharedSession, file: &RemoteFile) -> Result<(), ProtocolError> {
		session.lock().await.cd(file).await
	}

	pub async fn cd_to_home(&self, session: &SharedSession) -> Result<(), ProtocolError> {
		session.lock().await.cd_to_home().await
	}

	pub async fn cd_to_root(&self, session: &SharedSession) -> Result<(), ProtocolError> {
		session.lock().await.cd_to_root().await
	}

	pub async fn is_connected(&self, session: &SharedSession) -> bool {
		session.lock().await.is_connected().await
	}

	/// Listing of the session's current directory, served from the frozen
	/// snapshot when the directory has been marked dynamic
	pub async fn ls(&self, session: &SharedSession) -> Result<Vec<RemoteFile>, ProtocolError> {
		let mut guard = session.lock().await;
		let cwd = guard.pwd()?;
		if let Some(snapshot) = self.dynamic_listing_for(&cwd) {
			return Ok(snapshot);
		}
		guard.ls().await
	}

	pub async fn disconnect(&self, session: &SharedSession) -> Result<(), ConnectionError> {
		let mut guard = session.lock().await;
		let url = guard
			.remote_site()
			.map(|s| s.url.as_str().to_string())
			.unwrap_or_else(|| "<unconnected>".to_string());
		info!("Disconnecting protocol from {}", url);
		guard.disconnect().await.map_err(|e| ConnectionError::DisconnectFailed {
			url,
			source: Box::new(e),
		})
	}

	/// Global shutdown: disconnect every pooled session and clear every cache
	pub async fn close(&self) {
		let sessions: Vec<(String, SharedSession)> = {
			let mut pool = self.reuse_pool.lock().unwrap_or_else(|e| e.into_inner());
			pool.drain().collect()
		};
		let tasks = sessions.into_iter().map(|(url, session)| async move {
			info!("Disconnecting protocol from {}", url);
			let mut guard = session.lock().await;
			if let Err(e) = guard.disconnect().await {
				warn!("Error disconnecting from {}: {}", url, e);
			}
		});
		futures::future::join_all(tasks).await;

		self.factory_cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
		self.paging_table.lock().unwrap_or_else(|e| e.into_inner()).clear();
		self.dynamic_listings.lock().unwrap_or_else(|e| e.into_inner()).clear();
	}

	/// Current paging cursor for a directory, if one has been created
	pub fn page_loc_for(&self, dir: &RemoteFile) -> Option<usize> {
		let table = self.paging_table.lock().unwrap_or_else(|e| e.into_inner());
		table.get(dir).map(|info| info.lock().unwrap_or_else(|e| e.into_inner()).page_loc())
	}

	// === Shared-state helpers (short-held locks only) ===

	fn paging_info_for(&self, dir: &RemoteFile) -> Arc<StdMutex<PagingInfo>> {
		let mut table = self.paging_table.lock().unwrap_or_else(|e| e.into_inner());
		table.entry(dir.clone()).or_insert_with(Default::default).clone()
	}

	fn dynamic_listing_for(&self, dir: &RemoteFile) -> Option<Vec<RemoteFile>> {
		let map = self.dynamic_listings.lock().unwrap_or_else(|e| e.into_inner());
		map.get(dir).cloned()
	}

	fn put_dynamic_listing(&self, dir: RemoteFile, listing: Vec<RemoteFile>) {
		let mut map = self.dynamic_listings.lock().unwrap_or_else(|e| e.into_inner());
		map.insert(dir, listing);
	}

	fn replace_dynamic_listing_if_cached(&self, dir: &RemoteFile, listing: &[RemoteFile]) {
		let mut map = self.dynamic_listings.lock().unwrap_or_else(|e| e.into_inner());
		if map.contains_key(dir) {
			map.insert(dir.clone(), listing.to_vec());
		}
	}
}

impl std::fmt::Debug for ProtocolHandler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ProtocolHandler")
			.field("registry", &self.registry)
			.field("config", &self.config)
			.finish()
	}
}

/// Sibling path carrying the in-progress marker prefix
fn staging_path(target: &Path) -> Result<PathBuf, ProtocolError> {
	let name = target
		.file_name()
		.and_then(|n| n.to_str())
		.ok_or_else(|| ProtocolError::Other(format!(
			"Download target has no file name: {}",
			target.display()
		)))?;
	let staged = format!("{}{}", STAGING_PREFIX, name);
	Ok(target.with_file_name(staged))
}


// vim: ts=4

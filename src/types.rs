//! Value types shared across the session and handler layers
//!
//! `RemoteSite` identifies an endpoint, `RemoteFile` a path on it. Both are
//! used as map keys by the handler, so equality and hashing follow identity
//! (site alias/url/credentials, file site+path) rather than every field.

use globset::{Glob, GlobMatcher};
use serde::Deserialize;
use std::fmt;
use std::hash::{Hash, Hasher};
use url::Url;

use crate::util;

/// Identity and credentials for a remote data-source endpoint
///
/// Replaced, never mutated, across reconnects. `max_connections` is carried
/// for the outer retrieval system; the handler itself does not enforce it.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSite {
	pub alias: String,
	pub url: Url,
	pub username: String,
	pub password: String,
	/// Directory used by the compatibility test instead of the root
	#[serde(default)]
	pub cd_test_dir: Option<String>,
	#[serde(default)]
	pub max_connections: Option<u32>,
}

impl RemoteSite {
	pub fn new(alias: &str, url: Url, username: &str, password: &str) -> Self {
		RemoteSite {
			alias: alias.to_string(),
			url,
			username: username.to_string(),
			password: password.to_string(),
			cd_test_dir: None,
			max_connections: None,
		}
	}

	/// URL scheme, lowercased; selects the candidate transport factories
	pub fn scheme(&self) -> String {
		self.url.scheme().to_lowercase()
	}

	pub fn host(&self) -> &str {
		self.url.host_str().unwrap_or_default()
	}
}

impl PartialEq for RemoteSite {
	fn eq(&self, other: &Self) -> bool {
		self.alias == other.alias
			&& self.url == other.url
			&& self.username == other.username
			&& self.password == other.password
	}
}

impl Eq for RemoteSite {}

impl Hash for RemoteSite {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.alias.hash(state);
		self.url.as_str().hash(state);
		self.username.hash(state);
		self.password.hash(state);
	}
}

impl fmt::Display for RemoteSite {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.alias, self.url)
	}
}

/// A path on a remote site, tagged directory or file
#[derive(Debug, Clone)]
pub struct RemoteFile {
	pub site: RemoteSite,
	pub path: String,
	pub is_directory: bool,
	/// Paths not starting with '/' are resolved against the session home
	pub relative_to_home: bool,
}

impl RemoteFile {
	pub fn new(site: RemoteSite, path: &str, is_directory: bool) -> Self {
		RemoteFile {
			site,
			relative_to_home: !path.starts_with('/'),
			path: path.to_string(),
			is_directory,
		}
	}

	pub fn directory(site: RemoteSite, path: &str) -> Self {
		RemoteFile::new(site, path, true)
	}

	pub fn file(site: RemoteSite, path: &str) -> Self {
		RemoteFile::new(site, path, false)
	}

	/// Parent directory on the same site
	pub fn parent_file(&self) -> RemoteFile {
		RemoteFile {
			site: self.site.clone(),
			path: util::parent_path(&self.path),
			is_directory: true,
			relative_to_home: self.relative_to_home,
		}
	}

	/// Last path component
	pub fn name(&self) -> &str {
		util::file_name(&self.path)
	}

	/// Absolute form of a home-relative file
	pub fn absolute_from(&self, home_path: &str) -> RemoteFile {
		if !self.relative_to_home || self.path.starts_with('/') {
			return self.clone();
		}
		RemoteFile {
			site: self.site.clone(),
			path: util::join_path(home_path, &self.path),
			is_directory: self.is_directory,
			relative_to_home: false,
		}
	}
}

impl PartialEq for RemoteFile {
	fn eq(&self, other: &Self) -> bool {
		self.site == other.site && self.path == other.path
	}
}

impl Eq for RemoteFile {}

impl Hash for RemoteFile {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.site.hash(state);
		self.path.hash(state);
	}
}

impl fmt::Display for RemoteFile {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.site.alias, self.path)
	}
}

/// Predicate deciding whether a listing entry belongs in a page
pub trait FileFilter: Send + Sync {
	fn accept(&self, file: &RemoteFile) -> bool;
}

impl<F> FileFilter for F
where
	F: Fn(&RemoteFile) -> bool + Send + Sync,
{
	fn accept(&self, file: &RemoteFile) -> bool {
		self(file)
	}
}

/// Glob-based filter matching against file names
pub struct GlobFilter {
	matcher: GlobMatcher,
}

impl GlobFilter {
	pub fn new(pattern: &str) -> Result<Self, globset::Error> {
		Ok(GlobFilter { matcher: Glob::new(pattern)?.compile_matcher() })
	}
}

impl FileFilter for GlobFilter {
	fn accept(&self, file: &RemoteFile) -> bool {
		self.matcher.is_match(file.name())
	}
}


// vim: ts=4

//! Remote path string helpers
//!
//! Remote paths are plain `/`-separated strings; they never go through
//! `std::path` because the remote server's path rules are not ours.

/// Join two remote path segments with a single separator
pub fn join_path(base: &str, rest: &str) -> String {
	let base = base.trim_end_matches('/');
	let rest = rest.trim_start_matches('/');
	if base.is_empty() {
		format!("/{}", rest)
	} else {
		format!("{}/{}", base, rest)
	}
}

/// Parent of a remote path ("/" is its own parent)
pub fn parent_path(path: &str) -> String {
	let trimmed = path.trim_end_matches('/');
	match trimmed.rfind('/') {
		Some(0) | None => "/".to_string(),
		Some(idx) => trimmed[..idx].to_string(),
	}
}

/// Last component of a remote path
pub fn file_name(path: &str) -> &str {
	path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}


// vim: ts=4

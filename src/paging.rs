//! Per-directory paging cursor bookkeeping
//!
//! One `PagingInfo` exists per directory identity (site + path), created
//! lazily by the handler and kept for its whole lifetime. Every page or
//! delete call against the directory mutates it, recording exactly the
//! triple the next call's drift check consumes.

use crate::types::RemoteFile;

/// Cursor state for one paged directory
#[derive(Debug)]
pub struct PagingInfo {
	page_loc: usize,
	size_of_last_ls: Option<usize>,
	file_at_page_loc: Option<RemoteFile>,
}

impl PagingInfo {
	pub fn new() -> Self {
		PagingInfo { page_loc: 0, size_of_last_ls: None, file_at_page_loc: None }
	}

	pub fn page_loc(&self) -> usize {
		self.page_loc
	}

	pub fn size_of_last_ls(&self) -> Option<usize> {
		self.size_of_last_ls
	}

	pub fn file_at_page_loc(&self) -> Option<&RemoteFile> {
		self.file_at_page_loc.as_ref()
	}

	/// Record the cursor plus the observations the next drift check needs
	pub fn update(&mut self, new_page_loc: usize, listing: &[RemoteFile]) {
		self.page_loc = new_page_loc;
		self.size_of_last_ls = Some(listing.len());
		self.file_at_page_loc = listing.get(new_page_loc).cloned();
	}

	/// Heuristic drift check against a freshly observed listing
	///
	/// Drift means the directory mutated between two paging calls: the entry
	/// count changed, or the entry now sitting at the recorded cursor is not
	/// the one recorded. A cursor resting at the end of a same-sized listing
	/// is the normal pagination end state, not drift. The heuristic is
	/// intentionally weak: a mutation that preserves both the count and the
	/// sampled slot goes undetected.
	pub fn drifted(&self, new_listing: &[RemoteFile]) -> bool {
		let last_size = match self.size_of_last_ls {
			Some(size) => size,
			// Never observed: first call can't drift
			None => return false,
		};
		if last_size != new_listing.len() {
			return true;
		}
		if !new_listing.is_empty() && self.page_loc < new_listing.len() {
			return new_listing.get(self.page_loc) != self.file_at_page_loc.as_ref();
		}
		false
	}
}

impl Default for PagingInfo {
	fn default() -> Self {
		PagingInfo::new()
	}
}


// vim: ts=4

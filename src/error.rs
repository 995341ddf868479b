//! Error types for remote-site protocol operations

use std::error::Error;
use std::fmt;
use std::io;

/// Session and transport level errors
///
/// Raised by navigation, listing and transfer operations, by the
/// compatibility test, and when every candidate transport for a site
/// has been exhausted.
#[derive(Debug)]
pub enum ProtocolError {
	/// Transport authentication/connection failure
	Connect { host: String, message: String },

	/// Remote change-directory failed
	Navigation { path: String, message: String },

	/// Remote directory listing failed
	Listing { path: String, message: String },

	/// Remote byte transfer failed
	Transfer { path: String, message: String },

	/// Transfer stopped by the cooperative abort flag
	TransferAborted { path: String },

	/// Home directory changed between two captures during the compatibility test
	HomeMismatch { expected: String, actual: String },

	/// Operation requires a connected session
	NotConnected,

	/// Every candidate factory failed the compatibility test for a site
	NoCompatibleProtocol { site: String },

	/// I/O error
	Io(io::Error),

	/// Generic error message
	Other(String),
}

impl fmt::Display for ProtocolError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ProtocolError::Connect { host, message } => {
				write!(f, "Failed to connect to {}: {}", host, message)
			}
			ProtocolError::Navigation { path, message } => {
				write!(f, "Failed to change directory to '{}': {}", path, message)
			}
			ProtocolError::Listing { path, message } => {
				write!(f, "Failed to list directory '{}': {}", path, message)
			}
			ProtocolError::Transfer { path, message } => {
				write!(f, "Failed to transfer '{}': {}", path, message)
			}
			ProtocolError::TransferAborted { path } => {
				write!(f, "Transfer of '{}' aborted", path)
			}
			ProtocolError::HomeMismatch { expected, actual } => {
				write!(
					f,
					"Home directory not the same after cd: expected '{}', got '{}'",
					expected, actual
				)
			}
			ProtocolError::NotConnected => write!(f, "Session has never been connected"),
			ProtocolError::NoCompatibleProtocol { site } => {
				write!(f, "No compatible protocol found for {}", site)
			}
			ProtocolError::Io(e) => write!(f, "I/O error: {}", e),
			ProtocolError::Other(msg) => write!(f, "{}", msg),
		}
	}
}

impl Error for ProtocolError {}

impl From<io::Error> for ProtocolError {
	fn from(e: io::Error) -> Self {
		ProtocolError::Io(e)
	}
}

impl From<String> for ProtocolError {
	fn from(e: String) -> Self {
		ProtocolError::Other(e)
	}
}

impl From<&str> for ProtocolError {
	fn from(e: &str) -> Self {
		ProtocolError::Other(e.to_string())
	}
}

/// Connection lifecycle errors, always carrying site/path context
#[derive(Debug)]
pub enum ConnectionError {
	/// Authentication or transport failure while connecting a session
	ConnectFailed { site: String, source: Box<dyn Error + Send + Sync> },

	/// A staged download failed after best-effort local cleanup
	DownloadFailed { file: String, source: Box<dyn Error + Send + Sync> },

	/// Disconnecting a pooled session failed
	DisconnectFailed { url: String, source: Box<dyn Error + Send + Sync> },

	/// A paging call against a directory failed
	PagingFailed { dir: String, page_loc: usize, source: Box<dyn Error + Send + Sync> },

	/// Could not resolve an appropriate protocol for a file
	Resolution { file: String, source: Box<dyn Error + Send + Sync> },

	/// Protocol error (nested)
	Protocol(ProtocolError),

	/// I/O error
	Io(io::Error),
}

impl fmt::Display for ConnectionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConnectionError::ConnectFailed { site, source } => {
				write!(f, "Failed to connect to {}: {}", site, source)
			}
			ConnectionError::DownloadFailed { file, source } => {
				write!(f, "Failed to download file {}: {}", file, source)
			}
			ConnectionError::DisconnectFailed { url, source } => {
				write!(f, "Error disconnecting from {}: {}", url, source)
			}
			ConnectionError::PagingFailed { dir, page_loc, source } => {
				write!(
					f,
					"Failed getting next page for '{}' (page_loc={}): {}",
					dir, page_loc, source
				)
			}
			ConnectionError::Resolution { file, source } => {
				write!(f, "Failed to get appropriate protocol for {}: {}", file, source)
			}
			ConnectionError::Protocol(e) => write!(f, "Protocol error: {}", e),
			ConnectionError::Io(e) => write!(f, "I/O error: {}", e),
		}
	}
}

impl Error for ConnectionError {}

impl From<ProtocolError> for ConnectionError {
	fn from(e: ProtocolError) -> Self {
		ConnectionError::Protocol(e)
	}
}

impl From<io::Error> for ConnectionError {
	fn from(e: io::Error) -> Self {
		ConnectionError::Io(e)
	}
}


// vim: ts=4

//! Handler configuration and the transport registry
//!
//! `HandlerConfig` carries the paging and retry knobs and loads from TOML or
//! JSON files. `TransportRegistry` is the read-only surface of the outer
//! configuration collaborator: it answers "which transport factories, in
//! which order, should be tried for this URL scheme".

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ProtocolError;
use crate::protocol::traits::TransportFactory;

const DEFAULT_PAGE_SIZE: usize = 8;
const DEFAULT_RETRY_DELAY_MS: u64 = 5000;

/// Paging and retry configuration for a `ProtocolHandler`
///
/// Connect attempts are fixed at 3 and the delay between them is linear,
/// not exponential; outer polling schedulers impose their own cadence
/// across cycles.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HandlerConfig {
	/// Maximum entries per page returned by `next_page`
	pub page_size: usize,

	/// Fixed wait between connect attempts
	pub retry_delay_ms: u64,

	/// Default watchdog timeout for timed downloads
	pub download_timeout_secs: Option<u64>,
}

impl Default for HandlerConfig {
	fn default() -> Self {
		HandlerConfig {
			page_size: DEFAULT_PAGE_SIZE,
			retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
			download_timeout_secs: None,
		}
	}
}

impl HandlerConfig {
	pub fn retry_delay(&self) -> Duration {
		Duration::from_millis(self.retry_delay_ms)
	}

	pub fn download_timeout(&self) -> Option<Duration> {
		self.download_timeout_secs.map(Duration::from_secs)
	}

	/// Load configuration from a `.toml` or `.json` file
	pub fn load(path: &Path) -> Result<Self, ProtocolError> {
		let raw = std::fs::read_to_string(path)?;
		match path.extension().and_then(|e| e.to_str()) {
			Some("json") => serde_json::from_str(&raw)
				.map_err(|e| ProtocolError::Other(format!("Invalid JSON config: {}", e))),
			_ => toml::from_str(&raw)
				.map_err(|e| ProtocolError::Other(format!("Invalid TOML config: {}", e))),
		}
	}
}

/// Ordered candidate transport factories per URL scheme
#[derive(Clone, Default)]
pub struct TransportRegistry {
	by_scheme: HashMap<String, Vec<Arc<dyn TransportFactory>>>,
}

impl TransportRegistry {
	pub fn new() -> Self {
		TransportRegistry { by_scheme: HashMap::new() }
	}

	/// Register a candidate factory for a scheme; registration order is
	/// probe order
	pub fn register(&mut self, scheme: &str, factory: Arc<dyn TransportFactory>) {
		self.by_scheme.entry(scheme.to_lowercase()).or_insert_with(Vec::new).push(factory);
	}

	pub fn factories_for(&self, scheme: &str) -> Vec<Arc<dyn TransportFactory>> {
		self.by_scheme.get(&scheme.to_lowercase()).cloned().unwrap_or_default()
	}
}

impl std::fmt::Debug for TransportRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let schemes: Vec<_> =
			self.by_scheme.iter().map(|(s, v)| format!("{}({})", s, v.len())).collect();
		f.debug_struct("TransportRegistry").field("schemes", &schemes).finish()
	}
}


// vim: ts=4

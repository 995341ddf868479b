//! # PullR - Remote-Site Protocol Sessions & Paged Retrieval
//!
//! PullR lets a data-ingestion pipeline crawl remote sites over pluggable
//! wire protocols (FTP, SFTP, HTTP, ...) and retrieve files in bounded-size
//! pages, reusing connections across scheduled polling cycles. It provides
//! the session abstraction over a transport, the orchestration engine that
//! resolves which transport to use per site, pools and retries connections,
//! and a pagination protocol that stays internally consistent even when the
//! remote directory mutates between pages.
//!
//! Concrete wire clients are out of scope; they plug in through
//! [`protocol::TransportFactory`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pullr::config::{HandlerConfig, TransportRegistry};
//! use pullr::handler::ProtocolHandler;
//! use pullr::types::{RemoteFile, RemoteSite};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = TransportRegistry::new();
//!     registry.register("ftp", my_ftp_factory());
//!
//!     let handler = ProtocolHandler::new(registry, HandlerConfig::default());
//!     let dir = RemoteFile::directory(my_site(), "/pub/data");
//!     let session = handler.get_appropriate_protocol(&dir, true, true).await?;
//!     loop {
//!         let page = handler.next_page(&session, None).await?;
//!         if page.is_empty() {
//!             break;
//!         }
//!         for file in page {
//!             println!("{}", file);
//!         }
//!     }
//!     handler.close().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod logging;
pub mod paging;
pub mod protocol;
pub mod types;
pub mod util;

// Re-export commonly used types
pub use config::{HandlerConfig, TransportRegistry};
pub use error::{ConnectionError, ProtocolError};
pub use handler::ProtocolHandler;
pub use protocol::{AbortHandle, DirEntry, Session, SharedSession, Transport, TransportFactory};
pub use types::{FileFilter, GlobFilter, RemoteFile, RemoteSite};

// vim: ts=4

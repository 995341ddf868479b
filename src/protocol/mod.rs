//! Protocol session layer
//!
//! `traits` defines the pluggable transport boundary (the capability set one
//! wire client must provide), `session` the connected-session state machine
//! built on top of it.

pub mod session;
pub mod traits;

pub use session::{Session, SharedSession};
pub use traits::{AbortHandle, DirEntry, Transport, TransportFactory, TransportResult};

// vim: ts=4

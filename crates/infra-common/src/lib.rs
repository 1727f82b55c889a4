//! # Infra-Common - shared plumbing for voipmon
//!
//! Pieces every other voipmon crate leans on:
//!
//! - [`errors`]: the common [`Error`] type used at crate boundaries
//! - [`logging`]: `tracing-subscriber` setup driven by [`LoggingConfig`]
//! - [`events`]: the fire-and-forget observer channel ([`EventSink`]) that
//!   the registrar and the call engine push dashboard events into

pub mod errors;
pub mod events;
pub mod logging;

pub use errors::{Error, Result};
pub use events::{BroadcastEventSink, EventKind, EventSink, MonitorEvent, NullEventSink};
pub use logging::{setup_logging, LoggingConfig};

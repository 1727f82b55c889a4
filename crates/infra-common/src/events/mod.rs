//! Observer events
//!
//! The monitoring core never waits on its observers. Components push
//! [`MonitorEvent`]s into an [`EventSink`]; whatever sits behind the sink (a
//! dashboard bridge, a log writer, a test probe) consumes them at its own pace.

mod sink;
mod types;

pub use sink::{BroadcastEventSink, EventSink, NullEventSink, DEFAULT_EVENT_CAPACITY};
pub use types::{EventKind, MonitorEvent};

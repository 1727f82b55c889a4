//! # Call lifecycle engine for voipmon
//!
//! The single source of truth for call state. Signalling and media components
//! submit events (call started, quality snapshot, call ended) and never touch
//! a call record directly.
//!
//! ## Modules
//!
//! - [`call`]: the call record, session info and status
//! - [`manager`]: [`CallManager`], the thread-safe owner of active and historical calls
//! - [`stats`]: summary statistics over time windows
//! - [`store`]: history persistence
//! - [`config`]: manager configuration
//!
//! ```rust
//! use voipmon_call_engine::{CallManager, SessionInfo};
//!
//! let manager = CallManager::in_memory();
//! manager.start_call("a84b4c76e66710", SessionInfo::new("sip:201@gw", "sip:999@monitor", "UDP"));
//! assert!(manager.is_active("a84b4c76e66710"));
//! manager.end_call("a84b4c76e66710");
//! assert_eq!(manager.get_history(10).len(), 1);
//! ```

pub mod call;
pub mod config;
pub mod error;
pub mod manager;
pub mod stats;
pub mod store;

pub use call::{Call, CallStatus, SessionInfo, DEFAULT_CALL_TYPE};
pub use config::CallManagerConfig;
pub use error::{CallEngineError, Result};
pub use manager::CallManager;
pub use stats::{PeriodStats, SummaryStats};
pub use store::{HistoryStore, JsonFileStore, MemoryStore};

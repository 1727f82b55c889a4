//! Error types shared across the workspace

pub mod types;

pub use types::{Error, Result};

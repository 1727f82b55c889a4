//! History persistence

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::call::Call;
use crate::error::Result;

/// Durable storage for completed calls.
///
/// Read once at startup; rewritten in full on every change.
pub trait HistoryStore: Send + Sync {
    fn load(&self) -> Result<Vec<Call>>;
    fn save(&self, calls: &[Call]) -> Result<()>;
}

/// Pretty-printed JSON array on disk
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "calls.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl HistoryStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Call>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn save(&self, calls: &[Call]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(calls)?;
        let tmp = self.temp_path();
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), calls = calls.len(), "Call history saved");
        Ok(())
    }
}

/// Keeps history in memory only
#[derive(Debug, Default)]
pub struct MemoryStore {
    calls: Mutex<Vec<Call>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_calls(calls: Vec<Call>) -> Self {
        Self {
            calls: Mutex::new(calls),
        }
    }

    /// What was last saved
    pub fn snapshot(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }
}

impl HistoryStore for MemoryStore {
    fn load(&self) -> Result<Vec<Call>> {
        Ok(self.calls.lock().clone())
    }

    fn save(&self, calls: &[Call]) -> Result<()> {
        *self.calls.lock() = calls.to_vec();
        Ok(())
    }
}

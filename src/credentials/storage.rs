//! Credential persistence as one JSON file per provider.
//!
//! Writes go to a temporary file in the same directory which is then
//! renamed over the target, so an interrupted save leaves the previous
//! record intact.

use super::Credentials;
use crate::error::AdapterError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// JSON-file credential storage for a single provider.
///
/// # Layout
/// ```text
/// <config_dir>/<provider>.json
/// {
///   "client_id": "...",
///   "access_token": "...",
///   "refresh_token": "...",
///   "expires_at": "2026-10-18T12:00:00Z",
///   "user_id": "..."
/// }
/// ```
///
/// # Thread Safety
/// - Saves are serialized by an internal mutex; share one store (behind an
///   `Arc`) between every adapter using the same provider credentials.
pub struct CredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CredentialStore {
    /// Opens the store for `provider` inside `config_dir`.
    ///
    /// Nothing is read or created until `load`/`save` is called.
    pub fn open<P: AsRef<Path>>(config_dir: P, provider: &str) -> Self {
        Self::at_path(config_dir.as_ref().join(format!("{}.json", provider)))
    }

    /// Opens a store backed by an explicit file path.
    pub fn at_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads credentials issued to `client_id`.
    ///
    /// # Returns
    /// * `Ok(Some(Credentials))` - Stored record issued to this client
    /// * `Ok(None)` - No file, unreadable JSON, or a record for another client
    /// * `Err` - The file exists but could not be read
    pub fn load(&self, client_id: &str) -> Result<Option<Credentials>, AdapterError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let credentials: Credentials = match serde_json::from_str(&contents) {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Ignoring unreadable credential file"
                );
                return Ok(None);
            }
        };

        if credentials.client_id != client_id {
            debug!(
                path = %self.path.display(),
                "Stored credentials belong to another client id, ignoring"
            );
            return Ok(None);
        }

        Ok(Some(credentials))
    }

    /// Replaces the stored record with `credentials`.
    ///
    /// The previous record stays valid if any step fails.
    pub fn save(&self, credentials: &Credentials) -> Result<(), AdapterError> {
        let json = serde_json::to_vec_pretty(credentials)
            .map_err(|e| AdapterError::Io(format!("failed to encode credentials: {}", e)))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        fs::create_dir_all(&dir)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| AdapterError::Io(e.error.to_string()))?;

        debug!(path = %self.path.display(), "Credentials saved");
        Ok(())
    }
}

//! Durable media for the session store.
//!
//! A medium holds named string fields and nothing else. Only `SessionStore`
//! knows which field names exist.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;

pub trait StorageMedium: Send + Sync {
    /// Read a field; `Ok(None)` when it was never written or was removed.
    fn read(&self, key: &str) -> Result<Option<String>>;

    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a field. Removing a missing field is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

// ============================================================================
// File medium
// ============================================================================

/// One file per field inside a private directory.
pub struct FileMedium {
    dir: PathBuf,
}

impl FileMedium {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn field_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl StorageMedium for FileMedium {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.field_path(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create directory {}", self.dir.display()))?;
        let path = self.field_path(key);

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&path)
            .with_context(|| format!("Failed to open {} for writing", path.display()))?;
        // The open mode only applies on creation; tighten files left by older runs
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict permissions on {}", path.display()))?;
        }
        file.write_all(value.as_bytes())
            .with_context(|| format!("Failed to write to {}", path.display()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.field_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}

// ============================================================================
// Keyring medium
// ============================================================================

/// Service name for OS keychain entries
const KEYRING_SERVICE: &str = "finsight";

/// Fields stored as OS keychain entries, one entry per field.
pub struct KeyringMedium {
    service: String,
}

impl KeyringMedium {
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }
}

impl Default for KeyringMedium {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageMedium for KeyringMedium {
    fn read(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve session field from keychain"),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store session field in keychain")
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete session field from keychain"),
        }
    }
}

// ============================================================================
// Memory medium
// ============================================================================

/// In-process fields. Nothing survives the process.
#[derive(Default)]
pub struct MemoryMedium {
    fields: Mutex<HashMap<String, String>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a field directly, bypassing the store (fixtures and migrations).
    pub fn with_field(self, key: &str, value: &str) -> Self {
        self.lock().insert(key.to_string(), value.to_string());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map still holds consistent strings
        self.fields.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StorageMedium for MemoryMedium {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_medium_roundtrip() {
        let medium = MemoryMedium::new();
        assert_eq!(medium.read("token").unwrap(), None);
        medium.write("token", "t1").unwrap();
        assert_eq!(medium.read("token").unwrap().as_deref(), Some("t1"));
        medium.remove("token").unwrap();
        medium.remove("token").unwrap();
        assert_eq!(medium.read("token").unwrap(), None);
    }

    #[test]
    fn test_file_medium_creates_dir_lazily() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("nested").join("session");
        let medium = FileMedium::new(&dir);

        assert_eq!(medium.read("token").unwrap(), None);
        assert!(!dir.exists());

        medium.write("token", "t1").unwrap();
        assert!(dir.join("token").exists());
        assert_eq!(medium.read("token").unwrap().as_deref(), Some("t1"));

        medium.write("token", "t2").unwrap();
        assert_eq!(medium.read("token").unwrap().as_deref(), Some("t2"));
    }

    #[test]
    fn test_file_medium_remove_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let medium = FileMedium::new(temp.path());
        medium.remove("identity").unwrap();
        medium.write("identity", "{}").unwrap();
        medium.remove("identity").unwrap();
        medium.remove("identity").unwrap();
        assert_eq!(medium.read("identity").unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_medium_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let medium = FileMedium::new(temp.path());
        medium.write("token", "secret-token").unwrap();
        let mode = fs::metadata(temp.path().join("token")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_medium_tightens_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("token");
        fs::write(&path, "old-token").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let medium = FileMedium::new(temp.path());
        medium.write("token", "new-token").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(medium.read("token").unwrap().as_deref(), Some("new-token"));
    }
}

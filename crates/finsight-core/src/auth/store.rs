use std::fmt;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::models::Identity;

use super::medium::StorageMedium;

/// Field holding the bearer token
const TOKEN_KEY: &str = "token";

/// Field holding the JSON-serialized identity
const IDENTITY_KEY: &str = "identity";

/// A complete persisted session: both fields present and readable.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub token: String,
    pub identity: Identity,
}

impl fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredSession")
            .field("token", &"<redacted>")
            .field("identity", &self.identity)
            .finish()
    }
}

/// Durable record of who is logged in.
///
/// The token and identity are one logical record; nothing outside this type
/// addresses the two fields by name.
pub struct SessionStore {
    medium: Box<dyn StorageMedium>,
}

impl SessionStore {
    pub fn new(medium: impl StorageMedium + 'static) -> Self {
        Self {
            medium: Box::new(medium),
        }
    }

    /// Read the persisted session. Anything incomplete or malformed is absent.
    pub fn restore(&self) -> Option<StoredSession> {
        let token = match self.medium.read(TOKEN_KEY) {
            Ok(Some(token)) if !token.trim().is_empty() => token,
            Ok(_) => {
                debug!("No stored session token");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored session token");
                return None;
            }
        };

        let raw_identity = match self.medium.read(IDENTITY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("Stored token has no identity, treating session as absent");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored identity");
                return None;
            }
        };

        match serde_json::from_str::<Identity>(&raw_identity) {
            Ok(identity) => Some(StoredSession { token, identity }),
            Err(e) => {
                warn!(error = %e, "Stored identity is malformed, treating session as absent");
                None
            }
        }
    }

    /// Persist a token and identity as a pair.
    ///
    /// The old identity is removed before the new token is written, so an
    /// interrupted save restores as absent rather than as a mismatched pair.
    pub fn save(&self, token: &str, identity: &Identity) -> Result<()> {
        let serialized = serde_json::to_string(identity).context("Failed to serialize identity")?;
        self.medium
            .remove(IDENTITY_KEY)
            .context("Failed to remove previous identity")?;
        self.medium
            .write(TOKEN_KEY, token)
            .context("Failed to store session token")?;
        self.medium
            .write(IDENTITY_KEY, &serialized)
            .context("Failed to store identity")?;
        Ok(())
    }

    /// Remove both fields. Attempts both removals even if the first fails.
    pub fn clear(&self) -> Result<()> {
        let token = self.medium.remove(TOKEN_KEY);
        let identity = self.medium.remove(IDENTITY_KEY);
        token.context("Failed to remove session token")?;
        identity.context("Failed to remove identity")?;
        Ok(())
    }

    /// Bearer token of the persisted session, if it is complete.
    pub fn token(&self) -> Option<String> {
        self.restore().map(|session| session.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::medium::{FileMedium, MemoryMedium};

    /// Medium whose writes to one field always fail.
    struct FailingWrites {
        inner: MemoryMedium,
        failing_key: &'static str,
    }

    impl StorageMedium for FailingWrites {
        fn read(&self, key: &str) -> Result<Option<String>> {
            self.inner.read(key)
        }

        fn write(&self, key: &str, value: &str) -> Result<()> {
            if key == self.failing_key {
                anyhow::bail!("disk full");
            }
            self.inner.write(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_restore_empty_is_absent() {
        let store = SessionStore::new(MemoryMedium::new());
        assert_eq!(store.restore(), None);
        assert_eq!(store.token(), None);
    }

    #[test]
    fn test_save_then_restore() {
        let store = SessionStore::new(MemoryMedium::new());
        let identity = Identity::new("a@b.com").with_name("Ana");
        store.save("t1", &identity).unwrap();

        let restored = store.restore().unwrap();
        assert_eq!(restored.token, "t1");
        assert_eq!(restored.identity, identity);
        assert_eq!(store.token().as_deref(), Some("t1"));
    }

    #[test]
    fn test_restore_requires_both_fields() {
        let token_only = SessionStore::new(MemoryMedium::new().with_field(TOKEN_KEY, "t1"));
        assert_eq!(token_only.restore(), None);

        let identity_only = SessionStore::new(
            MemoryMedium::new().with_field(IDENTITY_KEY, r#"{"email":"a@b.com"}"#),
        );
        assert_eq!(identity_only.restore(), None);

        let blank_token = SessionStore::new(
            MemoryMedium::new()
                .with_field(TOKEN_KEY, "  ")
                .with_field(IDENTITY_KEY, r#"{"email":"a@b.com"}"#),
        );
        assert_eq!(blank_token.restore(), None);
    }

    #[test]
    fn test_restore_malformed_identity_is_absent() {
        let store = SessionStore::new(
            MemoryMedium::new()
                .with_field(TOKEN_KEY, "t1")
                .with_field(IDENTITY_KEY, "{not json"),
        );
        assert_eq!(store.restore(), None);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = SessionStore::new(MemoryMedium::new());
        store.save("t1", &Identity::new("a@b.com")).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.restore(), None);
    }

    #[test]
    fn test_failed_identity_write_never_pairs_old_identity_with_new_token() {
        let medium = FailingWrites {
            inner: MemoryMedium::new()
                .with_field(TOKEN_KEY, "old-token")
                .with_field(IDENTITY_KEY, r#"{"email":"old@b.com"}"#),
            failing_key: IDENTITY_KEY,
        };
        let store = SessionStore::new(medium);
        assert!(store.restore().is_some());

        let result = store.save("new-token", &Identity::new("new@b.com"));
        assert!(result.is_err());
        assert_eq!(store.restore(), None);
    }

    #[test]
    fn test_file_backed_store_survives_reopen() {
        let temp = tempfile::tempdir().unwrap();
        {
            let store = SessionStore::new(FileMedium::new(temp.path()));
            store.save("t1", &Identity::new("a@b.com")).unwrap();
        }
        let reopened = SessionStore::new(FileMedium::new(temp.path()));
        let restored = reopened.restore().unwrap();
        assert_eq!(restored.token, "t1");
        assert_eq!(restored.identity.email, "a@b.com");
    }

    #[test]
    fn test_debug_hides_token() {
        let session = StoredSession {
            token: "secret-token".to_string(),
            identity: Identity::new("a@b.com"),
        };
        assert!(!format!("{:?}", session).contains("secret-token"));
    }
}

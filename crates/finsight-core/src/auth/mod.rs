//! Authentication module for the session lifecycle.
//!
//! This module provides:
//! - `SessionStore`: durable token + identity record over a `StorageMedium`
//! - `AuthSession`: the login/logout state machine and sole state writer
//! - `AccessGuard`: gate for protected views, driven by `SessionState`
//!
//! Sessions survive restarts; the client does not track token expiry and
//! relies on the server rejecting stale tokens instead.

pub mod error;
pub mod guard;
pub mod medium;
pub mod session;
pub mod state;
pub mod store;

pub use error::{LoginError, RegisterError};
pub use guard::{gate, AccessGuard, Gate};
pub use medium::{FileMedium, KeyringMedium, MemoryMedium, StorageMedium};
pub use session::AuthSession;
pub use state::SessionState;
pub use store::{SessionStore, StoredSession};

use anyhow::Result;

use crate::config::{Config, StorageKind};

/// Open the session store selected by the configuration.
pub fn open_store(config: &Config) -> Result<SessionStore> {
    Ok(match config.storage {
        StorageKind::File => SessionStore::new(FileMedium::new(config.session_dir()?)),
        StorageKind::Keyring => SessionStore::new(KeyringMedium::new()),
    })
}

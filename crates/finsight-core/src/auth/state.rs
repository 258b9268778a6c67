use serde::Serialize;

use crate::models::Identity;

/// Process-wide authentication state, owned by `AuthSession`.
///
/// `Unresolved` only exists before the boot-time restore; once left it is
/// never re-entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(tag = "status", content = "identity", rename_all = "lowercase")]
pub enum SessionState {
    Unresolved,
    Authenticated(Identity),
    Unauthenticated,
}

impl SessionState {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, SessionState::Unresolved)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    /// Short label for logs and the status bar
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Unresolved => "unresolved",
            SessionState::Authenticated(_) => "authenticated",
            SessionState::Unauthenticated => "unauthenticated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_queries() {
        let signed_in = SessionState::Authenticated(Identity::new("a@b.com"));
        assert!(signed_in.is_resolved());
        assert!(signed_in.is_authenticated());
        assert_eq!(signed_in.identity().map(|i| i.email.as_str()), Some("a@b.com"));

        assert!(!SessionState::Unresolved.is_resolved());
        assert!(SessionState::Unauthenticated.is_resolved());
        assert_eq!(SessionState::Unauthenticated.identity(), None);
    }

    #[test]
    fn test_state_serializes_tagged() {
        let json = serde_json::to_value(SessionState::Authenticated(Identity::new("a@b.com"))).unwrap();
        assert_eq!(json["status"], "authenticated");
        assert_eq!(json["identity"]["email"], "a@b.com");

        let json = serde_json::to_value(SessionState::Unresolved).unwrap();
        assert_eq!(json["status"], "unresolved");
    }
}

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::auth::RegisterError;

/// Minimum secret length accepted by the registration form.
pub const MIN_SECRET_LENGTH: usize = 6;

/// The authenticated principal, cached alongside the session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Identity {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "string_or_number"
    )]
    pub id: Option<String>,
}

impl Identity {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            id: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name to greet the user with: the display name when known, else the email.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

/// Servers disagree on whether user ids are integers or strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Uint(u64),
    }

    Ok(Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
        RawId::Uint(n) => n.to_string(),
    }))
}

/// Identifier/secret pair typed at login. Lives only for one login attempt.
#[derive(Clone)]
pub struct Credential {
    pub identifier: String,
    pub secret: String,
}

impl Credential {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.identifier.trim().is_empty() && !self.secret.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Successful response of the credential endpoint.
///
/// Accepts both the `{token, identity}` and the `{access_token, user}` shapes.
#[derive(Clone, Deserialize)]
pub struct LoginGrant {
    #[serde(alias = "access_token")]
    pub token: String,
    #[serde(alias = "user")]
    pub identity: Identity,
}

impl fmt::Debug for LoginGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginGrant")
            .field("token", &"<redacted>")
            .field("identity", &self.identity)
            .finish()
    }
}

/// Sign-up form data. Registration never establishes a session.
#[derive(Clone, Default)]
pub struct Registration {
    pub name: String,
    pub identifier: String,
    pub secret: String,
    pub confirmation: String,
}

impl Registration {
    /// Client-side checks run before the registration request is sent.
    pub fn validate(&self) -> Result<(), RegisterError> {
        if self.name.trim().is_empty() {
            return Err(RegisterError::Invalid("Name is required".to_string()));
        }
        if self.identifier.trim().is_empty() {
            return Err(RegisterError::Invalid("Email is required".to_string()));
        }
        if !looks_like_email(self.identifier.trim()) {
            return Err(RegisterError::Invalid("Email is not valid".to_string()));
        }
        if self.secret.chars().count() < MIN_SECRET_LENGTH {
            return Err(RegisterError::Invalid(format!(
                "Password must be at least {} characters",
                MIN_SECRET_LENGTH
            )));
        }
        if self.secret != self.confirmation {
            return Err(RegisterError::Invalid("Passwords do not match".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

/// Loose `local@domain.tld` shape check; the server has the final word.
fn looks_like_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    match domain.rsplit_once('.') {
        Some((host, tld)) => !local.is_empty() && !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> Registration {
        Registration {
            name: "Ana Pérez".to_string(),
            identifier: "ana@example.com".to_string(),
            secret: "hunter22".to_string(),
            confirmation: "hunter22".to_string(),
        }
    }

    #[test]
    fn test_identity_display_name_prefers_name() {
        let identity = Identity::new("a@b.com").with_name("Ana");
        assert_eq!(identity.display_name(), "Ana");
        assert_eq!(Identity::new("a@b.com").display_name(), "a@b.com");
        assert_eq!(Identity::new("a@b.com").with_name("  ").display_name(), "a@b.com");
    }

    #[test]
    fn test_identity_accepts_numeric_and_string_ids() {
        let numeric: Identity = serde_json::from_str(r#"{"email":"a@b.com","id":42}"#).unwrap();
        assert_eq!(numeric.id.as_deref(), Some("42"));

        let text: Identity = serde_json::from_str(r#"{"email":"a@b.com","id":"u-1"}"#).unwrap();
        assert_eq!(text.id.as_deref(), Some("u-1"));

        let bare: Identity = serde_json::from_str(r#"{"email":"a@b.com"}"#).unwrap();
        assert_eq!(bare, Identity::new("a@b.com"));
    }

    #[test]
    fn test_login_grant_accepts_both_shapes() {
        let plain: LoginGrant =
            serde_json::from_str(r#"{"token":"t2","identity":{"email":"a@b.com"}}"#).unwrap();
        assert_eq!(plain.token, "t2");

        let fastapi: LoginGrant = serde_json::from_str(
            r#"{"access_token":"t3","token_type":"bearer","user":{"email":"a@b.com","name":"Ana"}}"#,
        )
        .unwrap();
        assert_eq!(fastapi.token, "t3");
        assert_eq!(fastapi.identity.name.as_deref(), Some("Ana"));
    }

    #[test]
    fn test_debug_output_hides_secrets() {
        let credential = Credential::new("a@b.com", "hunter22");
        let printed = format!("{:?}", credential);
        assert!(printed.contains("a@b.com"));
        assert!(!printed.contains("hunter22"));

        let printed = format!("{:?}", registration());
        assert!(!printed.contains("hunter22"));
    }

    #[test]
    fn test_credential_is_complete() {
        assert!(Credential::new("a@b.com", "x").is_complete());
        assert!(!Credential::new("  ", "x").is_complete());
        assert!(!Credential::new("a@b.com", "").is_complete());
    }

    #[test]
    fn test_registration_validation() {
        assert!(registration().validate().is_ok());

        let mut missing_name = registration();
        missing_name.name = " ".to_string();
        assert!(matches!(missing_name.validate(), Err(RegisterError::Invalid(m)) if m == "Name is required"));

        let mut bad_email = registration();
        bad_email.identifier = "ana@example".to_string();
        assert!(matches!(bad_email.validate(), Err(RegisterError::Invalid(m)) if m == "Email is not valid"));

        let mut short = registration();
        short.secret = "abc".to_string();
        short.confirmation = "abc".to_string();
        assert!(short.validate().is_err());

        let mut mismatch = registration();
        mismatch.confirmation = "hunter23".to_string();
        assert!(matches!(mismatch.validate(), Err(RegisterError::Invalid(m)) if m == "Passwords do not match"));
    }

    #[test]
    fn test_looks_like_email() {
        assert!(looks_like_email("a@b.com"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("@b.com"));
        assert!(!looks_like_email("a b@c.com"));
        assert!(!looks_like_email("plain"));
    }
}

//! Data models shared by the auth lifecycle and the API client.
//!
//! - `Identity`: the authenticated principal, cached beside the token
//! - `Credential`: the identifier/secret pair typed at login
//! - `LoginGrant`: what the credential endpoint returns on success
//! - `Registration`: sign-up form data
//! - `Summary`: ledger totals for the dashboard

pub mod identity;
pub mod summary;

pub use identity::{Credential, Identity, LoginGrant, Registration};
pub use summary::{format_amount, Summary};

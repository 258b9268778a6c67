//! Core library for finsight.
//!
//! This crate owns the session lifecycle of the finsight dashboard client:
//!
//! - `auth`: durable session store, the `AuthSession` state machine and the
//!   `AccessGuard` that gates protected views
//! - `api`: REST client for the remote credential endpoints and the
//!   authorized request layer that attaches the bearer token
//! - `config`: user configuration (API location, login field names, storage)
//! - `models`: identity, credential and registration types

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, AuthorizedClient};
pub use auth::{
    gate, AccessGuard, AuthSession, Gate, LoginError, RegisterError, SessionState, SessionStore,
};
pub use config::Config;
pub use models::{Credential, Identity, LoginGrant, Registration};

//! REST API client module for the finsight backend.
//!
//! This module provides the `ApiClient` for the credential endpoints and the
//! `AuthorizedClient` every other request goes through.
//!
//! The API uses bearer token authentication. A 401 on an authorized request
//! means the token is no longer honored and ends the local session.

pub mod authorized;
pub mod client;
pub mod error;

pub use authorized::AuthorizedClient;
pub use client::ApiClient;
pub use error::ApiError;

//! # linkgate
//!
//! Session and email-verification authority for a link-shortener API.
//!
//! - [`auth`]: the credential store, password hashing, bearer and action
//!   tokens, the session manager and the request gate.
//! - [`api`]: the axum router exposing the auth lifecycle over HTTP.
//! - [`cli`]: argument parsing, telemetry and server bootstrap.
//! - [`error`]: the error taxonomy shared by the core and the HTTP layer.

pub mod api;
pub mod auth;
pub mod cli;
pub mod error;

//! Auth handlers: registration, cookie-backed sessions and email verification.
//!
//! Handlers validate input, call the [`crate::auth::SessionManager`], and turn
//! the outcome into a response. All status and message decisions live in the
//! session manager; errors are rendered by [`crate::error::AuthError`].
//!
//! ## Cookie
//!
//! The refresh token is set as `jwt` (`HttpOnly; SameSite=None`, optionally
//! `Secure`) on login and on successful verification, and cleared on logout.

mod register;
mod session;
mod state;
pub mod types;
mod validation;
mod verification;

pub use register::register;
pub use session::{login, logout, refresh};
pub use state::{AuthConfig, AuthState};
pub use verification::{resend_verification, verify_email};

// utoipa path structs live next to the handlers
pub(crate) use register::__path_register;
pub(crate) use session::{__path_login, __path_logout, __path_refresh};
pub(crate) use verification::{__path_resend_verification, __path_verify_email};

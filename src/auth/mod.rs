//! Authentication core.
//!
//! Components, leaves first: the credential [`store`], the [`password`]
//! hasher, the bearer-token issuer ([`token`]), single-use
//! [`action_token`]s, the [`notifier`] that delivers verification links, the
//! [`session`] manager that drives the user lifecycle, and the request
//! [`gate`] that guards protected routes.
//!
//! ## Lifecycle
//!
//! `Unregistered -> PendingVerification -> Verified`. Whether a user has an
//! active session is an orthogonal axis: it is the presence of a stored
//! refresh token.
//!
//! ## Tokens
//!
//! - **Access:** HS256 JWT, 120 seconds, returned in the response body only.
//! - **Refresh:** HS256 JWT with a separate secret, 24 hours, stored on the
//!   user record and delivered in an HTTP-only cookie.
//! - **Action:** opaque random id, 15 minutes, single use, embedded in the
//!   verification link.

pub mod action_token;
pub mod gate;
pub mod model;
pub mod notifier;
pub mod password;
pub mod session;
pub mod store;
pub mod token;

pub use action_token::{ActionTokenService, Clock, ManualClock, SystemClock};
pub use gate::Principal;
pub use model::{Action, ActionToken, User};
pub use notifier::{LogNotifier, Notifier, VerificationMessage};
pub use password::{Argon2Hasher, PasswordHasher};
pub use session::{IssuedSession, SessionManager};
pub use store::{CredentialStore, MemoryStore, PgStore};
pub use token::{TokenConfig, TokenIssuer, TokenKind};

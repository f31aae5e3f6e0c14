//! Authentication error taxonomy.

use thiserror::Error;

/// Reason a request was refused by the authentication gateway.
///
/// The variant is for internal diagnostics only. Every variant maps to the
/// same externally observable response: `401 Unauthorized` with the body
/// returned by [`AuthRejection::public_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthRejection {
    /// No `Authorization` header was sent.
    #[error("authorization header is missing")]
    MissingHeader,

    /// The header was present but not of the exact form `Bearer <token>`.
    #[error("authorization header is not of the form `Bearer <token>`")]
    MalformedHeader,

    /// The configured public key material could not be parsed.
    #[error("configured public key material is not a valid RSA public key")]
    InvalidKey,

    /// The token failed signature verification or claim validation.
    #[error("token is invalid or expired")]
    InvalidToken,
}

impl AuthRejection {
    /// Body text sent to the caller. Identical for every variant.
    pub const PUBLIC_MESSAGE: &'static str = "Unauthorized";

    /// Returns the HTTP status code that should be sent for this rejection.
    pub fn http_status(&self) -> u16 {
        401
    }

    /// Returns the caller-facing message, which never reveals the variant.
    pub fn public_message(&self) -> &'static str {
        Self::PUBLIC_MESSAGE
    }
}

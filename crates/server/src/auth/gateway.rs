//! Bearer-token gateway placed in front of every application route.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use common::{AuthRejection, Claims};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use tracing::{warn, Span};

use super::context::AuthContext;
use super::key::parse_public_key;

/// Signature algorithms that can be verified with an RSA public key.
pub const RSA_ALGORITHMS: [Algorithm; 6] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// Validates `Authorization: Bearer <JWT>` headers against a fixed RSA key.
///
/// The key material is parsed once, at construction. Material that does not
/// parse does not prevent construction: the gateway then refuses every
/// request with [`AuthRejection::InvalidKey`].
///
/// Cheap to clone; all clones share the parsed key.
#[derive(Clone)]
pub struct AuthGateway {
    inner: Arc<Inner>,
}

struct Inner {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl AuthGateway {
    /// Build a gateway from `||`-delimited PEM key material.
    ///
    /// `span` is the logging context the gateway reports into.
    pub fn new(key_material: &str, span: Span) -> Self {
        let key = match parse_public_key(key_material) {
            Ok(k) => Some(k),
            Err(e) => {
                span.in_scope(|| {
                    warn!(error = %e, "JWT public key unusable; every request will be refused")
                });
                None
            }
        };
        Self {
            inner: Arc::new(Inner {
                key,
                validation: validation(),
            }),
        }
    }

    /// Run the authentication checks against a request's headers.
    ///
    /// Checks run in order and stop at the first failure: header present,
    /// header shape, key usable, token valid.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthRejection`] describing the first failed check.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<Claims, AuthRejection> {
        let header = match headers.get(AUTHORIZATION) {
            None => return Err(AuthRejection::MissingHeader),
            Some(v) if v.is_empty() => return Err(AuthRejection::MissingHeader),
            Some(v) => v.to_str().map_err(|_| AuthRejection::MalformedHeader)?,
        };

        let token = bearer_token(header).ok_or(AuthRejection::MalformedHeader)?;

        let key = self.inner.key.as_ref().ok_or(AuthRejection::InvalidKey)?;

        jsonwebtoken::decode::<Claims>(token, key, &self.inner.validation)
            .map(|data| data.claims)
            .map_err(|_| AuthRejection::InvalidToken)
    }
}

/// Split `Bearer <token>` on single spaces; exactly two parts are accepted.
fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}

fn validation() -> Validation {
    let mut v = Validation::new(Algorithm::RS256);
    v.algorithms = RSA_ALGORITHMS.to_vec();
    v.leeway = 0;
    // `exp` and `nbf` are checked when present but neither is mandatory.
    v.required_spec_claims.clear();
    v.validate_exp = true;
    v.validate_nbf = true;
    // No audience is configured for this service.
    v.validate_aud = false;
    v
}

/// Build the response sent for a refused request.
pub(crate) fn reject(rejection: AuthRejection) -> Response {
    let status = StatusCode::from_u16(rejection.http_status()).unwrap_or(StatusCode::UNAUTHORIZED);
    (status, rejection.public_message()).into_response()
}

/// Axum middleware enforcing [`AuthGateway::authorize`].
///
/// On success the verified claims are attached as an [`AuthContext`] and the
/// request continues down the chain; otherwise the chain stops here with 401.
pub async fn require_bearer(
    State(gateway): State<AuthGateway>,
    mut request: Request,
    next: Next,
) -> Response {
    match gateway.authorize(request.headers()) {
        Ok(claims) => {
            request.extensions_mut().insert(AuthContext::new(claims));
            next.run(request).await
        }
        Err(rejection) => reject(rejection),
    }
}

//! Request-scoped authentication context.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use common::{AuthRejection, Claims};

use super::gateway::reject;

/// Claims of the verified bearer token for the request in flight.
///
/// Inserted into the request extensions by the gateway middleware and
/// dropped with the request. Extensions are keyed by type, and this type can
/// only be built inside the `auth` module, so handlers never see a context
/// that the gateway did not produce.
#[derive(Debug, Clone)]
pub struct AuthContext {
    claims: Claims,
}

impl AuthContext {
    pub(super) fn new(claims: Claims) -> Self {
        Self { claims }
    }

    /// Claims of the verified token.
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Shorthand for the `sub` claim.
    pub fn subject(&self) -> Option<&str> {
        self.claims.sub.as_deref()
    }
}

/// Missing-context rejection for the [`AuthContext`] extractor.
pub struct MissingAuthContext;

impl IntoResponse for MissingAuthContext {
    fn into_response(self) -> Response {
        reject(AuthRejection::MissingHeader)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthContext {
    type Rejection = MissingAuthContext;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(MissingAuthContext)
    }
}

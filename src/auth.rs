use std::convert::Infallible;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
};
use uuid::Uuid;

use crate::{models::User, repository::RepositoryState, session::SessionRegistry};

/// AuthUser
///
/// The resolved identity of an authenticated request: the full user record
/// plus the session id it arrived under (kept so logout can remove exactly
/// that session). This is the output of the mandatory extractor below;
/// handlers take it as an argument and never touch the registry or the
/// token themselves.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The identity record fetched after session resolution.
    pub user: User,
    /// The session token this request authenticated with.
    pub session_id: Uuid,
}

/// AuthUser Extractor Implementation
///
/// Resolution happens in a fixed order and every step funnels into the same
/// 401, so a malformed token, an unknown token, an expired session, and a
/// deleted user are indistinguishable from outside:
///
/// 1. Pull the session registry and repository out of the application state.
/// 2. Extract the bearer token from the Authorization header and parse it as
///    a UUID.
/// 3. Resolve it against the registry. This is the step with side effects:
///    a live session gets its expiry window extended, an expired one is
///    lazily evicted.
/// 4. Fetch the identity record for the session's user id. A `None` here
///    means the account was deleted after the session was opened; the
///    session token alone grants nothing.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    SessionRegistry: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let sessions = SessionRegistry::from_ref(state);

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let session_id = Uuid::parse_str(token).map_err(|_| StatusCode::UNAUTHORIZED)?;

        // Touches the session: extends the sliding window on success,
        // evicts on expiry.
        let session = sessions
            .resolve(session_id)
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let user = repo
            .get_user(session.user_id)
            .await
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(AuthUser {
            user,
            session_id: session.session_id,
        })
    }
}

/// MaybeAuthUser
///
/// Optional variant of [`AuthUser`] for endpoints that serve anonymous
/// clients too (the forum read paths). Any authentication failure — missing
/// header, garbage token, expired session, vanished user — collapses to
/// `None` instead of rejecting, which is exactly how the authorization rules
/// expect an unauthenticated viewer to arrive.
///
/// When a valid token *is* presented, resolution still runs with its usual
/// side effects, so browsing public forums keeps a session alive.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl MaybeAuthUser {
    /// The resolved identity record, if any. Shaped for passing straight
    /// into `authz::is_authorized`.
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref().map(|auth| &auth.user)
    }
}

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    SessionRegistry: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(
            AuthUser::from_request_parts(parts, state).await.ok(),
        ))
    }
}

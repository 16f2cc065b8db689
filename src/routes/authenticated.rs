use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Authenticated Router Module
///
/// Every route here demands a live session — the `auth_middleware` layered
/// above this router in `create_router` rejects with 401 before any handler
/// runs. Mail deliberately has no anonymous mode, unlike the forum reads:
/// even operations a public forum would allow (listing, reading) require a
/// resolvable session when aimed at a mailbox.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /logout
        // Removes the presented session from the registry. Idempotent at the
        // registry level; a second logout of the same token is just 401.
        .route("/logout", post(handlers::logout))
        // POST /mail
        // Sends a direct message. The sender is the session's user, the
        // recipient an identifier resolved server-side.
        .route("/mail", post(handlers::send_mail))
        // GET /mail/inbox?offset&limit&unread&flagged
        // The session user's received messages, optionally narrowed.
        .route("/mail/inbox", get(handlers::get_inbox))
        // GET /mail/outbox?offset&limit
        // The session user's sent messages.
        .route("/mail/outbox", get(handlers::get_outbox))
        // GET /mail/{id}
        // Full message; sender or recipient only.
        .route("/mail/{id}", get(handlers::get_mail_message))
        // PATCH /mail/{id}/mark
        // Sets read/flagged marks; recipient only.
        .route("/mail/{id}/mark", patch(handlers::mark_mail_message))
}

use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. That does not make them
/// session-blind: the forum read handlers extract an *optional* session
/// (`MaybeAuthUser`) and run the whitelist authorization with whatever
/// identity resolves, so the same route serves anonymous browsing of public
/// forums and whitelisted access to private ones.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated liveness probe for monitors and load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // Account creation. Returns a session token, so a fresh registration
        // is immediately logged in.
        .route("/register", post(handlers::register))
        // POST /login
        // Credential check against the identity store; opens a session.
        .route("/login", post(handlers::login))
        // GET /forums?offset&limit&filter
        // Forum index. Names/descriptions only; no whitelist gate here.
        .route("/forums", get(handlers::get_forums))
        // GET /forums/{id}/posts?offset&limit
        // Post index of one forum, behind the forum's visibility rule.
        .route("/forums/{id}/posts", get(handlers::get_forum_posts))
        // GET /posts/{id}
        // Full post, behind the owning forum's visibility rule.
        .route("/posts/{id}", get(handlers::get_post))
        // GET /posts/{id}/replies?parent&offset&limit
        // Replies beneath a post, same gate as the post.
        .route("/posts/{id}/replies", get(handlers::get_post_replies))
}

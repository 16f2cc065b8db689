use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Routes nested under `/admin`. The surrounding middleware guarantees a
/// live session; the handlers then require `PermissionTier::Administrator`
/// or above via `authz::has_tier`, so an ordinary logged-in user receives
/// 403 rather than 401 here.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/stats
        // User/forum/post/message counters for the dashboard.
        .route("/stats", get(handlers::get_admin_stats))
        // GET /admin/users/{id}
        // Full identity record, including email and confirmation status —
        // the fields ordinary callers never see.
        .route("/users/{id}", get(handlers::get_admin_user))
}

/// Router Module Index
///
/// Organizes the application's routing into access-segregated modules so
/// that the session requirement is applied explicitly at the module level
/// (via Axum layers) instead of being re-derived handler by handler.
///
/// The split mirrors the per-resource session policy: forum reads are
/// session-aware but open to anonymous clients, mail and logout demand a
/// live session, and the admin module additionally gates on permission
/// tier inside its handlers.

/// Routes accessible without a session. The forum read handlers still
/// resolve an optional session and apply the whitelist rules themselves.
pub mod public;

/// Routes behind the `AuthUser` extractor middleware: a live, resolvable
/// session is mandatory before any handler runs.
pub mod authenticated;

/// Routes nested under `/admin`. Authentication is enforced by the same
/// middleware as `authenticated`; the Administrator tier check happens
/// in-handler.
pub mod admin;

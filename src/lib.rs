use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod authz;
pub mod config;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod session;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

// Makes core state types easily accessible to the application entry point
// (main.rs) and the integration tests.
pub use config::AppConfig;
pub use repository::{PostgresRepository, RepositoryState};
pub use session::SessionRegistry;

/// ApiDoc
///
/// Auto-generates the OpenAPI documentation (Swagger JSON) by aggregating
/// every handler decorated with `#[utoipa::path]` and every schema model.
/// Served at `/api-docs/openapi.json`, rendered at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register, handlers::login, handlers::logout,
        handlers::get_forums, handlers::get_forum_posts, handlers::get_post,
        handlers::get_post_replies,
        handlers::send_mail, handlers::get_inbox, handlers::get_outbox,
        handlers::get_mail_message, handlers::mark_mail_message,
        handlers::get_admin_user, handlers::get_admin_stats
    ),
    components(
        schemas(
            models::RegisterRequest, models::LoginRequest, models::SessionResponse,
            models::ForumSummary, models::PostSummary, models::PostView, models::ReplyView,
            models::SendMailRequest, models::MarkMailRequest, models::MailSummary,
            models::MailView, models::UserInfo, models::PortalStats,
        )
    ),
    tags(
        (name = "forum-portal", description = "Forum, mail and account API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, thread-safe container holding all shared services, cloned
/// into every request. The session registry lives here — constructed once
/// in main and passed explicitly, never reached through a global.
#[derive(Clone)]
pub struct AppState {
    /// Repository layer: identity store plus forum/mail data access.
    pub repo: RepositoryState,
    /// The in-memory session registry. Process lifetime; a restart
    /// invalidates every session.
    pub sessions: SessionRegistry,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let extractors and handlers pull individual services out of the shared
// AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionRegistry {
    fn from_ref(app_state: &AppState) -> SessionRegistry {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces a live session for the routers it is layered onto. The
/// `AuthUser` extractor performs the actual work (token extraction,
/// registry resolution with its TTL side effects, identity fetch) and
/// rejects with 401 before the handler runs; on success the request simply
/// proceeds, and handlers re-extract the already-resolved user as a
/// parameter.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware,
/// and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public routes: no session middleware. Forum handlers still run
        // the optional-session + whitelist protocol internally.
        .merge(public::public_routes())
        // Authenticated routes (logout + mail): a live session is mandatory.
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        // Admin routes: same session requirement; the tier check happens
        // inside the handlers after authentication passes.
        .nest(
            "/admin",
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        // Apply the unified state to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers (applied outermost)
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID generation: unique UUID per incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request tracing: wraps the request/response lifecycle
                // in a span carrying the generated request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID propagation back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS layer.
        .layer(cors)
}

/// trace_span_logger
///
/// Customizes the `TraceLayer` span so that every log line for a single
/// request is correlated by its `x-request-id`, alongside the HTTP method
/// and URI.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

use crate::{
    AppState,
    auth::{AuthUser, MaybeAuthUser},
    authz,
    models::{
        ForumSummary, LoginRequest, MailSummary, MailView, MarkMailRequest, PermissionTier,
        PortalStats, PostSummary, PostView, RegisterRequest, ReplyView, SendMailRequest,
        SessionResponse, User, UserInfo,
    },
    repository::RepositoryState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

// --- Filter Structs ---

fn default_limit() -> i64 {
    20
}

/// PageFilter
///
/// Standard paging parameters shared by the listing endpoints.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct PageFilter {
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// ForumIndexFilter
///
/// Paging plus the `filter` switch of the forum index: `false` (the default)
/// lists public forums only, `true` includes private ones. Only names and
/// descriptions are exposed either way; reading a private forum's posts
/// still goes through the whitelist check.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct ForumIndexFilter {
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub filter: bool,
}

/// ReplyFilter
///
/// Paging plus the optional parent reply: absent lists the direct replies
/// to the post, present lists the children of that reply.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct ReplyFilter {
    pub parent: Option<Uuid>,
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// InboxFilter
///
/// Paging plus the inbox narrowing switches.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct InboxFilter {
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub unread: bool,
    #[serde(default)]
    pub flagged: bool,
}

/// Resolves a user id to a display name for payloads, tolerating accounts
/// deleted after their content was written.
async fn display_name(repo: &RepositoryState, id: Uuid) -> String {
    repo.get_identifier(id)
        .await
        .unwrap_or_else(|| "[deleted]".to_string())
}

// --- Account Handlers ---

/// register
///
/// [Public Route] Creates an account and opens its first session in one
/// step, returning the session token.
///
/// Uniqueness is checked up front for a friendly failure, and enforced again
/// by the insert itself (`ON CONFLICT DO NOTHING`) so a racing registration
/// cannot slip through the gap. A session-id collision after the account was
/// created is surfaced as a server error, not retried — the account exists
/// and the client can simply log in.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered and logged in", body = SessionResponse),
        (status = 400, description = "Username or email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<SessionResponse>, StatusCode> {
    if state.repo.find_user(&payload.username).await.is_some()
        || state.repo.find_user(&payload.email).await.is_some()
    {
        return Err(StatusCode::BAD_REQUEST);
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        username: payload.username,
        email: payload.email,
        password_hash: User::hash_password(&payload.password),
        permissions: PermissionTier::Registered,
        is_email_confirmed: false,
        last_login: now,
        created_at: now,
    };

    let Some(user) = state.repo.create_user(user).await else {
        // Lost a uniqueness race between the probe and the insert.
        return Err(StatusCode::BAD_REQUEST);
    };

    tracing::info!(username = %user.username, "user account registered");

    let session = state.sessions.create_session(user.id).map_err(|e| {
        tracing::error!(username = %user.username, "session creation failed after registration: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(SessionResponse {
        token: session.session_id,
    }))
}

/// login
///
/// [Public Route] Verifies credentials and opens a session.
///
/// Unknown identifier and wrong password produce the same 400, so the
/// endpoint cannot be used to probe which usernames exist.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = SessionResponse),
        (status = 400, description = "Username or password is invalid")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, StatusCode> {
    let user = state
        .repo
        .find_user(&payload.username)
        .await
        .filter(|user| user.password_matches(&payload.password))
        .ok_or(StatusCode::BAD_REQUEST)?;

    let session = state.sessions.create_session(user.id).map_err(|e| {
        tracing::error!(username = %user.username, "session creation failed at login: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    state.repo.touch_last_login(user.id).await;
    tracing::info!(username = %user.username, "user logged in");

    Ok(Json(SessionResponse {
        token: session.session_id,
    }))
}

/// logout
///
/// [Authenticated Route] Removes the presented session. Reaching this
/// handler at all proves the session resolved a moment ago, so a failed
/// removal can only mean a concurrent logout won the race — reported as 401
/// just like any other dead session.
#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "No live session")
    )
)]
pub async fn logout(
    AuthUser { session_id, user }: AuthUser,
    State(state): State<AppState>,
) -> StatusCode {
    if state.sessions.remove(session_id) {
        tracing::info!(username = %user.username, "user logged out");
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    }
}

// --- Forum Handlers ---

/// get_forums
///
/// [Public Route] Paged forum index. No session is consulted: the index
/// exposes names and descriptions only, and the whitelist gate applies to a
/// forum's contents, not its existence.
#[utoipa::path(
    get,
    path = "/forums",
    params(ForumIndexFilter),
    responses((status = 200, description = "Forum index", body = [ForumSummary]))
)]
pub async fn get_forums(
    State(state): State<AppState>,
    Query(filter): Query<ForumIndexFilter>,
) -> Json<Vec<ForumSummary>> {
    let forums = state
        .repo
        .list_forums(filter.offset, filter.limit, filter.filter)
        .await;

    Json(
        forums
            .into_iter()
            .map(|forum| ForumSummary {
                id: forum.id,
                name: forum.name,
                description: forum.description,
            })
            .collect(),
    )
}

/// get_forum_posts
///
/// [Public Route, session-aware] Paged post index of one forum.
///
/// The fixed two-step protocol: resolve the (optional) session first, then
/// authorize the resolved viewer against the forum's whitelist. An
/// anonymous client passes on public forums and is denied on private ones;
/// an expired session is exactly as anonymous.
#[utoipa::path(
    get,
    path = "/forums/{id}/posts",
    params(("id" = Uuid, Path, description = "Forum ID"), PageFilter),
    responses(
        (status = 200, description = "Post index", body = [PostSummary]),
        (status = 401, description = "Not authorized for this forum"),
        (status = 404, description = "Unknown forum")
    )
)]
pub async fn get_forum_posts(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path(forum_id): Path<Uuid>,
    Query(page): Query<PageFilter>,
) -> Result<Json<Vec<PostSummary>>, StatusCode> {
    let forum = state
        .repo
        .get_forum(forum_id)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;

    if !authz::is_authorized(&forum, viewer.user()) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let posts = state.repo.list_posts(forum.id, page.offset, page.limit).await;

    let mut summaries = Vec::with_capacity(posts.len());
    for post in posts {
        summaries.push(PostSummary {
            id: post.id,
            title: post.title,
            author: display_name(&state.repo, post.author).await,
            created_at: post.created_at,
        });
    }

    Ok(Json(summaries))
}

/// get_post
///
/// [Public Route, session-aware] Full post payload, gated by the owning
/// forum's visibility rule. A post whose forum record has vanished is served
/// ungated rather than becoming permanently unreachable.
#[utoipa::path(
    get,
    path = "/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post", body = PostView),
        (status = 401, description = "Not authorized for this forum"),
        (status = 404, description = "Unknown post")
    )
)]
pub async fn get_post(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<PostView>, StatusCode> {
    let post = state
        .repo
        .get_post(post_id)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;

    if let Some(forum) = state.repo.get_forum(post.forum_id).await {
        if !authz::is_authorized(&forum, viewer.user()) {
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    Ok(Json(PostView {
        title: post.title,
        author: display_name(&state.repo, post.author).await,
        body: post.body,
        created_at: post.created_at,
    }))
}

/// get_post_replies
///
/// [Public Route, session-aware] Paged replies beneath a post, same gate as
/// the post itself.
#[utoipa::path(
    get,
    path = "/posts/{id}/replies",
    params(("id" = Uuid, Path, description = "Post ID"), ReplyFilter),
    responses(
        (status = 200, description = "Replies", body = [ReplyView]),
        (status = 401, description = "Not authorized for this forum"),
        (status = 404, description = "Unknown post")
    )
)]
pub async fn get_post_replies(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Query(filter): Query<ReplyFilter>,
) -> Result<Json<Vec<ReplyView>>, StatusCode> {
    let post = state
        .repo
        .get_post(post_id)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;

    if let Some(forum) = state.repo.get_forum(post.forum_id).await {
        if !authz::is_authorized(&forum, viewer.user()) {
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    let replies = state
        .repo
        .list_replies(post.id, filter.parent, filter.offset, filter.limit)
        .await;

    let mut views = Vec::with_capacity(replies.len());
    for reply in replies {
        views.push(ReplyView {
            id: reply.id,
            author: display_name(&state.repo, reply.author).await,
            body: reply.body,
            created_at: reply.created_at,
        });
    }

    Ok(Json(views))
}

// --- Mail Handlers ---

/// send_mail
///
/// [Authenticated Route] Stores a direct message. Unlike the forum reads,
/// every mail operation requires a live session — there is no anonymous
/// mail. The sender is always the session's user; the recipient arrives as
/// an identifier and is resolved here.
#[utoipa::path(
    post,
    path = "/mail",
    request_body = SendMailRequest,
    responses(
        (status = 200, description = "Message id", body = Uuid),
        (status = 400, description = "Unknown recipient"),
        (status = 401, description = "No live session")
    )
)]
pub async fn send_mail(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<SendMailRequest>,
) -> Result<Json<Uuid>, StatusCode> {
    let recipient = state
        .repo
        .find_user(&payload.recipient)
        .await
        .ok_or(StatusCode::BAD_REQUEST)?;

    let message_id = state
        .repo
        .send_mail(auth.user.id, recipient.id, &payload.subject, &payload.body)
        .await
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    tracing::info!(recipient = %recipient.id, "direct message sent");

    Ok(Json(message_id))
}

/// get_inbox
///
/// [Authenticated Route] Paged inbox of the session's user, optionally
/// narrowed to unread and/or flagged messages. `other` in each summary is
/// the sender's display name.
#[utoipa::path(
    get,
    path = "/mail/inbox",
    params(InboxFilter),
    responses(
        (status = 200, description = "Inbox", body = [MailSummary]),
        (status = 401, description = "No live session")
    )
)]
pub async fn get_inbox(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<InboxFilter>,
) -> Json<Vec<MailSummary>> {
    let messages = state
        .repo
        .get_inbox(
            auth.user.id,
            filter.offset,
            filter.limit,
            filter.unread,
            filter.flagged,
        )
        .await;

    let mut summaries = Vec::with_capacity(messages.len());
    for msg in messages {
        summaries.push(MailSummary {
            id: msg.id,
            other: display_name(&state.repo, msg.sender).await,
            subject: msg.subject,
            is_read: msg.is_read,
            is_flagged: msg.is_flagged,
            created_at: msg.created_at,
        });
    }

    Json(summaries)
}

/// get_outbox
///
/// [Authenticated Route] Paged outbox; `other` is the recipient's display
/// name.
#[utoipa::path(
    get,
    path = "/mail/outbox",
    params(PageFilter),
    responses(
        (status = 200, description = "Outbox", body = [MailSummary]),
        (status = 401, description = "No live session")
    )
)]
pub async fn get_outbox(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(page): Query<PageFilter>,
) -> Json<Vec<MailSummary>> {
    let messages = state
        .repo
        .get_outbox(auth.user.id, page.offset, page.limit)
        .await;

    let mut summaries = Vec::with_capacity(messages.len());
    for msg in messages {
        summaries.push(MailSummary {
            id: msg.id,
            other: display_name(&state.repo, msg.recipient).await,
            subject: msg.subject,
            is_read: msg.is_read,
            is_flagged: msg.is_flagged,
            created_at: msg.created_at,
        });
    }

    Json(summaries)
}

/// get_mail_message
///
/// [Authenticated Route] Full message payload, served only to its sender or
/// recipient. Unknown ids and other people's messages return the identical
/// 401, so message ids cannot be enumerated through this endpoint.
#[utoipa::path(
    get,
    path = "/mail/{id}",
    params(("id" = Uuid, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Message", body = MailView),
        (status = 401, description = "No live session, or not a party to this message")
    )
)]
pub async fn get_mail_message(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
) -> Result<Json<MailView>, StatusCode> {
    let message = state
        .repo
        .get_message(message_id)
        .await
        .filter(|msg| msg.sender == auth.user.id || msg.recipient == auth.user.id)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    Ok(Json(MailView {
        sender: display_name(&state.repo, message.sender).await,
        recipient: display_name(&state.repo, message.recipient).await,
        subject: message.subject,
        body: message.body,
        is_read: message.is_read,
        is_flagged: message.is_flagged,
        created_at: message.created_at,
    }))
}

/// mark_mail_message
///
/// [Authenticated Route] Sets the read/flagged marks on a message in the
/// session user's inbox. The recipient-only rule lives in the repository's
/// UPDATE clause; a miss (unknown id or someone else's mail) is the same
/// 401 as any other denied mail access.
#[utoipa::path(
    patch,
    path = "/mail/{id}/mark",
    params(("id" = Uuid, Path, description = "Message ID")),
    request_body = MarkMailRequest,
    responses(
        (status = 200, description = "Marks updated"),
        (status = 401, description = "No live session, or not the recipient")
    )
)]
pub async fn mark_mail_message(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Json(payload): Json<MarkMailRequest>,
) -> StatusCode {
    if state
        .repo
        .mark_message(message_id, auth.user.id, payload.read, payload.flagged)
        .await
    {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    }
}

// --- Admin Handlers ---

/// get_admin_user
///
/// [Admin Route] Full identity record for any account, including the email
/// and confirmation status hidden from ordinary callers. Gated on the
/// Administrator tier: resolution already happened in the extractor, so the
/// only question left is the tier comparison.
#[utoipa::path(
    get,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User record", body = UserInfo),
        (status = 403, description = "Insufficient tier"),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn get_admin_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserInfo>, StatusCode> {
    if !authz::has_tier(Some(&auth.user), PermissionTier::Administrator) {
        return Err(StatusCode::FORBIDDEN);
    }

    let user = state
        .repo
        .get_user(user_id)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(UserInfo {
        id: user.id,
        username: user.username,
        email: user.email,
        permissions: user.permissions,
        is_email_confirmed: user.is_email_confirmed,
        last_login: user.last_login,
        created_at: user.created_at,
    }))
}

/// get_admin_stats
///
/// [Admin Route] Dashboard counters, same tier gate as the user query.
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses(
        (status = 200, description = "Stats", body = PortalStats),
        (status = 403, description = "Insufficient tier")
    )
)]
pub async fn get_admin_stats(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PortalStats>, StatusCode> {
    if !authz::has_tier(Some(&auth.user), PermissionTier::Administrator) {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(Json(state.repo.get_stats().await))
}

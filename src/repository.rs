use crate::models::{Forum, MailMessage, PortalStats, Post, PostReply, User};
use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// Abstract contract for all persistence operations: the identity store and
/// the forum/mail data the handlers list and fetch. Handlers interact with
/// this trait only, which keeps the session registry and the authorization
/// rules free of any storage concern and lets tests substitute an in-memory
/// implementation.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) shareable across Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity Store ---

    /// Lookup by primary key. Used after session resolution to turn a
    /// session's user id back into an identity record.
    async fn get_user(&self, id: Uuid) -> Option<User>;

    /// Lookup by login identifier: probes the username column first, then
    /// email. Used by login, registration duplicate checks, and mail
    /// recipient resolution.
    async fn find_user(&self, identifier: &str) -> Option<User>;

    /// Resolves a user id to its display name, for post/reply/mail payloads.
    async fn get_identifier(&self, id: Uuid) -> Option<String>;

    /// Inserts a new account. Returns `None` when the id, username, or email
    /// is already taken (the row is left untouched).
    async fn create_user(&self, user: User) -> Option<User>;

    /// Stamps `last_login = now`. Returns whether the user existed.
    async fn touch_last_login(&self, id: Uuid) -> bool;

    // --- Forums ---

    /// Paged forum index. With `include_private = false` only forums with an
    /// empty whitelist (public ones) are listed.
    async fn list_forums(&self, offset: i64, limit: i64, include_private: bool) -> Vec<Forum>;

    async fn get_forum(&self, id: Uuid) -> Option<Forum>;

    /// Paged post index for one forum, excluding removed posts.
    async fn list_posts(&self, forum_id: Uuid, offset: i64, limit: i64) -> Vec<Post>;

    async fn get_post(&self, id: Uuid) -> Option<Post>;

    /// Paged replies beneath a post: direct replies when `parent` is `None`,
    /// otherwise the children of that reply.
    async fn list_replies(
        &self,
        post_id: Uuid,
        parent: Option<Uuid>,
        offset: i64,
        limit: i64,
    ) -> Vec<PostReply>;

    // --- Mail ---

    /// Stores a new message (unread, unflagged) and returns its id.
    async fn send_mail(
        &self,
        sender: Uuid,
        recipient: Uuid,
        subject: &str,
        body: &str,
    ) -> Option<Uuid>;

    /// Paged inbox for `recipient`, optionally narrowed to unread and/or
    /// flagged messages.
    async fn get_inbox(
        &self,
        recipient: Uuid,
        offset: i64,
        limit: i64,
        unread_only: bool,
        flagged_only: bool,
    ) -> Vec<MailMessage>;

    /// Paged outbox for `sender`.
    async fn get_outbox(&self, sender: Uuid, offset: i64, limit: i64) -> Vec<MailMessage>;

    /// Raw message lookup. The caller decides who may see it.
    async fn get_message(&self, id: Uuid) -> Option<MailMessage>;

    /// Sets the read/flagged marks, enforced in SQL to the recipient's own
    /// messages. Returns whether a row was updated.
    async fn mark_message(&self, id: Uuid, recipient: Uuid, read: bool, flagged: bool) -> bool;

    // --- Admin ---

    /// Counters for the administrative dashboard.
    async fn get_stats(&self) -> PortalStats;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The production implementation, backed by a single PostgreSQL database.
/// Queries are runtime-checked (`sqlx::query_as` + `bind`) so the crate
/// builds without a live DATABASE_URL; malformed rows surface as logged
/// errors with benign defaults, never panics.
pub struct PostgresRepository {
    pool: PgPool,
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, permissions, is_email_confirmed, last_login, created_at";
const FORUM_COLUMNS: &str = "id, name, description, moderators, blacklist, whitelist";
const POST_COLUMNS: &str = "id, forum_id, author, title, body, removed, created_at";
const REPLY_COLUMNS: &str = "id, post_id, parent_reply_id, author, body, created_at";
const MAIL_COLUMNS: &str = "id, sender, recipient, subject, body, is_read, is_flagged, created_at";

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Option<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user error: {:?}", e);
                None
            })
    }

    /// find_user
    ///
    /// Two probes instead of one OR-query, preserving username precedence
    /// when one account's username equals another account's email.
    async fn find_user(&self, identifier: &str) -> Option<User> {
        let by_username = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("find_user (username) error: {:?}", e);
            None
        });

        if by_username.is_some() {
            return by_username;
        }

        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("find_user (email) error: {:?}", e);
                None
            })
    }

    async fn get_identifier(&self, id: Uuid) -> Option<String> {
        sqlx::query_scalar::<_, String>("SELECT username FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_identifier error: {:?}", e);
                None
            })
    }

    /// create_user
    ///
    /// `ON CONFLICT DO NOTHING` covers every unique constraint (id, username,
    /// email); a conflicting insert returns no row, which the handler reports
    /// as "already in use".
    async fn create_user(&self, user: User) -> Option<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users ({USER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT DO NOTHING \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.permissions)
        .bind(user.is_email_confirmed)
        .bind(user.last_login)
        .bind(user.created_at)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("create_user error: {:?}", e);
            None
        })
    }

    async fn touch_last_login(&self, id: Uuid) -> bool {
        match sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("touch_last_login error: {:?}", e);
                false
            }
        }
    }

    /// list_forums
    ///
    /// Dynamic filtering via QueryBuilder for safe parameterization. The
    /// public-only restriction is the whitelist-emptiness rule expressed in
    /// SQL.
    async fn list_forums(&self, offset: i64, limit: i64, include_private: bool) -> Vec<Forum> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {FORUM_COLUMNS} FROM forums"));

        if !include_private {
            builder.push(" WHERE cardinality(whitelist) = 0");
        }

        builder.push(" ORDER BY name ASC OFFSET ");
        builder.push_bind(offset);
        builder.push(" LIMIT ");
        builder.push_bind(limit);

        match builder.build_query_as::<Forum>().fetch_all(&self.pool).await {
            Ok(forums) => forums,
            Err(e) => {
                tracing::error!("list_forums error: {:?}", e);
                vec![]
            }
        }
    }

    async fn get_forum(&self, id: Uuid) -> Option<Forum> {
        sqlx::query_as::<_, Forum>(&format!("SELECT {FORUM_COLUMNS} FROM forums WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_forum error: {:?}", e);
                None
            })
    }

    async fn list_posts(&self, forum_id: Uuid, offset: i64, limit: i64) -> Vec<Post> {
        match sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts \
             WHERE forum_id = $1 AND removed = false \
             ORDER BY created_at DESC OFFSET $2 LIMIT $3"
        ))
        .bind(forum_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        {
            Ok(posts) => posts,
            Err(e) => {
                tracing::error!("list_posts error: {:?}", e);
                vec![]
            }
        }
    }

    async fn get_post(&self, id: Uuid) -> Option<Post> {
        sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_post error: {:?}", e);
                None
            })
    }

    async fn list_replies(
        &self,
        post_id: Uuid,
        parent: Option<Uuid>,
        offset: i64,
        limit: i64,
    ) -> Vec<PostReply> {
        // Two static queries: `= NULL` never matches in SQL, so the
        // top-level case needs IS NULL.
        let result = match parent {
            Some(parent_id) => {
                sqlx::query_as::<_, PostReply>(&format!(
                    "SELECT {REPLY_COLUMNS} FROM post_replies \
                     WHERE post_id = $1 AND parent_reply_id = $2 \
                     ORDER BY created_at ASC OFFSET $3 LIMIT $4"
                ))
                .bind(post_id)
                .bind(parent_id)
                .bind(offset)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, PostReply>(&format!(
                    "SELECT {REPLY_COLUMNS} FROM post_replies \
                     WHERE post_id = $1 AND parent_reply_id IS NULL \
                     ORDER BY created_at ASC OFFSET $2 LIMIT $3"
                ))
                .bind(post_id)
                .bind(offset)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        };

        match result {
            Ok(replies) => replies,
            Err(e) => {
                tracing::error!("list_replies error: {:?}", e);
                vec![]
            }
        }
    }

    async fn send_mail(
        &self,
        sender: Uuid,
        recipient: Uuid,
        subject: &str,
        body: &str,
    ) -> Option<Uuid> {
        let new_id = Uuid::new_v4();
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO mail_messages (id, sender, recipient, subject, body, is_read, is_flagged, created_at) \
             VALUES ($1, $2, $3, $4, $5, false, false, NOW()) \
             RETURNING id",
        )
        .bind(new_id)
        .bind(sender)
        .bind(recipient)
        .bind(subject)
        .bind(body)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("send_mail error: {:?}", e);
            None
        })
    }

    /// get_inbox
    ///
    /// The unread/flagged narrowing is dynamic, so this uses QueryBuilder
    /// like `list_forums` rather than four near-identical static queries.
    async fn get_inbox(
        &self,
        recipient: Uuid,
        offset: i64,
        limit: i64,
        unread_only: bool,
        flagged_only: bool,
    ) -> Vec<MailMessage> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(format!(
            "SELECT {MAIL_COLUMNS} FROM mail_messages WHERE recipient = "
        ));
        builder.push_bind(recipient);

        if unread_only {
            builder.push(" AND is_read = false");
        }
        if flagged_only {
            builder.push(" AND is_flagged = true");
        }

        builder.push(" ORDER BY created_at ASC OFFSET ");
        builder.push_bind(offset);
        builder.push(" LIMIT ");
        builder.push_bind(limit);

        match builder
            .build_query_as::<MailMessage>()
            .fetch_all(&self.pool)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!("get_inbox error: {:?}", e);
                vec![]
            }
        }
    }

    async fn get_outbox(&self, sender: Uuid, offset: i64, limit: i64) -> Vec<MailMessage> {
        match sqlx::query_as::<_, MailMessage>(&format!(
            "SELECT {MAIL_COLUMNS} FROM mail_messages \
             WHERE sender = $1 \
             ORDER BY created_at ASC OFFSET $2 LIMIT $3"
        ))
        .bind(sender)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!("get_outbox error: {:?}", e);
                vec![]
            }
        }
    }

    async fn get_message(&self, id: Uuid) -> Option<MailMessage> {
        sqlx::query_as::<_, MailMessage>(&format!(
            "SELECT {MAIL_COLUMNS} FROM mail_messages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_message error: {:?}", e);
            None
        })
    }

    /// mark_message
    ///
    /// The `recipient = $2` clause is the ownership check: marking someone
    /// else's mail affects zero rows.
    async fn mark_message(&self, id: Uuid, recipient: Uuid, read: bool, flagged: bool) -> bool {
        match sqlx::query(
            "UPDATE mail_messages SET is_read = $3, is_flagged = $4 \
             WHERE id = $1 AND recipient = $2",
        )
        .bind(id)
        .bind(recipient)
        .bind(read)
        .bind(flagged)
        .execute(&self.pool)
        .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("mark_message error: {:?}", e);
                false
            }
        }
    }

    async fn get_stats(&self) -> PortalStats {
        let count = |table: &'static str| {
            let pool = self.pool.clone();
            async move {
                sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
                    .fetch_one(&pool)
                    .await
                    .unwrap_or_else(|e| {
                        tracing::error!("get_stats error on {}: {:?}", table, e);
                        0
                    })
            }
        };

        PortalStats {
            total_users: count("users").await,
            total_forums: count("forums").await,
            total_posts: count("posts").await,
            total_messages: count("mail_messages").await,
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// PermissionTier
///
/// Ordered administrative level attached to every user account, stored as a
/// SMALLINT in the `users` table. The derived total order (`Registered <
/// Administrator < Super`) is what every tier gate compares against; an
/// out-of-range database value fails to decode instead of producing an
/// unknown tier.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[repr(i16)]
pub enum PermissionTier {
    /// An ordinary registered account.
    #[default]
    Registered = 0,
    /// May view any forum regardless of whitelist and query user records.
    Administrator = 1,
    /// Highest tier. Gates nothing beyond Administrator yet, but sorts above it.
    Super = 2,
}

/// User
///
/// Canonical identity record from the `users` table. This struct carries the
/// stored password digest, so it intentionally does **not** derive
/// `Serialize` — only the payload structs below ever cross the wire.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: Uuid,

    /// Unique display/login name.
    pub username: String,
    /// Unique contact address; also accepted as a login identifier.
    pub email: String,

    /// Unsalted SHA-256 digest of the password (see DESIGN.md).
    pub password_hash: Vec<u8>,

    pub permissions: PermissionTier,
    pub is_email_confirmed: bool,
    pub last_login: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Digests a plaintext password into the stored form.
    ///
    /// A single unsalted SHA-256 pass, kept for compatibility with existing
    /// credential rows. DESIGN.md flags this as a known security gap.
    pub fn hash_password(password: &str) -> Vec<u8> {
        Sha256::digest(password.as_bytes()).to_vec()
    }

    /// Compares a candidate password against the stored digest.
    pub fn password_matches(&self, password: &str) -> bool {
        self.password_hash == Self::hash_password(password)
    }
}

/// Forum
///
/// A forum record from the `forums` table. The whitelist doubles as the
/// visibility rule: an empty whitelist makes the forum public, a non-empty
/// one restricts access to the listed users plus Administrator+ tiers
/// (see `authz::is_authorized`).
///
/// `moderators` and `blacklist` are part of the schema but no access rule
/// consults them yet.
#[derive(Debug, Clone, FromRow, Default)]
pub struct Forum {
    pub id: Uuid,

    pub name: String,
    pub description: String,

    pub moderators: Vec<Uuid>,
    pub blacklist: Vec<Uuid>,
    pub whitelist: Vec<Uuid>,
}

impl Forum {
    /// A forum is public exactly when its whitelist is empty.
    pub fn is_public(&self) -> bool {
        self.whitelist.is_empty()
    }
}

/// Post
///
/// A top-level thread post in a forum. `removed` posts stay in the table but
/// are excluded from listings.
#[derive(Debug, Clone, FromRow, Default)]
pub struct Post {
    pub id: Uuid,
    pub forum_id: Uuid,

    /// FK to `users.id`; resolved to a display name when serving summaries.
    pub author: Uuid,

    pub title: String,
    pub body: String,
    pub removed: bool,

    pub created_at: DateTime<Utc>,
}

/// PostReply
///
/// A reply beneath a post. Replies nest: `parent_reply_id` is `None` for a
/// direct reply to the post and otherwise points at the reply it answers.
#[derive(Debug, Clone, FromRow, Default)]
pub struct PostReply {
    pub id: Uuid,
    pub post_id: Uuid,
    pub parent_reply_id: Option<Uuid>,

    pub author: Uuid,
    pub body: String,

    pub created_at: DateTime<Utc>,
}

/// MailMessage
///
/// A direct message between two users from the `mail_messages` table. The
/// read/flagged marks are inbox-side state owned by the recipient.
#[derive(Debug, Clone, FromRow, Default)]
pub struct MailMessage {
    pub id: Uuid,

    pub sender: Uuid,
    pub recipient: Uuid,

    pub subject: String,
    pub body: String,

    pub is_read: bool,
    pub is_flagged: bool,

    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for the public registration endpoint (POST /register).
/// The password is digested immediately and never stored or logged in
/// plaintext.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// LoginRequest
///
/// Input payload for POST /login. `username` also accepts the account's
/// email address; lookup probes the username column first, then email.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// SendMailRequest
///
/// Input payload for POST /mail. The recipient is an identifier (username
/// or email), resolved server-side.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SendMailRequest {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// MarkMailRequest
///
/// Input payload for PATCH /mail/{id}/mark. Both marks are set absolutely,
/// not toggled.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MarkMailRequest {
    pub read: bool,
    pub flagged: bool,
}

// --- Response Payloads (Output Schemas) ---

/// SessionResponse
///
/// Output of a successful login or registration: the opaque session token
/// the client presents as `Authorization: Bearer <token>` on subsequent
/// requests.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SessionResponse {
    pub token: Uuid,
}

/// ForumSummary
///
/// One row of the forum index (GET /forums).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ForumSummary {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

/// PostSummary
///
/// One row of a forum's post index. `author` is the resolved display name,
/// not the user id.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostSummary {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// PostView
///
/// Full post payload (GET /posts/{id}).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostView {
    pub title: String,
    pub author: String,
    pub body: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// ReplyView
///
/// One reply beneath a post (GET /posts/{id}/replies).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ReplyView {
    pub id: Uuid,
    pub author: String,
    pub body: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// MailSummary
///
/// One row of the inbox or outbox listing. `other` is the display name of
/// the counterpart: the sender when listing the inbox, the recipient when
/// listing the outbox.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MailSummary {
    pub id: Uuid,
    pub other: String,
    pub subject: String,
    pub is_read: bool,
    pub is_flagged: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// MailView
///
/// Full message payload (GET /mail/{id}), served only to the sender or the
/// recipient.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MailView {
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub is_read: bool,
    pub is_flagged: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// UserInfo
///
/// Administrative view of an account (GET /admin/users/{id}), including the
/// email and confirmation status that ordinary callers never see.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserInfo {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Serialized as the tier's name ("Registered", "Administrator", "Super").
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub permissions: PermissionTier,
    pub is_email_confirmed: bool,
    #[ts(type = "string")]
    pub last_login: DateTime<Utc>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// PortalStats
///
/// Counters for the administrative dashboard (GET /admin/stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PortalStats {
    pub total_users: i64,
    pub total_forums: i64,
    pub total_posts: i64,
    pub total_messages: i64,
}

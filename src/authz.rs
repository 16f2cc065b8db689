use crate::models::{Forum, PermissionTier, User};

// Two pure functions, no state, no I/O, no logging: given the same forum and
// viewer the answer is always the same. Every visibility and tier gate in
// the handlers routes through here.

/// Decides whether `viewer` may access `forum`.
///
/// A forum with an empty whitelist is public: everyone passes, including an
/// anonymous viewer (`None`). A non-empty whitelist makes the forum private,
/// and the whitelist becomes the sole non-administrative grant list — the
/// viewer must be present and either listed or of Administrator tier or
/// above. An anonymous viewer never passes a private forum.
///
/// Callers must resolve the session *before* calling this: an expired or
/// unknown session has to arrive here as `None`, indistinguishable from a
/// client that never authenticated.
pub fn is_authorized(forum: &Forum, viewer: Option<&User>) -> bool {
    forum.is_public()
        || viewer.is_some_and(|user| {
            forum.whitelist.contains(&user.id)
                || user.permissions >= PermissionTier::Administrator
        })
}

/// Decides whether `viewer` holds at least `required` tier.
///
/// Anonymous viewers hold no tier at all, so `None` fails every requirement.
/// Gates administrative queries independently of any forum whitelist.
pub fn has_tier(viewer: Option<&User>, required: PermissionTier) -> bool {
    viewer.is_some_and(|user| user.permissions >= required)
}

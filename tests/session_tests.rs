use chrono::Duration;
use forum_portal::authz;
use forum_portal::models::{PermissionTier, User};
use forum_portal::session::SessionRegistry;
use std::thread;
use std::time::Duration as StdDuration;
use uuid::Uuid;

#[test]
fn created_session_resolves_live_with_same_user() {
    let registry = SessionRegistry::new();
    let user_id = Uuid::new_v4();

    let created = registry.create_session(user_id).expect("fresh registry");
    let resolved = registry.resolve(created.session_id).expect("just created");

    assert_eq!(resolved.user_id, user_id);
    assert_eq!(resolved.session_id, created.session_id);
    assert_eq!(registry.session_count(), 1);
}

#[test]
fn unknown_id_resolves_to_none() {
    let registry = SessionRegistry::new();
    assert!(registry.resolve(Uuid::new_v4()).is_none());
}

#[test]
fn expired_session_is_evicted_on_resolve() {
    let registry = SessionRegistry::with_ttl(Duration::milliseconds(100));
    let created = registry
        .create_session(Uuid::new_v4())
        .expect("fresh registry");

    thread::sleep(StdDuration::from_millis(250));

    // First resolve after the window reports the session gone and evicts it.
    assert!(registry.resolve(created.session_id).is_none());
    assert_eq!(registry.session_count(), 0, "expired entry should be removed");

    // And it stays gone: evicted, not merely reported expired once.
    assert!(registry.resolve(created.session_id).is_none());
}

#[test]
fn remove_is_idempotent() {
    let registry = SessionRegistry::new();
    let created = registry
        .create_session(Uuid::new_v4())
        .expect("fresh registry");

    assert!(registry.remove(created.session_id));
    assert!(!registry.remove(created.session_id));
    assert!(registry.resolve(created.session_id).is_none());
}

#[test]
fn removing_unknown_id_reports_false() {
    let registry = SessionRegistry::new();
    assert!(!registry.remove(Uuid::new_v4()));
}

/// Resolving partway through the window must push the expiry out from the
/// *resolution* time: a session created at t0 with a 600ms window, touched
/// at ~t300, must still be live well past t600.
#[test]
fn sliding_window_extends_from_resolution_time() {
    let registry = SessionRegistry::with_ttl(Duration::milliseconds(600));
    let created = registry
        .create_session(Uuid::new_v4())
        .expect("fresh registry");

    thread::sleep(StdDuration::from_millis(300));
    assert!(
        registry.resolve(created.session_id).is_some(),
        "still inside the original window"
    );

    // Now past the original expiry, inside the extended one.
    thread::sleep(StdDuration::from_millis(450));
    assert!(
        registry.resolve(created.session_id).is_some(),
        "touch at t300 must keep the session alive past t600"
    );

    // Left alone for longer than a full window, it finally dies.
    thread::sleep(StdDuration::from_millis(1400));
    assert!(registry.resolve(created.session_id).is_none());
}

#[test]
fn concurrent_creates_are_all_registered() {
    const CALLERS: usize = 32;
    let registry = SessionRegistry::new();

    let sessions: Vec<(Uuid, Uuid)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let registry = &registry;
                scope.spawn(move || {
                    let user_id = Uuid::new_v4();
                    let session = registry.create_session(user_id).expect("no collision");
                    (session.session_id, user_id)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("creator thread"))
            .collect()
    });

    // No lost updates: every creation landed and is independently resolvable.
    assert_eq!(registry.session_count(), CALLERS);
    for (session_id, user_id) in sessions {
        let resolved = registry.resolve(session_id).expect("live session");
        assert_eq!(resolved.user_id, user_id);
    }
}

/// The whole account lifecycle as the handlers drive it: create, resolve,
/// tier check, logout, and the token is dead.
#[test]
fn registered_user_session_lifecycle() {
    let registry = SessionRegistry::new();
    let user = User {
        id: Uuid::new_v4(),
        username: "plain-user".to_string(),
        permissions: PermissionTier::Registered,
        ..User::default()
    };

    let session = registry.create_session(user.id).expect("fresh registry");

    let resolved = registry.resolve(session.session_id).expect("live session");
    assert_eq!(resolved.user_id, user.id);

    assert!(!authz::has_tier(
        Some(&user),
        PermissionTier::Administrator
    ));

    assert!(registry.remove(session.session_id));
    assert!(registry.resolve(session.session_id).is_none());
}

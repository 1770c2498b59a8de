//! Behavioural tests every `Store` implementation must pass.
//!
//! Each check is written once against `&dyn Store` and instantiated for both
//! backends by `store_tests!`.

use sharegate_core::{
    AccessType, GithubLink, NewShare, Session, ShareKind, User, UserStatus, Viewer,
};
use sharegate_store::{MemoryStore, SqliteStore, Store, StoreError};

struct World {
    alice: User,
    bob: User,
    session: Session,
}

async fn world(store: &dyn Store) -> World {
    let alice = store.create_user("alice@example.com", None, 1).await.unwrap();
    let bob = store.create_user("bob@example.com", None, 1).await.unwrap();
    let mut session = Session::new(alice.id, "ext-1", 100);
    session.summary = Some("refactor parser".into());
    session.total_lines = 12;
    store.upsert_session(&session).await.unwrap();
    World {
        alice,
        bob,
        session,
    }
}

async fn create_share_requires_owner(store: &dyn Store) {
    let w = world(store).await;
    let err = store
        .create_share(&w.session.id, w.bob.id, &NewShare::Public, None, 200)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::SessionNotFound(_)));
}

async fn create_share_resolves_known_recipients(store: &dyn Store) {
    let w = world(store).await;
    let share = store
        .create_share(
            &w.session.id,
            w.alice.id,
            &NewShare::Recipients(vec!["BOB@example.com".into(), "new@example.com".into()]),
            None,
            200,
        )
        .await
        .unwrap();

    let recipients = share.kind.recipients();
    assert_eq!(recipients.len(), 2);
    assert_eq!(recipients[0].user_id, Some(w.bob.id));
    assert_eq!(recipients[1].user_id, None);

    let stored = store.get_share(&share.id).await.unwrap().unwrap();
    assert_eq!(stored, share);
}

async fn invalid_recipient_is_rejected_before_writing(store: &dyn Store) {
    let w = world(store).await;
    let err = store
        .create_share(
            &w.session.id,
            w.alice.id,
            &NewShare::Recipients(vec!["ok@example.com".into(), "broken".into()]),
            None,
            200,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));
    assert!(store.shares_for_session(&w.session.id).await.unwrap().is_empty());
}

async fn revoke_is_owner_only(store: &dyn Store) {
    let w = world(store).await;
    let share = store
        .create_share(&w.session.id, w.alice.id, &NewShare::Public, None, 200)
        .await
        .unwrap();

    let err = store.revoke_share(&share.id, w.bob.id, 300).await.unwrap_err();
    assert!(matches!(err, StoreError::Unauthorized));

    store.revoke_share(&share.id, w.alice.id, 300).await.unwrap();
    assert!(store.get_share(&share.id).await.unwrap().is_none());

    // Already gone: indistinguishable from "not yours".
    let err = store.revoke_share(&share.id, w.alice.id, 300).await.unwrap_err();
    assert!(matches!(err, StoreError::Unauthorized));
}

async fn list_shares_newest_first_with_expired(store: &dyn Store) {
    let w = world(store).await;
    let old = store
        .create_share(&w.session.id, w.alice.id, &NewShare::Public, Some(250), 200)
        .await
        .unwrap();
    let new = store
        .create_system_share(&w.session.id, None, 300)
        .await
        .unwrap();

    let shares = store.list_shares(&w.session.id, w.alice.id).await.unwrap();
    let ids: Vec<_> = shares.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![new.id, old.id]);

    let err = store
        .list_shares(&w.session.id, w.bob.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::SessionNotFound(_)));

    let all = store.list_all_user_shares(w.alice.id).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].share.id, new.id);
    assert_eq!(all[0].external_id, "ext-1");
    assert_eq!(all[0].session_summary.as_deref(), Some("refactor parser"));
}

async fn shared_sessions_skip_expired_and_public(store: &dyn Store) {
    let w = world(store).await;
    store
        .create_share(&w.session.id, w.alice.id, &NewShare::Public, None, 200)
        .await
        .unwrap();
    store
        .create_share(
            &w.session.id,
            w.alice.id,
            &NewShare::Recipients(vec!["bob@example.com".into()]),
            Some(500),
            200,
        )
        .await
        .unwrap();

    let viewer = Viewer::new(w.bob.id, &w.bob.email);
    let rows = store.shared_sessions(&viewer, 400).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].grant.access_type, AccessType::Recipient);
    assert_eq!(rows[0].owner_email, "alice@example.com");

    assert!(store.shared_sessions(&viewer, 500).await.unwrap().is_empty());
}

async fn shared_sessions_match_live_email(store: &dyn Store) {
    let w = world(store).await;
    store
        .create_share(
            &w.session.id,
            w.alice.id,
            &NewShare::Recipients(vec!["Later@Example.com".into()]),
            None,
            200,
        )
        .await
        .unwrap();

    // Viewer id unknown to the share, but the address matches.
    let viewer = Viewer::new(sharegate_core::UserId(404), "later@example.com");
    let rows = store.shared_sessions(&viewer, 300).await.unwrap();
    assert_eq!(rows.len(), 1);
}

async fn delete_session_cascades(store: &dyn Store) {
    let w = world(store).await;
    let share = store
        .create_share(&w.session.id, w.alice.id, &NewShare::Public, None, 200)
        .await
        .unwrap();

    assert!(!store.delete_session(&w.session.id, w.bob.id, 300).await.unwrap());
    assert!(store.delete_session(&w.session.id, w.alice.id, 300).await.unwrap());
    assert!(store.get_session(&w.session.id).await.unwrap().is_none());
    assert!(store.get_share(&share.id).await.unwrap().is_none());
}

async fn record_sync_and_links(store: &dyn Store) {
    let w = world(store).await;
    store
        .record_sync(&w.session.id, 3, 40, Some(900), 1000)
        .await
        .unwrap();
    store
        .add_github_link(&w.session.id, &GithubLink::PullRequest("7".into()), 1100)
        .await
        .unwrap();
    store
        .add_github_link(&w.session.id, &GithubLink::PullRequest("7".into()), 1200)
        .await
        .unwrap();

    let s = store.get_session(&w.session.id).await.unwrap().unwrap();
    assert_eq!(s.file_count, 3);
    assert_eq!(s.total_lines, 40);
    assert_eq!(s.last_activity_at, Some(900));
    assert_eq!(s.last_sync_at, Some(1000));
    assert_eq!(s.github_prs, vec!["7"]);
    assert_eq!(s.updated_at, 1100);

    // A sync without activity keeps the previous activity time.
    store
        .record_sync(&w.session.id, 3, 41, None, 1300)
        .await
        .unwrap();
    let s = store.get_session(&w.session.id).await.unwrap().unwrap();
    assert_eq!(s.last_activity_at, Some(900));
}

async fn user_status_and_lookup(store: &dyn Store) {
    let w = world(store).await;
    store
        .set_user_status(w.alice.id, UserStatus::Inactive, 300)
        .await
        .unwrap();
    let alice = store
        .get_user_by_email("ALICE@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alice.status, UserStatus::Inactive);

    let rows = store.owned_sessions(w.alice.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].owner_status, UserStatus::Inactive);
    assert_eq!(rows[0].grant.access_type, AccessType::Owner);
}

async fn share_all_rows_are_synthetic(store: &dyn Store) {
    let w = world(store).await;
    let rows = store.sessions_not_owned_by(w.bob.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].grant.access_type, AccessType::System);
    assert_eq!(rows[0].grant.share_id, None);
    assert!(store.sessions_not_owned_by(w.alice.id).await.unwrap().is_empty());
}

async fn system_share_kind_roundtrips(store: &dyn Store) {
    let w = world(store).await;
    let share = store
        .create_system_share(&w.session.id, None, 200)
        .await
        .unwrap();
    let stored = store.get_share(&share.id).await.unwrap().unwrap();
    assert_eq!(stored.kind, ShareKind::System);

    store.touch_share(&share.id, 777).await.unwrap();
    let stored = store.get_share(&share.id).await.unwrap().unwrap();
    assert_eq!(stored.last_accessed_at, Some(777));
}

async fn upsert_never_moves_ownership(store: &dyn Store) {
    let w = world(store).await;
    let mut taken = w.session.clone();
    taken.owner_id = w.bob.id;
    taken.summary = Some("mine now".into());
    let err = store.upsert_session(&taken).await.unwrap_err();
    assert!(matches!(err, StoreError::SessionNotFound(id) if id == w.session.id));

    let stored = store.get_session(&w.session.id).await.unwrap().unwrap();
    assert_eq!(stored.owner_id, w.alice.id);
    assert_eq!(stored.summary.as_deref(), Some("refactor parser"));

    let mut edited = w.session.clone();
    edited.summary = Some("renamed".into());
    store.upsert_session(&edited).await.unwrap();
    let stored = store.get_session(&w.session.id).await.unwrap().unwrap();
    assert_eq!(stored.summary.as_deref(), Some("renamed"));
}

async fn visibility_stamp_tracks_removals(store: &dyn Store) {
    let w = world(store).await;
    assert_eq!(store.visibility_changed_at(1_000).await.unwrap(), 0);

    let expiring = store
        .create_share(&w.session.id, w.alice.id, &NewShare::Public, Some(500), 200)
        .await
        .unwrap();
    assert_eq!(store.visibility_changed_at(499).await.unwrap(), 0);
    assert_eq!(store.visibility_changed_at(600).await.unwrap(), 500);

    store.revoke_share(&expiring.id, w.alice.id, 700).await.unwrap();
    assert_eq!(store.visibility_changed_at(700).await.unwrap(), 700);

    // An out-of-order write never pulls the stamp back.
    store
        .set_user_status(w.bob.id, UserStatus::Inactive, 650)
        .await
        .unwrap();
    assert_eq!(store.visibility_changed_at(800).await.unwrap(), 700);

    assert!(!store.delete_session(&w.session.id, w.bob.id, 900).await.unwrap());
    assert_eq!(store.visibility_changed_at(900).await.unwrap(), 700);
    assert!(store.delete_session(&w.session.id, w.alice.id, 900).await.unwrap());
    assert_eq!(store.visibility_changed_at(900).await.unwrap(), 900);
}

async fn only_ascii_letters_fold_in_emails(store: &dyn Store) {
    let w = world(store).await;
    let ulf = store.create_user("Ülf@example.com", None, 1).await.unwrap();
    let found = store.get_user_by_email("ÜLF@EXAMPLE.COM").await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(ulf.id));
    assert!(store.get_user_by_email("ülf@example.com").await.unwrap().is_none());

    store
        .create_share(
            &w.session.id,
            w.alice.id,
            &NewShare::Recipients(vec!["Öda@example.com".into()]),
            None,
            200,
        )
        .await
        .unwrap();
    let stranger = Viewer::new(sharegate_core::UserId(404), "öda@example.com");
    assert!(store.shared_sessions(&stranger, 300).await.unwrap().is_empty());
    let invited = Viewer::new(sharegate_core::UserId(404), "ÖDA@EXAMPLE.COM");
    assert_eq!(store.shared_sessions(&invited, 300).await.unwrap().len(), 1);
}

macro_rules! store_tests {
    ($($name:ident),* $(,)?) => {
        mod memory {
            $(
                #[tokio::test]
                async fn $name() {
                    let store = super::MemoryStore::new();
                    super::$name(&store).await;
                }
            )*
        }

        mod sqlite {
            $(
                #[tokio::test]
                async fn $name() {
                    let store = super::SqliteStore::open_memory().unwrap();
                    super::$name(&store).await;
                }
            )*
        }
    };
}

store_tests!(
    create_share_requires_owner,
    create_share_resolves_known_recipients,
    invalid_recipient_is_rejected_before_writing,
    revoke_is_owner_only,
    list_shares_newest_first_with_expired,
    shared_sessions_skip_expired_and_public,
    shared_sessions_match_live_email,
    delete_session_cascades,
    record_sync_and_links,
    user_status_and_lookup,
    share_all_rows_are_synthetic,
    system_share_kind_roundtrips,
    upsert_never_moves_ownership,
    visibility_stamp_tracks_removals,
    only_ascii_letters_fold_in_emails,
);

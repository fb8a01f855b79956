//! The libSQL service through the backend traits the sync core uses.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;
use rstest::rstest;
use tokio::task::JoinSet;

use nyuki_auth::AuthBackend;
use nyuki_config::BackendConfig;
use nyuki_core::entities::{Apiary, Hive, HiveMetrics, NewApiary, NewHive, Profile};
use nyuki_core::enums::HiveHealth;
use nyuki_core::errors::BackendError;
use nyuki_core::events::ChangeEvent;
use nyuki_core::updates::apiary::ApiaryPatchBuilder;
use nyuki_core::updates::hive::HivePatchBuilder;
use nyuki_core::updates::profile::ProfilePatchBuilder;
use nyuki_db::{NyukiDb, NyukiService};
use nyuki_sync::{ChangeFeed, CollectionBackend, CounterBackend};

const EMAIL: &str = "neema@example.com";
const PASSWORD: &str = "correct-horse";

async fn service_with(config: BackendConfig) -> NyukiService {
    let db = NyukiDb::open_local(":memory:").await.unwrap();
    NyukiService::from_db(db, &config).unwrap()
}

async fn service() -> NyukiService {
    service_with(BackendConfig {
        token_secret: "test-secret".into(),
        ..Default::default()
    })
    .await
}

async fn owner(svc: &NyukiService) -> String {
    svc.sign_up(EMAIL, PASSWORD).await.unwrap().user_id
}

fn draft(name: &str) -> NewApiary {
    NewApiary {
        name: name.into(),
        location: "Arusha".into(),
        ..Default::default()
    }
}

async fn apiary(svc: &NyukiService, owner_id: &str, name: &str) -> Apiary {
    CollectionBackend::<Apiary>::create(svc, owner_id, &draft(name), "tmp-00000001")
        .await
        .unwrap()
}

async fn hive(svc: &NyukiService, owner_id: &str, apiary_id: &str, name: &str) -> Hive {
    CollectionBackend::<Hive>::create(
        svc,
        owner_id,
        &NewHive {
            apiary_id: apiary_id.into(),
            name: name.into(),
            ..Default::default()
        },
        "tmp-00000002",
    )
    .await
    .unwrap()
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sign_up_sign_in_restore_sign_out() {
    let svc = service().await;

    let account = svc.sign_up(EMAIL, PASSWORD).await.unwrap();
    let first = account.session.unwrap();
    assert_eq!(first.user_id, account.user_id);

    let second = svc.sign_in(EMAIL, PASSWORD).await.unwrap();
    assert_ne!(first.token, second.token);

    let restored = svc.restore_session(&second.token).await.unwrap().unwrap();
    assert_eq!(restored.user_id, account.user_id);
    assert_eq!(restored.email, EMAIL);

    svc.sign_out(&second.token).await.unwrap();
    assert_eq!(svc.restore_session(&second.token).await.unwrap(), None);
    // Other sessions of the same user survive.
    assert!(svc.restore_session(&first.token).await.unwrap().is_some());
}

#[tokio::test]
async fn duplicate_sign_up_reports_existing_account() {
    let svc = service().await;
    owner(&svc).await;
    assert_eq!(
        svc.sign_up(EMAIL, "other").await.unwrap_err(),
        BackendError::AccountExists(EMAIL.into())
    );
}

#[rstest]
#[case(EMAIL, "wrong-password")]
#[case("nobody@example.com", PASSWORD)]
#[tokio::test]
async fn bad_credentials_are_refused(#[case] email: &str, #[case] password: &str) {
    let svc = service().await;
    owner(&svc).await;
    assert_eq!(
        svc.sign_in(email, password).await.unwrap_err(),
        BackendError::InvalidCredentials
    );
}

#[tokio::test]
async fn unverified_accounts_cannot_sign_in_until_confirmed() {
    let svc = service_with(BackendConfig {
        require_email_verification: true,
        ..Default::default()
    })
    .await;

    let account = svc.sign_up(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(account.session, None);
    assert_eq!(
        svc.sign_in(EMAIL, PASSWORD).await.unwrap_err(),
        BackendError::EmailUnverified(EMAIL.into())
    );

    svc.confirm_email(EMAIL).await.unwrap();
    assert!(svc.sign_in(EMAIL, PASSWORD).await.is_ok());
}

#[tokio::test]
async fn restore_rejects_foreign_and_forged_tokens() {
    let svc = service().await;
    let session = svc.sign_up(EMAIL, PASSWORD).await.unwrap().session.unwrap();

    let other = service_with(BackendConfig {
        token_secret: "other-secret".into(),
        ..Default::default()
    })
    .await;
    assert_eq!(other.restore_session(&session.token).await.unwrap(), None);
    assert_eq!(svc.restore_session("mem.abc.def").await.unwrap(), None);
}

#[tokio::test]
async fn profile_create_fetch_update() {
    let svc = service().await;
    let user_id = owner(&svc).await;
    assert_eq!(svc.fetch_profile(&user_id).await.unwrap(), None);

    let now = Utc::now();
    let profile = Profile {
        user_id: user_id.clone(),
        email: EMAIL.into(),
        first_name: "Neema".into(),
        last_name: "Mushi".into(),
        avatar_url: None,
        created_at: now,
        updated_at: now,
    };
    svc.create_profile(&profile).await.unwrap();
    assert_eq!(svc.fetch_profile(&user_id).await.unwrap(), Some(profile.clone()));

    let err = svc.create_profile(&profile).await.unwrap_err();
    assert!(matches!(err, BackendError::Rejected(_)), "{err}");

    let updated = svc
        .update_profile(
            &user_id,
            &ProfilePatchBuilder::new()
                .last_name("Kimaro")
                .avatar_url(Some("https://example.com/n.png".into()))
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(updated.first_name, "Neema");
    assert_eq!(updated.last_name, "Kimaro");
    assert_eq!(updated.avatar_url.as_deref(), Some("https://example.com/n.png"));

    let err = svc
        .update_profile("usr-missing", &ProfilePatchBuilder::new().first_name("X").build())
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::NotFound { .. }));
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn apiary_versions_advance_on_every_write() {
    let svc = service().await;
    let user_id = owner(&svc).await;

    let home = apiary(&svc, &user_id, "Home").await;
    assert_eq!(home.version, 1);
    assert_eq!(home.total_hives, 0);
    assert_eq!(home.client_ref.as_deref(), Some("tmp-00000001"));

    let renamed = CollectionBackend::<Apiary>::update(
        &svc,
        &user_id,
        &home.id,
        &ApiaryPatchBuilder::new()
            .name("Hill")
            .description(Some("On the ridge".into()))
            .build(),
    )
    .await
    .unwrap();
    assert_eq!(renamed.before, home);
    let renamed = renamed.after;
    assert_eq!(renamed.version, 2);
    assert_eq!(renamed.name, "Hill");
    assert_eq!(renamed.location, "Arusha");
    assert_eq!(renamed.description.as_deref(), Some("On the ridge"));

    let listed = CollectionBackend::<Apiary>::list(&svc, &user_id).await.unwrap();
    assert_eq!(listed, vec![renamed.clone()]);

    let removal = CollectionBackend::<Apiary>::delete(&svc, &user_id, &home.id)
        .await
        .unwrap();
    assert_eq!(removal.version, 3);
    assert_eq!(removal.record, renamed);
    assert!(CollectionBackend::<Apiary>::list(&svc, &user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn other_users_rows_are_invisible() {
    let svc = service().await;
    let user_id = owner(&svc).await;
    let intruder = svc
        .sign_up("intruder@example.com", PASSWORD)
        .await
        .unwrap()
        .user_id;
    let home = apiary(&svc, &user_id, "Home").await;

    assert!(CollectionBackend::<Apiary>::list(&svc, &intruder).await.unwrap().is_empty());
    let err = CollectionBackend::<Apiary>::update(
        &svc,
        &intruder,
        &home.id,
        &ApiaryPatchBuilder::new().name("Mine").build(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, BackendError::NotFound { .. }));

    let err = CollectionBackend::<Hive>::create(
        &svc,
        &intruder,
        &NewHive {
            apiary_id: home.id.clone(),
            name: "Sneaky".into(),
            ..Default::default()
        },
        "tmp-0000dead",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, BackendError::Rejected(_)));
}

#[tokio::test]
async fn hive_fields_round_trip_through_the_table() {
    let svc = service().await;
    let user_id = owner(&svc).await;
    let home = apiary(&svc, &user_id, "Home").await;

    let created = CollectionBackend::<Hive>::create(
        &svc,
        &user_id,
        &NewHive {
            apiary_id: home.id.clone(),
            name: "A1".into(),
            queen_age: Some(2),
            queen_color: Some("yellow".into()),
            health: HiveHealth::Fair,
            notes: Some("calm".into()),
            metrics: HiveMetrics {
                temperature: Some(34.5),
                humidity: Some(61.0),
                weight: None,
            },
        },
        "tmp-0000a1a1",
    )
    .await
    .unwrap();

    let listed = CollectionBackend::<Hive>::list(&svc, &user_id).await.unwrap();
    assert_eq!(listed, vec![created.clone()]);
    assert_eq!(svc.get_hive(&user_id, &created.id).await.unwrap(), created);
}

#[tokio::test]
async fn hive_moves_and_clears_optional_fields() {
    let svc = service().await;
    let user_id = owner(&svc).await;
    let home = apiary(&svc, &user_id, "Home").await;
    let hill = apiary(&svc, &user_id, "Hill").await;
    let a1 = hive(&svc, &user_id, &home.id, "A1").await;

    let moved = CollectionBackend::<Hive>::update(
        &svc,
        &user_id,
        &a1.id,
        &HivePatchBuilder::new()
            .apiary_id(hill.id.clone())
            .queen_age(None)
            .health(HiveHealth::Critical)
            .build(),
    )
    .await
    .unwrap();
    assert_eq!(moved.before, a1);
    let moved = moved.after;
    assert_eq!(moved.apiary_id, hill.id);
    assert_eq!(moved.health, HiveHealth::Critical);
    assert_eq!(moved.version, 2);
    assert_eq!(svc.count_hives_in(&user_id, &home.id).await.unwrap(), 0);
    assert_eq!(svc.count_hives_in(&user_id, &hill.id).await.unwrap(), 1);

    let err = CollectionBackend::<Hive>::update(
        &svc,
        &user_id,
        &a1.id,
        &HivePatchBuilder::new().apiary_id("apy-missing").build(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, BackendError::Rejected(msg) if msg.contains("apy-missing")));
}

#[tokio::test]
async fn apiary_with_hives_cannot_be_deleted() {
    let svc = service().await;
    let user_id = owner(&svc).await;
    let home = apiary(&svc, &user_id, "Home").await;
    let a1 = hive(&svc, &user_id, &home.id, "A1").await;

    let err = CollectionBackend::<Apiary>::delete(&svc, &user_id, &home.id)
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Rejected(msg) if msg.contains("still has 1 hive")));

    CollectionBackend::<Hive>::delete(&svc, &user_id, &a1.id).await.unwrap();
    CollectionBackend::<Apiary>::delete(&svc, &user_id, &home.id).await.unwrap();
}

#[tokio::test]
async fn deleted_hive_reports_the_apiary_it_was_stored_in() {
    let svc = service().await;
    let user_id = owner(&svc).await;
    let home = apiary(&svc, &user_id, "Home").await;
    let hill = apiary(&svc, &user_id, "Hill").await;
    let a1 = hive(&svc, &user_id, &home.id, "A1").await;
    CollectionBackend::<Hive>::update(
        &svc,
        &user_id,
        &a1.id,
        &HivePatchBuilder::new().apiary_id(hill.id.clone()).build(),
    )
    .await
    .unwrap();

    let removal = CollectionBackend::<Hive>::delete(&svc, &user_id, &a1.id)
        .await
        .unwrap();
    assert_eq!(removal.record.apiary_id, hill.id);
    assert_eq!((removal.record.version, removal.version), (2, 3));
}

#[tokio::test]
async fn deleting_a_missing_row_is_not_found() {
    let svc = service().await;
    let user_id = owner(&svc).await;
    let err = CollectionBackend::<Hive>::delete(&svc, &user_id, "hiv-missing")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BackendError::NotFound {
            collection: "hives".into(),
            id: "hiv-missing".into()
        }
    );
}

// ---------------------------------------------------------------------------
// Counter
// ---------------------------------------------------------------------------

#[tokio::test]
async fn counter_increments_and_refuses_to_go_negative() {
    let svc = service().await;
    let user_id = owner(&svc).await;
    let home = apiary(&svc, &user_id, "Home").await;

    let up = svc.increment_hive_count(&user_id, &home.id).await.unwrap();
    assert_eq!((up.total_hives, up.version), (1, 2));
    let down = svc.decrement_hive_count(&user_id, &home.id).await.unwrap();
    assert_eq!((down.total_hives, down.version), (0, 3));
    let err = svc
        .decrement_hive_count(&user_id, &home.id)
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Rejected(msg) if msg.contains("constraint failed")));
    let held = svc.get_apiary(&user_id, &home.id).await.unwrap();
    assert_eq!((held.total_hives, held.version), (0, 3));

    let err = svc
        .increment_hive_count(&user_id, "apy-missing")
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::NotFound { .. }));
}

#[tokio::test]
async fn recount_sets_the_count_from_the_hives_table() {
    let svc = service().await;
    let user_id = owner(&svc).await;
    let home = apiary(&svc, &user_id, "Home").await;
    hive(&svc, &user_id, &home.id, "A1").await;
    hive(&svc, &user_id, &home.id, "A2").await;
    // Only one of the two creates reached the counter.
    svc.increment_hive_count(&user_id, &home.id).await.unwrap();

    let recounted = CounterBackend::recount_hives(&svc, &user_id, &home.id)
        .await
        .unwrap();
    assert_eq!((recounted.total_hives, recounted.version), (2, 3));
    assert_eq!(svc.get_apiary(&user_id, &home.id).await.unwrap(), recounted);

    let err = CounterBackend::recount_hives(&svc, "usr-intruder", &home.id)
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::NotFound { .. }));
}

#[tokio::test]
async fn concurrent_increments_are_not_lost() {
    let svc = Arc::new(service().await);
    let user_id = owner(&svc).await;
    let home = apiary(&svc, &user_id, "Home").await;

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let svc = Arc::clone(&svc);
        let (user_id, apiary_id) = (user_id.clone(), home.id.clone());
        tasks.spawn(async move { svc.increment_hive_count(&user_id, &apiary_id).await });
    }
    let mut versions = Vec::new();
    while let Some(result) = tasks.join_next().await {
        versions.push(result.unwrap().unwrap().version);
    }
    versions.sort_unstable();

    assert_eq!(versions, (2..=9).collect::<Vec<i64>>());
    assert_eq!(svc.get_apiary(&user_id, &home.id).await.unwrap().total_hives, 8);
}

// ---------------------------------------------------------------------------
// Change feed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn committed_writes_reach_the_owners_feed_in_order() {
    let svc = service().await;
    let user_id = owner(&svc).await;
    let mut apiaries = ChangeFeed::<Apiary>::subscribe(&svc, &user_id).await.unwrap();
    let mut hives = ChangeFeed::<Hive>::subscribe(&svc, &user_id).await.unwrap();

    let home = apiary(&svc, &user_id, "Home").await;
    let a1 = hive(&svc, &user_id, &home.id, "A1").await;
    svc.increment_hive_count(&user_id, &home.id).await.unwrap();

    let recv = Duration::from_secs(1);
    let first = tokio::time::timeout(recv, apiaries.events.recv()).await.unwrap().unwrap();
    assert_eq!(first, ChangeEvent::Insert { record: home.clone() });
    let second = tokio::time::timeout(recv, apiaries.events.recv()).await.unwrap().unwrap();
    assert_eq!(second.version(), 2);
    assert_eq!(second.record().unwrap().total_hives, 1);

    let hive_event = tokio::time::timeout(recv, hives.events.recv()).await.unwrap().unwrap();
    assert_eq!(hive_event, ChangeEvent::Insert { record: a1 });
}

#[tokio::test]
async fn feeds_are_scoped_to_their_owner_and_unsubscribe_stops_delivery() {
    let svc = service().await;
    let user_id = owner(&svc).await;
    let other = svc
        .sign_up("other@example.com", PASSWORD)
        .await
        .unwrap()
        .user_id;
    let mut theirs = ChangeFeed::<Apiary>::subscribe(&svc, &other).await.unwrap();
    let mut mine = ChangeFeed::<Apiary>::subscribe(&svc, &user_id).await.unwrap();

    apiary(&svc, &user_id, "Home").await;
    assert!(theirs.events.try_recv().is_err());

    ChangeFeed::<Apiary>::unsubscribe(&svc, mine.id);
    apiary(&svc, &user_id, "Hill").await;
    // The Home insert was queued before unsubscribing; nothing after it.
    assert!(mine.events.try_recv().is_ok());
    assert!(mine.events.try_recv().is_err());
}

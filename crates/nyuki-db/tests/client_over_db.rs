//! `NyukiClient` end to end over a file-backed database: the same wiring the
//! binary uses.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use nyuki_auth::{FileTokenStore, TokenStore};
use nyuki_config::NyukiConfig;
use nyuki_core::entities::{Apiary, NewApiary, NewHive, ProfileFields};
use nyuki_core::enums::SessionPhase;
use nyuki_core::record::SyncRecord;
use nyuki_core::updates::hive::HivePatchBuilder;
use nyuki_db::NyukiService;
use nyuki_sync::{Backends, CollectionBackend, CollectionSnapshot, EntityStore, NyukiClient};

const EMAIL: &str = "neema@example.com";
const PASSWORD: &str = "correct-horse";

struct Fixture {
    _dir: tempfile::TempDir,
    config: NyukiConfig,
    tokens: Arc<dyn TokenStore>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NyukiConfig::default();
        config.backend.database_path = dir
            .path()
            .join("data")
            .join("nyuki.db")
            .to_string_lossy()
            .into_owned();
        config.backend.token_secret = "fixture-secret".into();
        let tokens: Arc<dyn TokenStore> =
            Arc::new(FileTokenStore::new(dir.path().join("credentials")));
        Self {
            _dir: dir,
            config,
            tokens,
        }
    }

    async fn client(&self) -> (Arc<NyukiService>, NyukiClient) {
        let service = Arc::new(NyukiService::open(&self.config.backend).await.unwrap());
        let client = NyukiClient::new(
            Backends::shared(&service),
            Arc::clone(&self.tokens),
            &self.config,
        );
        (service, client)
    }
}

async fn eventually<E: SyncRecord>(
    store: &EntityStore<E>,
    pred: impl FnMut(&CollectionSnapshot<E>) -> bool,
) {
    let mut rx = store.watch();
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
        .await
        .expect("store never reached the expected state")
        .expect("store dropped");
}

fn fields() -> ProfileFields {
    ProfileFields {
        first_name: "Neema".into(),
        last_name: "Mushi".into(),
        avatar_url: None,
    }
}

#[tokio::test]
async fn sign_up_track_hives_and_restore_in_a_new_process() {
    let fixture = Fixture::new();

    let home_id = {
        let (_service, client) = fixture.client().await;
        let outcome = client.sign_up(EMAIL, PASSWORD, fields()).await.unwrap();
        assert!(outcome.session.is_some());
        assert_eq!(outcome.profile.unwrap().display_name(), "Neema Mushi");
        assert!(client.feeds_open());

        let home = client
            .create_apiary(NewApiary {
                name: "Home".into(),
                location: "Arusha".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let hill = client
            .create_apiary(NewApiary {
                name: "Hill".into(),
                location: "Moshi".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let a1 = client
            .create_hive(NewHive {
                apiary_id: home.id.clone(),
                name: "A1".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        client
            .create_hive(NewHive {
                apiary_id: home.id.clone(),
                name: "A2".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        client
            .update_hive(&a1.id, HivePatchBuilder::new().apiary_id(hill.id.clone()).build())
            .await
            .unwrap();

        assert_eq!(client.apiaries().get(&home.id).unwrap().total_hives, 1);
        assert_eq!(client.apiaries().get(&hill.id).unwrap().total_hives, 1);
        home.id
    };

    // Same database and credentials file, fresh client.
    let (_service, client) = fixture.client().await;
    assert!(client.restore().await);
    assert_eq!(client.session().phase(), SessionPhase::Authenticated);
    assert_eq!(client.apiaries().snapshot().len(), 2);
    assert_eq!(client.hives().snapshot().len(), 2);
    assert_eq!(client.apiaries().get(&home_id).unwrap().total_hives, 1);

    let dashboard = client.dashboard();
    assert_eq!((dashboard.apiary_count, dashboard.hive_count), (2, 2));
    assert!(dashboard.stale_apiaries.is_empty());
}

#[tokio::test]
async fn another_device_sees_writes_through_the_feed() {
    let fixture = Fixture::new();
    let (service, client) = fixture.client().await;
    client.sign_up(EMAIL, PASSWORD, fields()).await.unwrap();
    let owner_id = client.session().identity().unwrap().user_id;

    let pushed = CollectionBackend::<Apiary>::create(
        &*service,
        &owner_id,
        &NewApiary {
            name: "Valley".into(),
            location: "Karatu".into(),
            ..Default::default()
        },
        "tmp-0ther0de",
    )
    .await
    .unwrap();

    eventually(client.apiaries(), |s| s.get(&pushed.id).is_some()).await;
}

#[tokio::test]
async fn sign_out_revokes_the_stored_session() {
    let fixture = Fixture::new();
    let (_service, client) = fixture.client().await;
    client.sign_up(EMAIL, PASSWORD, fields()).await.unwrap();
    client.sign_out().await.unwrap();
    assert_eq!(fixture.tokens.load(), None);
    assert!(!client.feeds_open());

    let (_service, client) = fixture.client().await;
    assert!(!client.restore().await);
    assert_eq!(client.session().phase(), SessionPhase::Unauthenticated);
}

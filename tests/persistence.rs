//! Integration tests for the persistence layer

use vigil::{
    history::{ON_DISK_VERSION, PersistedSlot},
    models::{CheckAccumulator, HealthCheck, HealthSnapshot, Severity},
    persistence::{error::PersistenceError, sqlite::SqliteHealthStore, traits::KeyValueStore},
};

async fn setup_db() -> SqliteHealthStore {
    let store = SqliteHealthStore::new("sqlite::memory:")
        .await
        .expect("Failed to set up in-memory database");
    store.run_migrations().await.expect("Failed to run migrations");
    store
}

fn sample_record() -> PersistedSlot {
    let mut checks = CheckAccumulator::default();
    checks.add(&HealthSnapshot::single(
        "OSD_DOWN",
        HealthCheck {
            severity: Severity::Warning,
            summary: "osd.1 down".to_string(),
            detail: vec!["osd.1 on host a is down".to_string()],
        },
    ));
    PersistedSlot { version: ON_DISK_VERSION, checks }
}

#[tokio::test]
async fn test_json_state_round_trip() {
    let store = setup_db().await;
    let key = "health_history/2018-11-05_00";

    // 1. Initially the key is absent.
    let absent: Option<PersistedSlot> = store.get_json_state(key).await.unwrap();
    assert!(absent.is_none());

    // 2. Write and read back.
    let record = sample_record();
    store.set_json_state(key, &record).await.unwrap();
    let loaded: PersistedSlot = store.get_json_state(key).await.unwrap().unwrap();
    assert_eq!(loaded.version, ON_DISK_VERSION);
    assert_eq!(loaded.checks, record.checks);
}

#[tokio::test]
async fn test_set_json_state_overwrites() {
    let store = setup_db().await;
    let key = "health_history/2018-11-05_00";

    store.set_json_state(key, &sample_record()).await.unwrap();

    let empty = PersistedSlot { version: ON_DISK_VERSION, checks: CheckAccumulator::default() };
    store.set_json_state(key, &empty).await.unwrap();

    let loaded: PersistedSlot = store.get_json_state(key).await.unwrap().unwrap();
    assert!(loaded.checks.is_empty());
}

#[tokio::test]
async fn test_delete_state_removes_key() {
    let store = setup_db().await;
    let key = "health_history/2018-11-05_00";

    store.set_json_state(key, &sample_record()).await.unwrap();
    store.delete_state(key).await.unwrap();

    let loaded: Option<PersistedSlot> = store.get_json_state(key).await.unwrap();
    assert!(loaded.is_none());

    // Deleting an absent key is not an error.
    store.delete_state(key).await.unwrap();
}

#[tokio::test]
async fn test_keys_with_prefix_scopes_to_namespace() {
    let store = setup_db().await;
    let record = sample_record();

    store.set_json_state("health_history/2018-11-05_00", &record).await.unwrap();
    store.set_json_state("health_history/2018-11-05_01", &record).await.unwrap();
    store.set_json_state("other/2018-11-05_00", &record).await.unwrap();

    let mut keys = store.keys_with_prefix("health_history/").await.unwrap();
    keys.sort();
    assert_eq!(
        keys,
        vec![
            "health_history/2018-11-05_00".to_string(),
            "health_history/2018-11-05_01".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_keys_with_prefix_treats_wildcards_literally() {
    let store = setup_db().await;
    let record = sample_record();

    // An underscore in the prefix must not act as a single-character
    // wildcard.
    store.set_json_state("a_b/2018", &record).await.unwrap();
    store.set_json_state("axb/2018", &record).await.unwrap();

    let keys = store.keys_with_prefix("a_b/").await.unwrap();
    assert_eq!(keys, vec!["a_b/2018".to_string()]);
}

#[tokio::test]
async fn test_malformed_value_is_serialization_error() {
    let store = setup_db().await;
    let key = "health_history/2018-11-05_00";

    sqlx::query("INSERT INTO health_state (key, value) VALUES (?, ?)")
        .bind(key)
        .bind("not json")
        .execute(store.pool())
        .await
        .unwrap();

    let result = store.get_json_state::<PersistedSlot>(key).await;
    assert!(matches!(result, Err(PersistenceError::SerializationError(_))));
}

use rocket::local::blocking::Client;
use std::sync::Arc;
use swipe_engine::config::EngineConfig;
use swipe_engine::metadata_client::MetadataProvider;

use crate::fixture_provider::FixtureProvider;

/// Wrapper around Client that auto-deletes the temp DB on drop.
pub struct TestClient {
    client: Option<Client>,
    db_path: String,
}

impl Drop for TestClient {
    fn drop(&mut self) {
        drop(self.client.take());
        let _ = std::fs::remove_file(&self.db_path);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_path));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_path));
    }
}

impl std::ops::Deref for TestClient {
    type Target = Client;
    fn deref(&self) -> &Client {
        self.client.as_ref().unwrap()
    }
}

fn temp_db_path() -> String {
    format!(
        "/tmp/swipe_test_{}.db",
        uuid::Uuid::new_v4().to_string().split('-').next().unwrap()
    )
}

fn test_config() -> EngineConfig {
    let mut config = EngineConfig::from_env();
    config.catalog_size = 10;
    config.min_overview_len = 10;
    config.room_ttl_hours = 24;
    config.consensus_poll_ms = 20;
    config
}

pub fn test_client() -> TestClient {
    let db_path = temp_db_path();
    let provider: Arc<dyn MetadataProvider> = Arc::new(FixtureProvider::abundant());
    let rocket = swipe_engine::engine_with_storage_config_and_provider(&db_path, test_config(), provider);
    let client = Client::tracked(rocket).expect("valid rocket instance");
    TestClient { client: Some(client), db_path }
}

/// A client backed by a provider that can only ever produce a handful of
/// candidates — used to exercise the `InsufficientContent` failure path.
pub fn test_client_scarce() -> TestClient {
    let db_path = temp_db_path();
    let mut config = test_config();
    config.catalog_size = 50;
    let provider: Arc<dyn MetadataProvider> = Arc::new(FixtureProvider::scarce());
    let rocket = swipe_engine::engine_with_storage_config_and_provider(&db_path, config, provider);
    let client = Client::tracked(rocket).expect("valid rocket instance");
    TestClient { client: Some(client), db_path }
}

/// Create a room and return (room_id, invite_code, created_by).
pub fn create_test_room(client: &Client, name: &str, capacity: i64) -> serde_json::Value {
    use rocket::http::{ContentType, Status};
    let res = client
        .post("/api/v1/rooms")
        .header(ContentType::JSON)
        .body(format!(
            r#"{{"media_type":"MOVIE","genres":[],"name":"{name}","capacity":{capacity},"created_by":"host"}}"#
        ))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    res.into_json().unwrap()
}

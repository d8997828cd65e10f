//! Property tests over randomized room/genre/vote inputs, standing in for
//! the quantified invariants a deployer cares about: catalog shape, priority
//! ordering, and single-shot match semantics.

use proptest::prelude::*;
use rocket::http::{ContentType, Status};
use rocket::local::blocking::Client;
use std::sync::Arc;
use swipe_engine::config::EngineConfig;
use swipe_engine::error::EngineResult;
use swipe_engine::metadata_client::{DiscoverPage, GenreExpression, MetadataProvider, RawCandidate};
use swipe_engine::models::MediaType;

/// Hands back as many uniformly well-formed candidates as asked for, all
/// sharing the requested genre set so every tier's gate is trivially
/// satisfiable — the property tests below care about catalog shape and
/// consensus timing, not about exercising the fallback tiers themselves.
struct AbundantProvider {
    genres: Vec<i64>,
}

fn candidate(id: i64, media_type: MediaType, genres: Vec<i64>) -> RawCandidate {
    let (title, release_date, name, first_air_date) = match media_type {
        MediaType::Movie => (Some(format!("Title {id}")), Some("2015-06-01".to_string()), None, None),
        MediaType::Tv => (None, None, Some(format!("Title {id}")), Some("2015-06-01".to_string())),
    };
    RawCandidate {
        id,
        title,
        release_date,
        name,
        first_air_date,
        overview: format!("A sufficiently long synopsis for property entry {id} that clears the gate."),
        poster_path: Some(format!("/poster{id}.jpg")),
        original_language: "en".to_string(),
        genre_ids: genres,
        vote_average: 7.0,
        vote_count: 500,
        adult: false,
    }
}

#[rocket::async_trait]
impl MetadataProvider for AbundantProvider {
    async fn discover(
        &self,
        media_type: MediaType,
        _genre_expression: &GenreExpression,
        page: u32,
    ) -> EngineResult<DiscoverPage> {
        if page > 1 {
            return Ok(DiscoverPage { results: vec![], page, total_pages: 1 });
        }
        let mut genre_ids = self.genres.clone();
        if genre_ids.is_empty() {
            genre_ids.push(28);
        }
        let results = (1..=200i64).map(|id| candidate(id, media_type, genre_ids.clone())).collect();
        Ok(DiscoverPage { results, page: 1, total_pages: 1 })
    }

    async fn genres_for(&self, _media_type: MediaType) -> EngineResult<Vec<i64>> {
        Ok(self.genres.clone())
    }
}

struct TestInstance {
    client: Client,
    db_path: String,
}

impl Drop for TestInstance {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_path));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_path));
    }
}

fn spin_up(genres: Vec<i64>, catalog_size: usize, consensus_poll_ms: u64) -> TestInstance {
    let db_path = format!(
        "/tmp/swipe_prop_{}.db",
        uuid::Uuid::new_v4().to_string().split('-').next().unwrap()
    );
    let mut config = EngineConfig::from_env();
    config.catalog_size = catalog_size;
    config.min_overview_len = 10;
    config.room_ttl_hours = 24;
    config.consensus_poll_ms = consensus_poll_ms;
    let provider: Arc<dyn MetadataProvider> = Arc::new(AbundantProvider { genres });
    let rocket = swipe_engine::engine_with_storage_config_and_provider(&db_path, config, provider);
    let client = Client::tracked(rocket).expect("valid rocket instance");
    TestInstance { client, db_path }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Invariant 1 & 2: a successful createRoom always yields exactly
    /// `catalogSize` entries with sequence indices 0..N-1, no duplicate
    /// item ids, and non-decreasing priority across the sequence.
    #[test]
    fn prop_catalog_is_well_formed(
        genres in prop::collection::vec(1i64..50, 0..3),
        capacity in 2i64..6,
        catalog_size in 5usize..30,
    ) {
        let genres_json = format!("[{}]", genres.iter().map(i64::to_string).collect::<Vec<_>>().join(","));
        let instance = spin_up(genres.clone(), catalog_size, 500);
        let res = instance.client
            .post("/api/v1/rooms")
            .header(ContentType::JSON)
            .body(format!(
                r#"{{"media_type":"MOVIE","genres":{genres_json},"name":"prop-room","capacity":{capacity},"created_by":"host"}}"#
            ))
            .dispatch();
        prop_assert_eq!(res.status(), Status::Ok);
        let body: serde_json::Value = res.into_json().unwrap();
        let catalog = body["catalog"].as_array().unwrap();

        prop_assert_eq!(catalog.len(), catalog_size);

        let mut seen_items = std::collections::HashSet::new();
        let mut seen_indices = std::collections::HashSet::new();
        let mut last_priority = 0i64;
        for (expected_idx, entry) in catalog.iter().enumerate() {
            let idx = entry["sequence_index"].as_i64().unwrap();
            prop_assert_eq!(idx, expected_idx as i64);
            prop_assert!(seen_indices.insert(idx));

            let item_id = entry["item_id"].as_i64().unwrap();
            prop_assert!(seen_items.insert(item_id));

            let priority = entry["priority"].as_i64().unwrap();
            prop_assert!((1..=3).contains(&priority));
            prop_assert!(priority >= last_priority);
            last_priority = priority;
        }
    }

    /// Invariants 3 & 4: when every member votes YES on the same item the
    /// room transitions to MATCHED exactly once, the matched item is the
    /// one every member voted for, and exactly one notification is
    /// recorded — regardless of how many members there are.
    #[test]
    fn prop_unanimous_vote_matches_exactly_once(capacity in 2i64..5) {
        let instance = spin_up(vec![], 5, 15);
        let res = instance.client
            .post("/api/v1/rooms")
            .header(ContentType::JSON)
            .body(format!(
                r#"{{"media_type":"MOVIE","genres":[],"name":"prop-vote","capacity":{capacity},"created_by":"u0"}}"#
            ))
            .dispatch();
        let body: serde_json::Value = res.into_json().unwrap();
        let room_id = body["room"]["id"].as_str().unwrap().to_string();
        let item_id = body["catalog"][0]["item_id"].as_i64().unwrap();

        let users: Vec<String> = (0..capacity).map(|i| format!("u{i}")).collect();
        for user in users.iter().skip(1) {
            instance.client
                .post("/api/v1/rooms/join")
                .header(ContentType::JSON)
                .body(format!(r#"{{"room_id":"{room_id}","user_id":"{user}"}}"#))
                .dispatch();
        }

        for user in &users {
            let res = instance.client
                .post(format!("/api/v1/rooms/{room_id}/votes"))
                .header(ContentType::JSON)
                .body(format!(r#"{{"user_id":"{user}","item_id":{item_id},"decision":"YES"}}"#))
                .dispatch();
            prop_assert_eq!(res.status(), Status::Ok);
        }

        let mut matched = None;
        for _ in 0..200 {
            let room: serde_json::Value = instance.client
                .get(format!("/api/v1/rooms/{room_id}"))
                .dispatch()
                .into_json()
                .unwrap();
            if room["status"] == "MATCHED" {
                matched = Some(room);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(15));
        }
        let matched = matched.expect("room never reached MATCHED");
        prop_assert_eq!(matched["matched_item_id"].as_i64().unwrap(), item_id);

        let stats: serde_json::Value = instance.client.get("/api/v1/stats").dispatch().into_json().unwrap();
        prop_assert_eq!(stats["matches_notified"].as_i64().unwrap(), 1);
    }

    /// Invariant 5: at most one Vote record per (room, user, item) — a
    /// repeated vote on the same item with a *different* decision is
    /// rejected; a repeat of the *same* decision is the documented
    /// idempotent-retry case and succeeds without writing a second record.
    #[test]
    fn prop_duplicate_vote_rejected_only_on_decision_change(first in prop::bool::ANY, second in prop::bool::ANY) {
        let instance = spin_up(vec![], 5, 500);
        let decision = |yes: bool| if yes { "YES" } else { "NO" };
        let res = instance.client
            .post("/api/v1/rooms")
            .header(ContentType::JSON)
            .body(r#"{"media_type":"MOVIE","genres":[],"name":"prop-dup","capacity":2,"created_by":"host"}"#)
            .dispatch();
        let body: serde_json::Value = res.into_json().unwrap();
        let room_id = body["room"]["id"].as_str().unwrap();
        let item_id = body["catalog"][0]["item_id"].as_i64().unwrap();

        let res = instance.client
            .post(format!("/api/v1/rooms/{room_id}/votes"))
            .header(ContentType::JSON)
            .body(format!(r#"{{"user_id":"host","item_id":{item_id},"decision":"{}"}}"#, decision(first)))
            .dispatch();
        prop_assert_eq!(res.status(), Status::Ok);

        let res = instance.client
            .post(format!("/api/v1/rooms/{room_id}/votes"))
            .header(ContentType::JSON)
            .body(format!(r#"{{"user_id":"host","item_id":{item_id},"decision":"{}"}}"#, decision(second)))
            .dispatch();
        if first == second {
            prop_assert_eq!(res.status(), Status::Ok);
        } else {
            prop_assert_eq!(res.status(), Status::Conflict);
        }
    }
}

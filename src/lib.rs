pub mod catalog;
pub mod config;
pub mod consensus;
pub mod deadline;
pub mod error;
pub mod events;
pub mod metadata_client;
pub mod models;
pub mod notify;
pub mod pool_builder;
pub mod rate_limit;
pub mod retention;
pub mod routes;
pub mod storage;

use catalog::BatchCache;
use config::EngineConfig;
use events::EventBus;
use metadata_client::{MetadataProvider, TmdbClient};
use notify::Notifier;
use rate_limit::RateLimiter;
use rocket_cors::CorsOptions;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use storage::Storage;

pub fn engine() -> rocket::Rocket<rocket::Build> {
    let db_path = env::var("DATABASE_PATH").unwrap_or_else(|_| "data/swipe.db".to_string());
    engine_with_storage_and_config(&db_path, EngineConfig::from_env())
}

pub fn engine_with_config(db_path: &str, config: EngineConfig) -> rocket::Rocket<rocket::Build> {
    engine_with_storage_and_config(db_path, config)
}

/// Test-friendly entrypoint: caller picks the database path, config is
/// already assembled (tests typically override `metadata` with fixture
/// credentials and short TTLs).
pub fn engine_with_storage_and_config(
    db_path: &str,
    config: EngineConfig,
) -> rocket::Rocket<rocket::Build> {
    let provider: Arc<dyn MetadataProvider> = Arc::new(TmdbClient::new(config.metadata.clone()));
    engine_with_storage_config_and_provider(db_path, config, provider)
}

/// Same as `engine_with_storage_and_config` but with an injectable
/// metadata provider — the seam the test suite uses to swap in a
/// `FixtureProvider` instead of talking to a real TMDB endpoint.
pub fn engine_with_storage_config_and_provider(
    db_path: &str,
    config: EngineConfig,
    provider: Arc<dyn MetadataProvider>,
) -> rocket::Rocket<rocket::Build> {
    if let Some(parent) = std::path::Path::new(db_path).parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let storage = Arc::new(Storage::new(db_path));
    let events = Arc::new(EventBus::new());
    let rate_limiter = RateLimiter::new();
    let batch_cache = BatchCache::default();
    let notifier = Arc::new(Notifier::new(
        config.match_webhook_url.clone(),
        config.match_webhook_secret.clone(),
    ));

    let cors = CorsOptions::default()
        .to_cors()
        .expect("Failed to create CORS");

    let sweep_storage = storage.clone();
    let sweep_events = events.clone();
    let sweep_interval = Duration::from_secs(config.retention_sweep_secs);

    let consensus_storage = storage.clone();
    let consensus_events = events.clone();
    let consensus_notifier = notifier.clone();
    let consensus_interval = Duration::from_millis(config.consensus_poll_ms);
    let consensus_batch_size = config.consensus_batch_size;

    rocket::build()
        .manage(storage)
        .manage(events)
        .manage(config)
        .manage(rate_limiter)
        .manage(batch_cache)
        .manage(provider)
        .manage(notifier)
        .attach(cors)
        .register(
            "/",
            rocket::catchers![routes::too_many_requests, routes::not_found],
        )
        .mount(
            "/",
            rocket::routes![
                routes::health,
                routes::stats,
                routes::create_room,
                routes::get_room,
                routes::join_room,
                routes::next_item,
                routes::progress,
                routes::cast_vote,
                routes::room_events,
            ],
        )
        .attach(rocket::fairing::AdHoc::on_liftoff(
            "Room Expiry Sweep",
            move |_rocket| {
                Box::pin(async move {
                    retention::spawn_expiry_sweep(sweep_storage, sweep_events, sweep_interval);
                    println!("room expiry sweep started");
                })
            },
        ))
        .attach(rocket::fairing::AdHoc::on_liftoff(
            "Vote Consensus Poller",
            move |_rocket| {
                Box::pin(async move {
                    consensus::spawn_consensus_poller(
                        consensus_storage,
                        consensus_events,
                        consensus_notifier,
                        consensus_interval,
                        consensus_batch_size,
                    );
                    println!("vote consensus poller started");
                })
            },
        ))
}

use crate::metadata_client::MetadataClientConfig;

/// Single options struct covering every tunable the engine exposes,
/// assembled once at startup. Mirrors the teacher's `RateLimitConfig::from_env`
/// shape: one env var per field, a sane default when unset.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub catalog_size: usize,
    pub catalog_batch_size: i64,
    pub max_genres: usize,
    pub min_overview_len: usize,
    pub max_discover_pages_per_tier: u32,
    pub inappropriate_keywords: Vec<String>,
    pub room_ttl_hours: i64,
    pub retention_sweep_secs: u64,
    pub consensus_poll_ms: u64,
    pub consensus_batch_size: i64,
    pub metadata: MetadataClientConfig,
    pub match_webhook_url: Option<String>,
    pub match_webhook_secret: Option<String>,
    pub create_room_rate_limit_per_min: u32,
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let inappropriate_keywords = std::env::var("SWIPE_BLOCKED_KEYWORDS")
            .ok()
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let metadata = MetadataClientConfig {
            api_key: env_string("TMDB_API_KEY", ""),
            base_url: env_string("TMDB_BASE_URL", "https://api.themoviedb.org/3"),
            western_languages: env_string("SWIPE_WESTERN_LANGUAGES", "en,es,fr,it,de,pt")
                .split(',')
                .map(String::from)
                .collect(),
            min_vote_count: env_i64("SWIPE_MIN_VOTE_COUNT", 50),
            min_release_year: env_i64("SWIPE_MIN_RELEASE_YEAR", 1990),
            rate_limit_ms_per_call: env_u64("TMDB_RATE_LIMIT_MS", 250),
            retry_base_ms: env_u64("TMDB_RETRY_BASE_MS", 1000),
            retry_max_ms: env_u64("TMDB_RETRY_MAX_MS", 30_000),
            retry_max_attempts: env_u32("TMDB_RETRY_MAX_ATTEMPTS", 3),
            circuit_failure_threshold: env_u32("TMDB_CIRCUIT_FAILURE_THRESHOLD", 5),
            circuit_reset_ms: env_u64("TMDB_CIRCUIT_RESET_MS", 60_000),
        };

        Self {
            catalog_size: env_usize("SWIPE_CATALOG_SIZE", 50),
            catalog_batch_size: env_i64("SWIPE_CATALOG_BATCH_SIZE", 10),
            max_genres: env_usize("SWIPE_MAX_GENRES", 2),
            min_overview_len: env_usize("SWIPE_MIN_OVERVIEW_LEN", 20),
            max_discover_pages_per_tier: env_u32("SWIPE_MAX_DISCOVER_PAGES_PER_TIER", 20),
            inappropriate_keywords,
            room_ttl_hours: env_i64("SWIPE_ROOM_TTL_HOURS", 24),
            retention_sweep_secs: env_u64("SWIPE_RETENTION_SWEEP_SECS", 60),
            consensus_poll_ms: env_u64("SWIPE_CONSENSUS_POLL_MS", 500),
            consensus_batch_size: env_i64("SWIPE_CONSENSUS_BATCH_SIZE", 100),
            metadata,
            match_webhook_url: std::env::var("SWIPE_MATCH_WEBHOOK_URL").ok(),
            match_webhook_secret: std::env::var("SWIPE_MATCH_WEBHOOK_SECRET").ok(),
            create_room_rate_limit_per_min: env_u32("SWIPE_CREATE_ROOM_RATE_LIMIT", 10),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

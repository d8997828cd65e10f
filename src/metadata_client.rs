use crate::error::{EngineError, EngineResult};
use crate::models::MediaType;
use backoff::backoff::Backoff;
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use governor::state::{InMemoryState, NotKeyed};
use governor::clock::DefaultClock;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One raw candidate as returned by the provider, before the quality gate
/// ever looks at it. Both movie- and TV-shaped fields are optional so the
/// Pool Builder can detect cross-type contamination (§4.3 endpoint
/// enforcement) instead of the client silently coercing one shape into
/// the other.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCandidate {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub original_language: String,
    #[serde(default)]
    pub genre_ids: Vec<i64>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: i64,
    #[serde(default)]
    pub adult: bool,
}

#[derive(Debug, Clone)]
pub struct DiscoverPage {
    pub results: Vec<RawCandidate>,
    pub page: u32,
    pub total_pages: u32,
}

/// ALL(genres) / ANY(genres) / NONE — mirrors the Pool Builder's three tiers.
#[derive(Debug, Clone)]
pub enum GenreExpression {
    All(Vec<i64>),
    Any(Vec<i64>),
    None,
}

/// Narrow contract the Pool Builder depends on. The concrete `TmdbClient`
/// is the only thing in the crate that ever speaks HTTP to the provider;
/// tests inject a `FixtureProvider` instead (see tests/support).
#[rocket::async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn discover(
        &self,
        media_type: MediaType,
        genre_expression: &GenreExpression,
        page: u32,
    ) -> EngineResult<DiscoverPage>;

    async fn genres_for(&self, media_type: MediaType) -> EngineResult<Vec<i64>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Hand-rolled — no breaker crate appears anywhere in the retrieved
/// pack (checked guts, aptos-core, lockframe, substrate-archive), so
/// this is the one piece of flow control built from scratch rather
/// than borrowed from an ecosystem crate.
struct CircuitBreaker {
    state: Mutex<CircuitState>,
    failure_count: AtomicU32,
    opened_at_millis: AtomicU64,
    failure_threshold: u32,
    reset: Duration,
    epoch: Instant,
}

impl CircuitBreaker {
    fn new(failure_threshold: u32, reset: Duration) -> Self {
        Self {
            state: Mutex::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            opened_at_millis: AtomicU64::new(0),
            failure_threshold,
            reset,
            epoch: Instant::now(),
        }
    }

    fn allow(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        match *state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let opened_at = self.opened_at_millis.load(Ordering::Relaxed);
                let elapsed = self.epoch.elapsed().as_millis() as u64;
                if elapsed.saturating_sub(opened_at) >= self.reset.as_millis() as u64 {
                    *state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    fn record_success(&self) {
        let mut state = self.state.lock().unwrap();
        if *state != CircuitState::Closed {
            println!("metadata client: circuit breaker closing after probe success");
        }
        *state = CircuitState::Closed;
        self.failure_count.store(0, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == CircuitState::HalfOpen {
            *state = CircuitState::Open;
            self.opened_at_millis
                .store(self.epoch.elapsed().as_millis() as u64, Ordering::Relaxed);
            eprintln!("metadata client: circuit breaker re-opened after failed probe");
            return;
        }
        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        if *state == CircuitState::Closed && failures >= self.failure_threshold {
            *state = CircuitState::Open;
            self.opened_at_millis
                .store(self.epoch.elapsed().as_millis() as u64, Ordering::Relaxed);
            eprintln!(
                "metadata client: circuit breaker opened after {} consecutive failures",
                failures
            );
        }
    }
}

/// Configuration the concrete client is built from. Mirrors the options
/// §6 of the specification names for the outbound call surface.
#[derive(Debug, Clone)]
pub struct MetadataClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub western_languages: Vec<String>,
    pub min_vote_count: i64,
    pub min_release_year: i64,
    pub rate_limit_ms_per_call: u64,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
    pub retry_max_attempts: u32,
    pub circuit_failure_threshold: u32,
    pub circuit_reset_ms: u64,
}

impl Default for MetadataClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.themoviedb.org/3".to_string(),
            western_languages: vec!["en", "es", "fr", "it", "de", "pt"]
                .into_iter()
                .map(String::from)
                .collect(),
            min_vote_count: 50,
            min_release_year: 1990,
            rate_limit_ms_per_call: 250,
            retry_base_ms: 1000,
            retry_max_ms: 30_000,
            retry_max_attempts: 3,
            circuit_failure_threshold: 5,
            circuit_reset_ms: 60_000,
        }
    }
}

/// Movie-domain genre id -> TV-domain genre id, applied only when the
/// caller's media type is TV. Ids not present here pass through
/// unchanged (§4.2).
fn normalize_genre_for_tv(genre_id: i64) -> i64 {
    match genre_id {
        28 => 10759,  // Action -> Action & Adventure
        12 => 10759,  // Adventure -> Action & Adventure
        10752 => 10768, // War -> War & Politics
        other => other,
    }
}

pub struct TmdbClient {
    http: reqwest::Client,
    config: MetadataClientConfig,
    rate_limiter: GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    circuit: CircuitBreaker,
    /// Width-one concurrency permit (§4.2, §5): serializes every outbound
    /// call on this instance so at most one HTTP request is ever in
    /// flight, even when multiple rooms are built concurrently across
    /// handlers sharing this same `Arc<TmdbClient>`. `governor` above only
    /// throttles the *rate* new calls are allowed to start; this is what
    /// actually bounds concurrency to one.
    concurrency: tokio::sync::Semaphore,
}

impl TmdbClient {
    pub fn new(config: MetadataClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        let per_millis = config.rate_limit_ms_per_call.max(1);
        let per_second = (1000 / per_millis).max(1) as u32;
        let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap());
        let rate_limiter = GovernorRateLimiter::direct(quota);

        let circuit = CircuitBreaker::new(
            config.circuit_failure_threshold,
            Duration::from_millis(config.circuit_reset_ms),
        );

        Self {
            http,
            config,
            rate_limiter,
            circuit,
            concurrency: tokio::sync::Semaphore::new(1),
        }
    }

    fn normalize_genres(&self, media_type: MediaType, genres: &[i64]) -> Vec<i64> {
        match media_type {
            MediaType::Movie => genres.to_vec(),
            MediaType::Tv => genres.iter().copied().map(normalize_genre_for_tv).collect(),
        }
    }

    async fn send_with_retry(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> EngineResult<serde_json::Value> {
        // Held for the whole call, retries included, so only one outbound
        // request to the provider is ever in flight on this instance.
        let _permit = self
            .concurrency
            .acquire()
            .await
            .expect("concurrency semaphore is never closed");

        if !self.circuit.allow() {
            return Err(EngineError::UpstreamUnavailable);
        }

        let mut backoff = backoff::ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.config.retry_base_ms))
            .with_max_interval(Duration::from_millis(self.config.retry_max_ms))
            .with_max_elapsed_time(Some(Duration::from_millis(
                self.config.retry_max_ms * self.config.retry_max_attempts as u64,
            )))
            .build();

        let mut attempt = 0u32;
        loop {
            self.rate_limiter.until_ready().await;
            attempt += 1;

            let result = build().send().await;
            match result {
                Ok(resp) if resp.status().is_success() => {
                    self.circuit.record_success();
                    return resp
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| EngineError::Transient(e.to_string()));
                }
                Ok(resp) if resp.status().as_u16() == 429 => {
                    self.circuit.record_failure();
                    if attempt >= self.config.retry_max_attempts {
                        return Err(EngineError::Transient("rate limited by provider".into()));
                    }
                    match backoff.next_backoff() {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => return Err(EngineError::Transient("rate limited by provider".into())),
                    }
                }
                Ok(resp) => {
                    self.circuit.record_failure();
                    return Err(EngineError::Transient(format!(
                        "provider returned HTTP {}",
                        resp.status()
                    )));
                }
                Err(e) => {
                    self.circuit.record_failure();
                    if attempt >= self.config.retry_max_attempts {
                        return Err(EngineError::Transient(e.to_string()));
                    }
                    match backoff.next_backoff() {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => return Err(EngineError::Transient(e.to_string())),
                    }
                }
            }
        }
    }
}

#[rocket::async_trait]
impl MetadataProvider for TmdbClient {
    async fn discover(
        &self,
        media_type: MediaType,
        genre_expression: &GenreExpression,
        page: u32,
    ) -> EngineResult<DiscoverPage> {
        let endpoint = match media_type {
            MediaType::Movie => "discover/movie",
            MediaType::Tv => "discover/tv",
        };
        let url = format!("{}/{}", self.config.base_url, endpoint);
        let lang_csv = self.config.western_languages.join("|");
        let min_year = self.config.min_release_year;

        let genres_param = match genre_expression {
            GenreExpression::All(g) => Some(self.normalize_genres(media_type, g).iter().map(i64::to_string).collect::<Vec<_>>().join(",")),
            GenreExpression::Any(g) => Some(self.normalize_genres(media_type, g).iter().map(i64::to_string).collect::<Vec<_>>().join("|")),
            GenreExpression::None => None,
        };

        let body = self
            .send_with_retry(|| {
                let mut req = self
                    .http
                    .get(&url)
                    .query(&[
                        ("api_key", self.config.api_key.as_str()),
                        ("sort_by", "popularity.desc"),
                        ("include_adult", "false"),
                        ("page", &page.to_string()),
                        ("with_original_language", &lang_csv),
                        ("vote_count.gte", &self.config.min_vote_count.to_string()),
                    ]);
                if let Some(ref g) = genres_param {
                    req = req.query(&[("with_genres", g.as_str())]);
                }
                req = match media_type {
                    MediaType::Movie => req.query(&[("release_date.gte", format!("{min_year}-01-01"))]),
                    MediaType::Tv => req.query(&[
                        ("first_air_date.gte", format!("{min_year}-01-01")),
                        ("with_status", "0|2|3|4|5".to_string()),
                    ]),
                };
                req
            })
            .await?;

        let results: Vec<RawCandidate> = body
            .get("results")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let page_no = body.get("page").and_then(|v| v.as_u64()).unwrap_or(page as u64) as u32;
        let total_pages = body.get("total_pages").and_then(|v| v.as_u64()).unwrap_or(1) as u32;

        Ok(DiscoverPage {
            results,
            page: page_no,
            total_pages,
        })
    }

    async fn genres_for(&self, media_type: MediaType) -> EngineResult<Vec<i64>> {
        let endpoint = match media_type {
            MediaType::Movie => "genre/movie/list",
            MediaType::Tv => "genre/tv/list",
        };
        let url = format!("{}/{}", self.config.base_url, endpoint);
        let body = self
            .send_with_retry(|| {
                self.http
                    .get(&url)
                    .query(&[("api_key", self.config.api_key.as_str())])
            })
            .await?;

        let genres: Vec<i64> = body
            .get("genres")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|g| g.get("id").and_then(|id| id.as_i64()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(genres)
    }
}

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::metadata_client::{DiscoverPage, GenreExpression, MetadataProvider, RawCandidate};
use crate::models::{CatalogEntry, MediaType};
use std::collections::HashSet;

/// Candidate titles the quality gate rejects outright regardless of any
/// other signal. Real metadata providers occasionally backfill missing
/// synopses with one of these stock phrases instead of leaving the
/// field empty.
const PLACEHOLDER_OVERVIEWS: &[&str] = &[
    "no overview found.",
    "no overview",
    "tba",
    "to be announced",
    "plot unknown.",
    "overview not available.",
];

/// Priority tier a candidate was accepted under. Lower is better; the
/// final catalog is stable-sorted by this value and then by the
/// provider's own popularity ordering within a tier, so re-running the
/// build against the same provider snapshot always yields the same
/// sequence (no shuffle — see DESIGN.md's Open Questions section).
/// Numeric values match the persisted `priority` field directly
/// (1..=3, per the data model's `priority ∈ {1,2,3}` invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    AllGenres = 1,
    AnyGenre = 2,
    Popular = 3,
}

/// Endpoint-enforcement check (§4.3): a candidate carrying the other
/// media type's shape is a contract violation by the provider, not a
/// quality signal, so it's rejected unconditionally before the rest of
/// the gate ever runs.
fn is_cross_type_contaminated(candidate: &RawCandidate, media_type: MediaType) -> bool {
    match media_type {
        MediaType::Movie => candidate.name.is_some() || candidate.first_air_date.is_some(),
        MediaType::Tv => candidate.title.is_some() || candidate.release_date.is_some(),
    }
}

fn quality_gate(candidate: &RawCandidate, media_type: MediaType, config: &EngineConfig) -> bool {
    if is_cross_type_contaminated(candidate, media_type) {
        return false;
    }
    if candidate.adult {
        return false;
    }
    if candidate.overview.trim().len() < config.min_overview_len {
        return false;
    }
    let lowered = candidate.overview.trim().to_lowercase();
    if PLACEHOLDER_OVERVIEWS.contains(&lowered.as_str()) {
        return false;
    }
    if candidate.poster_path.as_deref().unwrap_or("").is_empty() {
        return false;
    }
    if !config.metadata.western_languages.contains(&candidate.original_language) {
        return false;
    }
    if candidate.genre_ids.is_empty() {
        return false;
    }
    if candidate.vote_average < 0.0 {
        return false;
    }
    let title = match media_type {
        MediaType::Movie => candidate.title.as_deref().unwrap_or(""),
        MediaType::Tv => candidate.name.as_deref().unwrap_or(""),
    };
    if title.trim().is_empty() {
        return false;
    }
    let date = match media_type {
        MediaType::Movie => candidate.release_date.as_deref().unwrap_or(""),
        MediaType::Tv => candidate.first_air_date.as_deref().unwrap_or(""),
    };
    if date.trim().is_empty() {
        return false;
    }
    for kw in &config.inappropriate_keywords {
        if lowered.contains(kw.as_str()) || title.to_lowercase().contains(kw.as_str()) {
            return false;
        }
    }
    true
}

fn title_of(candidate: &RawCandidate, media_type: MediaType) -> String {
    match media_type {
        MediaType::Movie => candidate.title.clone().unwrap_or_default(),
        MediaType::Tv => candidate.name.clone().unwrap_or_default(),
    }
}

fn release_date_of(candidate: &RawCandidate, media_type: MediaType) -> Option<String> {
    match media_type {
        MediaType::Movie => candidate.release_date.clone(),
        MediaType::Tv => candidate.first_air_date.clone(),
    }
}

fn genre_overlap_any(candidate_genres: &[i64], wanted: &[i64]) -> bool {
    wanted.iter().any(|g| candidate_genres.contains(g))
}

fn genre_overlap_all(candidate_genres: &[i64], wanted: &[i64]) -> bool {
    wanted.iter().all(|g| candidate_genres.contains(g))
}

/// Pulls pages from the provider for a single tier until either `want`
/// more accepted candidates are found, the dedup set stops growing for
/// a full page, or the provider runs out of pages.
async fn collect_tier(
    provider: &dyn MetadataProvider,
    media_type: MediaType,
    genre_expression: &GenreExpression,
    config: &EngineConfig,
    seen: &mut HashSet<i64>,
    want: usize,
) -> EngineResult<Vec<RawCandidate>> {
    let mut accepted = Vec::new();
    let mut page = 1u32;
    loop {
        let DiscoverPage {
            results,
            total_pages,
            ..
        } = provider.discover(media_type, genre_expression, page).await?;

        let mut gained_any = false;
        for candidate in results {
            if seen.contains(&candidate.id) {
                continue;
            }
            let matches_tier = match genre_expression {
                GenreExpression::All(g) => genre_overlap_all(&candidate.genre_ids, g),
                GenreExpression::Any(g) => genre_overlap_any(&candidate.genre_ids, g),
                GenreExpression::None => true,
            };
            if !matches_tier {
                continue;
            }
            if !quality_gate(&candidate, media_type, config) {
                continue;
            }
            seen.insert(candidate.id);
            accepted.push(candidate);
            gained_any = true;
            if accepted.len() >= want {
                return Ok(accepted);
            }
        }

        if !gained_any || page >= total_pages || page >= config.max_discover_pages_per_tier {
            break;
        }
        page += 1;
    }
    Ok(accepted)
}

/// Builds a room's fixed catalog: tries ALL requested genres first, then
/// ANY of them, then falls back to an unfiltered popular pool, stopping
/// as soon as `config.catalog_size` candidates have cleared the quality
/// gate. Returns `InsufficientContent` without persisting anything if
/// even the popular fallback comes up short — partial catalogs are
/// never written (see DESIGN.md).
pub async fn build_catalog(
    provider: &dyn MetadataProvider,
    room_id: &str,
    media_type: MediaType,
    genres: &[i64],
    config: &EngineConfig,
) -> EngineResult<Vec<CatalogEntry>> {
    let want = config.catalog_size;
    let mut seen: HashSet<i64> = HashSet::new();
    let mut tiered: Vec<(Tier, RawCandidate)> = Vec::new();

    if !genres.is_empty() {
        let remaining = want.saturating_sub(tiered.len());
        if remaining > 0 {
            let all = collect_tier(
                provider,
                media_type,
                &GenreExpression::All(genres.to_vec()),
                config,
                &mut seen,
                remaining,
            )
            .await?;
            tiered.extend(all.into_iter().map(|c| (Tier::AllGenres, c)));
        }
    }

    if !genres.is_empty() {
        let remaining = want.saturating_sub(tiered.len());
        if remaining > 0 {
            let any = collect_tier(
                provider,
                media_type,
                &GenreExpression::Any(genres.to_vec()),
                config,
                &mut seen,
                remaining,
            )
            .await?;
            tiered.extend(any.into_iter().map(|c| (Tier::AnyGenre, c)));
        }
    }

    let remaining = want.saturating_sub(tiered.len());
    if remaining > 0 {
        let popular = collect_tier(
            provider,
            media_type,
            &GenreExpression::None,
            config,
            &mut seen,
            remaining,
        )
        .await?;
        tiered.extend(popular.into_iter().map(|c| (Tier::Popular, c)));
    }

    if tiered.len() < want {
        return Err(EngineError::InsufficientContent {
            found: tiered.len(),
            needed: want,
        });
    }

    tiered.truncate(want);
    tiered.sort_by_key(|(tier, _)| *tier);

    let entries = tiered
        .into_iter()
        .enumerate()
        .map(|(idx, (tier, candidate))| CatalogEntry {
            room_id: room_id.to_string(),
            sequence_index: idx as i64,
            item_id: candidate.id,
            title: title_of(&candidate, media_type),
            overview: candidate.overview,
            poster_path: candidate.poster_path,
            release_date: release_date_of(&candidate, media_type),
            original_language: candidate.original_language,
            genre_ids: candidate.genre_ids,
            vote_average: candidate.vote_average,
            priority: tier as i64,
        })
        .collect();

    Ok(entries)
}

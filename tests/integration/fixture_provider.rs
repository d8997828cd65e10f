use swipe_engine::error::EngineResult;
use swipe_engine::metadata_client::{DiscoverPage, GenreExpression, MetadataProvider, RawCandidate};
use swipe_engine::models::MediaType;

/// Deterministic metadata double. `abundant()` hands back more than
/// enough candidates to fill any catalog the tests build; `scarce()`
/// caps out at three, deliberately not enough, to exercise the
/// insufficient-content failure path.
pub struct FixtureProvider {
    count: usize,
}

impl FixtureProvider {
    pub fn abundant() -> Self {
        Self { count: 200 }
    }

    pub fn scarce() -> Self {
        Self { count: 3 }
    }
}

fn candidate(id: i64, media_type: MediaType) -> RawCandidate {
    let (title, release_date, name, first_air_date) = match media_type {
        MediaType::Movie => (Some(format!("Fixture Title {id}")), Some("2015-06-01".to_string()), None, None),
        MediaType::Tv => (None, None, Some(format!("Fixture Title {id}")), Some("2015-06-01".to_string())),
    };
    RawCandidate {
        id,
        title,
        release_date,
        name,
        first_air_date,
        overview: format!(
            "This is a sufficiently long synopsis for fixture entry number {id} so it clears the quality gate."
        ),
        poster_path: Some(format!("/poster{id}.jpg")),
        original_language: "en".to_string(),
        genre_ids: vec![28, 12],
        vote_average: 7.5,
        vote_count: 500,
        adult: false,
    }
}

#[rocket::async_trait]
impl MetadataProvider for FixtureProvider {
    async fn discover(
        &self,
        media_type: MediaType,
        _genre_expression: &GenreExpression,
        page: u32,
    ) -> EngineResult<DiscoverPage> {
        if page > 1 {
            return Ok(DiscoverPage {
                results: vec![],
                page,
                total_pages: 1,
            });
        }
        let results = (1..=self.count as i64)
            .map(|id| candidate(id, media_type))
            .collect();
        Ok(DiscoverPage {
            results,
            page: 1,
            total_pages: 1,
        })
    }

    async fn genres_for(&self, _media_type: MediaType) -> EngineResult<Vec<i64>> {
        Ok(vec![28, 12, 35, 18])
    }
}

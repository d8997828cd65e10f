use crate::catalog::{self, BatchCache};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::models::{NextItemResponse, ProgressResponse};
use crate::storage::Storage;
use rocket::serde::json::Json;
use rocket::{get, State};
use std::sync::Arc;

#[get("/api/v1/rooms/<room_id>/next?<user_id>")]
pub fn next_item(
    room_id: &str,
    user_id: &str,
    storage: &State<Arc<Storage>>,
    cache: &State<BatchCache>,
    config: &State<EngineConfig>,
) -> EngineResult<Json<NextItemResponse>> {
    Ok(Json(catalog::next_for(
        storage,
        cache,
        config.catalog_batch_size.max(1),
        room_id,
        user_id,
    )?))
}

#[get("/api/v1/rooms/<room_id>/progress?<user_id>")]
pub fn progress(
    room_id: &str,
    user_id: &str,
    storage: &State<Arc<Storage>>,
) -> EngineResult<Json<ProgressResponse>> {
    Ok(Json(catalog::progress(storage, room_id, user_id)?))
}

use crate::consensus;
use crate::deadline;
use crate::error::EngineResult;
use crate::models::{VoteRequest, VoteResponse};
use crate::storage::Storage;
use rocket::serde::json::Json;
use rocket::{post, State};
use std::sync::Arc;
use std::time::Duration;

const VOTE_WRITE_DEADLINE: Duration = Duration::from_secs(2);

/// Durably records the vote and hands back a bare acknowledgement; the
/// MATCHED transition and its notification are entirely the background
/// consensus poller's job (§4.5) — a client watches for the match via
/// `subscribeRoomEvents` or by polling `progress`/the room resource.
#[post("/api/v1/rooms/<room_id>/votes", data = "<body>")]
pub async fn cast_vote(
    room_id: &str,
    body: Json<VoteRequest>,
    storage: &State<Arc<Storage>>,
) -> EngineResult<Json<VoteResponse>> {
    deadline::enforce(VOTE_WRITE_DEADLINE, async {
        let now = chrono::Utc::now().to_rfc3339();
        let response = consensus::submit_vote(storage, room_id, &body.user_id, &body.0, &now)?;
        Ok(Json(response))
    })
    .await
}

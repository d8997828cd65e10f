use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus};
use crate::storage::Storage;
use rocket::response::stream::{Event, EventStream};
use rocket::{get, State};
use std::sync::Arc;
use tokio::time::{interval, Duration};

/// Best-effort live feed for a single room: member joins, the VOTING
/// transition, MATCHED, and expiry. No replay buffer — a client that
/// reconnects falls back to `progress`/`nextItem` to re-derive where it
/// left off, since those reads are cheap and idempotent.
#[get("/api/v1/rooms/<room_id>/stream?<user_id>")]
pub fn room_events(
    room_id: &str,
    user_id: &str,
    events: &State<Arc<EventBus>>,
    storage: &State<Arc<Storage>>,
) -> EngineResult<EventStream![]> {
    if !storage.is_member(room_id, user_id)? {
        return Err(EngineError::NotMember);
    }

    let mut rx = events.sender.subscribe();
    let room_id = room_id.to_string();

    Ok(EventStream! {
        let mut heartbeat = interval(Duration::from_secs(15));
        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Ok(EngineEvent::MemberJoined { room_id: ref rid, ref user_id, member_count }) if *rid == room_id => {
                            yield Event::json(&serde_json::json!({"user_id": user_id, "member_count": member_count})).event("member_joined");
                        }
                        Ok(EngineEvent::RoomVotingStarted { room_id: ref rid }) if *rid == room_id => {
                            yield Event::json(&serde_json::json!({"room_id": rid})).event("voting_started");
                        }
                        Ok(EngineEvent::Matched(ref m)) if m.room_id == room_id => {
                            yield Event::json(m).event("matched");
                        }
                        Ok(EngineEvent::RoomExpired { room_id: ref rid }) if *rid == room_id => {
                            yield Event::json(&serde_json::json!({"room_id": rid})).event("room_expired");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        _ => {} // different room or lagged
                    }
                }
                _ = heartbeat.tick() => {
                    let now = chrono::Utc::now().to_rfc3339();
                    yield Event::json(&serde_json::json!({"time": now})).event("heartbeat");
                }
            }
        }
    })
}

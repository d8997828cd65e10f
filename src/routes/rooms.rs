use crate::config::EngineConfig;
use crate::deadline;
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus};
use crate::metadata_client::MetadataProvider;
use crate::models::{CreateRoomRequest, CreateRoomResponse, JoinRoomRequest, Room, RoomStatus};
use crate::pool_builder;
use crate::rate_limit::RateLimiter;
use crate::routes::ClientIp;
use crate::storage::Storage;
use rocket::serde::json::Json;
use rocket::{get, post, State};
use std::sync::Arc;
use std::time::Duration;

const MIN_CAPACITY: i64 = 2;
const MAX_CAPACITY: i64 = 12;
const CREATE_ROOM_DEADLINE: Duration = Duration::from_secs(60);

fn validate_create(req: &CreateRoomRequest, config: &EngineConfig) -> EngineResult<()> {
    if req.name.trim().is_empty() || req.name.len() > 100 {
        return Err(EngineError::Validation(
            "name must be 1-100 characters".into(),
        ));
    }
    if req.capacity < MIN_CAPACITY || req.capacity > MAX_CAPACITY {
        return Err(EngineError::Validation(format!(
            "capacity must be between {} and {}",
            MIN_CAPACITY, MAX_CAPACITY
        )));
    }
    if req.genres.len() > config.max_genres {
        return Err(EngineError::Validation(format!(
            "at most {} genres allowed",
            config.max_genres
        )));
    }
    if req.created_by.trim().is_empty() {
        return Err(EngineError::Validation("created_by is required".into()));
    }
    Ok(())
}

#[post("/api/v1/rooms", data = "<body>")]
pub async fn create_room(
    body: Json<CreateRoomRequest>,
    storage: &State<Arc<Storage>>,
    config: &State<EngineConfig>,
    provider: &State<Arc<dyn MetadataProvider>>,
    events: &State<Arc<EventBus>>,
    rate_limiter: &State<RateLimiter>,
    ip: ClientIp,
) -> EngineResult<Json<CreateRoomResponse>> {
    if !rate_limiter.check(
        &format!("create_room:{}", ip.0),
        config.create_room_rate_limit_per_min as usize,
        60,
    ) {
        return Err(EngineError::Transient("rate limited".into()));
    }

    deadline::enforce(
        CREATE_ROOM_DEADLINE,
        create_room_inner(body, storage, config, provider, events),
    )
    .await
}

async fn create_room_inner(
    body: Json<CreateRoomRequest>,
    storage: &State<Arc<Storage>>,
    config: &State<EngineConfig>,
    provider: &State<Arc<dyn MetadataProvider>>,
    events: &State<Arc<EventBus>>,
) -> EngineResult<Json<CreateRoomResponse>> {
    validate_create(&body, config)?;

    let catalog = pool_builder::build_catalog(
        provider.as_ref().as_ref(),
        "pending",
        body.media_type,
        &body.genres,
        config,
    )
    .await?;

    let room_id = uuid::Uuid::new_v4().to_string();
    let invite_code = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
    let now = chrono::Utc::now();
    let expires_at = now + chrono::Duration::hours(config.room_ttl_hours);

    storage.create_room(
        &room_id,
        body.name.trim(),
        &invite_code,
        body.media_type,
        &body.genres,
        body.capacity,
        &now.to_rfc3339(),
        &expires_at.to_rfc3339(),
    )?;

    let catalog: Vec<_> = catalog
        .into_iter()
        .map(|mut e| {
            e.room_id = room_id.clone();
            e
        })
        .collect();

    if let Err(e) = storage.insert_catalog_entries(&catalog) {
        storage.delete_room(&room_id).ok();
        return Err(e);
    }

    let room = match storage.join_room(&room_id, &body.created_by, &now.to_rfc3339()) {
        Ok(room) => room,
        Err(e) => {
            storage.delete_room(&room_id).ok();
            return Err(e);
        }
    };

    events.publish(EngineEvent::MemberJoined {
        room_id: room_id.clone(),
        user_id: body.created_by.clone(),
        member_count: room.member_count,
    });

    Ok(Json(CreateRoomResponse { room, catalog }))
}

/// Ambient read endpoint: a client that just voted, or reconnected
/// after missing the `subscribeRoomEvents` stream, re-derives room
/// state this way instead of needing to replay the event bus.
#[get("/api/v1/rooms/<room_id>")]
pub fn get_room(room_id: &str, storage: &State<Arc<Storage>>) -> EngineResult<Json<Room>> {
    Ok(Json(storage.get_room(room_id)?))
}

fn resolve_room(storage: &Storage, req: &JoinRoomRequest) -> EngineResult<Room> {
    if let Some(ref code) = req.invite_code {
        return storage.get_room_by_invite_code(code);
    }
    if let Some(ref id) = req.room_id {
        return storage.get_room(id);
    }
    Err(EngineError::Validation(
        "either invite_code or room_id is required".into(),
    ))
}

#[post("/api/v1/rooms/join", data = "<body>")]
pub fn join_room(
    body: Json<JoinRoomRequest>,
    storage: &State<Arc<Storage>>,
    events: &State<Arc<EventBus>>,
) -> EngineResult<Json<Room>> {
    if body.user_id.trim().is_empty() {
        return Err(EngineError::Validation("user_id is required".into()));
    }
    let target = resolve_room(storage, &body)?;
    let now = chrono::Utc::now().to_rfc3339();
    let room = storage.join_room(&target.id, &body.user_id, &now)?;

    events.publish(EngineEvent::MemberJoined {
        room_id: room.id.clone(),
        user_id: body.user_id.clone(),
        member_count: room.member_count,
    });
    if room.status == RoomStatus::Voting && room.member_count == room.capacity {
        events.publish(EngineEvent::RoomVotingStarted {
            room_id: room.id.clone(),
        });
    }

    Ok(Json(room))
}

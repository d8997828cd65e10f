use crate::events::{EngineEvent, EventBus};
use crate::storage::Storage;
use std::sync::Arc;
use std::time::Duration;

/// Spawns a background task that periodically transitions rooms past
/// their TTL (WAITING or VOTING, `expires_at` in the past) to EXPIRED.
/// Shaped after the teacher's message-retention sweeper: a startup
/// delay, then a fixed-interval loop for the life of the process.
pub fn spawn_expiry_sweep(storage: Arc<Storage>, events: Arc<EventBus>, interval: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        loop {
            let now = chrono::Utc::now().to_rfc3339();
            match storage.expire_stale_rooms(&now) {
                Ok(ids) if !ids.is_empty() => {
                    eprintln!("room expiry sweep: expired {} stale rooms", ids.len());
                    for room_id in ids {
                        events.publish(EngineEvent::RoomExpired { room_id });
                    }
                }
                Ok(_) => {}
                Err(e) => eprintln!("room expiry sweep failed: {}", e),
            }
            tokio::time::sleep(interval).await;
        }
    });
}

use crate::models::MatchEvent;
use tokio::sync::broadcast;

/// Ephemeral, best-effort fan-out for live room updates. Unlike the
/// change feed this carries no durability guarantee — a subscriber that
/// isn't connected when an event fires simply never sees it, which is
/// fine since `subscribeRoomEvents` clients also poll `progress`/`nextItem`
/// on reconnect.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    MemberJoined { room_id: String, user_id: String, member_count: i64 },
    RoomVotingStarted { room_id: String },
    Matched(MatchEvent),
    RoomExpired { room_id: String },
}

pub struct EventBus {
    pub sender: broadcast::Sender<EngineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        EventBus { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: EngineEvent) {
        let _ = self.sender.send(event);
    }
}

use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus};
use crate::models::{MatchEvent, RoomStatus, VoteDecision, VoteRequest, VoteResponse};
use crate::notify::Notifier;
use crate::storage::{ChangeFeedRecord, Storage};
use std::sync::Arc;
use std::time::Duration;

/// Durable write side of a vote: membership, room-status, and
/// item-in-room checks, then the record itself (which also appends to
/// the change feed). This is the only thing the HTTP handler does —
/// tallying, the MATCHED transition, and notification are entirely the
/// background poller's job (§4.5), so the Vote store never calls back
/// into the consensus engine and the consensus engine never calls back
/// into the Vote store's write path. A retry of the caller's own prior
/// (room, user, item, decision) is idempotent — `record_vote` reports it
/// as `AlreadyRecordedSame` rather than erroring, and this still returns
/// the same acknowledgement; only a genuinely different decision on an
/// already-voted item surfaces `AlreadyVoted`.
pub fn submit_vote(
    storage: &Storage,
    room_id: &str,
    user_id: &str,
    request: &VoteRequest,
    now: &str,
) -> EngineResult<VoteResponse> {
    if !storage.is_member(room_id, user_id)? {
        return Err(EngineError::NotMember);
    }

    let room = storage.get_room(room_id)?;
    if room.status != RoomStatus::Voting {
        return Err(EngineError::RoomClosed);
    }

    if storage
        .get_catalog_entry_by_item(room_id, request.item_id)?
        .is_none()
    {
        return Err(EngineError::ItemNotInRoom);
    }

    storage.record_vote(room_id, user_id, request.item_id, request.decision, now)?;

    Ok(VoteResponse {
        acknowledged: true,
        matched_item_id: None,
    })
}

/// Spawns the background poller that is the sole consumer of the
/// change feed's vote records: a fixed-interval loop, shaped after the
/// teacher's `retention.rs` sleep loop, that drains new records in
/// order and only advances its persisted cursor past whatever it
/// successfully processed.
pub fn spawn_consensus_poller(
    storage: Arc<Storage>,
    events: Arc<EventBus>,
    notifier: Arc<Notifier>,
    interval: Duration,
    batch_size: i64,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = poll_once(&storage, &events, &notifier, batch_size) {
                eprintln!("consensus poller failed: {}", e);
            }
        }
    });
}

/// One poll tick: read the feed strictly after the persisted cursor,
/// process records in order, and stop at the first one that fails
/// transiently so it gets redelivered next tick instead of being
/// skipped over.
fn poll_once(storage: &Storage, events: &EventBus, notifier: &Notifier, batch_size: i64) -> EngineResult<()> {
    let cursor = storage.load_cursor()?;
    let batch = storage.poll_change_feed(cursor, batch_size)?;

    for record in &batch {
        match process_vote_record(storage, events, notifier, record) {
            Ok(()) => storage.save_cursor(record.seq)?,
            Err(EngineError::Transient(_)) | Err(EngineError::Timeout) => return Ok(()),
            Err(e) => {
                eprintln!(
                    "consensus poller: permanent error on change-feed record {} ({}) — skipping",
                    record.seq, e
                );
                storage.save_cursor(record.seq)?;
            }
        }
    }
    Ok(())
}

/// The per-vote pipeline from §4.5: drop if the room isn't VOTING, drop
/// NO decisions, bump the YES tally, and — only on the vote that tips
/// the tally to capacity — perform the single-shot MATCHED transition
/// and dispatch the notification. Replaying an already-matched room's
/// records is harmless: step 1 drops them before the tally is ever
/// touched again.
fn process_vote_record(
    storage: &Storage,
    events: &EventBus,
    notifier: &Notifier,
    record: &ChangeFeedRecord,
) -> EngineResult<()> {
    let room = match storage.get_room(&record.room_id) {
        Ok(room) => room,
        Err(EngineError::NotFound) => return Ok(()),
        Err(e) => return Err(e),
    };
    if room.status != RoomStatus::Voting {
        return Ok(());
    }
    if record.decision != VoteDecision::Yes {
        return Ok(());
    }

    let yes_count = storage.increment_yes_count(&record.room_id, record.item_id)?;
    if yes_count < room.capacity {
        return Ok(());
    }

    if !storage.try_transition_to_matched(&record.room_id, record.item_id)? {
        // Someone else's vote already tipped this room over.
        return Ok(());
    }

    let event = MatchEvent {
        room_id: record.room_id.clone(),
        item_id: record.item_id,
        matched_at: chrono::Utc::now().to_rfc3339(),
        capacity: room.capacity,
        notified: false,
    };
    storage.insert_match_event(&event)?;
    dispatch_match(storage, events, notifier, &record.room_id)
}

/// Flips the notified flag exactly once and, only if this call is the
/// one that flipped it, fires the outbound notification and the
/// in-process broadcast. A crash between the MATCHED transition and
/// the flip self-heals: the next poll tick replays the winning record,
/// finds `status = MATCHED` at step 1, and drops — so this function is
/// only ever reached once per room in practice, but stays idempotent
/// regardless.
fn dispatch_match(
    storage: &Storage,
    events: &EventBus,
    notifier: &Notifier,
    room_id: &str,
) -> EngineResult<()> {
    if storage.try_mark_notified(room_id)? {
        if let Some(event) = storage.get_match_event(room_id)? {
            notifier.notify_match(&event);
            events.publish(EngineEvent::Matched(event));
        }
    }
    Ok(())
}

use crate::error::{EngineError, EngineResult};
use crate::models::{
    CatalogEntry, MatchEvent, MediaType, Room, RoomStatus, VoteDecision,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

/// Result of `Storage::record_vote`: either the vote was newly written (and
/// appended to the change feed, returning its sequence number), or it was an
/// idempotent retry of the caller's own prior decision and nothing changed.
#[derive(Debug, Clone, Copy)]
pub enum VoteOutcome {
    Recorded(i64),
    AlreadyRecordedSame,
}

/// A single mutation record read off the append-only change feed.
#[derive(Debug, Clone)]
pub struct ChangeFeedRecord {
    pub seq: i64,
    pub room_id: String,
    pub user_id: String,
    pub item_id: i64,
    pub decision: VoteDecision,
}

/// Mediates all durable state behind a small set of operations
/// (get / putConditional / incrementCounter / rangeGet / indexQuery /
/// subscribeChangeFeed) over one mutex-guarded SQLite connection. Every
/// write path in the engine goes through this type; no other module
/// touches `rusqlite` directly.
pub struct Storage {
    pub conn: Mutex<Connection>,
}

fn room_status_from_str(s: &str) -> RoomStatus {
    match s {
        "WAITING" => RoomStatus::Waiting,
        "VOTING" => RoomStatus::Voting,
        "MATCHED" => RoomStatus::Matched,
        _ => RoomStatus::Expired,
    }
}

fn media_type_str(m: MediaType) -> &'static str {
    match m {
        MediaType::Movie => "MOVIE",
        MediaType::Tv => "TV",
    }
}

fn media_type_from_str(s: &str) -> MediaType {
    match s {
        "TV" => MediaType::Tv,
        _ => MediaType::Movie,
    }
}

fn decision_str(d: VoteDecision) -> &'static str {
    match d {
        VoteDecision::Yes => "YES",
        VoteDecision::No => "NO",
    }
}

fn decision_from_str(s: &str) -> VoteDecision {
    match s {
        "YES" => VoteDecision::Yes,
        _ => VoteDecision::No,
    }
}

impl Storage {
    pub fn new(path: &str) -> Self {
        let conn = Connection::open(path).expect("Failed to open database");
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;")
            .expect("Failed to set pragmas");
        let storage = Storage {
            conn: Mutex::new(conn),
        };
        storage.migrate();
        storage
    }

    fn migrate(&self) {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                invite_code TEXT NOT NULL UNIQUE,
                media_type TEXT NOT NULL,
                genres TEXT NOT NULL DEFAULT '[]',
                capacity INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'WAITING',
                matched_item_id INTEGER,
                member_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_rooms_invite_code ON rooms(invite_code);
            CREATE INDEX IF NOT EXISTS idx_rooms_status ON rooms(status);

            CREATE TABLE IF NOT EXISTS room_members (
                room_id TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL,
                joined_at TEXT NOT NULL,
                PRIMARY KEY (room_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS catalog_entries (
                room_id TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                sequence_index INTEGER NOT NULL,
                item_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                overview TEXT NOT NULL,
                poster_path TEXT,
                release_date TEXT,
                original_language TEXT NOT NULL,
                genre_ids TEXT NOT NULL DEFAULT '[]',
                vote_average REAL NOT NULL DEFAULT 0,
                priority INTEGER NOT NULL,
                PRIMARY KEY (room_id, sequence_index)
            );
            CREATE INDEX IF NOT EXISTS idx_catalog_room_item ON catalog_entries(room_id, item_id);

            CREATE TABLE IF NOT EXISTS votes (
                room_id TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL,
                item_id INTEGER NOT NULL,
                decision TEXT NOT NULL,
                voted_at TEXT NOT NULL,
                PRIMARY KEY (room_id, user_id, item_id)
            );
            CREATE INDEX IF NOT EXISTS idx_votes_room_user ON votes(room_id, user_id);

            CREATE TABLE IF NOT EXISTS vote_tally (
                room_id TEXT NOT NULL,
                item_id INTEGER NOT NULL,
                yes_count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (room_id, item_id)
            );

            CREATE TABLE IF NOT EXISTS match_events (
                room_id TEXT PRIMARY KEY REFERENCES rooms(id) ON DELETE CASCADE,
                item_id INTEGER NOT NULL,
                matched_at TEXT NOT NULL,
                capacity INTEGER NOT NULL,
                notified INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS change_feed (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                room_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                item_id INTEGER NOT NULL,
                decision TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS consensus_cursor (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                last_seq INTEGER NOT NULL DEFAULT 0
            );
            INSERT OR IGNORE INTO consensus_cursor (id, last_seq) VALUES (1, 0);
            ",
        )
        .expect("Failed to run migrations");
    }

    // --- Room lifecycle ---

    /// putConditional(absent): creates the room only if the id is unused.
    pub fn create_room(
        &self,
        room_id: &str,
        name: &str,
        invite_code: &str,
        media_type: MediaType,
        genres: &[i64],
        capacity: i64,
        created_at: &str,
        expires_at: &str,
    ) -> EngineResult<()> {
        let conn = self.conn.lock().unwrap();
        let genres_json = serde_json::to_string(genres).unwrap_or_else(|_| "[]".into());
        conn.execute(
            "INSERT INTO rooms (id, name, invite_code, media_type, genres, capacity, status, member_count, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'WAITING', 0, ?7, ?8)",
            params![room_id, name, invite_code, media_type_str(media_type), genres_json, capacity, created_at, expires_at],
        )
        .map_err(EngineError::from)?;
        Ok(())
    }

    pub fn delete_room(&self, room_id: &str) -> EngineResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM rooms WHERE id = ?1", params![room_id])
            .map_err(EngineError::from)?;
        Ok(())
    }

    /// get(roomId)
    pub fn get_room(&self, room_id: &str) -> EngineResult<Room> {
        let conn = self.conn.lock().unwrap();
        Self::row_to_room(&conn, room_id)
    }

    fn row_to_room(conn: &Connection, room_id: &str) -> EngineResult<Room> {
        conn.query_row(
            "SELECT id, name, invite_code, media_type, genres, capacity, status, matched_item_id, member_count, created_at, expires_at
             FROM rooms WHERE id = ?1",
            params![room_id],
            |row| {
                let genres_json: String = row.get(4)?;
                let status_str: String = row.get(6)?;
                let media_type_str: String = row.get(3)?;
                Ok(Room {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    invite_code: row.get(2)?,
                    media_type: media_type_from_str(&media_type_str),
                    genres: serde_json::from_str(&genres_json).unwrap_or_default(),
                    capacity: row.get(5)?,
                    status: room_status_from_str(&status_str),
                    matched_item_id: row.get(7)?,
                    member_count: row.get(8)?,
                    created_at: row.get(9)?,
                    expires_at: row.get(10)?,
                })
            },
        )
        .optional()
        .map_err(EngineError::from)?
        .ok_or(EngineError::NotFound)
    }

    /// indexQuery(byInviteCode)
    pub fn get_room_by_invite_code(&self, invite_code: &str) -> EngineResult<Room> {
        let conn = self.conn.lock().unwrap();
        let room_id: Option<String> = conn
            .query_row(
                "SELECT id FROM rooms WHERE invite_code = ?1",
                params![invite_code],
                |r| r.get(0),
            )
            .optional()
            .map_err(EngineError::from)?;
        let room_id = room_id.ok_or(EngineError::NotFound)?;
        Self::row_to_room(&conn, &room_id)
    }

    /// putConditional(member join): seals capacity atomically by checking
    /// member_count < capacity and status != MATCHED/EXPIRED in the same
    /// write, then increments member_count and flips to VOTING if full.
    pub fn join_room(&self, room_id: &str, user_id: &str, joined_at: &str) -> EngineResult<Room> {
        let conn = self.conn.lock().unwrap();
        let room = Self::row_to_room(&conn, room_id)?;

        if matches!(room.status, RoomStatus::Matched | RoomStatus::Expired) {
            return Err(EngineError::RoomClosed);
        }

        let already: bool = conn
            .query_row(
                "SELECT 1 FROM room_members WHERE room_id = ?1 AND user_id = ?2",
                params![room_id, user_id],
                |_| Ok(()),
            )
            .optional()
            .map_err(EngineError::from)?
            .is_some();
        if already {
            return Err(EngineError::AlreadyMember);
        }
        if room.member_count >= room.capacity {
            return Err(EngineError::RoomFull);
        }

        conn.execute(
            "INSERT INTO room_members (room_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
            params![room_id, user_id, joined_at],
        )
        .map_err(EngineError::from)?;

        // Conditional increment: only succeeds while still under capacity —
        // guards the race between two joins landing on the last seat.
        let updated = conn
            .execute(
                "UPDATE rooms SET member_count = member_count + 1 WHERE id = ?1 AND member_count < capacity",
                params![room_id],
            )
            .map_err(EngineError::from)?;
        if updated == 0 {
            conn.execute(
                "DELETE FROM room_members WHERE room_id = ?1 AND user_id = ?2",
                params![room_id, user_id],
            )
            .ok();
            return Err(EngineError::RoomFull);
        }

        conn.execute(
            "UPDATE rooms SET status = 'VOTING' WHERE id = ?1 AND status = 'WAITING' AND member_count >= capacity",
            params![room_id],
        )
        .map_err(EngineError::from)?;

        Self::row_to_room(&conn, room_id)
    }

    pub fn is_member(&self, room_id: &str, user_id: &str) -> EngineResult<bool> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT 1 FROM room_members WHERE room_id = ?1 AND user_id = ?2",
                params![room_id, user_id],
                |_| Ok(()),
            )
            .optional()
            .map_err(EngineError::from)?
            .is_some())
    }

    /// putConditional(status = VOTING -> MATCHED): the single-shot guard
    /// behind the whole consensus pipeline.
    pub fn try_transition_to_matched(&self, room_id: &str, item_id: i64) -> EngineResult<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(
                "UPDATE rooms SET status = 'MATCHED', matched_item_id = ?1 WHERE id = ?2 AND status = 'VOTING'",
                params![item_id, room_id],
            )
            .map_err(EngineError::from)?;
        Ok(updated > 0)
    }

    /// Background TTL sweep: WAITING/VOTING rooms past expires_at -> EXPIRED.
    /// Returns the ids of the rooms actually transitioned, so the caller
    /// can publish an expiry event per room.
    pub fn expire_stale_rooms(&self, now: &str) -> EngineResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id FROM rooms WHERE status IN ('WAITING','VOTING') AND expires_at < ?1")
            .map_err(EngineError::from)?;
        let ids: Vec<String> = stmt
            .query_map(params![now], |row| row.get(0))
            .map_err(EngineError::from)?
            .filter_map(|r| r.ok())
            .collect();
        drop(stmt);
        conn.execute(
            "UPDATE rooms SET status = 'EXPIRED' WHERE status IN ('WAITING','VOTING') AND expires_at < ?1",
            params![now],
        )
        .map_err(EngineError::from)?;
        Ok(ids)
    }

    // --- Catalog entries ---

    pub fn insert_catalog_entries(&self, entries: &[CatalogEntry]) -> EngineResult<()> {
        let conn = self.conn.lock().unwrap();
        for e in entries {
            let genre_json = serde_json::to_string(&e.genre_ids).unwrap_or_else(|_| "[]".into());
            conn.execute(
                "INSERT INTO catalog_entries (room_id, sequence_index, item_id, title, overview, poster_path, release_date, original_language, genre_ids, vote_average, priority)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    e.room_id, e.sequence_index, e.item_id, e.title, e.overview,
                    e.poster_path, e.release_date, e.original_language, genre_json,
                    e.vote_average, e.priority,
                ],
            )
            .map_err(EngineError::from)?;
        }
        Ok(())
    }

    /// rangeGet(roomId, sequenceIndex range)
    pub fn range_get_catalog(
        &self,
        room_id: &str,
        from_index: i64,
        limit: i64,
    ) -> EngineResult<Vec<CatalogEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT room_id, sequence_index, item_id, title, overview, poster_path, release_date, original_language, genre_ids, vote_average, priority
                 FROM catalog_entries WHERE room_id = ?1 AND sequence_index >= ?2 ORDER BY sequence_index ASC LIMIT ?3",
            )
            .map_err(EngineError::from)?;
        let rows = stmt
            .query_map(params![room_id, from_index, limit], Self::row_to_catalog_entry)
            .map_err(EngineError::from)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn get_catalog_entry_by_item(
        &self,
        room_id: &str,
        item_id: i64,
    ) -> EngineResult<Option<CatalogEntry>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT room_id, sequence_index, item_id, title, overview, poster_path, release_date, original_language, genre_ids, vote_average, priority
             FROM catalog_entries WHERE room_id = ?1 AND item_id = ?2",
            params![room_id, item_id],
            Self::row_to_catalog_entry,
        )
        .optional()
        .map_err(EngineError::from)
    }

    fn row_to_catalog_entry(row: &rusqlite::Row) -> rusqlite::Result<CatalogEntry> {
        let genre_json: String = row.get(8)?;
        Ok(CatalogEntry {
            room_id: row.get(0)?,
            sequence_index: row.get(1)?,
            item_id: row.get(2)?,
            title: row.get(3)?,
            overview: row.get(4)?,
            poster_path: row.get(5)?,
            release_date: row.get(6)?,
            original_language: row.get(7)?,
            genre_ids: serde_json::from_str(&genre_json).unwrap_or_default(),
            vote_average: row.get(9)?,
            priority: row.get(10)?,
        })
    }

    pub fn catalog_count(&self, room_id: &str) -> EngineResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM catalog_entries WHERE room_id = ?1",
            params![room_id],
            |r| r.get(0),
        )
        .map_err(EngineError::from)
    }

    // --- Votes ---

    /// putConditional(absent) on (room, user, item), with the one documented
    /// exception: a retry of the exact same (room, user, item, decision) is
    /// idempotent rather than a conflict. The existing-decision check and the
    /// insert happen under the same connection lock, so a same-decision
    /// retry can never race the first write into two INSERTs.
    pub fn record_vote(
        &self,
        room_id: &str,
        user_id: &str,
        item_id: i64,
        decision: VoteDecision,
        voted_at: &str,
    ) -> EngineResult<VoteOutcome> {
        let conn = self.conn.lock().unwrap();

        let existing: Option<String> = conn
            .query_row(
                "SELECT decision FROM votes WHERE room_id = ?1 AND user_id = ?2 AND item_id = ?3",
                params![room_id, user_id, item_id],
                |r| r.get(0),
            )
            .optional()
            .map_err(EngineError::from)?;

        if let Some(existing_str) = existing {
            if decision_from_str(&existing_str) == decision {
                return Ok(VoteOutcome::AlreadyRecordedSame);
            }
            return Err(EngineError::AlreadyVoted);
        }

        conn.execute(
            "INSERT INTO votes (room_id, user_id, item_id, decision, voted_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![room_id, user_id, item_id, decision_str(decision), voted_at],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref se, _)
                if se.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                EngineError::AlreadyVoted
            }
            other => EngineError::from(other),
        })?;

        let seq: i64 = conn
            .query_row(
                "INSERT INTO change_feed (room_id, user_id, item_id, decision, recorded_at) VALUES (?1, ?2, ?3, ?4, ?5) RETURNING seq",
                params![room_id, user_id, item_id, decision_str(decision), voted_at],
                |r| r.get(0),
            )
            .map_err(EngineError::from)?;
        Ok(VoteOutcome::Recorded(seq))
    }

    pub fn votes_cast_count(&self, room_id: &str, user_id: &str) -> EngineResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM votes WHERE room_id = ?1 AND user_id = ?2",
            params![room_id, user_id],
            |r| r.get(0),
        )
        .map_err(EngineError::from)
    }

    /// incrementCounter(roomVotesKey, yesCount, +1)
    pub fn increment_yes_count(&self, room_id: &str, item_id: i64) -> EngineResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "INSERT INTO vote_tally (room_id, item_id, yes_count) VALUES (?1, ?2, 1)
             ON CONFLICT(room_id, item_id) DO UPDATE SET yes_count = yes_count + 1
             RETURNING yes_count",
            params![room_id, item_id],
            |r| r.get(0),
        )
        .map_err(EngineError::from)
    }

    // --- Match events ---

    /// putConditional(absent)
    pub fn insert_match_event(&self, event: &MatchEvent) -> EngineResult<bool> {
        let conn = self.conn.lock().unwrap();
        let n = conn
            .execute(
                "INSERT OR IGNORE INTO match_events (room_id, item_id, matched_at, capacity, notified) VALUES (?1, ?2, ?3, ?4, 0)",
                params![event.room_id, event.item_id, event.matched_at, event.capacity],
            )
            .map_err(EngineError::from)?;
        Ok(n > 0)
    }

    /// Conditional flip of the notified flag: false -> true, exactly once.
    pub fn try_mark_notified(&self, room_id: &str) -> EngineResult<bool> {
        let conn = self.conn.lock().unwrap();
        let n = conn
            .execute(
                "UPDATE match_events SET notified = 1 WHERE room_id = ?1 AND notified = 0",
                params![room_id],
            )
            .map_err(EngineError::from)?;
        Ok(n > 0)
    }

    pub fn get_match_event(&self, room_id: &str) -> EngineResult<Option<MatchEvent>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT room_id, item_id, matched_at, capacity, notified FROM match_events WHERE room_id = ?1",
            params![room_id],
            |row| {
                let notified: i64 = row.get(4)?;
                Ok(MatchEvent {
                    room_id: row.get(0)?,
                    item_id: row.get(1)?,
                    matched_at: row.get(2)?,
                    capacity: row.get(3)?,
                    notified: notified != 0,
                })
            },
        )
        .optional()
        .map_err(EngineError::from)
    }

    // --- Change feed (subscribeChangeFeed) ---

    pub fn load_cursor(&self) -> EngineResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT last_seq FROM consensus_cursor WHERE id = 1", [], |r| r.get(0))
            .map_err(EngineError::from)
    }

    pub fn save_cursor(&self, seq: i64) -> EngineResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE consensus_cursor SET last_seq = ?1 WHERE id = 1",
            params![seq],
        )
        .map_err(EngineError::from)?;
        Ok(())
    }

    /// Poll the feed strictly after `since_seq`, ordered — the consensus
    /// poller's only read path. At-least-once: a crash between processing
    /// a batch and calling `save_cursor` redelivers the whole batch.
    pub fn poll_change_feed(&self, since_seq: i64, limit: i64) -> EngineResult<Vec<ChangeFeedRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT seq, room_id, user_id, item_id, decision FROM change_feed WHERE seq > ?1 ORDER BY seq ASC LIMIT ?2",
            )
            .map_err(EngineError::from)?;
        let rows = stmt
            .query_map(params![since_seq, limit], |row| {
                let decision_str: String = row.get(4)?;
                Ok(ChangeFeedRecord {
                    seq: row.get(0)?,
                    room_id: row.get(1)?,
                    user_id: row.get(2)?,
                    item_id: row.get(3)?,
                    decision: decision_from_str(&decision_str),
                })
            })
            .map_err(EngineError::from)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

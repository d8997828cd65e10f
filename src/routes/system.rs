use crate::storage::Storage;
use rocket::serde::json::Json;
use rocket::{get, State};
use std::sync::Arc;

#[get("/api/v1/health")]
pub fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "swipe-engine",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[get("/api/v1/stats")]
pub fn stats(storage: &State<Arc<Storage>>) -> Json<serde_json::Value> {
    let conn = storage.conn.lock().unwrap();

    let room_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM rooms", [], |r| r.get(0))
        .unwrap_or(0);
    let waiting: i64 = conn
        .query_row("SELECT COUNT(*) FROM rooms WHERE status = 'WAITING'", [], |r| r.get(0))
        .unwrap_or(0);
    let voting: i64 = conn
        .query_row("SELECT COUNT(*) FROM rooms WHERE status = 'VOTING'", [], |r| r.get(0))
        .unwrap_or(0);
    let matched: i64 = conn
        .query_row("SELECT COUNT(*) FROM rooms WHERE status = 'MATCHED'", [], |r| r.get(0))
        .unwrap_or(0);
    let expired: i64 = conn
        .query_row("SELECT COUNT(*) FROM rooms WHERE status = 'EXPIRED'", [], |r| r.get(0))
        .unwrap_or(0);
    let votes_cast: i64 = conn
        .query_row("SELECT COUNT(*) FROM votes", [], |r| r.get(0))
        .unwrap_or(0);
    let matches_notified: i64 = conn
        .query_row("SELECT COUNT(*) FROM match_events WHERE notified = 1", [], |r| r.get(0))
        .unwrap_or(0);

    Json(serde_json::json!({
        "rooms": {
            "total": room_count,
            "waiting": waiting,
            "voting": voting,
            "matched": matched,
            "expired": expired,
        },
        "votes_cast": votes_cast,
        "matches_notified": matches_notified,
    }))
}

#[rocket::catch(429)]
pub fn too_many_requests() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Too many requests"}))
}

#[rocket::catch(404)]
pub fn not_found() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Not found"}))
}

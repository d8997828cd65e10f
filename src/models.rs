use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaType {
    Movie,
    Tv,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoomStatus {
    Waiting,
    Voting,
    Matched,
    Expired,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoteDecision {
    Yes,
    No,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub invite_code: String,
    pub media_type: MediaType,
    pub genres: Vec<i64>,
    pub capacity: i64,
    pub status: RoomStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_item_id: Option<i64>,
    pub member_count: i64,
    pub created_at: String,
    pub expires_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RoomMember {
    pub room_id: String,
    pub user_id: String,
    pub joined_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CatalogEntry {
    pub room_id: String,
    pub sequence_index: i64,
    pub item_id: i64,
    pub title: String,
    pub overview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    pub original_language: String,
    pub genre_ids: Vec<i64>,
    pub vote_average: f64,
    pub priority: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Vote {
    pub room_id: String,
    pub user_id: String,
    pub item_id: i64,
    pub decision: VoteDecision,
    pub voted_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatchEvent {
    pub room_id: String,
    pub item_id: i64,
    pub matched_at: String,
    pub capacity: i64,
    pub notified: bool,
}

// --- Inbound request DTOs ---

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub media_type: MediaType,
    #[serde(default)]
    pub genres: Vec<i64>,
    pub name: String,
    pub capacity: i64,
    pub created_by: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    #[serde(default)]
    pub invite_code: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub user_id: String,
    pub item_id: i64,
    pub decision: VoteDecision,
}

#[derive(Debug, Serialize)]
pub struct CreateRoomResponse {
    pub room: Room,
    pub catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub room_id: String,
    pub user_id: String,
    pub voted_count: i64,
    pub total: i64,
    pub remaining: i64,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind")]
pub enum NextItemResponse {
    #[serde(rename = "ITEM")]
    Item { entry: CatalogEntry },
    #[serde(rename = "EXHAUSTED")]
    Exhausted,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub acknowledged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_item_id: Option<i64>,
}

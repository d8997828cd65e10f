use rocket::http::Status;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use rocket::Request;

/// Every fallible engine operation returns one of these kinds. A single
/// `Responder` impl below is the only place a kind gets turned into an
/// HTTP status, so handlers never hand-roll `(Status, Json<Value>)` tuples.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),
    #[error("insufficient content: only {found} of {needed} items passed the quality gate")]
    InsufficientContent { found: usize, needed: usize },
    #[error("room is full")]
    RoomFull,
    #[error("room is closed")]
    RoomClosed,
    #[error("already a member of this room")]
    AlreadyMember,
    #[error("already voted on this item")]
    AlreadyVoted,
    #[error("not a member of this room")]
    NotMember,
    #[error("item is not in this room's catalog")]
    ItemNotInRoom,
    #[error("room not found")]
    NotFound,
    #[error("optimistic write lost a race")]
    ConditionFailed,
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("operation timed out")]
    Timeout,
    #[error("upstream metadata provider unavailable")]
    UpstreamUnavailable,
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => EngineError::NotFound,
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                EngineError::Transient(err.to_string())
            }
            other => EngineError::Transient(other.to_string()),
        }
    }
}

impl EngineError {
    fn status(&self) -> Status {
        match self {
            EngineError::Validation(_) => Status::BadRequest,
            EngineError::InsufficientContent { .. } => Status::UnprocessableEntity,
            EngineError::RoomFull => Status::Conflict,
            EngineError::RoomClosed => Status::Conflict,
            EngineError::AlreadyMember => Status::Conflict,
            EngineError::AlreadyVoted => Status::Conflict,
            EngineError::NotMember => Status::Forbidden,
            EngineError::ItemNotInRoom => Status::NotFound,
            EngineError::NotFound => Status::NotFound,
            EngineError::ConditionFailed => Status::Conflict,
            EngineError::Transient(_) => Status::ServiceUnavailable,
            EngineError::Timeout => Status::GatewayTimeout,
            EngineError::UpstreamUnavailable => Status::ServiceUnavailable,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for EngineError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        Response::build_from(body.respond_to(req)?)
            .status(status)
            .ok()
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

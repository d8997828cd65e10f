// Route module decomposition — each domain area in its own file.
// Shared types (request guards) live here; route functions in submodules.

mod catalog_routes;
mod rooms;
mod stream;
mod system;
mod votes;

pub use catalog_routes::{next_item, progress};
pub use rooms::{create_room, get_room, join_room};
pub use stream::room_events;
pub use system::{health, not_found, stats, too_many_requests};
pub use votes::cast_vote;

// --- Shared request guards ---

use rocket::request::{FromRequest, Outcome, Request};

pub struct ClientIp(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let ip = req
            .headers()
            .get_one("X-Forwarded-For")
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .or_else(|| req.remote().map(|r| r.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string());
        Outcome::Success(ClientIp(ip))
    }
}

use crate::models::MatchEvent;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Fires the single outbound match notification a room's consensus
/// transition produces. Unlike the teacher's per-room webhook table,
/// this engine has exactly one configured sink — match events are rare
/// and synchronous delivery to many endpoints was never a requirement
/// here.
pub struct Notifier {
    client: reqwest::Client,
    url: Option<String>,
    secret: Option<String>,
}

impl Notifier {
    pub fn new(url: Option<String>, secret: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");
        Self { client, url, secret }
    }

    /// Fire-and-forget: spawns the delivery and returns immediately. The
    /// `notified` flag in storage is the source of truth for "was this
    /// dispatched", not the HTTP outcome — a failed delivery does not
    /// retry, matching the teacher's webhook dispatcher.
    pub fn notify_match(&self, event: &MatchEvent) {
        let Some(url) = self.url.clone() else {
            return;
        };
        let secret = self.secret.clone();
        let client = self.client.clone();
        let body = serde_json::to_string(&serde_json::json!({
            "event": "match",
            "room_id": event.room_id,
            "item_id": event.item_id,
            "matched_at": event.matched_at,
            "capacity": event.capacity,
        }))
        .unwrap_or_default();

        tokio::spawn(async move {
            let mut request = client
                .post(&url)
                .header("Content-Type", "application/json")
                .header("X-Swipe-Event", "match");

            if let Some(ref secret) = secret {
                if let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) {
                    mac.update(body.as_bytes());
                    let signature = hex::encode(mac.finalize().into_bytes());
                    request = request.header("X-Swipe-Signature", format!("sha256={}", signature));
                }
            }

            match request.body(body).send().await {
                Ok(resp) if !resp.status().is_success() => {
                    eprintln!("match notification delivery failed: HTTP {}", resp.status());
                }
                Err(e) => {
                    eprintln!("match notification delivery error: {}", e);
                }
                _ => {}
            }
        });
    }
}

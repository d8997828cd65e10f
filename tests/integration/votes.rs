use crate::common::{create_test_room, test_client};
use rocket::http::{ContentType, Status};
use rocket::local::blocking::Client;
use std::thread::sleep;
use std::time::Duration;

fn vote(client: &Client, room_id: &str, user_id: &str, item_id: i64, decision: &str) -> rocket::local::blocking::LocalResponse<'_> {
    client
        .post(format!("/api/v1/rooms/{room_id}/votes"))
        .header(ContentType::JSON)
        .body(format!(
            r#"{{"user_id":"{user_id}","item_id":{item_id},"decision":"{decision}"}}"#
        ))
        .dispatch()
}

/// The MATCHED transition only happens on the background consensus
/// poller's tick, so tests that expect it poll the room resource for a
/// bounded window instead of asserting on the vote response itself.
fn wait_for_status(client: &Client, room_id: &str, status: &str) -> serde_json::Value {
    for _ in 0..100 {
        let room: serde_json::Value = client
            .get(format!("/api/v1/rooms/{room_id}"))
            .dispatch()
            .into_json()
            .unwrap();
        if room["status"] == status {
            return room;
        }
        sleep(Duration::from_millis(20));
    }
    panic!("room never reached status {status}");
}

#[test]
fn test_unanimous_vote_matches_and_stops_notifying_once() {
    let client = test_client();
    let body = create_test_room(&client, "date-night", 2);
    let room_id = body["room"]["id"].as_str().unwrap();
    let item_id = body["catalog"][0]["item_id"].as_i64().unwrap();
    let invite_code = body["room"]["invite_code"].as_str().unwrap();

    client
        .post("/api/v1/rooms/join")
        .header(ContentType::JSON)
        .body(format!(r#"{{"invite_code":"{invite_code}","user_id":"guest"}}"#))
        .dispatch();

    let res = vote(&client, room_id, "host", item_id, "YES");
    assert_eq!(res.status(), Status::Ok);
    let res = vote(&client, room_id, "guest", item_id, "YES");
    assert_eq!(res.status(), Status::Ok);

    let room = wait_for_status(&client, room_id, "MATCHED");
    assert_eq!(room["matched_item_id"].as_i64().unwrap(), item_id);

    let stats: serde_json::Value = client.get("/api/v1/stats").dispatch().into_json().unwrap();
    assert_eq!(stats["matches_notified"].as_i64().unwrap(), 1);
}

#[test]
fn test_no_vote_never_matches() {
    let client = test_client();
    let body = create_test_room(&client, "no-night", 2);
    let room_id = body["room"]["id"].as_str().unwrap();
    let item_id = body["catalog"][0]["item_id"].as_i64().unwrap();
    let invite_code = body["room"]["invite_code"].as_str().unwrap();

    client
        .post("/api/v1/rooms/join")
        .header(ContentType::JSON)
        .body(format!(r#"{{"invite_code":"{invite_code}","user_id":"guest"}}"#))
        .dispatch();

    vote(&client, room_id, "host", item_id, "YES");
    vote(&client, room_id, "guest", item_id, "NO");

    sleep(Duration::from_millis(200));
    let room: serde_json::Value = client
        .get(format!("/api/v1/rooms/{room_id}"))
        .dispatch()
        .into_json()
        .unwrap();
    assert_eq!(room["status"], "VOTING");
}

#[test]
fn test_vote_retry_with_same_decision_is_idempotent() {
    let client = test_client();
    let body = create_test_room(&client, "retry-vote", 2);
    let room_id = body["room"]["id"].as_str().unwrap();
    let item_id = body["catalog"][0]["item_id"].as_i64().unwrap();

    let res = vote(&client, room_id, "host", item_id, "YES");
    assert_eq!(res.status(), Status::Ok);
    let res = vote(&client, room_id, "host", item_id, "YES");
    assert_eq!(res.status(), Status::Ok);
}

#[test]
fn test_vote_rejects_duplicate_with_different_decision() {
    let client = test_client();
    let body = create_test_room(&client, "dup-vote", 2);
    let room_id = body["room"]["id"].as_str().unwrap();
    let item_id = body["catalog"][0]["item_id"].as_i64().unwrap();

    let res = vote(&client, room_id, "host", item_id, "YES");
    assert_eq!(res.status(), Status::Ok);
    let res = vote(&client, room_id, "host", item_id, "NO");
    assert_eq!(res.status(), Status::Conflict);
}

#[test]
fn test_vote_rejects_non_member() {
    let client = test_client();
    let body = create_test_room(&client, "outsider", 2);
    let room_id = body["room"]["id"].as_str().unwrap();
    let item_id = body["catalog"][0]["item_id"].as_i64().unwrap();

    let res = vote(&client, room_id, "stranger", item_id, "YES");
    assert_eq!(res.status(), Status::Forbidden);
}

#[test]
fn test_vote_rejects_item_not_in_catalog() {
    let client = test_client();
    let body = create_test_room(&client, "ghost-item", 2);
    let room_id = body["room"]["id"].as_str().unwrap();

    let res = vote(&client, room_id, "host", 999_999_999, "YES");
    assert_eq!(res.status(), Status::NotFound);
}

#[test]
fn test_vote_rejected_once_room_is_matched() {
    let client = test_client();
    let body = create_test_room(&client, "already-matched", 2);
    let room_id = body["room"]["id"].as_str().unwrap();
    let item_id = body["catalog"][0]["item_id"].as_i64().unwrap();
    let other_item_id = body["catalog"][1]["item_id"].as_i64().unwrap();
    let invite_code = body["room"]["invite_code"].as_str().unwrap();

    client
        .post("/api/v1/rooms/join")
        .header(ContentType::JSON)
        .body(format!(r#"{{"invite_code":"{invite_code}","user_id":"guest"}}"#))
        .dispatch();

    vote(&client, room_id, "host", item_id, "YES");
    vote(&client, room_id, "guest", item_id, "YES");
    wait_for_status(&client, room_id, "MATCHED");

    let res = vote(&client, room_id, "host", other_item_id, "YES");
    assert_eq!(res.status(), Status::Conflict);
}

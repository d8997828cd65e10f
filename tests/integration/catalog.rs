use crate::common::{create_test_room, test_client};
use rocket::http::Status;

#[test]
fn test_next_item_and_progress_advance_with_votes() {
    let client = test_client();
    let body = create_test_room(&client, "catalog-room", 2);
    let room_id = body["room"]["id"].as_str().unwrap();
    let first_item = body["catalog"][0]["item_id"].as_i64().unwrap();

    let next: serde_json::Value = client
        .get(format!("/api/v1/rooms/{room_id}/next?user_id=host"))
        .dispatch()
        .into_json()
        .unwrap();
    assert_eq!(next["kind"], "ITEM");
    assert_eq!(next["entry"]["item_id"].as_i64().unwrap(), first_item);

    let progress: serde_json::Value = client
        .get(format!("/api/v1/rooms/{room_id}/progress?user_id=host"))
        .dispatch()
        .into_json()
        .unwrap();
    assert_eq!(progress["voted_count"].as_i64().unwrap(), 0);
    assert_eq!(progress["total"].as_i64().unwrap(), 10);
}

#[test]
fn test_next_item_rejects_non_member() {
    let client = test_client();
    let body = create_test_room(&client, "members-only", 2);
    let room_id = body["room"]["id"].as_str().unwrap();

    let res = client
        .get(format!("/api/v1/rooms/{room_id}/next?user_id=stranger"))
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);
}

#[test]
fn test_next_item_exhausted_after_full_catalog() {
    use rocket::http::ContentType;

    let client = test_client();
    let body = create_test_room(&client, "exhaust-me", 2);
    let room_id = body["room"]["id"].as_str().unwrap().to_string();
    let catalog = body["catalog"].as_array().unwrap().clone();

    client
        .post("/api/v1/rooms/join")
        .header(ContentType::JSON)
        .body(format!(r#"{{"room_id":"{room_id}","user_id":"guest"}}"#))
        .dispatch();

    for entry in &catalog {
        let item_id = entry["item_id"].as_i64().unwrap();
        client
            .post(format!("/api/v1/rooms/{room_id}/votes"))
            .header(ContentType::JSON)
            .body(format!(
                r#"{{"user_id":"host","item_id":{item_id},"decision":"NO"}}"#
            ))
            .dispatch();
    }

    let next: serde_json::Value = client
        .get(format!("/api/v1/rooms/{room_id}/next?user_id=host"))
        .dispatch()
        .into_json()
        .unwrap();
    assert_eq!(next["kind"], "EXHAUSTED");
}

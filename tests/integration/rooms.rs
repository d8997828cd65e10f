use crate::common::{create_test_room, test_client, test_client_scarce};
use rocket::http::{ContentType, Status};

#[test]
fn test_create_room_builds_full_catalog_and_auto_joins_creator() {
    let client = test_client();
    let body = create_test_room(&client, "movie-night", 2);

    assert_eq!(body["room"]["status"], "WAITING");
    assert_eq!(body["room"]["member_count"].as_i64().unwrap(), 1);
    assert_eq!(body["catalog"].as_array().unwrap().len(), 10);
}

#[test]
fn test_create_room_rejects_too_many_genres() {
    let client = test_client();
    let res = client
        .post("/api/v1/rooms")
        .header(ContentType::JSON)
        .body(r#"{"media_type":"MOVIE","genres":[28,12,18],"name":"x","capacity":2,"created_by":"host"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn test_create_room_rejects_bad_capacity() {
    let client = test_client();
    let res = client
        .post("/api/v1/rooms")
        .header(ContentType::JSON)
        .body(r#"{"media_type":"MOVIE","genres":[],"name":"x","capacity":1,"created_by":"host"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn test_create_room_insufficient_content_is_not_persisted() {
    let client = test_client_scarce();
    let res = client
        .post("/api/v1/rooms")
        .header(ContentType::JSON)
        .body(r#"{"media_type":"MOVIE","genres":[],"name":"scarce","capacity":2,"created_by":"host"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::UnprocessableEntity);

    // No room should have leaked into stats.
    let stats: serde_json::Value = client.get("/api/v1/stats").dispatch().into_json().unwrap();
    assert_eq!(stats["rooms"]["total"].as_i64().unwrap(), 0);
}

#[test]
fn test_join_room_by_invite_code_seals_capacity() {
    let client = test_client();
    let body = create_test_room(&client, "sealed", 2);
    let invite_code = body["room"]["invite_code"].as_str().unwrap();

    let res = client
        .post("/api/v1/rooms/join")
        .header(ContentType::JSON)
        .body(format!(r#"{{"invite_code":"{invite_code}","user_id":"guest"}}"#))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let joined: serde_json::Value = res.into_json().unwrap();
    assert_eq!(joined["status"], "VOTING");
    assert_eq!(joined["member_count"].as_i64().unwrap(), 2);

    // A third join should bounce off a full room.
    let res = client
        .post("/api/v1/rooms/join")
        .header(ContentType::JSON)
        .body(format!(r#"{{"invite_code":"{invite_code}","user_id":"late"}}"#))
        .dispatch();
    assert_eq!(res.status(), Status::Conflict);
}

#[test]
fn test_join_room_twice_is_rejected() {
    let client = test_client();
    let body = create_test_room(&client, "dup-join", 3);
    let room_id = body["room"]["id"].as_str().unwrap();

    let res = client
        .post("/api/v1/rooms/join")
        .header(ContentType::JSON)
        .body(format!(r#"{{"room_id":"{room_id}","user_id":"host"}}"#))
        .dispatch();
    assert_eq!(res.status(), Status::Conflict);
}

use crate::common::test_client;
use rocket::http::Status;

#[test]
fn test_health() {
    let client = test_client();
    let res = client.get("/api/v1/health").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "swipe-engine");
}

#[test]
fn test_stats_reflects_room_creation() {
    let client = test_client();
    crate::common::create_test_room(&client, "stats-room", 2);

    let res = client.get("/api/v1/stats").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert!(body["rooms"]["total"].as_i64().unwrap() >= 1);
    assert!(body["rooms"]["waiting"].as_i64().unwrap() >= 1);
}

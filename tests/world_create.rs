mod support;

use serde_json::{Value, json};

async fn create(client: &reqwest::Client, payload: Value) -> reqwest::Response {
    let base_url = support::ensure_server();
    client
        .post(format!("{base_url}/worlds"))
        .json(&payload)
        .send()
        .await
        .expect("request should succeed")
}

#[tokio::test]
async fn test_world_creation() {
    let client = reqwest::Client::new();
    let world_id = format!("test-{}", uuid::Uuid::new_v4());

    let res = create(&client, json!({ "world_id": world_id, "mode": "coop" })).await;
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    let body: Value = res.json().await.expect("json body");
    assert_eq!(body["world_id"], world_id.as_str());
    assert_eq!(body["mode"], "coop");
}

#[tokio::test]
async fn test_duplicate_world_is_conflict() {
    let client = reqwest::Client::new();
    let world_id = format!("test-{}", uuid::Uuid::new_v4());

    let first = create(&client, json!({ "world_id": world_id })).await;
    assert_eq!(first.status(), reqwest::StatusCode::CREATED);

    let second = create(&client, json!({ "world_id": world_id })).await;
    assert_eq!(second.status(), reqwest::StatusCode::CONFLICT);
    let body: Value = second.json().await.expect("json body");
    assert_eq!(body["error"], "world already exists");
}

#[tokio::test]
async fn test_blank_world_id_is_bad_request() {
    let client = reqwest::Client::new();
    let res = create(&client, json!({ "world_id": "   " })).await;
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.expect("json body");
    assert_eq!(body["error"], "world_id is required");
}

//! HTTP surface tests: auth, create-bot, and the agent protocol over a
//! real listener.

mod common;

use common::{harness, new_bot};
use meetbot::api::{auth::hash_api_key, router, AppState};
use meetbot::domain::models::{BotStatus, MeetingPlatform};
use serde_json::{json, Value};

async fn serve(h: &common::TestHarness) -> (String, reqwest::Client) {
    let app = router(AppState {
        services: h.services.clone(),
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), reqwest::Client::new())
}

async fn seed_api_key(h: &common::TestHarness, key: &str) {
    h.services
        .api_keys
        .insert(h.tenant.id, &hash_api_key(key), Some("test"), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn create_bot_requires_an_api_key() {
    let h = harness().await;
    let (base, client) = serve(&h).await;

    let response = client
        .post(format!("{base}/bots"))
        .json(&json!({
            "meetingInfo": { "platform": "meet", "url": "https://meet.example/x" },
            "displayName": "Notetaker"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn create_bot_deploys_immediately_with_no_start_time() {
    let h = harness().await;
    seed_api_key(&h, "mb_test_key").await;
    let (base, client) = serve(&h).await;

    let response = client
        .post(format!("{base}/bots"))
        .header("x-api-key", "mb_test_key")
        .json(&json!({
            "meetingInfo": { "platform": "zoom", "url": "https://zoom.example/j/1" },
            "displayName": "Notetaker",
            "recordingEnabled": false
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["queued"], json!(false));
    assert_eq!(body["bot"]["status"], json!("JOINING_CALL"));
}

#[tokio::test]
async fn revoked_key_is_rejected() {
    let h = harness().await;
    seed_api_key(&h, "mb_revoked").await;
    sqlx::query("UPDATE api_keys SET revoked = 1")
        .execute(&h.db)
        .await
        .unwrap();
    let (base, client) = serve(&h).await;

    let response = client
        .get(format!("{base}/bots"))
        .header("x-api-key", "mb_revoked")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn agent_protocol_round_trip() {
    let h = harness().await;
    seed_api_key(&h, "mb_test_key").await;
    let (base, client) = serve(&h).await;

    let bot = h
        .services
        .bots
        .insert(new_bot(h.tenant.id, MeetingPlatform::Meet))
        .await
        .unwrap();
    h.services.coordinator.deploy(bot.id, None).await.unwrap();

    // Agent reports IN_CALL.
    let response = client
        .post(format!("{base}/agent/bots/{}/events", bot.id))
        .bearer_auth("test-agent-token")
        .json(&json!({
            "eventType": "IN_CALL",
            "eventTime": chrono::Utc::now(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        h.services.bots.get(bot.id).await.unwrap().unwrap().status,
        BotStatus::InCall
    );

    // Operator asks the bot to leave; the next heartbeat carries it.
    let response = client
        .post(format!("{base}/bots/{}/leave", bot.id))
        .header("x-api-key", "mb_test_key")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = client
        .post(format!("{base}/agent/bots/{}/heartbeat", bot.id))
        .bearer_auth("test-agent-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let reply: Value = response.json().await.unwrap();
    assert_eq!(reply["shouldLeave"], json!(true));

    let updated = h.services.bots.get(bot.id).await.unwrap().unwrap();
    assert!(updated.last_heartbeat.is_some());

    // Agent heartbeats are rejected without the system token.
    let response = client
        .post(format!("{base}/agent/bots/{}/heartbeat", bot.id))
        .bearer_auth("wrong-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn chat_queue_flows_from_operator_to_agent() {
    let h = harness().await;
    seed_api_key(&h, "mb_test_key").await;
    let (base, client) = serve(&h).await;

    let mut request = new_bot(h.tenant.id, MeetingPlatform::Meet);
    request.chat_enabled = true;
    let bot = h.services.bots.insert(request).await.unwrap();

    let response = client
        .post(format!("{base}/bots/{}/chat", bot.id))
        .header("x-api-key", "mb_test_key")
        .json(&json!({ "messageText": "hello from the operator" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = client
        .post(format!("{base}/agent/bots/{}/chat/dequeue", bot.id))
        .bearer_auth("test-agent-token")
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["messageText"], json!("hello from the operator"));

    // Queue is dry now: at-most-once delivery.
    let response = client
        .post(format!("{base}/agent/bots/{}/chat/dequeue", bot.id))
        .bearer_auth("test-agent-token")
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert!(body.is_null());
}

#[tokio::test]
async fn screenshot_upload_stores_bytes_and_metadata() {
    let h = harness().await;
    seed_api_key(&h, "mb_test_key").await;
    let (base, client) = serve(&h).await;

    let bot = h
        .services
        .bots
        .insert(new_bot(h.tenant.id, MeetingPlatform::Meet))
        .await
        .unwrap();

    let png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3];
    let response = client
        .post(format!(
            "{base}/agent/bots/{}/screenshots?type=fatal&state=FATAL&trigger=FATAL",
            bot.id
        ))
        .bearer_auth("test-agent-token")
        .header("content-type", "image/png")
        .body(png.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();

    let key = body["key"].as_str().unwrap();
    assert!(key.starts_with(&format!("bots/{}/screenshots/", bot.id)));
    assert!(key.ends_with(".png"));
    assert_eq!(body["type"], json!("fatal"));

    let stored = h.artifacts.objects.lock().await;
    let (bytes, content_type) = stored.get(key).expect("object stored");
    assert_eq!(*bytes, png);
    assert_eq!(content_type, "image/png");
    drop(stored);

    // Operator sees the metadata with a signed URL.
    let response = client
        .get(format!("{base}/bots/{}/screenshots", bot.id))
        .header("x-api-key", "mb_test_key")
        .send()
        .await
        .unwrap();
    let list: Value = response.json().await.unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert!(list[0]["signedUrl"]
        .as_str()
        .unwrap()
        .contains("artifacts.test"));
}

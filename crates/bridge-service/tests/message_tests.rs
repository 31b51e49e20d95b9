//! Message endpoint integration tests.

use bridge_service::services::message_sender::mock::MockMessageSender;
use bridge_service::services::ticket_issuer::mock::MockTicketIssuer;
use bridge_service::services::SystemClock;
use bridge_test_utils::TestBridgeServer;
use std::sync::Arc;
use std::time::Duration;

const RECEIVER: &str = "o6_bmjrPTlm6_2sgVt7hMZOPfL2M";

/// Poll a message until it leaves `accepted`.
async fn wait_for_status(
    client: &reqwest::Client,
    server: &TestBridgeServer,
    id: &str,
) -> Result<String, anyhow::Error> {
    for _ in 0..100 {
        let body: serde_json::Value = client
            .get(server.api_url(&format!("/message/{id}")))
            .send()
            .await?
            .json()
            .await?;
        let status = body["status"].as_str().unwrap_or_default().to_string();
        if status != "accepted" {
            return Ok(status);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok("accepted".to_string())
}

/// Test that an illegal receiver is rejected.
#[tokio::test]
async fn test_post_message_with_illegal_open_id() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .post(server.api_url("/message"))
        .form(&[("title", "TEST_TITLE"), ("receiver", "open_id")])
        .send()
        .await?;

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["errmsg"], "OpenID illegal");

    Ok(())
}

/// Test that a missing title is rejected.
#[tokio::test]
async fn test_post_message_without_title() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .post(server.api_url("/message"))
        .form(&[("receiver", RECEIVER)])
        .send()
        .await?;

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["errmsg"], "Missing title");

    Ok(())
}

/// Test that an unknown message id is an empty 404.
#[tokio::test]
async fn test_get_message_not_found() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn().await?;
    let client = reqwest::Client::new();

    for id in [uuid::Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
        let response = client
            .get(server.api_url(&format!("/message/{id}")))
            .send()
            .await?;

        assert_eq!(response.status(), 404);
        assert_eq!(response.json::<serde_json::Value>().await?, serde_json::json!({}));
    }

    Ok(())
}

/// Submit, read back, and see delivery recorded.
#[tokio::test]
async fn test_post_message_is_delivered() -> Result<(), anyhow::Error> {
    let sender = Arc::new(MockMessageSender::succeeding());
    let server = TestBridgeServer::spawn_with(
        Arc::new(MockTicketIssuer::succeeding()),
        sender.clone(),
        Arc::new(SystemClock),
    )
    .await?;
    let client = reqwest::Client::new();

    let response = client
        .post(server.api_url("/message"))
        .header("User-Agent", "bridge-tests/1.0")
        .form(&[
            ("title", "Build finished"),
            ("receiver", RECEIVER),
            ("body", "All green"),
            ("url", "https://ci.example/run/42"),
        ])
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let record: serde_json::Value = response.json().await?;
    assert_eq!(record["title"], "Build finished");
    assert_eq!(record["receiver"], RECEIVER);
    assert_eq!(record["status"], "accepted");
    assert_eq!(record["ip"], "127.0.0.1");
    assert_eq!(record["user_agent"], "bridge-tests/1.0");

    let id = record["id"].as_str().unwrap_or_default().to_string();
    assert_eq!(wait_for_status(&client, &server, &id).await?, "sent");

    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent
        .iter()
        .all(|m| m.url.as_deref() == Some("https://ci.example/run/42")));

    Ok(())
}

/// A failing sender leaves the message marked failed.
#[tokio::test]
async fn test_post_message_delivery_failure() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn_with(
        Arc::new(MockTicketIssuer::succeeding()),
        Arc::new(MockMessageSender::failing()),
        Arc::new(SystemClock),
    )
    .await?;
    let client = reqwest::Client::new();

    let record: serde_json::Value = client
        .post(server.api_url("/message"))
        .form(&[("title", "Build failed"), ("receiver", RECEIVER)])
        .send()
        .await?
        .json()
        .await?;

    let id = record["id"].as_str().unwrap_or_default().to_string();
    assert_eq!(wait_for_status(&client, &server, &id).await?, "failed");

    Ok(())
}

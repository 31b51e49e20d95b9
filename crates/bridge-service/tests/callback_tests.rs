//! Callback endpoint integration tests.
//!
//! Exercises signature negotiation and event ingestion through a real server
//! using the `TestBridgeServer` harness.

use bridge_service::services::message_sender::mock::MockMessageSender;
use bridge_service::services::ticket_issuer::mock::MockTicketIssuer;
use bridge_service::services::FixedClock;
use bridge_test_utils::{now_unix, signed_params, TestBridgeServer, TEST_TOKEN};
use std::sync::Arc;

/// Test that a correctly signed negotiation echoes `echostr`.
#[tokio::test]
async fn test_callback_negotiate() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .get(server.api_url("/callback"))
        .query(&signed_params(TEST_TOKEN, now_unix(), "1804289383"))
        .query(&[("echostr", "should_echo_this")])
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "should_echo_this");

    Ok(())
}

/// Test that a request without any parameters is a bad request.
#[tokio::test]
async fn test_callback_missing_params() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client.get(server.api_url("/callback")).send().await?;
    assert_eq!(response.status(), 400);

    let response = client
        .post(server.api_url("/callback"))
        .query(&[("timestamp", "1"), ("nonce", "2")])
        .body("<xml></xml>")
        .send()
        .await?;
    assert_eq!(response.status(), 400);

    Ok(())
}

/// Test that a signature older than the window is rejected.
#[tokio::test]
async fn test_callback_sign_rejected_by_time() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .get(server.api_url("/callback"))
        .query(&signed_params(TEST_TOKEN, now_unix() - 200, "846930886"))
        .query(&[("echostr", "123")])
        .send()
        .await?;

    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["errmsg"], "Callback signature verification failed");

    Ok(())
}

/// Test that a tampered signature is rejected with the same message.
#[tokio::test]
async fn test_callback_sign_rejected_by_sign() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn().await?;
    let client = reqwest::Client::new();

    let mut params = signed_params(TEST_TOKEN, now_unix(), "1681692777");
    for (key, value) in params.iter_mut() {
        if key == "signature" {
            *value = "bad_sign".to_string();
        }
    }

    let response = client
        .get(server.api_url("/callback"))
        .query(&params)
        .query(&[("echostr", "123")])
        .send()
        .await?;

    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["errmsg"], "Callback signature verification failed");

    Ok(())
}

/// Test the window edges against a pinned clock.
#[tokio::test]
async fn test_callback_window_edges() -> Result<(), anyhow::Error> {
    let now = 1_700_000_000;
    let server = TestBridgeServer::spawn_with(
        Arc::new(MockTicketIssuer::succeeding()),
        Arc::new(MockMessageSender::succeeding()),
        Arc::new(FixedClock::new(now)),
    )
    .await?;
    let client = reqwest::Client::new();

    for (timestamp, expected) in [
        (now - 60, 200),
        (now + 60, 200),
        (now - 61, 401),
        (now + 61, 401),
    ] {
        let response = client
            .get(server.api_url("/callback"))
            .query(&signed_params(TEST_TOKEN, timestamp, "424238335"))
            .query(&[("echostr", "edge")])
            .send()
            .await?;
        assert_eq!(response.status(), expected, "timestamp offset {}", timestamp - now);
    }

    Ok(())
}

/// Test that an unsigned event push changes nothing.
#[tokio::test]
async fn test_unsigned_event_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn().await?;
    let client = reqwest::Client::new();
    let scene = server.state().scenes.create().await?;

    let response = client
        .post(server.api_url("/callback"))
        .query(&[
            ("timestamp", now_unix().to_string()),
            ("nonce", "1".to_string()),
            ("signature", "bad_sign".to_string()),
        ])
        .body(bridge_test_utils::subscribe_event_xml(
            "UserOpenID",
            &scene.scene_id.to_string(),
        ))
        .send()
        .await?;

    assert_eq!(response.status(), 401);
    assert!(server.state().scenes.get(scene.scene_id).await.is_err());

    Ok(())
}

/// Test that unrelated and malformed pushes are acknowledged with an empty 200.
#[tokio::test]
async fn test_unrelated_pushes_acknowledged() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn().await?;
    let client = reqwest::Client::new();

    for body in [
        "<xml><FromUserName>u</FromUserName><MsgType>text</MsgType><Content>hi</Content></xml>",
        "<xml><FromUserName>u</FromUserName><MsgType>event</MsgType><Event>unsubscribe</Event></xml>",
        "this is not xml <",
    ] {
        let response = client
            .post(server.api_url("/callback"))
            .query(&signed_params(TEST_TOKEN, now_unix(), "719885386"))
            .body(body)
            .send()
            .await?;

        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await?, "");
    }

    Ok(())
}

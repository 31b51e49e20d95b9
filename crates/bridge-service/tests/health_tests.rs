//! Health, metrics and fallback integration tests.

use bridge_test_utils::TestBridgeServer;

/// Test that health endpoint returns 200 and ok status.
#[tokio::test]
async fn test_health_endpoint_returns_200() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), 200);

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    assert!(
        content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("application/json")),
        "Expected application/json content type, got {:?}",
        content_type
    );

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "ok");

    Ok(())
}

/// Test that the metrics endpoint is served outside the API prefix.
#[tokio::test]
async fn test_metrics_endpoint_returns_200() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn().await?;

    let response = reqwest::get(format!("{}/metrics", server.url())).await?;
    assert_eq!(response.status(), 200);

    Ok(())
}

/// Test that non-existent routes return the JSON 404.
#[tokio::test]
async fn test_unknown_route_returns_404() -> Result<(), anyhow::Error> {
    let server = TestBridgeServer::spawn().await?;
    let client = reqwest::Client::new();

    for url in [
        format!("{}/nonexistent", server.url()),
        format!("{}/api/v1/scene", server.url()),
        server.api_url("/scenes"),
    ] {
        let response = client.get(&url).send().await?;

        assert_eq!(response.status(), 404, "{url}");
        let body: serde_json::Value = response.json().await?;
        assert_eq!(body["errmsg"], "The requested path was not found.");
    }

    Ok(())
}

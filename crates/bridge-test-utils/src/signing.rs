//! Helpers for signing callback requests the way the platform does.

use bridge_service::services::signature::compute_signature;

/// Current Unix time in seconds.
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Query parameters of a signed callback: `timestamp`, `nonce`, `signature`.
pub fn signed_params(token: &str, timestamp: i64, nonce: &str) -> Vec<(String, String)> {
    let timestamp = timestamp.to_string();
    let signature = compute_signature(token, &timestamp, nonce);

    vec![
        ("timestamp".to_string(), timestamp),
        ("nonce".to_string(), nonce.to_string()),
        ("signature".to_string(), signature),
    ]
}

/// A subscribe event pushed when a user follows through a scene's QR code.
pub fn subscribe_event_xml(open_id: &str, scene_id: &str) -> String {
    format!(
        r#"<xml>
    <ToUserName><![CDATA[toUser]]></ToUserName>
    <FromUserName><![CDATA[{open_id}]]></FromUserName>
    <CreateTime>123456789</CreateTime>
    <MsgType><![CDATA[event]]></MsgType>
    <Event><![CDATA[subscribe]]></Event>
    <EventKey><![CDATA[qrscene_{scene_id}]]></EventKey>
</xml>"#
    )
}

/// A scan event pushed when an existing follower scans a scene's QR code.
pub fn scan_event_xml(open_id: &str, scene_id: &str) -> String {
    format!(
        r#"<xml>
    <ToUserName><![CDATA[toUser]]></ToUserName>
    <FromUserName><![CDATA[{open_id}]]></FromUserName>
    <CreateTime>123456789</CreateTime>
    <MsgType><![CDATA[event]]></MsgType>
    <Event><![CDATA[SCAN]]></Event>
    <EventKey><![CDATA[{scene_id}]]></EventKey>
</xml>"#
    )
}

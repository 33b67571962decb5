//! Telegram notifier against a local Bot API stub

use dca_safety_bot::common::traits::Notifier;
use dca_safety_bot::config::types::TelegramConfig;
use dca_safety_bot::TelegramNotifier;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn notifier(server: &MockServer) -> TelegramNotifier {
    let config = TelegramConfig {
        token: "123:abc".to_string(),
        chat_id: "-100200".to_string(),
        api_url: server.uri(),
    };
    TelegramNotifier::new(&config, Duration::from_secs(5)).unwrap()
}

#[test_log::test(tokio::test)]
async fn test_send_posts_chat_and_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_json(json!({"chat_id": "-100200", "text": "Skipping FTT/USDT due to invalid data."})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    notifier(&server).send("Skipping FTT/USDT due to invalid data.").await;
}

#[test_log::test(tokio::test)]
async fn test_delivery_failure_is_swallowed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    // must return normally even though the API is failing
    notifier(&server).send("Take profit moved").await;
}

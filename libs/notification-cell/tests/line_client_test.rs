use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notification_cell::models::NotificationError;
use notification_cell::services::LineClient;
use shared_utils::test_utils::TestConfig;

async fn client_against(mock_server: &MockServer) -> LineClient {
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    LineClient::new(&config)
}

#[tokio::test]
async fn test_send_text_message_success() {
    let mock_server = MockServer::start().await;
    let client = client_against(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/v2/bot/message/push"))
        .and(header("Authorization", "Bearer channel-token"))
        .and(body_partial_json(json!({
            "to": "U1234567890abcdef",
            "messages": [{"type": "text", "text": "提醒您明日回診"}],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = client
        .send_text_message("channel-token", "U1234567890abcdef", "提醒您明日回診")
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_send_button_template_builds_uri_action() {
    let mock_server = MockServer::start().await;
    let client = client_against(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/v2/bot/message/push"))
        .and(body_partial_json(json!({
            "messages": [{
                "type": "template",
                "template": {
                    "type": "buttons",
                    "actions": [{"type": "uri", "label": "填寫表單"}],
                },
            }],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = client
        .send_button_template(
            "channel-token",
            "U1234567890abcdef",
            "請填寫表單",
            "初診單已準備好",
            "填寫表單",
            "https://forms.example.com/records/abc",
        )
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_push_failure_surfaces_as_line_api_error() {
    let mock_server = MockServer::start().await;
    let client = client_against(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/v2/bot/message/push"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"message": "Invalid user ID"})),
        )
        .mount(&mock_server)
        .await;

    let result = client
        .send_text_message("channel-token", "not-a-user", "hello")
        .await;

    assert_matches!(result, Err(NotificationError::LineApi(_)));
}

#[tokio::test]
async fn test_empty_channel_token_is_a_configuration_error() {
    let mock_server = MockServer::start().await;
    let client = client_against(&mock_server).await;

    let result = client.send_text_message("", "U1234567890abcdef", "hello").await;

    assert_matches!(result, Err(NotificationError::NotConfigured(_)));
}

//! Mock Telegram Bot API built on wiremock

use super::fixtures::TEST_TOKEN;
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": result }))
}

fn api_path(api_method: &str) -> String {
    format!("/bot{TEST_TOKEN}/{api_method}")
}

/// A sent message as the API returns it
pub fn message_json(message_id: i64, chat_id: i64) -> Value {
    json!({ "message_id": message_id, "chat": { "id": chat_id, "type": "private" }, "date": 0 })
}

/// A text message update
pub fn text_update(update_id: i64, user_id: i64, text: &str) -> Value {
    json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id * 10,
            "from": { "id": user_id },
            "chat": { "id": user_id, "type": "private" },
            "text": text
        }
    })
}

/// A button press update
pub fn callback_update(update_id: i64, user_id: i64, data: &str) -> Value {
    json!({
        "update_id": update_id,
        "callback_query": {
            "id": format!("cb{update_id}"),
            "from": { "id": user_id },
            "message": {
                "message_id": update_id * 10,
                "chat": { "id": user_id, "type": "private" }
            },
            "data": data
        }
    })
}

/// Start a mock API that answers every send/edit/delete call
///
/// `batches` are served in order, one per poll, keyed by the expected offset;
/// later polls get an empty list.
pub async fn start_mock_api(batches: Vec<(i64, Vec<Value>)>) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(api_path("getMe")))
        .respond_with(ok(json!({ "id": 1, "is_bot": true, "username": "Mp3TestBot" })))
        .mount(&server)
        .await;

    for (offset, updates) in batches {
        Mock::given(method("POST"))
            .and(path(api_path("getUpdates")))
            .and(body_partial_json(json!({ "offset": offset })))
            .respond_with(ok(Value::Array(updates)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path(api_path("getUpdates")))
        .respond_with(ok(json!([])).set_delay(Duration::from_millis(25)))
        .mount(&server)
        .await;

    for api_method in ["sendMessage", "sendPhoto", "sendAudio", "editMessageText"] {
        Mock::given(method("POST"))
            .and(path(api_path(api_method)))
            .respond_with(ok(message_json(500, 5)))
            .mount(&server)
            .await;
    }
    for api_method in ["deleteMessage", "answerCallbackQuery"] {
        Mock::given(method("POST"))
            .and(path(api_path(api_method)))
            .respond_with(ok(json!(true)))
            .mount(&server)
            .await;
    }

    server
}

/// Requests received for one API method, in arrival order
pub async fn requests_to(server: &MockServer, api_method: &str) -> Vec<Request> {
    let wanted = api_path(api_method);
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == wanted)
        .collect()
}

/// Wait until at least `count` requests for `api_method` arrived
pub async fn wait_for_requests(
    server: &MockServer,
    api_method: &str,
    count: usize,
    timeout: Duration,
) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if requests_to(server, api_method).await.len() >= count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

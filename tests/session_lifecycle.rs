//! Session Lifecycle Tests
//!
//! Drive a `SessionController` through negotiation, bootstrap, tool calls and
//! teardown against in-memory transport fakes.

mod support;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

use ambit_realtime::core::realtime::DataChannel;
use ambit_realtime::core::realtime::transport::ChannelState;
use ambit_realtime::core::realtime::{
    Direction, EventPayload, ProtocolEvent, RealtimeError, SessionState,
};

use support::{
    ChannelDriver, FakeNegotiator, controller, eventually, function_call_done, text_delta,
};

const BOOTSTRAP: [&str; 3] = [
    "session.update",
    "conversation.item.create",
    "response.create",
];

/// Start, open and wait for the bootstrap to land on the wire.
async fn active_session() -> (
    ambit_realtime::SessionController,
    ChannelDriver,
    Arc<FakeNegotiator>,
    Arc<Notify>,
) {
    let negotiator = Arc::new(FakeNegotiator::new());
    let driver = negotiator.push_connection();
    let slow_gate = Arc::new(Notify::new());
    let controller = controller(negotiator.clone(), slow_gate.clone());

    assert_ok!(controller.start().await);
    assert_eq!(controller.state(), SessionState::Connecting);
    driver.open().await;
    eventually(|| driver.channel.sent().len() == 3).await;
    assert_eq!(controller.state(), SessionState::Active);

    (controller, driver, negotiator, slow_gate)
}

/// The outbound `function_call_output` items, parsed.
fn tool_outputs(driver: &ChannelDriver) -> Vec<(String, Value)> {
    driver
        .channel
        .sent_json()
        .into_iter()
        .filter(|v| v["item"]["type"] == "function_call_output")
        .map(|v| {
            let call_id = v["item"]["call_id"].as_str().unwrap_or_default().to_string();
            let output: Value =
                serde_json::from_str(v["item"]["output"].as_str().unwrap_or("null")).unwrap();
            (call_id, output)
        })
        .collect()
}

#[tokio::test]
async fn test_bootstrap_is_sent_in_order_on_open() {
    let (controller, driver, _negotiator, _gate) = active_session().await;

    assert_eq!(driver.channel.sent_types(), BOOTSTRAP);

    let sent = driver.channel.sent_json();
    let update = &sent[0]["session"];
    assert_eq!(update["tool_choice"], "auto");
    let names: Vec<&str> = update["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["echo", "broken", "slow"]);

    assert_eq!(sent[1]["item"]["role"], "system");
    assert_eq!(sent[1]["item"]["content"][0]["type"], "input_text");
    assert_eq!(sent[1]["item"]["content"][0]["text"], "You are Ambit.");

    // Every outbound event carries an id, none carries a timestamp
    for event in &sent {
        assert!(event["event_id"].is_string());
        assert!(event.get("timestamp").is_none());
    }
    for entry in controller.entries() {
        assert_eq!(entry.direction, Direction::Client);
        assert!(entry.event.timestamp.is_some());
    }
}

#[tokio::test]
async fn test_start_open_stop_then_send_fails() {
    let (controller, driver, _negotiator, _gate) = active_session().await;

    let id = assert_ok!(
        controller
            .send(ProtocolEvent::new(EventPayload::response_create()))
            .await
    );
    assert_eq!(id, "evt_4");
    assert_eq!(driver.channel.sent().len(), 4);

    controller.stop().await;
    assert_eq!(controller.state(), SessionState::Closed);
    assert_eq!(driver.channel.state(), ChannelState::Closed);
    assert_eq!(driver.peer.steps(), vec!["stop_senders", "close"]);

    let logged = controller.entries().len();
    let result = controller
        .send(ProtocolEvent::new(EventPayload::response_create()))
        .await;
    assert!(matches!(result, Err(RealtimeError::ChannelNotOpen)));
    assert_eq!(driver.channel.sent().len(), 4);
    assert_eq!(controller.entries().len(), logged);

    // Stopping twice is harmless
    controller.stop().await;
    assert_eq!(driver.peer.steps(), vec!["stop_senders", "close"]);
}

#[tokio::test]
async fn test_nonexistent_tool_gets_correlated_error() {
    let (_controller, driver, _negotiator, _gate) = active_session().await;

    driver
        .receive(function_call_done(
            "event_100",
            "call_missing",
            "nonexistent_tool",
            "{}",
        ))
        .await;
    eventually(|| driver.channel.sent().len() == 5).await;

    let types = driver.channel.sent_types();
    assert_eq!(types[3], "conversation.item.create");
    assert_eq!(types[4], "response.create");

    let outputs = tool_outputs(&driver);
    assert_eq!(outputs.len(), 1);
    let (call_id, output) = &outputs[0];
    assert_eq!(call_id, "call_missing");
    assert_eq!(output["error"]["type"], "tool_not_found");
    assert_eq!(
        output["error"]["message"],
        "Error: Tool 'nonexistent_tool' not found."
    );
}

#[tokio::test]
async fn test_tool_success_and_failure_each_answer_once() {
    let (_controller, driver, _negotiator, _gate) = active_session().await;

    driver
        .receive(function_call_done(
            "event_101",
            "call_echo",
            "echo",
            r#"{"text":"hello"}"#,
        ))
        .await;
    driver
        .receive(function_call_done("event_102", "call_broken", "broken", ""))
        .await;
    driver
        .receive(function_call_done("event_103", "call_bad", "echo", "{not json"))
        .await;
    eventually(|| tool_outputs(&driver).len() == 3).await;
    eventually(|| driver.channel.sent().len() == 9).await;

    let outputs = tool_outputs(&driver);
    let find = |id: &str| {
        outputs
            .iter()
            .find(|(call_id, _)| call_id == id)
            .map(|(_, output)| output.clone())
            .unwrap()
    };
    assert_eq!(find("call_echo"), json!({ "response": "hello" }));
    assert_eq!(find("call_broken")["error"]["type"], "backend_error");
    assert_eq!(find("call_bad")["error"]["type"], "invalid_arguments");

    // Each output is immediately followed by its response.create
    let types = driver.channel.sent_types();
    for pair in types[3..].chunks(2) {
        assert_eq!(pair, ["conversation.item.create", "response.create"]);
    }
}

#[tokio::test]
async fn test_duplicate_call_id_is_dispatched_once() {
    let (_controller, driver, _negotiator, _gate) = active_session().await;

    let event = function_call_done("event_104", "call_once", "echo", r#"{"text":"a"}"#);
    driver.receive(event.clone()).await;
    driver.receive(event).await;
    eventually(|| tool_outputs(&driver).len() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(tool_outputs(&driver).len(), 1);
}

#[tokio::test]
async fn test_inbound_continues_while_tool_is_suspended() {
    let (controller, driver, _negotiator, gate) = active_session().await;

    driver
        .receive(function_call_done("event_105", "call_slow", "slow", "{}"))
        .await;
    driver.receive(text_delta("event_106", "still here")).await;
    eventually(|| controller.inbound_processed() == 2).await;
    assert!(tool_outputs(&driver).is_empty());

    gate.notify_one();
    eventually(|| tool_outputs(&driver).len() == 1).await;
    assert_eq!(tool_outputs(&driver)[0].1, json!({ "response": "done" }));
}

#[tokio::test]
async fn test_tool_result_after_stop_is_discarded() {
    let (controller, driver, _negotiator, gate) = active_session().await;

    driver
        .receive(function_call_done("event_107", "call_slow", "slow", "{}"))
        .await;
    eventually(|| controller.inbound_processed() == 1).await;

    controller.stop().await;
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(tool_outputs(&driver).is_empty());
    assert_eq!(driver.channel.sent().len(), 3);
}

#[tokio::test]
async fn test_delta_thinning_does_not_affect_processed_count() {
    let (controller, driver, _negotiator, _gate) = active_session().await;

    for n in 0..5 {
        driver
            .receive(text_delta(&format!("event_2{n}"), &format!("chunk {n}")))
            .await;
    }
    driver
        .receive(json!({ "type": "response.text.done", "event_id": "event_30", "text": "all" }))
        .await;
    eventually(|| controller.inbound_processed() == 6).await;

    // 3 bootstrap events + 6 inbound
    assert_eq!(controller.entries().len(), 9);

    let display = controller.display_entries();
    assert_eq!(display.len(), 5);
    let deltas: Vec<_> = display
        .iter()
        .filter(|e| e.event_type() == "response.text.delta")
        .collect();
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].event.event_id.as_deref(), Some("event_24"));
    assert_eq!(deltas[0].direction, Direction::Server);
}

#[tokio::test]
async fn test_malformed_inbound_is_dropped() {
    let (controller, driver, _negotiator, _gate) = active_session().await;

    driver.receive_raw("{not json").await;
    driver.receive_raw(r#"{"event_id":"event_1"}"#).await;
    driver.receive(text_delta("event_40", "ok")).await;
    eventually(|| controller.inbound_processed() == 1).await;

    assert_eq!(controller.entries().len(), 4);
}

#[tokio::test]
async fn test_inbound_timestamp_is_kept_or_assigned() {
    let (controller, driver, _negotiator, _gate) = active_session().await;

    driver
        .receive(json!({
            "type": "response.text.delta",
            "event_id": "event_50",
            "delta": "x",
            "timestamp": "2024-05-01T12:00:00Z",
        }))
        .await;
    driver.receive(text_delta("event_51", "y")).await;
    eventually(|| controller.inbound_processed() == 2).await;

    let entries = controller.entries();
    let stamped = entries
        .iter()
        .find(|e| e.event.event_id.as_deref() == Some("event_50"))
        .unwrap();
    assert_eq!(stamped.timestamp.year(), 2024);
    let fresh = entries
        .iter()
        .find(|e| e.event.event_id.as_deref() == Some("event_51"))
        .unwrap();
    assert!(fresh.timestamp.year() >= 2025);
}

#[tokio::test]
async fn test_tool_call_with_local_clock_timestamp_is_dispatched() {
    let (controller, driver, _negotiator, _gate) = active_session().await;

    let mut done = function_call_done("event_60", "call_clock", "echo", r#"{"text":"tick"}"#);
    done["timestamp"] = json!("10:00:00 AM");
    driver.receive(done).await;
    eventually(|| driver.channel.sent().len() == 5).await;

    assert_eq!(
        tool_outputs(&driver),
        vec![("call_clock".to_string(), json!({ "response": "tick" }))]
    );
    assert_eq!(controller.inbound_processed(), 1);
    let entries = controller.entries();
    let logged = entries
        .iter()
        .find(|e| e.event.event_id.as_deref() == Some("event_60"))
        .unwrap();
    assert!(logged.timestamp.year() >= 2025);
}

#[tokio::test]
async fn test_send_refused_while_channel_is_closing() {
    let (controller, driver, _negotiator, _gate) = active_session().await;

    // The channel leaves Open without a close notification reaching the session
    driver.channel.set_state(ChannelState::Closing);
    assert_eq!(controller.state(), SessionState::Active);

    let logged = controller.entries().len();
    let result = controller
        .send(ProtocolEvent::new(EventPayload::response_create()))
        .await;
    assert!(matches!(result, Err(RealtimeError::ChannelNotOpen)));
    assert_eq!(driver.channel.sent().len(), 3);
    assert_eq!(controller.entries().len(), logged);
}

#[tokio::test]
async fn test_send_text_attempts_both_sends() {
    let negotiator = Arc::new(FakeNegotiator::new());
    let _driver = negotiator.push_connection();
    let controller = controller(negotiator, Arc::new(Notify::new()));

    // Idle: both sends are refused without I/O
    let result = controller.send_text("hello").await;
    assert!(matches!(result, Err(RealtimeError::ChannelNotOpen)));
    assert!(controller.entries().is_empty());
}

#[tokio::test]
async fn test_send_text_while_active() {
    let (controller, driver, _negotiator, _gate) = active_session().await;

    assert_ok!(controller.send_text("What do you see?").await);
    let sent = driver.channel.sent_json();
    assert_eq!(sent.len(), 5);
    assert_eq!(sent[3]["item"]["role"], "user");
    assert_eq!(sent[3]["item"]["content"][0]["text"], "What do you see?");
    assert_eq!(sent[4]["type"], "response.create");
}

#[tokio::test]
async fn test_negotiation_failure_closes_and_allows_retry() {
    let negotiator = Arc::new(FakeNegotiator::new());
    negotiator.push_failure(RealtimeError::Credential("token endpoint down".into()));
    let driver = negotiator.push_connection();
    let controller = controller(negotiator.clone(), Arc::new(Notify::new()));

    let err = assert_err!(controller.start().await);
    assert!(matches!(err, RealtimeError::Credential(_)));
    assert_eq!(controller.state(), SessionState::Closed);

    assert_ok!(controller.start().await);
    driver.open().await;
    eventually(|| driver.channel.sent().len() == 3).await;
    assert_eq!(controller.state(), SessionState::Active);
    assert_eq!(*negotiator.attempts.lock(), 2);
}

#[tokio::test]
async fn test_remote_close_then_restart_uses_fresh_channel() {
    let (controller, first, negotiator, _gate) = active_session().await;
    let second = negotiator.push_connection();

    driver_close_and_wait(&controller, &first).await;
    assert_eq!(first.peer.steps(), vec!["stop_senders", "close"]);

    assert_ok!(controller.start().await);
    second.open().await;
    eventually(|| second.channel.sent().len() == 3).await;

    assert_eq!(first.channel.sent().len(), 3);
    assert_eq!(second.channel.sent_types(), BOOTSTRAP);
    // The log is cleared when the new session turns Active
    assert_eq!(controller.entries().len(), 3);
    assert_eq!(
        controller.entries()[0].event.event_id.as_deref(),
        Some("evt_6")
    );
}

async fn driver_close_and_wait(controller: &ambit_realtime::SessionController, driver: &ChannelDriver) {
    let mut states = controller.subscribe_state();
    driver.remote_close().await;
    tokio::time::timeout(
        Duration::from_secs(2),
        states.wait_for(|s| *s == SessionState::Closed),
    )
    .await
    .expect("session closes")
    .expect("state sender alive");
}

#[tokio::test]
async fn test_stop_during_negotiation_cancels_start() {
    let negotiator = Arc::new(FakeNegotiator::gated());
    let driver = negotiator.push_connection();
    let controller = controller(negotiator.clone(), Arc::new(Notify::new()));

    let starting = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.start().await })
    };
    eventually(|| *negotiator.attempts.lock() == 1).await;
    assert_eq!(controller.state(), SessionState::Connecting);
    assert!(matches!(
        controller.start().await,
        Err(RealtimeError::AlreadyStarting)
    ));

    controller.stop().await;
    assert_eq!(controller.state(), SessionState::Closed);

    negotiator.release();
    let result = starting.await.unwrap();
    assert!(matches!(result, Err(RealtimeError::Cancelled)));
    assert_eq!(driver.peer.steps(), vec!["stop_senders", "close"]);
    assert_eq!(controller.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_send_raw_replaces_server_style_id() {
    let (controller, driver, _negotiator, _gate) = active_session().await;

    let id = assert_ok!(
        controller
            .send_raw(r#"{"type":"input_audio_buffer.clear","event_id":"event_spoof"}"#)
            .await
    );
    assert_eq!(id, "evt_4");
    let sent = driver.channel.sent_json();
    assert_eq!(sent[3]["type"], "input_audio_buffer.clear");
    assert_eq!(sent[3]["event_id"], "evt_4");

    let err = assert_err!(controller.send_raw("[1, 2]").await);
    assert!(matches!(err, RealtimeError::MalformedEvent(_)));
}

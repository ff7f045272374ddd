// Comprehensive tests for the protocol engine
//
// Covers the subscription commands end to end through ResultStreamService:
// - Tagged flavor: SUBSCRIBE, UNSUBSCRIBE, REPLAY, REPLAY_AND_SUBSCRIBE
// - JSON-RPC flavor: requests, notifications, batches
// - Error taxonomy on the wire for both flavors
// - Fan-out to subscribers after appends

use std::sync::Arc;

use brs_core::{Codec, Connection, Flavor, ManualClock, ResultLog, ResultStreamService};
use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedReceiver;

fn service_with_clock(default_flavor: Flavor) -> (Arc<ManualClock>, ResultStreamService) {
    let clock = Arc::new(ManualClock::new(0.0));
    let log = Arc::new(ResultLog::new(clock.clone(), Codec::new(default_flavor)));
    (clock, ResultStreamService::new(log, Codec::new(default_flavor)))
}

fn parse(frames: &[String]) -> Vec<Value> {
    frames
        .iter()
        .map(|f| serde_json::from_str(f).unwrap())
        .collect()
}

fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        out.push(serde_json::from_str(&frame).unwrap());
    }
    out
}

// ============================================================================
// Tagged Flavor Scenarios
// ============================================================================

#[tokio::test]
async fn test_subscribe_sends_nothing_and_registers() {
    let (_clock, service) = service_with_clock(Flavor::Tagged);
    let (conn, _rx) = Connection::channel();

    let out = service
        .on_message(&conn, r#"{"type":"SUBSCRIBE","payload":{}}"#)
        .await;

    assert!(out.is_empty());
    assert!(service.log().is_subscribed(conn.id()));
}

#[tokio::test]
async fn test_replay_after_filters_records() {
    let (clock, service) = service_with_clock(Flavor::Tagged);
    clock.set(900.0);
    service.log().append(json!("R0"));
    clock.set(1200.0);
    service.log().append(json!("R1"));

    let (conn, _rx) = Connection::channel();
    let out = parse(
        &service
            .on_message(&conn, r#"{"type":"REPLAY","payload":{"after":1000}}"#)
            .await,
    );

    assert_eq!(
        out,
        vec![json!({"type": "BATTLE_RESULT", "payload": {"result": "R1", "recordedAt": 1200.0}})]
    );
}

#[tokio::test]
async fn test_replay_without_payload_returns_everything() {
    let (clock, service) = service_with_clock(Flavor::Tagged);
    for (at, name) in [(1.0, "A"), (2.0, "B"), (3.0, "C")] {
        clock.set(at);
        service.log().append(json!(name));
    }

    let (conn, _rx) = Connection::channel();
    let out = parse(&service.on_message(&conn, r#"{"type":"REPLAY"}"#).await);
    let results: Vec<&Value> = out.iter().map(|m| &m["payload"]["result"]).collect();
    assert_eq!(results, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_replay_on_empty_log_sends_nothing() {
    let (_clock, service) = service_with_clock(Flavor::Tagged);
    let (conn, _rx) = Connection::channel();
    assert!(service.on_message(&conn, r#"{"type":"REPLAY"}"#).await.is_empty());
}

#[tokio::test]
async fn test_truncated_json_is_decode_error() {
    let (_clock, service) = service_with_clock(Flavor::Tagged);
    let (conn, _rx) = Connection::channel();
    let out = parse(&service.on_message(&conn, r#"{"type":"#).await);

    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["type"], "ERROR");
    assert_eq!(out[0]["payload"]["type"], "JSON_DECODE");
    assert!(out[0]["payload"]["message"].is_string());
}

#[tokio::test]
async fn test_unknown_command_with_null_payload() {
    let (_clock, service) = service_with_clock(Flavor::Tagged);
    let (conn, _rx) = Connection::channel();
    let out = parse(&service.on_message(&conn, r#"{"type":"FOO","payload":null}"#).await);

    assert_eq!(
        out,
        vec![json!({
            "type": "ERROR",
            "payload": {"type": "UNRECOGNISED_COMMAND", "message": "Command not recognized: FOO"}
        })]
    );
}

#[tokio::test]
async fn test_bad_after_is_malformed_payload() {
    let (_clock, service) = service_with_clock(Flavor::Tagged);
    let (conn, _rx) = Connection::channel();
    let out = parse(
        &service
            .on_message(&conn, r#"{"type":"REPLAY","payload":{"after":"yesterday"}}"#)
            .await,
    );

    assert_eq!(out[0]["payload"]["type"], "MALFORMED_PAYLOAD");
    assert_eq!(
        out[0]["payload"]["message"],
        "Expected $.payload.after to be a number."
    );
}

#[tokio::test]
async fn test_missing_type_is_malformed_message() {
    let (_clock, service) = service_with_clock(Flavor::Tagged);
    let (conn, _rx) = Connection::channel();
    let out = parse(&service.on_message(&conn, r#"{"payload":{}}"#).await);

    assert_eq!(out[0]["payload"]["type"], "MALFORMED_MESSAGE");
    assert_eq!(
        out[0]["payload"]["message"],
        "Expected $ to have a property \"type\"."
    );
}

#[tokio::test]
async fn test_unsubscribe_stops_fan_out() {
    let (_clock, service) = service_with_clock(Flavor::Tagged);
    let (conn, mut rx) = Connection::channel();

    service.on_message(&conn, r#"{"type":"SUBSCRIBE"}"#).await;
    service.log().append(json!("first"));
    service.on_message(&conn, r#"{"type":"UNSUBSCRIBE"}"#).await;
    service.log().append(json!("second"));

    let pushed = drain(&mut rx);
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0]["payload"]["result"], "first");
}

#[tokio::test]
async fn test_subscribe_twice_delivers_once() {
    let (_clock, service) = service_with_clock(Flavor::Tagged);
    let (conn, mut rx) = Connection::channel();

    service.on_message(&conn, r#"{"type":"SUBSCRIBE"}"#).await;
    service.on_message(&conn, r#"{"type":"SUBSCRIBE"}"#).await;
    service.log().append(json!("only"));

    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn test_replay_and_subscribe_has_no_gap() {
    let (clock, service) = service_with_clock(Flavor::Tagged);
    clock.set(10.0);
    service.log().append(json!("before"));

    let (conn, mut rx) = Connection::channel();
    let out = service
        .on_message(&conn, r#"{"type":"REPLAY_AND_SUBSCRIBE","payload":{"after":0}}"#)
        .await;
    assert!(out.is_empty());

    clock.set(20.0);
    service.log().append(json!("after"));

    let pushed = drain(&mut rx);
    let results: Vec<&Value> = pushed.iter().map(|m| &m["payload"]["result"]).collect();
    assert_eq!(results, vec!["before", "after"]);
}

// ============================================================================
// JSON-RPC Flavor Scenarios
// ============================================================================

#[tokio::test]
async fn test_rpc_subscribe_request_gets_null_result() {
    let (_clock, service) = service_with_clock(Flavor::Tagged);
    let (conn, mut rx) = Connection::channel();

    let out = parse(
        &service
            .on_message(&conn, r#"{"jsonrpc":"2.0","method":"subscribe","id":1}"#)
            .await,
    );
    assert_eq!(out, vec![json!({"jsonrpc": "2.0", "result": null, "id": 1})]);

    service.log().append(json!({"winner": "A"}));
    let pushed = drain(&mut rx);
    assert_eq!(
        pushed,
        vec![json!({
            "jsonrpc": "2.0",
            "method": "battle_result",
            "params": {"result": {"winner": "A"}, "recordedAt": 0.0}
        })]
    );
}

#[tokio::test]
async fn test_rpc_subscribe_notification_is_silent() {
    let (_clock, service) = service_with_clock(Flavor::Tagged);
    let (conn, _rx) = Connection::channel();

    let out = service
        .on_message(&conn, r#"{"jsonrpc":"2.0","method":"subscribe"}"#)
        .await;
    assert!(out.is_empty());
    assert!(service.log().is_subscribed(conn.id()));
}

#[tokio::test]
async fn test_rpc_get_battle_results() {
    let (clock, service) = service_with_clock(Flavor::Tagged);
    clock.set(5.0);
    service.log().append(json!("old"));
    clock.set(15.0);
    service.log().append(json!("new"));

    let (conn, _rx) = Connection::channel();
    let out = parse(
        &service
            .on_message(
                &conn,
                r#"{"jsonrpc":"2.0","method":"get_battle_results","params":{"after":10},"id":"q"}"#,
            )
            .await,
    );
    assert_eq!(
        out,
        vec![json!({
            "jsonrpc": "2.0",
            "result": [{"result": "new", "recordedAt": 15.0}],
            "id": "q"
        })]
    );
}

#[tokio::test]
async fn test_rpc_errors_carry_request_id() {
    let (_clock, service) = service_with_clock(Flavor::Tagged);
    let (conn, _rx) = Connection::channel();

    let out = parse(
        &service
            .on_message(&conn, r#"{"jsonrpc":"2.0","method":"nope","id":42}"#)
            .await,
    );
    assert_eq!(out[0]["error"]["code"], -32601);
    assert_eq!(out[0]["error"]["message"], "Method not found");
    assert_eq!(out[0]["id"], 42);

    let out = parse(
        &service
            .on_message(
                &conn,
                r#"{"jsonrpc":"2.0","method":"get_battle_results","params":{"after":true},"id":43}"#,
            )
            .await,
    );
    assert_eq!(out[0]["error"]["code"], -32602);
    assert_eq!(out[0]["error"]["data"], "Expected $.params.after to be a number.");
    assert_eq!(out[0]["id"], 43);
}

#[tokio::test]
async fn test_rpc_parse_error_in_rpc_default_flavor() {
    let (_clock, service) = service_with_clock(Flavor::JsonRpc);
    let (conn, _rx) = Connection::channel();
    let out = parse(&service.on_message(&conn, "[1, 2").await);

    assert_eq!(out[0]["error"]["code"], -32700);
    assert_eq!(out[0]["id"], Value::Null);
}

// ============================================================================
// Batch Scenarios
// ============================================================================

#[tokio::test]
async fn test_batch_collects_rpc_responses() {
    let (_clock, service) = service_with_clock(Flavor::JsonRpc);
    let (conn, _rx) = Connection::channel();

    let out = parse(
        &service
            .on_message(
                &conn,
                r#"[
                    {"jsonrpc":"2.0","method":"subscribe","id":1},
                    {"jsonrpc":"2.0","method":"unknown","id":2},
                    {"jsonrpc":"2.0","method":"unsubscribe"},
                    7
                ]"#,
            )
            .await,
    );

    assert_eq!(out.len(), 1);
    let responses = out[0].as_array().unwrap();
    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0], json!({"jsonrpc": "2.0", "result": null, "id": 1}));
    assert_eq!(responses[1]["error"]["code"], -32601);
    assert_eq!(responses[2]["error"]["code"], -32600);
    assert_eq!(responses[2]["id"], Value::Null);
}

#[tokio::test]
async fn test_batch_of_notifications_sends_nothing() {
    let (_clock, service) = service_with_clock(Flavor::JsonRpc);
    let (conn, _rx) = Connection::channel();

    let out = service
        .on_message(
            &conn,
            r#"[{"jsonrpc":"2.0","method":"subscribe"},{"jsonrpc":"2.0","method":"unsubscribe"}]"#,
        )
        .await;
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_batch_tagged_elements_are_separate_frames() {
    let (clock, service) = service_with_clock(Flavor::Tagged);
    clock.set(1.0);
    service.log().append(json!("X"));
    let (conn, _rx) = Connection::channel();

    let out = parse(
        &service
            .on_message(&conn, r#"[{"type":"REPLAY"},{"type":"BAD"}]"#)
            .await,
    );
    assert_eq!(out.len(), 2);
    assert_eq!(out[0]["type"], "BATTLE_RESULT");
    assert_eq!(out[1]["payload"]["type"], "UNRECOGNISED_COMMAND");
}

#[tokio::test]
async fn test_empty_batch_is_single_invalid_request() {
    let (_clock, service) = service_with_clock(Flavor::JsonRpc);
    let (conn, _rx) = Connection::channel();
    let out = parse(&service.on_message(&conn, "[]").await);

    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["error"]["code"], -32600);
}

// ============================================================================
// Fan-out Scenarios
// ============================================================================

#[tokio::test]
async fn test_each_subscriber_receives_once_in_own_flavor() {
    let (_clock, service) = service_with_clock(Flavor::Tagged);
    let (tagged, mut tagged_rx) = Connection::channel();
    let (rpc, mut rpc_rx) = Connection::channel();
    let (idle, mut idle_rx) = Connection::channel();

    service.on_message(&tagged, r#"{"type":"SUBSCRIBE"}"#).await;
    service
        .on_message(&rpc, r#"{"jsonrpc":"2.0","method":"subscribe"}"#)
        .await;
    service.log().append(json!(1));

    let t = drain(&mut tagged_rx);
    let r = drain(&mut rpc_rx);
    assert_eq!(t.len(), 1);
    assert_eq!(r.len(), 1);
    assert_eq!(t[0]["type"], "BATTLE_RESULT");
    assert_eq!(r[0]["method"], "battle_result");
    assert!(drain(&mut idle_rx).is_empty());
    drop(idle);
}

#[tokio::test]
async fn test_disconnected_subscriber_does_not_break_fan_out() {
    let (_clock, service) = service_with_clock(Flavor::Tagged);
    let (gone, gone_rx) = Connection::channel();
    let (alive, mut alive_rx) = Connection::channel();

    service.on_message(&gone, r#"{"type":"SUBSCRIBE"}"#).await;
    service.on_message(&alive, r#"{"type":"SUBSCRIBE"}"#).await;
    drop(gone_rx);

    service.log().append(json!("still delivered"));
    assert_eq!(drain(&mut alive_rx).len(), 1);
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use yare::parameterized;

fn position() -> PositionPayload {
    PositionPayload {
        participant_id: "s1".into(),
        latitude: 41.9,
        longitude: 12.5,
        accuracy_m: None,
        battery_level: Some(0.5),
    }
}

#[parameterized(
    trip = { trip_topic("t-42"), "trip:t-42" },
    supervisor = { supervisor_topic("t-42"), "trip_supervisor:t-42" },
)]
fn topic_names(topic: String, expected: &str) {
    assert_eq!(topic, expected);
}

#[test]
fn publish_position_wire_shape() {
    let msg = ClientMessage::publish(trip_topic("t1"), ChannelEvent::Position(position()));
    let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

    assert_eq!(value["type"], "publish");
    assert_eq!(value["topic"], "trip:t1");
    assert_eq!(value["event"]["type"], "position");
    assert_eq!(value["event"]["participant_id"], "s1");
    assert_eq!(value["event"]["accuracy_m"], Value::Null);
    assert_eq!(value["event"]["battery_level"], 0.5);
}

#[test]
fn rpc_wire_shape() {
    let msg = ClientMessage::rpc(7, RpcCall::CloseRollCall { roll_call_id: 3 });
    let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

    assert_eq!(value["type"], "rpc");
    assert_eq!(value["id"], 7);
    assert_eq!(value["call"]["method"], "close_roll_call");
    assert_eq!(value["call"]["roll_call_id"], 3);
}

#[parameterized(
    subscribe = { r#"{"type":"subscribe","topic":"trip:a"}"#, ClientMessage::subscribe("trip:a") },
    unsubscribe = { r#"{"type":"unsubscribe","topic":"trip:a"}"#, ClientMessage::unsubscribe("trip:a") },
    ping = { r#"{"type":"ping","id":9}"#, ClientMessage::ping(9) },
    open_round = {
        r#"{"type":"rpc","id":1,"call":{"method":"open_roll_call","trip_id":"a"}}"#,
        ClientMessage::rpc(1, RpcCall::OpenRollCall { trip_id: "a".into() })
    },
    record = {
        r#"{"type":"rpc","id":2,"call":{"method":"record_response","roll_call_id":5,"participant_id":"s1"}}"#,
        ClientMessage::rpc(2, RpcCall::RecordResponse { roll_call_id: 5, participant_id: "s1".into() })
    },
)]
fn parses_client_messages(json: &str, expected: ClientMessage) {
    assert_eq!(ClientMessage::from_json(json).unwrap(), expected);
}

#[test]
fn upsert_without_optionals_parses() {
    let json = r#"{"type":"rpc","id":3,"call":{"method":"upsert_position","participant_id":"s1","trip_id":"t1","latitude":1.0,"longitude":2.0}}"#;
    match ClientMessage::from_json(json).unwrap() {
        ClientMessage::Rpc { call: RpcCall::UpsertPosition(upsert), .. } => {
            assert_eq!(upsert.accuracy_m, None);
            assert_eq!(upsert.battery_level, None);
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[test]
fn roll_call_events_roundtrip() {
    let response = RollCallResponse {
        roll_call_id: 4,
        participant_id: "s2".into(),
        responded_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    };
    for event in [
        ChannelEvent::RollCallStart { roll_call_id: 4, timeout_seconds: 60 },
        ChannelEvent::RollCallEnd { roll_call_id: 4 },
        ChannelEvent::RollCallResponse(response),
    ] {
        let msg = ServerMessage::event(supervisor_topic("t1"), event);
        let parsed = ServerMessage::from_json(&msg.to_json().unwrap()).unwrap();
        assert_eq!(parsed, msg);
    }
}

#[test]
fn open_round_reply_may_be_empty() {
    let msg = ServerMessage::rpc_result(1, RpcReply::RollCall { roll_call: None });
    let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
    assert_eq!(value["type"], "rpc_result");
    assert_eq!(value["reply"]["kind"], "roll_call");
    assert_eq!(value["reply"]["roll_call"], Value::Null);
}

#[parameterized(
    rpc_error = { ServerMessage::rpc_error(3, "no such round"), "rpc_error" },
    pong = { ServerMessage::pong(3), "pong" },
    error = { ServerMessage::error("bad frame"), "error" },
    subscribed = { ServerMessage::subscribed("trip:x"), "subscribed" },
    ack = { ServerMessage::rpc_result(3, RpcReply::Ack), "rpc_result" },
)]
fn server_message_type_tags(msg: ServerMessage, tag: &str) {
    let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
    assert_eq!(value["type"], tag);
}

#[test]
fn unknown_type_is_rejected() {
    assert!(ClientMessage::from_json(r#"{"type":"teleport"}"#).is_err());
    assert!(ServerMessage::from_json("not json").is_err());
}

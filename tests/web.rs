#![cfg(target_arch = "wasm32")]

use impostor_game::{apply_action, create_session_state, generate_group_id, SessionHub};
use serde::Serialize;
use serde_json::{json, Value};
use wasm_bindgen_test::*;

fn parse(json: &str) -> Value {
    serde_json::from_str(json).expect("hub should return JSON")
}

#[wasm_bindgen_test]
fn hub_registers_and_polls_state() {
    let hub = SessionHub::new(None).expect("default config should load");
    let joined = hub
        .dispatch_json(
            &json!({ "action": "register", "groupId": "g", "playerName": "Ana" }).to_string(),
        )
        .expect("dispatch should succeed");
    assert_eq!(parse(&joined)["success"], true);

    let state = parse(&hub.state_json("g").expect("state should serialize"));
    assert_eq!(state["players"][0]["name"], "Ana");
}

#[wasm_bindgen_test]
fn hub_rejects_invalid_config() {
    assert!(SessionHub::new(Some(r#"{"impostorProbability":2}"#.into())).is_err());
}

#[wasm_bindgen_test]
fn apply_action_round_trips_through_js_values() {
    let state = create_session_state().expect("state should convert");
    let request = json!({
        "action": "register",
        "groupId": "local",
        "playerName": "Ana",
    })
    .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
    .expect("request should convert");

    let result: Value = serde_wasm_bindgen::from_value(
        apply_action(state, request).expect("action should apply"),
    )
    .expect("result should convert");
    assert_eq!(result["response"]["success"], true);
    assert_eq!(result["state"]["players"][0]["name"], "Ana");
}

#[wasm_bindgen_test]
fn group_ids_are_prefixed() {
    assert!(generate_group_id().starts_with("group-"));
}

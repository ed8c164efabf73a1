// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use deespec_adapters::AgentError;
use deespec_core::TaskError;
use deespec_storage::StoreError;

#[test]
fn exit_codes_follow_the_classification() {
    // transient/configuration -> 2
    assert_eq!(
        exit_code(&EngineError::Store(StoreError::Unavailable("db".into()))),
        2
    );
    assert_eq!(exit_code(&EngineError::Prompt("missing".into())), 2);
    // user error -> 1
    assert_eq!(
        exit_code(&EngineError::Task(TaskError::Validation("bad".into()))),
        1
    );
    assert_eq!(
        exit_code(&EngineError::Store(StoreError::not_found("task", "x"))),
        1
    );
    // critical -> 3
    assert_eq!(
        exit_code(&EngineError::Io(std::io::Error::other("disk"))),
        3
    );
}

#[test]
fn json_error_payload_shape() {
    let err = EngineError::Agent(AgentError::Transport("reset".into()));
    let payload = ErrorPayload {
        taxonomy: err.taxonomy(),
        details: err.to_string(),
        retryable: err.retryable(),
        class: None,
    };
    let json = serde_json::to_value(&payload).unwrap();
    assert_eq!(json["taxonomy"], "TransportError");
    assert_eq!(json["retryable"], true);
    assert!(json["details"].as_str().unwrap().contains("reset"));
}

#![allow(dead_code)]

use std::sync::Arc;

use vrtraining_engine::models::{
    CreateSessionRequest, EventPayload, EventType, LifecycleDefinition, Session, SessionKind,
    SubmitMomentRequest,
};
use vrtraining_engine::{EngineConfig, EngineState, LifecycleBuilder, ScoringConfig, SessionService};

pub fn create_test_engine() -> Arc<SessionService> {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    Arc::new(SessionService::new(Arc::new(EngineState::in_memory(
        EngineConfig::default(),
    ))))
}

/// Reference module: one chapter, two moments, weightage 1.0 each,
/// wrongReduction 0.5, passPercentage 0.5 => passMark 1.0.
pub fn reference_definition() -> LifecycleDefinition {
    LifecycleBuilder::new(ScoringConfig::default())
        .build_from_json(
            r#"{
                "name": "Fire Safety Basics",
                "chapters": [{
                    "chapterIndex": 0,
                    "chapterName": "Extinguisher Handling",
                    "moments": [
                        {"momentIndex": 0, "momentName": "Pick the extinguisher", "defaults": ""},
                        {"momentIndex": 1, "momentName": "Aim at the base", "defaults": ""}
                    ]
                }]
            }"#,
        )
        .expect("reference definition should build")
}

/// Module with a single weightage-2.0 moment, for trigger/submit scoring.
pub fn weighted_definition() -> LifecycleDefinition {
    LifecycleBuilder::new(ScoringConfig::default())
        .build_from_json(
            r#"{
                "name": "Valve Shutdown",
                "chapters": [{
                    "chapterIndex": 0,
                    "chapterName": "Shutdown",
                    "moments": [{
                        "momentIndex": 0,
                        "momentName": "Close the valve",
                        "defaults": "{\"weightage\": 2.0, \"wrongReduction\": {\"state\": true, \"reduction\": 0.5}}"
                    }]
                }]
            }"#,
        )
        .expect("weighted definition should build")
}

pub async fn create_session(
    service: &SessionService,
    kind: SessionKind,
    is_multiplayer: bool,
) -> Session {
    create_session_with(service, kind, is_multiplayer, reference_definition()).await
}

pub async fn create_session_with(
    service: &SessionService,
    kind: SessionKind,
    is_multiplayer: bool,
    definition: LifecycleDefinition,
) -> Session {
    service
        .create_session(CreateSessionRequest {
            module_id: "module-fire-safety".to_string(),
            owner_user_id: "owner".to_string(),
            kind,
            is_multiplayer,
            definition,
        })
        .await
        .expect("session should be created")
}

pub fn event(event_type: EventType, time: f64) -> EventPayload {
    EventPayload {
        verb: "interacted".to_string(),
        object: "extinguisher".to_string(),
        time,
        event_type,
    }
}

pub fn submit_request(
    chapter_index: u32,
    moment_index: u32,
    start_time: f64,
    events: Vec<EventPayload>,
) -> SubmitMomentRequest {
    SubmitMomentRequest {
        chapter_index,
        moment_index,
        start_time,
        end_time: None,
        events,
    }
}

use vrtraining_engine::models::{EventType, ExitRequest, JoinRequest, SessionKind};
use vrtraining_engine::EngineError;

mod common;

fn bare_join() -> JoinRequest {
    JoinRequest {
        session_type: None,
        chapter_index: None,
        moment_index: None,
    }
}

fn located_join(chapter_index: u32, moment_index: u32) -> JoinRequest {
    JoinRequest {
        session_type: None,
        chapter_index: Some(chapter_index),
        moment_index: Some(moment_index),
    }
}

fn located_exit(chapter_index: u32, moment_index: u32) -> ExitRequest {
    ExitRequest {
        session_type: None,
        chapter_index: Some(chapter_index),
        moment_index: Some(moment_index),
    }
}

#[tokio::test]
async fn duplicate_submission_is_a_benign_noop() {
    let service = common::create_test_engine();
    let session = common::create_session(&service, SessionKind::Evaluation, true).await;

    let req = common::submit_request(0, 0, 100.0, vec![common::event(EventType::OnRight, 110.0)]);
    let first = service
        .submit_moment(&session.id, "alice", req.clone())
        .await
        .unwrap();
    assert!(!first.already_submitted);

    let before = serde_json::to_value(&first.session).unwrap();
    let second = service
        .submit_moment(&session.id, "bob", req)
        .await
        .unwrap();

    assert!(second.already_submitted);
    assert!(second.message.is_some());
    assert_eq!(serde_json::to_value(&second.session).unwrap(), before);
}

#[tokio::test]
async fn pre_story_join_and_exit_adjust_membership_silently() {
    let service = common::create_test_engine();
    let session = common::create_session(&service, SessionKind::Training, true).await;

    let state = service.join(&session.id, "alice", bare_join()).await.unwrap();
    assert!(state.participants.contains("alice"));
    assert!(state.log.is_empty());

    let state = service
        .exit(
            &session.id,
            "alice",
            ExitRequest {
                session_type: None,
                chapter_index: None,
                moment_index: None,
            },
        )
        .await
        .unwrap();
    assert!(!state.participants.contains("alice"));
    assert!(state.log.is_empty());
}

#[tokio::test]
async fn post_story_membership_requires_location() {
    let service = common::create_test_engine();
    let session = common::create_session(&service, SessionKind::Training, true).await;
    service.start_story(&session.id, "owner").await.unwrap();

    let err = service
        .join(&session.id, "alice", bare_join())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingLocation));

    let state = service
        .join(&session.id, "alice", located_join(0, 0))
        .await
        .unwrap();
    assert!(state.participants.contains("alice"));
    assert!(state.log.has_event(0, 0, EventType::Joined));
}

#[tokio::test]
async fn post_story_exit_records_but_keeps_membership() {
    let service = common::create_test_engine();
    let session = common::create_session(&service, SessionKind::Training, true).await;
    service.join(&session.id, "alice", bare_join()).await.unwrap();
    service.start_story(&session.id, "owner").await.unwrap();

    let state = service
        .exit(&session.id, "alice", located_exit(0, 0))
        .await
        .unwrap();

    assert!(state.participants.contains("alice"));
    assert!(state.log.has_event(0, 0, EventType::Exited));
}

#[tokio::test]
async fn start_story_is_author_only_and_idempotent() {
    let service = common::create_test_engine();
    let session = common::create_session(&service, SessionKind::Training, true).await;

    let err = service.start_story(&session.id, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::NotAuthor));

    let first = service.start_story(&session.id, "owner").await.unwrap();
    assert!(first.story_start_time > 0.0);

    let second = service.start_story(&session.id, "owner").await.unwrap();
    assert_eq!(second.story_start_time, first.story_start_time);
}

#[tokio::test]
async fn membership_calls_are_rejected_on_single_player_sessions() {
    let service = common::create_test_engine();
    let session = common::create_session(&service, SessionKind::Training, false).await;

    let err = service
        .join(&session.id, "alice", bare_join())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidOperation(_)));
}

#[tokio::test]
async fn ending_computes_completed_participants() {
    let service = common::create_test_engine();
    let session = common::create_session(&service, SessionKind::Training, true).await;
    service.join(&session.id, "alice", bare_join()).await.unwrap();
    service.join(&session.id, "bob", bare_join()).await.unwrap();
    service.start_story(&session.id, "owner").await.unwrap();

    service
        .exit(&session.id, "bob", located_exit(0, 0))
        .await
        .unwrap();

    let ended = service.end_session(&session.id, 500.0).await.unwrap();
    assert!(ended.completed_participants.contains("owner"));
    assert!(ended.completed_participants.contains("alice"));
    assert!(!ended.completed_participants.contains("bob"));
}

#[tokio::test]
async fn recorded_exit_survives_a_rejoin() {
    // Preserved source behavior: once an exit event exists anywhere in the
    // log, the participant never counts as completed, even after rejoining.
    let service = common::create_test_engine();
    let session = common::create_session(&service, SessionKind::Training, true).await;
    service.join(&session.id, "alice", bare_join()).await.unwrap();
    service.start_story(&session.id, "owner").await.unwrap();

    service
        .exit(&session.id, "alice", located_exit(0, 0))
        .await
        .unwrap();
    let state = service
        .join(&session.id, "alice", located_join(0, 1))
        .await
        .unwrap();
    let rejoin = state.log.events(0, 1).last().unwrap().clone();
    assert_eq!(rejoin.verb, "Rejoined");

    let ended = service.end_session(&session.id, 500.0).await.unwrap();
    assert!(ended.participants.contains("alice"));
    assert!(!ended.completed_participants.contains("alice"));
}

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod event;
pub mod lifecycle;
pub mod membership;
pub mod moment;
pub mod progress;

pub use event::{EventLog, EventType, LifecycleEvent};
pub use lifecycle::{ChapterDef, LifecycleDefinition, MomentDef, WrongReduction};
pub use membership::{ExitRequest, JoinRequest};
pub use moment::{
    EventPayload, SubmitMomentRequest, SubmitMomentResponse, TriggerRequest, TriggerResponse,
};
pub use progress::{ChapterProgress, MomentProgress, ProgressTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionKind {
    Evaluation,
    Training,
}

/// Evaluation flavour. This engine implements `jsonLifeCycle`, the only mode
/// with chapter/moment structure; the other variants exist so foreign session
/// documents still deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionMode {
    Time,
    Mcq,
    QuestionAction,
    JsonLifeCycle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    /// Evaluation outcome not yet decided.
    Pending,
    Pass,
    Fail,
    /// Training session still running.
    Ongoing,
    Completed,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub module_id: String,
    pub owner_user_id: String,
    pub kind: SessionKind,
    #[serde(default)]
    pub is_multiplayer: bool,
    pub definition: LifecycleDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub module_id: String,
    pub owner_user_id: String,
    pub kind: SessionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<SessionMode>,
    pub is_multiplayer: bool,
    pub participants: BTreeSet<String>,
    pub completed_participants: BTreeSet<String>,
    /// Unix seconds; 0 means the story has not started yet.
    pub story_start_time: f64,
    pub status: SessionStatus,
    pub definition: LifecycleDefinition,
    pub progress: ProgressTree,
    pub log: EventLog,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(req: CreateSessionRequest) -> Self {
        let progress = ProgressTree::from_definition(&req.definition);
        let status = match req.kind {
            SessionKind::Evaluation => SessionStatus::Pending,
            SessionKind::Training => SessionStatus::Ongoing,
        };
        let mode = match req.kind {
            SessionKind::Evaluation => Some(SessionMode::JsonLifeCycle),
            SessionKind::Training => None,
        };
        let mut participants = BTreeSet::new();
        participants.insert(req.owner_user_id.clone());

        Self {
            id: Uuid::new_v4().to_string(),
            module_id: req.module_id,
            owner_user_id: req.owner_user_id,
            kind: req.kind,
            mode,
            is_multiplayer: req.is_multiplayer,
            participants,
            completed_participants: BTreeSet::new(),
            story_start_time: 0.0,
            status,
            definition: req.definition,
            progress,
            log: EventLog::default(),
            created_at: Utc::now(),
        }
    }

    /// A session becomes immutable once its end time is set.
    pub fn is_ended(&self) -> bool {
        self.progress.end_time.is_some()
    }

    pub fn story_started(&self) -> bool {
        self.story_start_time != 0.0
    }
}

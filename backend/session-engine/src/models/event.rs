use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    OnRight,
    OnWrong,
    OnMomentComplete,
    OnRightTrigger,
    OnWrongTrigger,
    OnAdminChange,
    Joined,
    Exited,
}

impl EventType {
    pub fn is_trigger(self) -> bool {
        matches!(
            self,
            EventType::OnRightTrigger | EventType::OnWrongTrigger | EventType::OnAdminChange
        )
    }

    pub fn is_submission(self) -> bool {
        matches!(
            self,
            EventType::OnRight | EventType::OnWrong | EventType::OnMomentComplete
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub verb: String,
    pub object: String,
    /// Unix seconds.
    pub time: f64,
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_name: Option<String>,
}

/// Append-only per-(chapter, moment) event history.
///
/// Keys are `"{chapterIndex}:{momentIndex}"` so the log stays a flat JSON
/// object when serialized with the session document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog(BTreeMap<String, Vec<LifecycleEvent>>);

impl EventLog {
    fn key(chapter_index: u32, moment_index: u32) -> String {
        format!("{}:{}", chapter_index, moment_index)
    }

    pub fn events(&self, chapter_index: u32, moment_index: u32) -> &[LifecycleEvent] {
        self.0
            .get(&Self::key(chapter_index, moment_index))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Append events for a moment, creating the entry if absent. Existing
    /// entries accumulate; nothing is ever replaced.
    pub fn append(
        &mut self,
        chapter_index: u32,
        moment_index: u32,
        events: impl IntoIterator<Item = LifecycleEvent>,
    ) {
        self.0
            .entry(Self::key(chapter_index, moment_index))
            .or_default()
            .extend(events);
    }

    pub fn has_event(&self, chapter_index: u32, moment_index: u32, event_type: EventType) -> bool {
        self.events(chapter_index, moment_index)
            .iter()
            .any(|e| e.event_type == event_type)
    }

    pub fn all_events(&self) -> impl Iterator<Item = &LifecycleEvent> {
        self.0.values().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

use serde::{Deserialize, Serialize};

use super::SessionKind;

/// Join a multiplayer session. Location is required once the story has
/// started, so the join lands in a concrete moment's event history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_type: Option<SessionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moment_index: Option<u32>,
}

/// Leave a multiplayer session. After story start the exit is recorded as an
/// event but membership is never revoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_type: Option<SessionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moment_index: Option<u32>,
}

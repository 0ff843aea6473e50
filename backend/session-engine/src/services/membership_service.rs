use std::collections::BTreeSet;

use crate::errors::{EngineError, EngineResult};
use crate::models::{
    EventType, ExitRequest, JoinRequest, LifecycleEvent, Session, SessionKind,
};

/// What a join/exit call actually did, for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipAction {
    Joined,
    Rejoined,
    Exited,
}

impl MembershipAction {
    pub fn label(self) -> &'static str {
        match self {
            MembershipAction::Joined => "joined",
            MembershipAction::Rejoined => "rejoined",
            MembershipAction::Exited => "exited",
        }
    }
}

pub fn join(
    session: &Session,
    user_id: &str,
    req: &JoinRequest,
    now: f64,
) -> EngineResult<(Session, MembershipAction)> {
    if session.is_ended() {
        return Err(EngineError::AlreadyEnded);
    }
    if !session.is_multiplayer {
        return Err(EngineError::InvalidOperation(
            "join is only available on multiplayer sessions".to_string(),
        ));
    }
    check_session_type(session, req.session_type)?;

    let mut next = session.clone();

    // Pre-story joins are a pure membership union; nothing is logged yet.
    if !session.story_started() {
        next.participants.insert(user_id.to_string());
        return Ok((next, MembershipAction::Joined));
    }

    let (chapter_index, moment_index) = location(req.chapter_index, req.moment_index)?;
    resolve_moment(session, chapter_index, moment_index)?;

    let rejoined = session.participants.contains(user_id);
    let verb = if rejoined { "Rejoined" } else { "Joined" };
    next.log.append(
        chapter_index,
        moment_index,
        [LifecycleEvent {
            verb: verb.to_string(),
            object: user_id.to_string(),
            time: now,
            event_type: EventType::Joined,
            user_id: Some(user_id.to_string()),
            trigger_name: None,
        }],
    );
    next.participants.insert(user_id.to_string());

    let action = if rejoined {
        MembershipAction::Rejoined
    } else {
        MembershipAction::Joined
    };
    Ok((next, action))
}

pub fn exit(
    session: &Session,
    user_id: &str,
    req: &ExitRequest,
    now: f64,
) -> EngineResult<(Session, MembershipAction)> {
    if session.is_ended() {
        return Err(EngineError::AlreadyEnded);
    }
    if !session.is_multiplayer {
        return Err(EngineError::InvalidOperation(
            "exit is only available on multiplayer sessions".to_string(),
        ));
    }
    check_session_type(session, req.session_type)?;
    if !session.participants.contains(user_id) {
        return Err(EngineError::NotParticipant(user_id.to_string()));
    }

    let mut next = session.clone();

    // Before story start leaving really removes the user.
    if !session.story_started() {
        next.participants.remove(user_id);
        return Ok((next, MembershipAction::Exited));
    }

    // Once play has begun an exit is recorded, not a membership revocation.
    let (chapter_index, moment_index) = location(req.chapter_index, req.moment_index)?;
    resolve_moment(session, chapter_index, moment_index)?;

    next.log.append(
        chapter_index,
        moment_index,
        [LifecycleEvent {
            verb: "Exited".to_string(),
            object: user_id.to_string(),
            time: now,
            event_type: EventType::Exited,
            user_id: Some(user_id.to_string()),
            trigger_name: None,
        }],
    );

    Ok((next, MembershipAction::Exited))
}

/// Participants that finished the session: everyone still in `participants`
/// minus anyone with an `exited` event anywhere in the log. A later rejoin
/// does not clear a recorded exit.
pub fn completed_participants(session: &Session) -> BTreeSet<String> {
    let exited: BTreeSet<&str> = session
        .log
        .all_events()
        .filter(|e| e.event_type == EventType::Exited)
        .filter_map(|e| e.user_id.as_deref())
        .collect();

    session
        .participants
        .iter()
        .filter(|p| !exited.contains(p.as_str()))
        .cloned()
        .collect()
}

fn check_session_type(session: &Session, requested: Option<SessionKind>) -> EngineResult<()> {
    match requested {
        Some(kind) if kind != session.kind => Err(EngineError::InvalidOperation(format!(
            "session type mismatch: session is {:?}",
            session.kind
        ))),
        _ => Ok(()),
    }
}

fn location(chapter_index: Option<u32>, moment_index: Option<u32>) -> EngineResult<(u32, u32)> {
    match (chapter_index, moment_index) {
        (Some(chapter), Some(moment)) => Ok((chapter, moment)),
        _ => Err(EngineError::MissingLocation),
    }
}

fn resolve_moment(session: &Session, chapter_index: u32, moment_index: u32) -> EngineResult<()> {
    session
        .definition
        .chapter(chapter_index)
        .ok_or(EngineError::ChapterNotFound(chapter_index))?
        .moment(moment_index)
        .ok_or(EngineError::MomentNotFound(chapter_index, moment_index))?;
    Ok(())
}

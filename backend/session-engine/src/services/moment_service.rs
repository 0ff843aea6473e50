use validator::Validate;

use crate::errors::{EngineError, EngineResult};
use crate::models::{
    EventType, LifecycleEvent, Session, SessionKind, SessionStatus, SubmitMomentRequest,
    TriggerRequest,
};
use crate::services::membership_service;
use crate::utils::scoring::round2;

/// Result of a submission, alongside the next session state.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub already_submitted: bool,
    pub message: Option<String>,
}

/// Apply the authoritative "moment finished" transition.
///
/// Pure: computes the next session state from the current one without
/// touching either on error. The coordinator commits the returned state only
/// after it has been persisted, so a failed write never leaves a torn tree.
pub fn submit_moment(
    session: &Session,
    actor_id: &str,
    req: &SubmitMomentRequest,
) -> EngineResult<(Session, SubmitOutcome)> {
    if session.is_ended() {
        return Err(EngineError::AlreadyEnded);
    }

    req.validate()
        .map_err(|e| EngineError::InvalidEvent(e.to_string()))?;

    let chapter_def = session
        .definition
        .chapter(req.chapter_index)
        .ok_or(EngineError::ChapterNotFound(req.chapter_index))?;
    let moment_def = chapter_def
        .moment(req.moment_index)
        .ok_or(EngineError::MomentNotFound(
            req.chapter_index,
            req.moment_index,
        ))?;
    let current = session
        .progress
        .moment(req.chapter_index, req.moment_index)
        .ok_or(EngineError::MomentNotFound(
            req.chapter_index,
            req.moment_index,
        ))?;

    if current.is_ended() {
        if session.is_multiplayer {
            // Benign concurrent duplicate: another participant got here first.
            return Ok((
                session.clone(),
                SubmitOutcome {
                    already_submitted: true,
                    message: Some("moment already submitted by another participant".to_string()),
                },
            ));
        }
        return Err(EngineError::AlreadyEvaluated);
    }

    let mut on_right = Vec::new();
    let mut on_wrong = Vec::new();
    let mut on_complete = Vec::new();
    for event in &req.events {
        match event.event_type {
            EventType::OnRight => on_right.push(event),
            EventType::OnWrong => on_wrong.push(event),
            EventType::OnMomentComplete => on_complete.push(event),
            other => {
                return Err(EngineError::InvalidEvent(format!(
                    "{} is not a submission event type",
                    event_type_label(other)
                )))
            }
        }
    }
    if on_right.is_empty() && on_complete.is_empty() {
        return Err(EngineError::InvalidEvent(
            "at least one onRight or onMomentComplete event is required".to_string(),
        ));
    }

    let end_event_time = match on_complete.first() {
        Some(complete) => complete.time,
        None => on_right
            .iter()
            .map(|e| e.time)
            .fold(f64::NEG_INFINITY, f64::max),
    };
    let total_time = end_event_time - req.start_time;
    if total_time < 0.0 {
        return Err(EngineError::InvalidTimeOrder);
    }

    // Wrongs already charged live via triggers keep their running score;
    // otherwise the moment is scored fresh from the submitted wrong events.
    let scored_via_trigger =
        session
            .log
            .has_event(req.chapter_index, req.moment_index, EventType::OnWrongTrigger);
    let total_scored = if scored_via_trigger {
        current.total_scored
    } else if moment_def.wrong_reduction.state {
        round2(
            (moment_def.weightage - moment_def.wrong_reduction.reduction * on_wrong.len() as f64)
                .max(0.0),
        )
    } else {
        moment_def.weightage
    };

    let mut next = session.clone();
    let moment_end = round2(req.start_time + total_time);
    {
        let chapter = next
            .progress
            .chapter_mut(req.chapter_index)
            .ok_or(EngineError::ChapterNotFound(req.chapter_index))?;
        if chapter.start_time.is_none() {
            chapter.start_time = Some(req.start_time);
        }
        let moment = chapter
            .moment_mut(req.moment_index)
            .ok_or(EngineError::MomentNotFound(
                req.chapter_index,
                req.moment_index,
            ))?;
        moment.start_time = Some(req.start_time);
        moment.end_time = Some(moment_end);
        moment.total_time_taken = total_time;
        moment.total_scored = total_scored;
    }
    if next.progress.start_time.is_none() {
        next.progress.start_time = Some(req.start_time);
    }
    next.progress.rollup();

    if chapter_def.last_moment_index() == Some(req.moment_index) {
        let chapter = next
            .progress
            .chapter_mut(req.chapter_index)
            .ok_or(EngineError::ChapterNotFound(req.chapter_index))?;
        chapter.end_time = Some(round2(req.start_time + chapter.total_time_taken));

        if next.definition.last_chapter_index() == Some(req.chapter_index) {
            let session_end = req.end_time.unwrap_or(moment_end);
            close_session(&mut next, session_end);
        }
    }

    next.log.append(
        req.chapter_index,
        req.moment_index,
        req.events.iter().cloned().map(|e| e.into_event(actor_id)),
    );

    Ok((
        next,
        SubmitOutcome {
            already_submitted: false,
            message: None,
        },
    ))
}

/// Apply an incremental trigger event.
///
/// Returns the next state and whether the trigger mutated the score path
/// (`false` when the moment had already ended and the event was only
/// recorded for audit).
pub fn apply_trigger(
    session: &Session,
    actor_id: &str,
    req: &TriggerRequest,
    now: f64,
) -> EngineResult<(Session, bool)> {
    if req.trigger_type != EventType::OnAdminChange && !session.story_started() {
        return Err(EngineError::StoryNotStarted);
    }
    if session.is_ended() {
        return Err(EngineError::AlreadyEnded);
    }

    session
        .definition
        .chapter(req.chapter_index)
        .ok_or(EngineError::ChapterNotFound(req.chapter_index))?;
    let current = session
        .progress
        .moment(req.chapter_index, req.moment_index)
        .ok_or(EngineError::MomentNotFound(
            req.chapter_index,
            req.moment_index,
        ))?;

    let mut event = LifecycleEvent {
        verb: req
            .verb
            .clone()
            .unwrap_or_else(|| event_type_label(req.trigger_type).to_string()),
        object: req.object.clone().unwrap_or_default(),
        time: req.time.unwrap_or(now),
        event_type: req.trigger_type,
        user_id: Some(actor_id.to_string()),
        trigger_name: req.trigger_name.clone(),
    };

    let mut next = session.clone();

    if current.is_ended() {
        // Late trigger against a terminal moment: keep it for audit, flag it,
        // and leave every score untouched.
        event.object = format!("{} (FLOW ERROR -> MOMENT ENDED)", event.object);
        next.log.append(req.chapter_index, req.moment_index, [event]);
        return Ok((next, false));
    }

    match req.trigger_type {
        EventType::OnWrongTrigger => {
            let first_penalty =
                !session
                    .log
                    .has_event(req.chapter_index, req.moment_index, EventType::OnWrongTrigger);
            let moment = next
                .progress
                .chapter_mut(req.chapter_index)
                .ok_or(EngineError::ChapterNotFound(req.chapter_index))?
                .moment_mut(req.moment_index)
                .ok_or(EngineError::MomentNotFound(
                    req.chapter_index,
                    req.moment_index,
                ))?;
            if first_penalty {
                moment.total_scored = moment.weightage;
            }
            if moment.wrong_reduction.state {
                moment.total_scored =
                    round2((moment.total_scored - moment.wrong_reduction.reduction).max(0.0));
            }
            next.progress.rollup();
        }
        EventType::OnRightTrigger => {
            // Recorded only; right answers never move the running score.
        }
        EventType::OnAdminChange => {
            if !session.is_multiplayer {
                return Err(EngineError::InvalidOperation(
                    "admin change requires a multiplayer session".to_string(),
                ));
            }
            next.owner_user_id = actor_id.to_string();
        }
        other => {
            return Err(EngineError::InvalidEvent(format!(
                "{} is not a trigger event type",
                event_type_label(other)
            )))
        }
    }

    next.log.append(req.chapter_index, req.moment_index, [event]);
    Ok((next, true))
}

/// Close every open chapter at `end_time` and finish the session.
pub fn end_session(session: &Session, end_time: f64) -> EngineResult<Session> {
    if session.is_ended() {
        return Err(EngineError::AlreadyEnded);
    }

    let mut next = session.clone();
    for chapter in &mut next.progress.chapters {
        if chapter.end_time.is_none() {
            if chapter.start_time.is_none() {
                chapter.start_time = Some(end_time);
            }
            chapter.end_time = Some(end_time);
        }
    }
    next.progress.rollup();
    close_session(&mut next, end_time);
    Ok(next)
}

/// Shared terminal transition for explicit `End` and last-moment auto-close.
fn close_session(session: &mut Session, end_time: f64) {
    session.progress.end_time = Some(end_time);
    if session.progress.start_time.is_none() {
        let first_chapter_start = session
            .progress
            .chapters
            .iter()
            .filter_map(|c| c.start_time)
            .fold(f64::INFINITY, f64::min);
        session.progress.start_time = Some(if first_chapter_start.is_finite() {
            first_chapter_start
        } else {
            end_time
        });
    }

    match session.kind {
        SessionKind::Evaluation => {
            // Status leaves pending exactly once; later writes never reconsider.
            if session.status == SessionStatus::Pending {
                session.status = if session.progress.total_scored >= session.definition.pass_mark {
                    SessionStatus::Pass
                } else {
                    SessionStatus::Fail
                };
            }
        }
        SessionKind::Training => {
            if session.status == SessionStatus::Ongoing {
                session.status = SessionStatus::Completed;
            }
        }
    }

    if session.is_multiplayer {
        session.completed_participants = membership_service::completed_participants(session);
    }
}

pub(crate) fn event_type_label(event_type: EventType) -> &'static str {
    match event_type {
        EventType::OnRight => "onRight",
        EventType::OnWrong => "onWrong",
        EventType::OnMomentComplete => "onMomentComplete",
        EventType::OnRightTrigger => "onRightTrigger",
        EventType::OnWrongTrigger => "onWrongTrigger",
        EventType::OnAdminChange => "onAdminChange",
        EventType::Joined => "joined",
        EventType::Exited => "exited",
    }
}

use std::sync::Arc;

use anyhow::anyhow;
use dashmap::mapref::entry::Entry;
use tokio::sync::{mpsc, oneshot};

use crate::errors::{EngineError, EngineResult};
use crate::metrics::{
    MEMBERSHIP_EVENTS_TOTAL, MOMENTS_SUBMITTED_TOTAL, SESSIONS_ACTIVE, SESSIONS_TOTAL,
    STORE_RETRIES_EXHAUSTED_TOTAL, TRIGGERS_APPLIED_TOTAL,
};
use crate::models::{
    CreateSessionRequest, ExitRequest, JoinRequest, Session, SessionKind, SubmitMomentRequest,
    SubmitMomentResponse, TriggerRequest, TriggerResponse,
};
use crate::services::moment_service::event_type_label;
use crate::services::{membership_service, moment_service, EngineState};
use crate::storage::SessionStore;
use crate::telemetry::TelemetrySink;
use crate::utils::retry::{with_retry, RetryPolicy};
use crate::utils::time::now_unix;

/// Commands accepted by a session's single-writer actor. Every mutating
/// operation on one session flows through its mailbox, which is what
/// linearizes concurrent participants.
enum Command {
    Submit {
        actor_id: String,
        req: SubmitMomentRequest,
        reply: oneshot::Sender<EngineResult<SubmitMomentResponse>>,
    },
    Trigger {
        actor_id: String,
        req: TriggerRequest,
        reply: oneshot::Sender<EngineResult<TriggerResponse>>,
    },
    StartStory {
        actor_id: String,
        reply: oneshot::Sender<EngineResult<Session>>,
    },
    End {
        end_time: f64,
        reply: oneshot::Sender<EngineResult<Session>>,
    },
    Join {
        user_id: String,
        req: JoinRequest,
        reply: oneshot::Sender<EngineResult<Session>>,
    },
    Exit {
        user_id: String,
        req: ExitRequest,
        reply: oneshot::Sender<EngineResult<Session>>,
    },
    Snapshot {
        reply: oneshot::Sender<Session>,
    },
}

#[derive(Clone)]
pub(crate) struct SessionHandle {
    tx: mpsc::Sender<Command>,
}

/// Owns one session's in-memory state and processes its mailbox one command
/// at a time. A caller that gives up waiting merely drops its reply receiver;
/// the in-flight mutation still runs to completion.
struct SessionActor {
    session: Session,
    store: Arc<dyn SessionStore>,
    telemetry: Arc<dyn TelemetrySink>,
    retry: RetryPolicy,
}

impl SessionActor {
    fn spawn(
        session: Session,
        store: Arc<dyn SessionStore>,
        telemetry: Arc<dyn TelemetrySink>,
        retry: RetryPolicy,
        mailbox_capacity: usize,
    ) -> SessionHandle {
        let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));
        let actor = SessionActor {
            session,
            store,
            telemetry,
            retry,
        };
        tokio::spawn(actor.run(rx));
        SessionHandle { tx }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(command) = rx.recv().await {
            if self.handle(command).await {
                break;
            }
        }
        // Terminal state reached: refuse new commands, then drain what was
        // already queued so every waiting caller gets AlreadyEnded instead of
        // a dead channel.
        rx.close();
        while let Ok(command) = rx.try_recv() {
            let _ = self.handle(command).await;
        }
        tracing::debug!(session_id = %self.session.id, "session actor retired");
    }

    /// Returns true once the session has reached its terminal state.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Submit {
                actor_id,
                req,
                reply,
            } => {
                let result = self.submit(&actor_id, req).await;
                let _ = reply.send(result);
            }
            Command::Trigger {
                actor_id,
                req,
                reply,
            } => {
                let result = self.trigger(&actor_id, req).await;
                let _ = reply.send(result);
            }
            Command::StartStory { actor_id, reply } => {
                let result = self.start_story(&actor_id).await;
                let _ = reply.send(result);
            }
            Command::End { end_time, reply } => {
                let result = self.end(end_time).await;
                let _ = reply.send(result);
            }
            Command::Join {
                user_id,
                req,
                reply,
            } => {
                let result = self.membership(&user_id, MembershipOp::Join(req)).await;
                let _ = reply.send(result);
            }
            Command::Exit {
                user_id,
                req,
                reply,
            } => {
                let result = self.membership(&user_id, MembershipOp::Exit(req)).await;
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.session.clone());
            }
        }
        self.session.is_ended()
    }

    /// Persist the next state, then commit it. The in-memory session only
    /// advances after the store write succeeds, so a failed write never
    /// leaves the actor ahead of the document.
    async fn commit(&mut self, next: Session) -> EngineResult<()> {
        {
            let store = Arc::clone(&self.store);
            with_retry(&self.retry, || store.save(&next))
                .await
                .map_err(|e| {
                    STORE_RETRIES_EXHAUSTED_TOTAL.inc();
                    tracing::error!(session_id = %next.id, error = %e, "session store write failed after retries");
                    EngineError::Storage(e)
                })?;
        }
        self.session = next;
        Ok(())
    }

    async fn submit(
        &mut self,
        actor_id: &str,
        req: SubmitMomentRequest,
    ) -> EngineResult<SubmitMomentResponse> {
        let (next, outcome) = moment_service::submit_moment(&self.session, actor_id, &req)?;

        if outcome.already_submitted {
            MOMENTS_SUBMITTED_TOTAL
                .with_label_values(&["already_submitted"])
                .inc();
            tracing::info!(
                session_id = %self.session.id,
                chapter = req.chapter_index,
                moment = req.moment_index,
                user = %actor_id,
                "duplicate submission ignored"
            );
            return Ok(SubmitMomentResponse {
                already_submitted: true,
                message: outcome.message,
                session: self.session.clone(),
            });
        }

        self.commit(next).await?;
        MOMENTS_SUBMITTED_TOTAL.with_label_values(&["scored"]).inc();
        self.telemetry
            .moment_submitted(&self.session, req.chapter_index, req.moment_index)
            .await;
        tracing::info!(
            session_id = %self.session.id,
            chapter = req.chapter_index,
            moment = req.moment_index,
            total_scored = self.session.progress.total_scored,
            "moment submitted"
        );

        if self.session.is_ended() {
            self.telemetry.session_ended(&self.session).await;
            tracing::info!(
                session_id = %self.session.id,
                status = ?self.session.status,
                "session closed by final moment submission"
            );
        }

        Ok(SubmitMomentResponse {
            already_submitted: false,
            message: None,
            session: self.session.clone(),
        })
    }

    async fn trigger(&mut self, actor_id: &str, req: TriggerRequest) -> EngineResult<TriggerResponse> {
        let (next, success) =
            moment_service::apply_trigger(&self.session, actor_id, &req, now_unix())?;
        self.commit(next).await?;

        TRIGGERS_APPLIED_TOTAL
            .with_label_values(&[event_type_label(req.trigger_type)])
            .inc();
        tracing::debug!(
            session_id = %self.session.id,
            chapter = req.chapter_index,
            moment = req.moment_index,
            trigger = event_type_label(req.trigger_type),
            success,
            "trigger processed"
        );

        let message = if success {
            None
        } else {
            Some("moment already ended; event recorded for audit".to_string())
        };
        Ok(TriggerResponse {
            success,
            message,
            session: self.session.clone(),
        })
    }

    async fn start_story(&mut self, actor_id: &str) -> EngineResult<Session> {
        if self.session.is_ended() {
            return Err(EngineError::AlreadyEnded);
        }
        if actor_id != self.session.owner_user_id {
            return Err(EngineError::NotAuthor);
        }

        if !self.session.story_started() {
            let mut next = self.session.clone();
            next.story_start_time = now_unix();
            self.commit(next).await?;
            tracing::info!(
                session_id = %self.session.id,
                story_start = self.session.story_start_time,
                "story started"
            );
        }
        Ok(self.session.clone())
    }

    async fn end(&mut self, end_time: f64) -> EngineResult<Session> {
        let next = moment_service::end_session(&self.session, end_time)?;
        self.commit(next).await?;
        self.telemetry.session_ended(&self.session).await;
        tracing::info!(
            session_id = %self.session.id,
            status = ?self.session.status,
            total_scored = self.session.progress.total_scored,
            "session ended"
        );
        Ok(self.session.clone())
    }

    async fn membership(&mut self, user_id: &str, op: MembershipOp) -> EngineResult<Session> {
        let (next, action) = match &op {
            MembershipOp::Join(req) => {
                membership_service::join(&self.session, user_id, req, now_unix())?
            }
            MembershipOp::Exit(req) => {
                membership_service::exit(&self.session, user_id, req, now_unix())?
            }
        };
        self.commit(next).await?;

        MEMBERSHIP_EVENTS_TOTAL
            .with_label_values(&[action.label()])
            .inc();
        tracing::info!(
            session_id = %self.session.id,
            user = %user_id,
            action = action.label(),
            "membership updated"
        );
        Ok(self.session.clone())
    }
}

enum MembershipOp {
    Join(JoinRequest),
    Exit(ExitRequest),
}

/// Public entry point for all session operations. Owns the registry of
/// resident session actors and routes each call to the right mailbox.
pub struct SessionService {
    state: Arc<EngineState>,
}

impl SessionService {
    pub fn new(state: Arc<EngineState>) -> Self {
        Self { state }
    }

    pub async fn create_session(&self, req: CreateSessionRequest) -> EngineResult<Session> {
        let session = Session::new(req);

        let retry = self.state.config.store_retry();
        let store = Arc::clone(&self.state.store);
        with_retry(&retry, || store.save(&session))
            .await
            .map_err(|e| {
                STORE_RETRIES_EXHAUSTED_TOTAL.inc();
                EngineError::Storage(e)
            })?;

        self.insert_actor(session.clone());
        SESSIONS_TOTAL
            .with_label_values(&[kind_label(session.kind)])
            .inc();
        tracing::info!(
            session_id = %session.id,
            module_id = %session.module_id,
            multiplayer = session.is_multiplayer,
            kind = kind_label(session.kind),
            "session created"
        );
        Ok(session)
    }

    pub async fn submit_moment(
        &self,
        session_id: &str,
        actor_id: &str,
        req: SubmitMomentRequest,
    ) -> EngineResult<SubmitMomentResponse> {
        let response = self
            .dispatch(session_id, |reply| Command::Submit {
                actor_id: actor_id.to_string(),
                req: req.clone(),
                reply,
            })
            .await?;
        if response.session.is_ended() {
            self.evict(session_id);
        }
        Ok(response)
    }

    pub async fn trigger(
        &self,
        session_id: &str,
        actor_id: &str,
        req: TriggerRequest,
    ) -> EngineResult<TriggerResponse> {
        self.dispatch(session_id, |reply| Command::Trigger {
            actor_id: actor_id.to_string(),
            req: req.clone(),
            reply,
        })
        .await
    }

    pub async fn start_story(&self, session_id: &str, actor_id: &str) -> EngineResult<Session> {
        self.dispatch(session_id, |reply| Command::StartStory {
            actor_id: actor_id.to_string(),
            reply,
        })
        .await
    }

    pub async fn end_session(&self, session_id: &str, end_time: f64) -> EngineResult<Session> {
        let session = self
            .dispatch(session_id, |reply| Command::End { end_time, reply })
            .await?;
        self.evict(session_id);
        Ok(session)
    }

    pub async fn join(
        &self,
        session_id: &str,
        user_id: &str,
        req: JoinRequest,
    ) -> EngineResult<Session> {
        self.dispatch(session_id, |reply| Command::Join {
            user_id: user_id.to_string(),
            req: req.clone(),
            reply,
        })
        .await
    }

    pub async fn exit(
        &self,
        session_id: &str,
        user_id: &str,
        req: ExitRequest,
    ) -> EngineResult<Session> {
        self.dispatch(session_id, |reply| Command::Exit {
            user_id: user_id.to_string(),
            req: req.clone(),
            reply,
        })
        .await
    }

    /// Read the current state. Resident sessions answer from their actor so
    /// the view is linearized with in-flight writes; everything else is read
    /// straight from the store.
    pub async fn get_session(&self, session_id: &str) -> EngineResult<Session> {
        let handle = self
            .state
            .sessions
            .get(session_id)
            .map(|entry| entry.value().clone());
        if let Some(handle) = handle {
            let (tx, rx) = oneshot::channel();
            if handle.tx.send(Command::Snapshot { reply: tx }).await.is_ok() {
                if let Ok(session) = rx.await {
                    return Ok(session);
                }
            }
            self.evict(session_id);
        }

        let loaded = self
            .state
            .store
            .load(session_id)
            .await
            .map_err(EngineError::Storage)?;
        loaded.ok_or_else(|| EngineError::NotFound(session_id.to_string()))
    }

    async fn dispatch<R>(
        &self,
        session_id: &str,
        mut make: impl FnMut(oneshot::Sender<EngineResult<R>>) -> Command,
    ) -> EngineResult<R> {
        // One retry: the handle may be stale if the actor retired between
        // lookup and send (session just ended).
        for _ in 0..2 {
            let handle = self.handle_for(session_id).await?;
            let (tx, rx) = oneshot::channel();
            if handle.tx.send(make(tx)).await.is_err() {
                self.evict(session_id);
                continue;
            }
            return match rx.await {
                Ok(result) => result,
                Err(_) => Err(EngineError::Storage(anyhow!(
                    "session worker dropped the reply"
                ))),
            };
        }
        Err(EngineError::Storage(anyhow!("session worker unavailable")))
    }

    async fn handle_for(&self, session_id: &str) -> EngineResult<SessionHandle> {
        if let Some(entry) = self.state.sessions.get(session_id) {
            return Ok(entry.value().clone());
        }

        let loaded = self
            .state
            .store
            .load(session_id)
            .await
            .map_err(EngineError::Storage)?;
        let session = loaded.ok_or_else(|| EngineError::NotFound(session_id.to_string()))?;
        Ok(self.insert_actor(session))
    }

    fn insert_actor(&self, session: Session) -> SessionHandle {
        match self.state.sessions.entry(session.id.clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let handle = SessionActor::spawn(
                    session,
                    Arc::clone(&self.state.store),
                    Arc::clone(&self.state.telemetry),
                    self.state.config.store_retry(),
                    self.state.config.mailbox_capacity,
                );
                entry.insert(handle.clone());
                SESSIONS_ACTIVE.inc();
                handle
            }
        }
    }

    fn evict(&self, session_id: &str) {
        if self.state.sessions.remove(session_id).is_some() {
            SESSIONS_ACTIVE.dec();
        }
    }
}

fn kind_label(kind: SessionKind) -> &'static str {
    match kind {
        SessionKind::Evaluation => "evaluation",
        SessionKind::Training => "training",
    }
}

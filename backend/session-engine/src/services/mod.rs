use std::sync::Arc;

use dashmap::DashMap;

use crate::config::EngineConfig;
use crate::storage::{InMemorySessionStore, SessionStore};
use crate::telemetry::{NoopTelemetry, TelemetrySink};

use self::session_service::SessionHandle;

/// Shared engine state: configuration, the persistence/telemetry ports and
/// the registry of resident session actors.
pub struct EngineState {
    pub config: EngineConfig,
    pub store: Arc<dyn SessionStore>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub(crate) sessions: DashMap<String, SessionHandle>,
}

impl EngineState {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn SessionStore>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            config,
            store,
            telemetry,
            sessions: DashMap::new(),
        }
    }

    /// State backed by the in-memory store and a no-op telemetry sink, for
    /// tests and single-process embedding.
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(
            config,
            Arc::new(InMemorySessionStore::default()),
            Arc::new(NoopTelemetry),
        )
    }
}

pub mod lifecycle_builder;
pub mod membership_service;
pub mod moment_service;
pub mod session_service;

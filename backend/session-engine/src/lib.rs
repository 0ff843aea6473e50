//! Lifecycle Session Engine for VR training modules: tracks learner progress
//! through chapters and moments, applies decay/penalty scoring, and keeps
//! multiplayer sessions consistent under concurrent writers.

pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod services;
pub mod storage;
pub mod telemetry;
pub mod utils;

pub use config::EngineConfig;
pub use errors::{EngineError, EngineResult};
pub use services::lifecycle_builder::{LifecycleBuilder, ScoringConfig};
pub use services::session_service::SessionService;
pub use services::EngineState;

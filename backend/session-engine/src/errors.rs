use thiserror::Error;

/// Caller-visible error taxonomy for the lifecycle engine.
///
/// All variants are terminal from the engine's point of view: nothing here is
/// retried internally except store writes, which only surface as [`EngineError::Storage`]
/// once the retry budget is exhausted.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("chapter {0} not found")]
    ChapterNotFound(u32),

    #[error("moment {1} not found in chapter {0}")]
    MomentNotFound(u32, u32),

    #[error("session already ended")]
    AlreadyEnded,

    #[error("moment already evaluated")]
    AlreadyEvaluated,

    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("computed end time precedes start time")]
    InvalidTimeOrder,

    #[error("story has not started")]
    StoryNotStarted,

    #[error("only the session author may perform this operation")]
    NotAuthor,

    #[error("user {0} is not a participant of this session")]
    NotParticipant(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("chapterIndex and momentIndex are required once the story has started")]
    MissingLocation,

    #[error("invalid lifecycle definition: {0}")]
    InvalidDefinition(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

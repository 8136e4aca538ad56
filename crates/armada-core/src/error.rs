use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArmadaError {
    #[error("not initialized: run 'armada init'")]
    NotInitialized,

    #[error("dispatch rejected by transport: {0}")]
    DispatchRejected(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("illegal task transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    #[error("invalid task state: {0}")]
    InvalidTaskState(String),

    #[error("task payload is missing required field '{0}'")]
    MissingPayloadField(String),

    #[error("invalid sentinel pattern for '{script}': {message}")]
    InvalidPattern { script: String, message: String },

    #[error("resource store error: {0}")]
    Store(String),

    #[error("queue db error: {0}")]
    QueueDb(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ArmadaError>;

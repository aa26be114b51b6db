pub type PaperpanResult<T> = Result<T, PaperpanError>;

#[derive(thiserror::Error, Debug)]
pub enum PaperpanError {
    /// Startup configuration is unusable (e.g. the anchor segment never
    /// appears in an enumerated path). Fatal; retrying cannot help.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Any failure while building a scene, animating it, or rendering a
    /// frame. Fatal to the current worker process; recovery is a full
    /// restart by the supervisor.
    #[error("render failure: {0}")]
    Render(String),

    /// The supervisor could not start the worker process at all.
    #[error("launch failure: {0}")]
    Launch(String),

    /// I/O on the checkpoint log.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PaperpanError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn launch(msg: impl Into<String>) -> Self {
        Self::Launch(msg.into())
    }

    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::Checkpoint(msg.into())
    }
}

pub type ShowreelResult<T> = Result<T, ShowreelError>;

#[derive(thiserror::Error, Debug)]
pub enum ShowreelError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("degenerate geometry: {0}")]
    Geometry(String),

    #[error("invalid intrinsics: {0}")]
    Intrinsics(String),

    #[error("missing resource: {0}")]
    Resource(String),

    #[error("command '{command}' failed with status {status}")]
    Command { command: String, status: i32 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ShowreelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }

    pub fn intrinsics(msg: impl Into<String>) -> Self {
        Self::Intrinsics(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }
}

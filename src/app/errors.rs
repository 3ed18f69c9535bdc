#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("room {0} is not available")]
    RoomUnavailable(u64),

    #[error("customer with email {0} already exists")]
    AlreadyExists(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}

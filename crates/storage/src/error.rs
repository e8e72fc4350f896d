use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unreachable after {attempts} attempt(s): {message}")]
    Connectivity { attempts: u32, message: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unknown employee: {0}")]
    UnknownEmployee(String),

    #[error(transparent)]
    Core(#[from] rota_core::RotaError),
}

impl StoreError {
    /// Whether waiting and trying again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connectivity { .. } => true,
            Self::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
            Self::UnknownEmployee(_) | Self::Core(_) => false,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

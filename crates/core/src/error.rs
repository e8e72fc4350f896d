use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RotaError {
    #[error("missing required config: {}", .0.join(", "))]
    MissingConfig(Vec<String>),

    #[error("invalid config: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("invalid employee field '{field}': {message}")]
    InvalidEmployee { field: String, message: String },

    #[error("invalid rule field '{field}': {message}")]
    InvalidRule { field: String, message: String },

    #[error("cannot decode {column}: {message}")]
    Encoding { column: String, message: String },
}

pub type RotaResult<T> = Result<T, RotaError>;

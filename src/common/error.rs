//! Error handling for PrismDB pivot rewriting

use thiserror::Error;

/// Main error type for binding, rewriting and executing queries
#[derive(Error, Debug)]
pub enum PrismError {
    /// Structural mismatch between declared counts (IN-list arity, UNPIVOT names)
    #[error("Shape error: {0}")]
    Shape(String),

    /// Semantic error raised while binding a statement
    #[error("Binder error: {0}")]
    Binder(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid type: {0}")]
    InvalidType(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for PrismError {
    fn from(err: serde_json::Error) -> Self {
        PrismError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for PrismError {
    fn from(err: csv::Error) -> Self {
        PrismError::Serialization(err.to_string())
    }
}

/// Result type alias for PrismDB operations
pub type PrismResult<T> = std::result::Result<T, PrismError>;

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_err {
    ($msg:expr) => {
        $crate::common::error::PrismError::Internal($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::common::error::PrismError::Internal(format!($fmt, $($arg)*))
    };
}

/// Macro for creating binder errors
#[macro_export]
macro_rules! binder_err {
    ($msg:expr) => {
        $crate::common::error::PrismError::Binder($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::common::error::PrismError::Binder(format!($fmt, $($arg)*))
    };
}

/// Macro for creating not implemented errors
#[macro_export]
macro_rules! not_implemented_err {
    ($msg:expr) => {
        $crate::common::error::PrismError::NotImplemented($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::common::error::PrismError::NotImplemented(format!($fmt, $($arg)*))
    };
}

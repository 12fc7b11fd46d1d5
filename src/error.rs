use thiserror::Error;

/// Errors raised while analyzing, storing, or querying strings.
#[derive(Debug, Error)]
pub(crate) enum Error {
    /// The natural-language query was empty or only whitespace.
    #[error("{0}")]
    InvalidQuery(String),

    /// A structured filter parameter had the wrong shape.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

impl Error {
    /// A stable, machine-readable name for the error kind.
    pub(crate) fn code(&self) -> &'static str {
        match self {
            Error::InvalidQuery(_) => "INVALID_QUERY",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::AlreadyExists(_) => "ALREADY_EXISTS",
            Error::Storage(_) | Error::Serialization(_) => "INTERNAL",
        }
    }
}

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

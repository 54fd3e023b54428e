use thiserror::Error;

use crate::store::StoreError;

/// Errors returned to the calling evaluator by every function family.
///
/// The evaluator surfaces `to_string()` verbatim as the result of the failed
/// expression, so messages are kept short and name the offending input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("too few arguments")]
    TooFewArgs,

    #[error("too many arguments")]
    TooManyArgs,

    #[error("expected {expected} but found {actual} at position {position}")]
    TypeMismatch {
        position: usize,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("the given connection `{0}` has not been registered")]
    ConnectionNotRegistered(String),

    #[error("the given command `{0}` is not a valid command")]
    UnknownCommand(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("key `{0}` does not exist")]
    KeyNotFound(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("no `formula` entry was provided")]
    MissingFormula,

    #[error("formula error: {0}")]
    Formula(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type FunctionResult<T> = Result<T, FunctionError>;

impl From<serde_json::Error> for FunctionError {
    fn from(err: serde_json::Error) -> Self {
        FunctionError::Json(err.to_string())
    }
}

impl serde::Serialize for FunctionError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

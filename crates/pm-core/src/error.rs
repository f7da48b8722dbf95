use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: String, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Duplicate key '{key}' in {what}")]
    DuplicateKey { what: &'static str, key: String },

    #[error("Missing key '{key}' in {what}")]
    MissingKey { what: &'static str, key: String },

    #[error("Unexpected key '{key}' in {what}")]
    UnexpectedKey { what: &'static str, key: String },
}

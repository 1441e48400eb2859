use thiserror::Error;

/// Errors raised while building a grid, deriving its transition model or
/// querying the solver state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A constructor argument is out of range or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Two value functions over different state sets were compared.
    #[error("value functions do not have the same size: expected {expected}, found {found}")]
    SizeMismatch { expected: usize, found: usize },

    /// A transition lookup hit a state/action pair with no table entry.
    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

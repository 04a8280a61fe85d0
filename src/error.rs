//! Crate-wide error type.
//!
//! One variant per row of the error taxonomy. `negotiation-rejection` has
//! deliberately no variant here: a rejected plugin is an ordinary
//! [`crate::negotiator::PluginDecision`] value, not an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("bad value: {0}")]
    BadValue(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("unowned mutation: {0}")]
    UnownedMutation(String),

    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("library load failed: {0}")]
    LibraryLoad(String),

    #[error("plugin runtime error: {0}")]
    PluginRuntime(#[from] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn bad_value(msg: impl Into<String>) -> Self {
        Error::BadValue(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Error::TypeMismatch(msg.into())
    }

    pub fn unowned_mutation(msg: impl Into<String>) -> Self {
        Error::UnownedMutation(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Error::Precondition(msg.into())
    }

    pub fn library_load(msg: impl Into<String>) -> Self {
        Error::LibraryLoad(msg.into())
    }

    /// Maps every variant onto the three-valued C ABI error code (`{0,1,2}`
    /// is the caller's concern; this just distinguishes domain errors from
    /// anything unexpected).
    pub fn is_domain_error(&self) -> bool {
        !matches!(self, Error::PluginRuntime(_))
    }
}

//! Error types for registration and resolution

use thiserror::Error;

/// Result type alias for resolution operations
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors raised when resolving a named instance through the factory.
///
/// The three variants are deliberately distinct: a missing name, a found
/// instance of the wrong type, and an unrelated failure inside the external
/// locator must stay distinguishable for callers.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// No resource is known under the requested name
    #[error("no resource found under name '{name}'")]
    NotFound { name: String },

    /// A resource was found but is not of the required type
    #[error("resource '{name}' is of type {actual}, not the required {required}")]
    TypeMismatch {
        name: String,
        required: &'static str,
        actual: &'static str,
    },

    /// The external locator failed for a reason other than a missing name
    #[error("lookup of '{name}' failed: {reason}")]
    LookupFailed { name: String, reason: String },
}

/// Errors raised by the external resource locator.
#[derive(Error, Debug)]
pub enum LookupError {
    /// The location service has no entry for the name
    #[error("name not bound")]
    NotFound,

    /// Any other failure inside the location service
    #[error("{0}")]
    Failed(String),
}

/// Errors raised by the definition registry.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// A definition is already registered under this name
    #[error("a definition named '{0}' is already registered")]
    DuplicateName(String),

    /// An alias is already registered under this name
    #[error("alias '{alias}' is already registered (points at '{target}')")]
    DuplicateAlias { alias: String, target: String },

    /// An alias would shadow or cycle into itself
    #[error("alias '{0}' would refer back to itself")]
    AliasCycle(String),

    /// An empty name or alias was supplied
    #[error("names and aliases must not be empty")]
    EmptyName,
}

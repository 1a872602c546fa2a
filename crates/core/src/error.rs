//! Error types for the session engine.
//!
//! All of these are raised synchronously at the point of detection and are
//! never retried internally; retry policy belongs to the caller. A failure
//! surfaced from one module must not corrupt another module's state.

use thiserror::Error;

/// Session configuration cannot be turned into a usable session.
///
/// Fatal to session construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Neither the SASL configuration nor a registration declares a domain.
    #[error("cannot determine domain")]
    CannotDetermineDomain,
}

/// A module asked the registry for another module that cannot be supplied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    #[error("module `{id}` is not registered")]
    Missing { id: String },
    #[error("module `{id}` is registered with a different type")]
    WrongType { id: String },
}

/// Registration into the module registry failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("module `{id}` is already registered")]
    DuplicateId { id: String },
    #[error(transparent)]
    Dependency(#[from] DependencyError),
}

/// An element reached a module in a form it cannot interpret.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// No registered module claims the element, or a module received an
    /// element kind outside its contract.
    #[error("unsupported element <{name} xmlns='{xmlns}'/>")]
    UnsupportedElement { name: String, xmlns: String },
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// SASL negotiation cannot proceed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("none of the known SASL mechanisms is allowed by the configuration")]
    NoMechanism,
    #[error("received a SASL challenge but no mechanism was selected")]
    NoMechanismSelected,
    #[error("mechanism `{mechanism}` is finished but the server sent another challenge")]
    MechanismAlreadyComplete { mechanism: String },
    #[error("server sent an unrecognized SASL failure condition `{condition}`")]
    UnknownFailure { condition: String },
    #[error("SASL failure element carries no condition")]
    MissingCondition,
    #[error("SASL mechanism requires a user JID with a local part and a password")]
    MissingCredentials,
    #[error("SASL payload is not valid base64: {0}")]
    BadEncoding(#[from] base64::DecodeError),
}

//! SASL mechanism implementations.
//!
//! A mechanism only transforms challenge bytes into response bytes; the
//! handshake element flow, base64 framing, and state transitions all live in
//! [`SaslModule`](super::SaslModule). New mechanisms plug in through
//! [`SaslMechanism`] without touching the state machine.

use secrecy::ExposeSecret;

use crate::{config::Config, error::AuthError};

use super::SaslContext;

/// One pluggable authentication mechanism.
pub trait SaslMechanism {
    /// The mechanism name as announced on the wire (e.g. `PLAIN`).
    fn name(&self) -> &'static str;

    /// Whether the current session configuration can use this mechanism.
    fn is_allowed(&self, config: &Config) -> bool;

    /// Consume a (decoded) server challenge and produce the next response
    /// payload, if the mechanism has one to send. The initial call passes
    /// `None`. Mechanisms mark the context complete once they expect no
    /// further challenges.
    fn evaluate_challenge(
        &self,
        input: Option<&[u8]>,
        config: &Config,
        sasl: &mut SaslContext,
    ) -> Result<Option<Vec<u8>>, AuthError>;

    /// Whether the mechanism considers its exchange finished.
    fn is_complete(&self, sasl: &SaslContext) -> bool {
        sasl.is_complete()
    }
}

/// SASL `PLAIN` (RFC 4616): single-shot `\0authcid\0password`.
pub struct Plain;

impl SaslMechanism for Plain {
    fn name(&self) -> &'static str {
        "PLAIN"
    }

    fn is_allowed(&self, config: &Config) -> bool {
        config
            .credentials()
            .is_some_and(|(jid, _)| jid.local().is_some())
    }

    fn evaluate_challenge(
        &self,
        _input: Option<&[u8]>,
        config: &Config,
        sasl: &mut SaslContext,
    ) -> Result<Option<Vec<u8>>, AuthError> {
        let (jid, password) = config.credentials().ok_or(AuthError::MissingCredentials)?;
        let local = jid.local().ok_or(AuthError::MissingCredentials)?;

        // Empty authzid: authorize as the authentication identity.
        let payload = format!("\0{}\0{}", local, password.expose_secret()).into_bytes();
        sasl.set_complete();
        Ok(Some(payload))
    }
}

/// SASL `ANONYMOUS` (RFC 4505): no credentials, no initial response.
pub struct Anonymous;

impl SaslMechanism for Anonymous {
    fn name(&self) -> &'static str {
        "ANONYMOUS"
    }

    fn is_allowed(&self, config: &Config) -> bool {
        matches!(config.sasl, Some(crate::config::SaslConfig::Anonymous { .. }))
    }

    fn evaluate_challenge(
        &self,
        _input: Option<&[u8]>,
        _config: &Config,
        sasl: &mut SaslContext,
    ) -> Result<Option<Vec<u8>>, AuthError> {
        sasl.set_complete();
        Ok(None)
    }
}

//! Session configuration.
//!
//! Carries the authentication policy and, optionally, an in-band
//! registration target. Loading and wiring of this struct is the embedding
//! application's concern; the engine only reads it.

use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

use aerie_jid::BareJid;

use crate::error::ConfigError;

/// How the session authenticates to the server.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SaslConfig {
    /// Credential-based authentication as `jid` (PLAIN and friends).
    Password {
        jid: BareJid,
        #[serde(serialize_with = "serialize_secret")]
        password: Secret<String>,
    },
    /// Anonymous login against the given domain.
    Anonymous { domain: String },
}

impl SaslConfig {
    /// The domain this authentication configuration declares, if any.
    pub fn domain(&self) -> Option<&str> {
        match self {
            Self::Password { jid, .. } => Some(jid.domain()),
            Self::Anonymous { domain } => Some(domain),
        }
    }
}

impl std::fmt::Debug for SaslConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password { jid, .. } => f
                .debug_struct("Password")
                .field("jid", jid)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::Anonymous { domain } => {
                f.debug_struct("Anonymous").field("domain", domain).finish()
            },
        }
    }
}

/// In-band account registration target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    /// Domain to register the account at.
    pub domain: String,
}

/// Session-wide settings consumed once at session setup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Authentication policy. `None` means the session cannot authenticate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sasl: Option<SaslConfig>,

    /// Registration configuration, used as the domain fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<Registration>,
}

impl Config {
    /// Resolve the session domain.
    ///
    /// Priority: the SASL configuration's declared domain, then the
    /// registration domain. With neither, the session cannot be set up.
    pub fn resolve_domain(&self) -> Result<&str, ConfigError> {
        if let Some(sasl) = &self.sasl
            && let Some(domain) = sasl.domain()
        {
            return Ok(domain);
        }
        if let Some(registration) = &self.registration {
            return Ok(&registration.domain);
        }
        Err(ConfigError::CannotDetermineDomain)
    }

    /// Credential accessor for mechanisms: `(jid, password)` when the
    /// configuration is credential-based.
    pub fn credentials(&self) -> Option<(&BareJid, &Secret<String>)> {
        match &self.sasl {
            Some(SaslConfig::Password { jid, password }) => Some((jid, password)),
            _ => None,
        }
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

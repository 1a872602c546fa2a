//! JID (Jabber ID) value types.
//!
//! A JID is the three-part address `[local@]domain[/resource]` naming an
//! endpoint on an XMPP network. [`Jid`] carries an optional resource;
//! [`BareJid`] never does. The domain is lowercased on construction, so
//! equality, ordering, and the string form are canonical; local-part and
//! resource stay case-sensitive.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Error parsing or constructing a JID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JidParseError {
    #[error("JID has an empty domain")]
    EmptyDomain,
    #[error("JID has an empty local part before '@'")]
    EmptyLocal,
    #[error("JID has an empty resource after '/'")]
    EmptyResource,
    #[error("invalid character in JID {part}: {value:?}")]
    InvalidChar { part: &'static str, value: String },
    #[error("bare JID must not carry a resource: {0:?}")]
    ResourceInBareJid(String),
}

/// Local-parts and domains exclude separators and whitespace; resources only
/// exclude control characters.
fn check_part(part: &'static str, value: &str, strict: bool) -> Result<(), JidParseError> {
    let bad = |c: char| {
        c.is_control() || (strict && (c == '@' || c == '/' || c.is_whitespace()))
    };
    if value.chars().any(bad) {
        return Err(JidParseError::InvalidChar {
            part,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn split_jid(s: &str) -> Result<(Option<&str>, &str, Option<&str>), JidParseError> {
    let (address, resource) = match s.split_once('/') {
        Some((address, resource)) => {
            if resource.is_empty() {
                return Err(JidParseError::EmptyResource);
            }
            (address, Some(resource))
        },
        None => (s, None),
    };

    let (local, domain) = match address.split_once('@') {
        Some((local, domain)) => {
            if local.is_empty() {
                return Err(JidParseError::EmptyLocal);
            }
            (Some(local), domain)
        },
        None => (None, address),
    };

    if domain.is_empty() {
        return Err(JidParseError::EmptyDomain);
    }

    Ok((local, domain, resource))
}

/// A full JID: `[local@]domain[/resource]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Jid {
    local: Option<String>,
    domain: String,
    resource: Option<String>,
}

impl Jid {
    /// Build a JID from its parts, validating each one.
    pub fn new(
        local: Option<&str>,
        domain: &str,
        resource: Option<&str>,
    ) -> Result<Self, JidParseError> {
        if domain.is_empty() {
            return Err(JidParseError::EmptyDomain);
        }
        if local == Some("") {
            return Err(JidParseError::EmptyLocal);
        }
        if resource == Some("") {
            return Err(JidParseError::EmptyResource);
        }
        if let Some(local) = local {
            check_part("local part", local, true)?;
        }
        check_part("domain", domain, true)?;
        if let Some(resource) = resource {
            check_part("resource", resource, false)?;
        }
        Ok(Self {
            local: local.map(str::to_string),
            domain: domain.to_lowercase(),
            resource: resource.map(str::to_string),
        })
    }

    pub fn local(&self) -> Option<&str> {
        self.local.as_deref()
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// The bare form: same address with the resource dropped.
    pub fn to_bare(&self) -> BareJid {
        BareJid {
            local: self.local.clone(),
            domain: self.domain.clone(),
        }
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(local) = &self.local {
            write!(f, "{local}@")?;
        }
        f.write_str(&self.domain)?;
        if let Some(resource) = &self.resource {
            write!(f, "/{resource}")?;
        }
        Ok(())
    }
}

impl FromStr for Jid {
    type Err = JidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (local, domain, resource) = split_jid(s)?;
        Self::new(local, domain, resource)
    }
}

/// A bare JID: `[local@]domain`, never carrying a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BareJid {
    local: Option<String>,
    domain: String,
}

impl BareJid {
    pub fn new(local: Option<&str>, domain: &str) -> Result<Self, JidParseError> {
        let jid = Jid::new(local, domain, None)?;
        Ok(jid.to_bare())
    }

    pub fn local(&self) -> Option<&str> {
        self.local.as_deref()
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Attach a resource, producing a full JID.
    pub fn with_resource(&self, resource: &str) -> Result<Jid, JidParseError> {
        Jid::new(self.local.as_deref(), &self.domain, Some(resource))
    }
}

impl fmt::Display for BareJid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(local) = &self.local {
            write!(f, "{local}@")?;
        }
        f.write_str(&self.domain)
    }
}

impl FromStr for BareJid {
    type Err = JidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (local, domain, resource) = split_jid(s)?;
        if resource.is_some() {
            return Err(JidParseError::ResourceInBareJid(s.to_string()));
        }
        Ok(Jid::new(local, domain, None)?.to_bare())
    }
}

impl From<BareJid> for Jid {
    fn from(bare: BareJid) -> Self {
        Jid {
            local: bare.local,
            domain: bare.domain,
            resource: None,
        }
    }
}

impl Serialize for Jid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Jid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

impl Serialize for BareJid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BareJid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

//! Typed stanza accessors over generic XML elements.
//!
//! A [`Stanza`] wraps a `minidom::Element` and exposes the addressed-unit
//! attributes (`to`, `from`, `type`) as typed values. Writes go straight
//! through to the underlying attribute table, so the wrapped element can be
//! handed to the transport at any point without a conversion step.

use std::str::FromStr;

use minidom::Element;

use aerie_jid::Jid;

/// XMPP namespace constants used by the session core.
pub mod ns {
    pub const JABBER_CLIENT: &str = "jabber:client";
    pub const STREAM: &str = "http://etherx.jabber.org/streams";
}

/// The closed set of stanza `type` attribute values, across message,
/// presence, and IQ stanzas. Rendered as the lowercase attribute string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StanzaType {
    Chat,
    Error,
    Get,
    Groupchat,
    Headline,
    Normal,
    Probe,
    Result,
    Set,
    Subscribe,
    Subscribed,
    Unavailable,
    Unsubscribe,
    Unsubscribed,
}

impl StanzaType {
    pub fn as_attr(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Error => "error",
            Self::Get => "get",
            Self::Groupchat => "groupchat",
            Self::Headline => "headline",
            Self::Normal => "normal",
            Self::Probe => "probe",
            Self::Result => "result",
            Self::Set => "set",
            Self::Subscribe => "subscribe",
            Self::Subscribed => "subscribed",
            Self::Unavailable => "unavailable",
            Self::Unsubscribe => "unsubscribe",
            Self::Unsubscribed => "unsubscribed",
        }
    }

    /// Parse an attribute value; unknown values are `None`.
    pub fn from_attr(value: &str) -> Option<Self> {
        match value {
            "chat" => Some(Self::Chat),
            "error" => Some(Self::Error),
            "get" => Some(Self::Get),
            "groupchat" => Some(Self::Groupchat),
            "headline" => Some(Self::Headline),
            "normal" => Some(Self::Normal),
            "probe" => Some(Self::Probe),
            "result" => Some(Self::Result),
            "set" => Some(Self::Set),
            "subscribe" => Some(Self::Subscribe),
            "subscribed" => Some(Self::Subscribed),
            "unavailable" => Some(Self::Unavailable),
            "unsubscribe" => Some(Self::Unsubscribe),
            "unsubscribed" => Some(Self::Unsubscribed),
            _ => None,
        }
    }
}

/// A typed view over one top-level stream element.
#[derive(Debug, Clone, PartialEq)]
pub struct Stanza {
    element: Element,
}

impl Stanza {
    /// Wrap an already-parsed element.
    pub fn from_element(element: Element) -> Self {
        Self { element }
    }

    /// A bare `<message/>` stanza.
    pub fn message() -> Self {
        Self::from_element(Element::bare("message", ns::JABBER_CLIENT))
    }

    /// A bare `<presence/>` stanza.
    pub fn presence() -> Self {
        Self::from_element(Element::bare("presence", ns::JABBER_CLIENT))
    }

    /// A bare `<iq/>` stanza.
    pub fn iq() -> Self {
        Self::from_element(Element::bare("iq", ns::JABBER_CLIENT))
    }

    fn jid_attr(&self, name: &str) -> Option<Jid> {
        self.element
            .attr(name)
            .and_then(|value| Jid::from_str(value).ok())
    }

    fn set_jid_attr(&mut self, name: &str, value: Option<&Jid>) {
        // `None` removes the attribute; it must never be written as "".
        self.element.set_attr(name, value.map(Jid::to_string));
    }

    /// The `to` address, if present and well-formed.
    pub fn to(&self) -> Option<Jid> {
        self.jid_attr("to")
    }

    pub fn set_to(&mut self, to: Option<&Jid>) {
        self.set_jid_attr("to", to);
    }

    /// The `from` address, if present and well-formed.
    pub fn from(&self) -> Option<Jid> {
        self.jid_attr("from")
    }

    pub fn set_from(&mut self, from: Option<&Jid>) {
        self.set_jid_attr("from", from);
    }

    /// The `type` attribute, if present and part of the closed set.
    pub fn stanza_type(&self) -> Option<StanzaType> {
        self.element.attr("type").and_then(StanzaType::from_attr)
    }

    pub fn set_stanza_type(&mut self, value: Option<StanzaType>) {
        self.element.set_attr("type", value.map(StanzaType::as_attr));
    }

    pub fn as_element(&self) -> &Element {
        &self.element
    }

    pub fn as_element_mut(&mut self) -> &mut Element {
        &mut self.element
    }

    pub fn into_element(self) -> Element {
        self.element
    }
}

impl From<Stanza> for Element {
    fn from(stanza: Stanza) -> Self {
        stanza.element
    }
}

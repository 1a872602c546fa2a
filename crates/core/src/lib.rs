//! Protocol session engine for the aerie XMPP client.
//!
//! This crate is the part of the client with real state-machine and ordering
//! semantics: the criteria-based module registry and dispatcher, the SASL
//! authentication state machine, the connector lifecycle, and the synchronous
//! event bus that ties transitions to observers. Everything around it is a
//! collaborator: transports feed already-parsed `minidom::Element`s into
//! [`modules::Registry::dispatch`] and carry outbound elements from the
//! [`context::ElementWriter`] seam; XML tokenizing, TLS, and extension
//! business logic live elsewhere.
//!
//! The engine is single-threaded and cooperative. Dispatch, mechanism
//! evaluation, and event delivery run synchronously on whatever context
//! drives the parsed-element stream; callers invoking entry points from
//! several execution contexts must serialize them.

pub mod config;
pub mod connector;
pub mod context;
pub mod error;
pub mod events;
pub mod features;
pub mod modules;
pub mod sasl;
pub mod stanza;

pub use {
    config::{Config, Registration, SaslConfig},
    context::{Context, ElementWriter},
    events::{ALL_EVENTS, Event, EventBus},
    modules::{Criteria, Module, Registry},
};

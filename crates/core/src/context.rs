//! Per-session collaborator bundle.
//!
//! A [`Context`] is owned by one connection scope and passed by reference
//! into module operations. It bundles what every module needs: the session
//! configuration, the event bus, the outbound element writer, and the domain
//! resolved once at setup. The engine is single-threaded by contract; all
//! entry points must be driven from the connection's own execution context.

use std::rc::Rc;

use minidom::Element;

use crate::{config::Config, error::ConfigError, events::EventBus};

/// Outbound seam to the transport collaborator.
///
/// Elements handed here are serialized onto the stream by the transport.
/// Delivery is fire-and-forget: transport failures surface through the
/// connector's lifecycle events, not through this trait.
pub trait ElementWriter {
    fn write(&self, element: Element);
}

/// Session-scoped state shared with every module operation.
pub struct Context {
    config: Config,
    domain: String,
    events: Rc<EventBus>,
    writer: Rc<dyn ElementWriter>,
}

impl Context {
    /// Set up a session context, resolving the domain once.
    ///
    /// Fails with [`ConfigError`] when the configuration cannot name a
    /// domain; that error is fatal to session construction.
    pub fn new(
        config: Config,
        events: Rc<EventBus>,
        writer: Rc<dyn ElementWriter>,
    ) -> Result<Self, ConfigError> {
        let domain = config.resolve_domain()?.to_string();
        Ok(Self {
            config,
            domain,
            events,
            writer,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The domain resolved at session setup.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn writer(&self) -> &dyn ElementWriter {
        self.writer.as_ref()
    }
}

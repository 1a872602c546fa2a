//! Connection lifecycle tracking.
//!
//! Transport implementations (TCP, WebSocket, in-process loopback) live
//! outside this crate; what they share is [`ConnectorCore`], the state cell
//! that publishes every genuine transition on the event bus, and the
//! [`Connector`] trait the rest of the application drives them through.

use std::{cell::Cell, rc::Rc};

use anyhow::Result;
use tracing::debug;

use crate::events::{Event, EventBus};

/// Event-type identifier for connector state changes.
pub const EVENT_TYPE: &str = "connector";

/// Connection lifecycle states.
///
/// Transport-specific intermediate states (TLS handshake, SRV fallback, ...)
/// are the transport's own concern and are not modelled here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectorState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Per-connection protocol driver created by a connector.
///
/// Bootstraps connection-scoped concerns (stream restarts, authentication)
/// once the transport is up, and tears them down with the connection.
pub trait SessionController {
    fn start(&self);
    fn stop(&self);
}

/// A transport connector.
///
/// `start` and `stop` are the only lifecycle entry points this core defines;
/// everything in between is transport territory. `send` forwards
/// pre-serialized stream content and is only meaningful while
/// [`ConnectorState::Connected`] — the core does not validate that, the
/// transport may reject it.
pub trait Connector {
    fn state(&self) -> ConnectorState;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn send(&mut self, data: &str) -> Result<()>;

    /// Session controller scoped to the current connection.
    fn create_session_controller(&self) -> Box<dyn SessionController>;
}

/// State cell embedded by every connector implementation.
///
/// Writes compare old and new values: re-assigning the current state is a
/// silent no-op, an actual change fires exactly one
/// [`Event::ConnectorStateChanged`].
pub struct ConnectorCore {
    state: Cell<ConnectorState>,
    events: Rc<EventBus>,
}

impl ConnectorCore {
    pub fn new(events: Rc<EventBus>) -> Self {
        Self {
            state: Cell::new(ConnectorState::Disconnected),
            events,
        }
    }

    pub fn state(&self) -> ConnectorState {
        self.state.get()
    }

    pub fn set_state(&self, new: ConnectorState) {
        let old = self.state.get();
        if old == new {
            return;
        }
        self.state.set(new);
        debug!(?old, ?new, "connector state changed");
        self.events.fire(&Event::ConnectorStateChanged { old, new });
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

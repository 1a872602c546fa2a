//! Synchronous in-process event bus.
//!
//! State machines announce transitions here and observers react to them.
//! Delivery is synchronous and reentrant: `fire` invokes every handler
//! registered for the event's type, in registration order, on the caller's
//! stack, before it returns. Handlers may themselves fire events or register
//! new handlers. Ordering guarantees elsewhere in the engine (e.g. that
//! `SaslStarted` precedes any later SASL outcome) depend on this model, so
//! there is no queued or deferred delivery.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use minidom::Element;

use crate::{
    connector::ConnectorState,
    features::StreamFeaturesModule,
    sasl::{SaslFailure, SaslModule},
};

/// Event-type identifier matched by handlers registered for every event.
pub const ALL_EVENTS: &str = "*";

/// Something that happened inside the session engine.
///
/// Events are immutable once fired. The type identifier of an event is the
/// registration id of the component that owns it, by convention.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The connector moved between lifecycle states.
    ConnectorStateChanged {
        old: ConnectorState,
        new: ConnectorState,
    },
    /// SASL negotiation started with the named mechanism.
    SaslStarted { mechanism: String },
    /// The server accepted authentication.
    SaslSuccess,
    /// The server rejected authentication.
    SaslFailed {
        reason: SaslFailure,
        text: Option<String>,
    },
    /// A fresh `<stream:features/>` element arrived.
    StreamFeaturesReceived { features: Element },
}

impl Event {
    /// The identifier handlers subscribe under.
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::ConnectorStateChanged { .. } => crate::connector::EVENT_TYPE,
            Event::SaslStarted { .. } | Event::SaslSuccess | Event::SaslFailed { .. } => {
                SaslModule::ID
            },
            Event::StreamFeaturesReceived { .. } => StreamFeaturesModule::ID,
        }
    }
}

type Handler = Rc<dyn Fn(&Event)>;

/// Ordered pub/sub keyed by event-type identifier.
///
/// Subscriptions persist for the life of the bus; there is no unsubscription.
#[derive(Default)]
pub struct EventBus {
    handlers: RefCell<HashMap<String, Vec<Handler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events of one type, or to [`ALL_EVENTS`].
    pub fn register(&self, event_type: &str, handler: impl Fn(&Event) + 'static) {
        self.handlers
            .borrow_mut()
            .entry(event_type.to_string())
            .or_default()
            .push(Rc::new(handler));
    }

    /// Deliver `event` to its typed handlers, then to wildcard handlers.
    ///
    /// The internal borrow is released before any handler runs, so handlers
    /// may re-enter the bus.
    pub fn fire(&self, event: &Event) {
        let selected: Vec<Handler> = {
            let map = self.handlers.borrow();
            let mut selected = Vec::new();
            if let Some(typed) = map.get(event.event_type()) {
                selected.extend(typed.iter().cloned());
            }
            if let Some(wildcard) = map.get(ALL_EVENTS) {
                selected.extend(wildcard.iter().cloned());
            }
            selected
        };
        for handler in &selected {
            handler(event);
        }
    }
}

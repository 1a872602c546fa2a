//! Stream features tracking.
//!
//! The server advertises what the stream offers (`<stream:features/>`) after
//! every stream open and restart. This module retains the most recent
//! features element and announces each refresh, which is the usual trigger
//! for kicking off authentication.

use std::{any::Any, cell::RefCell, rc::Rc};

use minidom::Element;

use crate::{
    context::Context,
    error::ProtocolError,
    events::Event,
    modules::{Criteria, Module},
    stanza::ns,
};

/// Retains the most recent `<stream:features/>` element.
pub struct StreamFeaturesModule {
    criteria: Criteria,
    features: RefCell<Option<Element>>,
}

impl StreamFeaturesModule {
    pub const ID: &'static str = "stream_features";

    pub fn new() -> Self {
        Self {
            criteria: Criteria::name_and_xmlns("features", ns::STREAM),
            features: RefCell::new(None),
        }
    }

    /// The last received features element, if any stream open completed.
    pub fn features(&self) -> Option<Element> {
        self.features.borrow().clone()
    }

    /// Whether the current stream advertises a child `<name xmlns='xmlns'/>`.
    pub fn has_feature(&self, name: &str, xmlns: &str) -> bool {
        self.features
            .borrow()
            .as_ref()
            .is_some_and(|features| features.get_child(name, xmlns).is_some())
    }
}

impl Default for StreamFeaturesModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for StreamFeaturesModule {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn criteria(&self) -> Option<&Criteria> {
        Some(&self.criteria)
    }

    fn process(&self, ctx: &Context, element: &Element) -> Result<(), ProtocolError> {
        *self.features.borrow_mut() = Some(element.clone());
        ctx.events().fire(&Event::StreamFeaturesReceived {
            features: element.clone(),
        });
        Ok(())
    }

    fn as_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

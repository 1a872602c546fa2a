//! Pluggable protocol modules and the criteria-based dispatcher.
//!
//! Independently-authored extensions implement [`Module`] and register into a
//! [`Registry`]. Inbound elements are offered to each module's [`Criteria`]
//! in registration order; the first match owns the element. There is no
//! central switch over element kinds anywhere in the engine.

use std::{any::Any, collections::BTreeSet, rc::Rc};

use minidom::Element;
use tracing::debug;

use crate::{
    context::Context,
    error::{DependencyError, ProtocolError, RegistryError},
};

enum CriteriaKind {
    Name { name: String, xmlns: String },
    Predicate(Box<dyn Fn(&Element) -> bool>),
    Or(Vec<Criteria>),
    And(Vec<Criteria>),
}

/// A pure, stateless predicate deciding whether a module owns an element.
pub struct Criteria(CriteriaKind);

impl Criteria {
    /// Matches elements with exactly this local name and namespace.
    pub fn name_and_xmlns(name: impl Into<String>, xmlns: impl Into<String>) -> Self {
        Self(CriteriaKind::Name {
            name: name.into(),
            xmlns: xmlns.into(),
        })
    }

    /// Matches whatever the predicate says.
    pub fn predicate(predicate: impl Fn(&Element) -> bool + 'static) -> Self {
        Self(CriteriaKind::Predicate(Box::new(predicate)))
    }

    /// Matches when any of the inner criteria matches.
    pub fn or(criteria: Vec<Criteria>) -> Self {
        Self(CriteriaKind::Or(criteria))
    }

    /// Matches when every inner criterion matches.
    pub fn and(criteria: Vec<Criteria>) -> Self {
        Self(CriteriaKind::And(criteria))
    }

    pub fn matches(&self, element: &Element) -> bool {
        match &self.0 {
            CriteriaKind::Name { name, xmlns } => element.is(name.as_str(), xmlns.as_str()),
            CriteriaKind::Predicate(predicate) => predicate(element),
            CriteriaKind::Or(criteria) => criteria.iter().any(|c| c.matches(element)),
            CriteriaKind::And(criteria) => criteria.iter().all(|c| c.matches(element)),
        }
    }
}

/// A self-contained protocol extension unit.
///
/// Modules are registered once per session and live as long as the registry.
/// The engine drives them from a single execution context, so module state
/// is interior-mutable (`Cell`/`RefCell`) rather than guarded by locks.
pub trait Module {
    /// Globally unique registry key. By convention this doubles as the
    /// event-type identifier for events the module fires.
    fn id(&self) -> &'static str;

    /// Ownership predicate for inbound elements. `None` opts out of
    /// dispatch entirely.
    fn criteria(&self) -> Option<&Criteria> {
        None
    }

    /// Namespaces advertised for capability discovery.
    fn features(&self) -> &'static [&'static str] {
        &[]
    }

    /// Runs once at registration. Sees every module registered earlier,
    /// and none registered later; registration order is the caller's
    /// dependency order.
    fn initialize(&self, modules: &Registry) -> Result<(), DependencyError> {
        let _ = modules;
        Ok(())
    }

    /// Handle an element this module's criteria claimed.
    fn process(&self, ctx: &Context, element: &Element) -> Result<(), ProtocolError>;

    /// Upcast for the registry's typed lookup.
    fn as_any(self: Rc<Self>) -> Rc<dyn Any>;
}

/// Insertion-ordered module registry and stanza dispatcher.
///
/// Identities are unique; each session owns its own registry instance.
#[derive(Default)]
pub struct Registry {
    modules: Vec<Rc<dyn Module>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module and run its `initialize` hook.
    ///
    /// Initialization happens before the module is stored, so dependency
    /// lookups during `initialize` see only earlier registrations.
    pub fn register(&mut self, module: Rc<dyn Module>) -> Result<(), RegistryError> {
        let id = module.id();
        if self.get(id).is_some() {
            return Err(RegistryError::DuplicateId { id: id.to_string() });
        }
        module.initialize(self)?;
        debug!(id, "module registered");
        self.modules.push(module);
        Ok(())
    }

    /// The module registered under `id`, if any.
    pub fn get(&self, id: &str) -> Option<&Rc<dyn Module>> {
        self.modules.iter().find(|module| module.id() == id)
    }

    /// Typed dependency lookup.
    ///
    /// Fails loudly when the dependency is absent or registered with an
    /// unexpected concrete type.
    pub fn lookup<M: Module + 'static>(&self, id: &str) -> Result<Rc<M>, DependencyError> {
        let module = self
            .get(id)
            .cloned()
            .ok_or_else(|| DependencyError::Missing { id: id.to_string() })?;
        module
            .as_any()
            .downcast::<M>()
            .map_err(|_| DependencyError::WrongType { id: id.to_string() })
    }

    /// Offer an inbound element to the first module whose criteria match.
    ///
    /// With no match the element is unhandled and this returns
    /// [`ProtocolError::UnsupportedElement`]; whether that is fatal is the
    /// caller's policy. A failure from the owning module propagates as-is
    /// and leaves every other module untouched.
    pub fn dispatch(&self, ctx: &Context, element: &Element) -> Result<(), ProtocolError> {
        for module in &self.modules {
            if module.criteria().is_some_and(|c| c.matches(element)) {
                debug!(id = module.id(), element = element.name(), "dispatching");
                return module.process(ctx, element);
            }
        }
        Err(ProtocolError::UnsupportedElement {
            name: element.name().to_string(),
            xmlns: element.ns(),
        })
    }

    /// Read-only union of every module's advertised features.
    pub fn features(&self) -> BTreeSet<&'static str> {
        self.modules
            .iter()
            .flat_map(|module| module.features().iter().copied())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

//! SASL authentication state machine.
//!
//! [`SaslModule`] negotiates a mechanism and drives its challenge/response
//! handshake over the stream. It is itself a [`Module`]: the dispatcher feeds
//! it the server's `success`/`failure`/`challenge` elements, and it reports
//! progress through [`Event`]s. Mechanisms are pluggable; see
//! [`mechanisms::SaslMechanism`].
//!
//! ```text
//! Unknown --start_auth--> InProgress --success--> Success
//!                           |   \--failure--> Failed
//!                           \--challenge (loop while incomplete)--/
//! Success/Failed --clear()--> Unknown
//! ```

pub mod mechanisms;

use std::{any::Any, cell::RefCell, rc::Rc};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use minidom::Element;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    context::Context,
    error::{AuthError, DependencyError, ProtocolError},
    events::Event,
    modules::{Criteria, Module, Registry},
};

use mechanisms::{Anonymous, Plain, SaslMechanism};

/// The SASL stream namespace.
pub const XMLNS: &str = "urn:ietf:params:xml:ns:xmpp-sasl";

/// Authentication progress for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Nothing negotiated yet; also the state after [`SaslModule::clear`].
    #[default]
    Unknown,
    /// Handshake running; terminal elements decide the outcome.
    InProgress,
    Success,
    Failed,
}

/// Failure conditions a server may report (RFC 6120 §6.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslFailure {
    Aborted,
    IncorrectEncoding,
    InvalidAuthzid,
    InvalidMechanism,
    MechanismTooWeak,
    NotAuthorized,
    ServerNotTrusted,
    TemporaryAuthFailure,
}

impl SaslFailure {
    /// The element name carrying this condition.
    pub fn condition(self) -> &'static str {
        match self {
            Self::Aborted => "aborted",
            Self::IncorrectEncoding => "incorrect-encoding",
            Self::InvalidAuthzid => "invalid-authzid",
            Self::InvalidMechanism => "invalid-mechanism",
            Self::MechanismTooWeak => "mechanism-too-weak",
            Self::NotAuthorized => "not-authorized",
            Self::ServerNotTrusted => "server-not-trusted",
            Self::TemporaryAuthFailure => "temporary-auth-failure",
        }
    }

    pub fn from_condition(name: &str) -> Option<Self> {
        match name {
            "aborted" => Some(Self::Aborted),
            "incorrect-encoding" => Some(Self::IncorrectEncoding),
            "invalid-authzid" => Some(Self::InvalidAuthzid),
            "invalid-mechanism" => Some(Self::InvalidMechanism),
            "mechanism-too-weak" => Some(Self::MechanismTooWeak),
            "not-authorized" => Some(Self::NotAuthorized),
            "server-not-trusted" => Some(Self::ServerNotTrusted),
            "temporary-auth-failure" => Some(Self::TemporaryAuthFailure),
            _ => None,
        }
    }
}

/// Per-connection authentication state.
///
/// Created in its initial state with the module and reset by
/// [`SaslModule::clear`] whenever the connection scope ends, so a reconnect
/// starts clean.
#[derive(Debug, Default)]
pub struct SaslContext {
    mechanism: Option<String>,
    state: AuthState,
    complete: bool,
}

impl SaslContext {
    /// Name of the mechanism selected for this handshake, if any.
    pub fn mechanism(&self) -> Option<&str> {
        self.mechanism.as_deref()
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Called by mechanisms once they expect no further challenges.
    pub fn set_complete(&mut self) {
        self.complete = true;
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The SASL negotiation module.
pub struct SaslModule {
    criteria: Criteria,
    mechanisms: RefCell<Vec<Rc<dyn SaslMechanism>>>,
    context: RefCell<SaslContext>,
}

impl SaslModule {
    pub const ID: &'static str = "sasl";

    pub fn new() -> Self {
        Self {
            criteria: Criteria::or(vec![
                Criteria::name_and_xmlns("success", XMLNS),
                Criteria::name_and_xmlns("failure", XMLNS),
                Criteria::name_and_xmlns("challenge", XMLNS),
            ]),
            mechanisms: RefCell::new(Vec::new()),
            context: RefCell::new(SaslContext::default()),
        }
    }

    /// Append a mechanism. Selection order is registration order.
    pub fn add_mechanism(&self, mechanism: Rc<dyn SaslMechanism>) {
        self.mechanisms.borrow_mut().push(mechanism);
    }

    /// Current authentication state.
    pub fn auth_state(&self) -> AuthState {
        self.context.borrow().state
    }

    /// Begin the handshake.
    ///
    /// Selects the first registered mechanism allowed by the configuration,
    /// emits the `<auth/>` element (with the base64 initial response, if the
    /// mechanism produced one), moves to [`AuthState::InProgress`], and fires
    /// [`Event::SaslStarted`]. Exactly one mechanism is selected per attempt.
    pub fn start_auth(&self, ctx: &Context) -> Result<(), AuthError> {
        let mechanism = self.select_mechanism(ctx.config())?;

        let initial = {
            let mut sasl = self.context.borrow_mut();
            mechanism.evaluate_challenge(None, ctx.config(), &mut sasl)?
        };

        let mut auth = Element::builder("auth", XMLNS).attr("mechanism", mechanism.name());
        if let Some(data) = initial {
            auth = auth.append(BASE64.encode(data));
        }
        ctx.writer().write(auth.build());

        {
            let mut sasl = self.context.borrow_mut();
            sasl.mechanism = Some(mechanism.name().to_string());
            sasl.state = AuthState::InProgress;
        }
        info!(mechanism = mechanism.name(), "authentication started");
        ctx.events().fire(&Event::SaslStarted {
            mechanism: mechanism.name().to_string(),
        });
        Ok(())
    }

    /// Reset the per-connection context to its initial state.
    ///
    /// Must be called when the owning connection scope ends; idempotent.
    pub fn clear(&self) {
        self.context.borrow_mut().reset();
        debug!("sasl context cleared");
    }

    fn select_mechanism(&self, config: &Config) -> Result<Rc<dyn SaslMechanism>, AuthError> {
        for mechanism in self.mechanisms.borrow().iter() {
            debug!(mechanism = mechanism.name(), "checking mechanism");
            if mechanism.is_allowed(config) {
                debug!(mechanism = mechanism.name(), "selected mechanism");
                return Ok(Rc::clone(mechanism));
            }
        }
        Err(AuthError::NoMechanism)
    }

    fn selected_mechanism(&self) -> Result<Rc<dyn SaslMechanism>, AuthError> {
        let name = self
            .context
            .borrow()
            .mechanism
            .clone()
            .ok_or(AuthError::NoMechanismSelected)?;
        self.mechanisms
            .borrow()
            .iter()
            .find(|mechanism| mechanism.name() == name)
            .cloned()
            .ok_or(AuthError::NoMechanismSelected)
    }

    fn process_success(&self, ctx: &Context) {
        self.context.borrow_mut().state = AuthState::Success;
        info!("authentication succeeded");
        ctx.events().fire(&Event::SaslSuccess);
    }

    fn process_failure(&self, ctx: &Context, element: &Element) -> Result<(), AuthError> {
        let condition = element
            .children()
            .find(|child| child.name() != "text")
            .ok_or(AuthError::MissingCondition)?;
        let reason = SaslFailure::from_condition(condition.name()).ok_or_else(|| {
            AuthError::UnknownFailure {
                condition: condition.name().to_string(),
            }
        })?;

        let text = element
            .children()
            .find(|child| child.name() == "text")
            .map(|child| child.text())
            .filter(|text| !text.is_empty());

        self.context.borrow_mut().state = AuthState::Failed;
        warn!(condition = reason.condition(), "authentication failed");
        ctx.events().fire(&Event::SaslFailed { reason, text });
        Ok(())
    }

    fn process_challenge(&self, ctx: &Context, element: &Element) -> Result<(), AuthError> {
        let mechanism = self.selected_mechanism()?;
        if mechanism.is_complete(&self.context.borrow()) {
            return Err(AuthError::MechanismAlreadyComplete {
                mechanism: mechanism.name().to_string(),
            });
        }

        let payload = BASE64.decode(element.text())?;
        let response = {
            let mut sasl = self.context.borrow_mut();
            mechanism.evaluate_challenge(Some(&payload), ctx.config(), &mut sasl)?
        };

        let mut builder = Element::builder("response", XMLNS);
        if let Some(data) = response {
            builder = builder.append(BASE64.encode(data));
        }
        ctx.writer().write(builder.build());
        Ok(())
    }
}

impl Default for SaslModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for SaslModule {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn criteria(&self) -> Option<&Criteria> {
        Some(&self.criteria)
    }

    fn initialize(&self, _modules: &Registry) -> Result<(), DependencyError> {
        let mut mechanisms = self.mechanisms.borrow_mut();
        if mechanisms.is_empty() {
            mechanisms.push(Rc::new(Plain));
            mechanisms.push(Rc::new(Anonymous));
        }
        Ok(())
    }

    fn process(&self, ctx: &Context, element: &Element) -> Result<(), ProtocolError> {
        match element.name() {
            "success" => {
                self.process_success(ctx);
                Ok(())
            },
            "failure" => self.process_failure(ctx, element).map_err(ProtocolError::from),
            "challenge" => self.process_challenge(ctx, element).map_err(ProtocolError::from),
            other => Err(ProtocolError::UnsupportedElement {
                name: other.to_string(),
                xmlns: element.ns(),
            }),
        }
    }

    fn as_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{Config, SaslConfig},
        context::ElementWriter,
        events::{ALL_EVENTS, EventBus},
    };
    use secrecy::Secret;
    use std::cell::Cell;

    struct RecordingWriter(RefCell<Vec<Element>>);

    impl RecordingWriter {
        fn new() -> Rc<Self> {
            Rc::new(Self(RefCell::new(Vec::new())))
        }

        fn take(&self) -> Vec<Element> {
            self.0.borrow_mut().drain(..).collect()
        }
    }

    impl ElementWriter for RecordingWriter {
        fn write(&self, element: Element) {
            self.0.borrow_mut().push(element);
        }
    }

    struct Harness {
        ctx: Context,
        writer: Rc<RecordingWriter>,
        events: Rc<RefCell<Vec<Event>>>,
        registry: Registry,
        sasl: Rc<SaslModule>,
    }

    fn harness(config: Config) -> Harness {
        let bus = Rc::new(EventBus::new());
        let seen: Rc<RefCell<Vec<Event>>> = Rc::default();
        let sink = Rc::clone(&seen);
        bus.register(ALL_EVENTS, move |event| {
            sink.borrow_mut().push(event.clone());
        });

        let writer = RecordingWriter::new();
        let ctx = Context::new(config, bus, writer.clone()).unwrap();

        let mut registry = Registry::new();
        let sasl = Rc::new(SaslModule::new());
        registry.register(Rc::clone(&sasl) as Rc<dyn Module>).unwrap();

        Harness {
            ctx,
            writer,
            events: seen,
            registry,
            sasl,
        }
    }

    fn password_config() -> Config {
        Config {
            sasl: Some(SaslConfig::Password {
                jid: "alice@example.com".parse().unwrap(),
                password: Secret::new("hunter2".into()),
            }),
            registration: None,
        }
    }

    fn sasl_element(name: &str) -> Element {
        Element::bare(name, XMLNS)
    }

    #[test]
    fn start_auth_happy_path() {
        let h = harness(password_config());
        assert_eq!(h.sasl.auth_state(), AuthState::Unknown);

        h.sasl.start_auth(&h.ctx).unwrap();
        assert_eq!(h.sasl.auth_state(), AuthState::InProgress);

        let written = h.writer.take();
        assert_eq!(written.len(), 1);
        let auth = &written[0];
        assert!(auth.is("auth", XMLNS));
        assert_eq!(auth.attr("mechanism"), Some("PLAIN"));
        assert_eq!(auth.text(), BASE64.encode(b"\0alice\0hunter2"));

        assert_eq!(
            *h.events.borrow(),
            vec![Event::SaslStarted {
                mechanism: "PLAIN".into(),
            }]
        );
    }

    #[test]
    fn anonymous_auth_has_no_body() {
        let h = harness(Config {
            sasl: Some(SaslConfig::Anonymous {
                domain: "example.com".into(),
            }),
            registration: None,
        });

        h.sasl.start_auth(&h.ctx).unwrap();
        let written = h.writer.take();
        assert_eq!(written[0].attr("mechanism"), Some("ANONYMOUS"));
        assert_eq!(written[0].text(), "");
    }

    #[test]
    fn no_usable_mechanism_fails() {
        let h = harness(Config {
            sasl: None,
            registration: Some(crate::config::Registration {
                domain: "example.com".into(),
            }),
        });
        let result = h.sasl.start_auth(&h.ctx);
        assert_eq!(result, Err(AuthError::NoMechanism));
        assert_eq!(h.sasl.auth_state(), AuthState::Unknown);
        assert!(h.writer.take().is_empty());
        assert!(h.events.borrow().is_empty());
    }

    #[test]
    fn success_element_completes_the_handshake() {
        let h = harness(password_config());
        h.sasl.start_auth(&h.ctx).unwrap();
        h.writer.take();
        h.events.borrow_mut().clear();

        h.registry.dispatch(&h.ctx, &sasl_element("success")).unwrap();
        assert_eq!(h.sasl.auth_state(), AuthState::Success);
        assert_eq!(*h.events.borrow(), vec![Event::SaslSuccess]);
        assert!(h.writer.take().is_empty());
    }

    #[test]
    fn failure_element_reports_reason_and_text() {
        let h = harness(password_config());
        h.sasl.start_auth(&h.ctx).unwrap();
        h.events.borrow_mut().clear();

        let failure = Element::builder("failure", XMLNS)
            .append(Element::bare("not-authorized", XMLNS))
            .append(
                Element::builder("text", XMLNS)
                    .append("Bad credentials")
                    .build(),
            )
            .build();
        h.registry.dispatch(&h.ctx, &failure).unwrap();

        assert_eq!(h.sasl.auth_state(), AuthState::Failed);
        assert_eq!(
            *h.events.borrow(),
            vec![Event::SaslFailed {
                reason: SaslFailure::NotAuthorized,
                text: Some("Bad credentials".into()),
            }]
        );
    }

    #[test]
    fn failure_without_text_has_no_description() {
        let h = harness(password_config());
        h.sasl.start_auth(&h.ctx).unwrap();
        h.events.borrow_mut().clear();

        let failure = Element::builder("failure", XMLNS)
            .append(Element::bare("aborted", XMLNS))
            .build();
        h.registry.dispatch(&h.ctx, &failure).unwrap();
        assert_eq!(
            *h.events.borrow(),
            vec![Event::SaslFailed {
                reason: SaslFailure::Aborted,
                text: None,
            }]
        );
    }

    #[test]
    fn unknown_failure_condition_is_fatal() {
        let h = harness(password_config());
        h.sasl.start_auth(&h.ctx).unwrap();
        h.events.borrow_mut().clear();

        let failure = Element::builder("failure", XMLNS)
            .append(Element::bare("flux-capacitor", XMLNS))
            .build();
        let result = h.registry.dispatch(&h.ctx, &failure);
        assert_eq!(
            result,
            Err(ProtocolError::Auth(AuthError::UnknownFailure {
                condition: "flux-capacitor".into(),
            }))
        );
        // The handshake outcome stays undecided; no event fired.
        assert_eq!(h.sasl.auth_state(), AuthState::InProgress);
        assert!(h.events.borrow().is_empty());
    }

    #[test]
    fn failure_without_condition_is_fatal() {
        let h = harness(password_config());
        h.sasl.start_auth(&h.ctx).unwrap();

        let result = h.registry.dispatch(&h.ctx, &sasl_element("failure"));
        assert_eq!(
            result,
            Err(ProtocolError::Auth(AuthError::MissingCondition))
        );
    }

    #[test]
    fn challenge_after_completion_is_a_violation() {
        let h = harness(password_config());
        h.sasl.start_auth(&h.ctx).unwrap();
        h.writer.take();

        // PLAIN is single-shot: it completed with the initial response.
        let challenge = Element::builder("challenge", XMLNS)
            .append(BASE64.encode(b"more"))
            .build();
        let result = h.registry.dispatch(&h.ctx, &challenge);
        assert_eq!(
            result,
            Err(ProtocolError::Auth(AuthError::MechanismAlreadyComplete {
                mechanism: "PLAIN".into(),
            }))
        );
        assert!(h.writer.take().is_empty());
    }

    #[test]
    fn challenge_before_start_is_a_violation() {
        let h = harness(password_config());
        let result = h.registry.dispatch(&h.ctx, &sasl_element("challenge"));
        assert_eq!(
            result,
            Err(ProtocolError::Auth(AuthError::NoMechanismSelected))
        );
    }

    #[test]
    fn multi_step_mechanism_loops_through_challenges() {
        struct TwoStep {
            rounds: Cell<u8>,
        }

        impl SaslMechanism for TwoStep {
            fn name(&self) -> &'static str {
                "TWO-STEP"
            }

            fn is_allowed(&self, _config: &Config) -> bool {
                true
            }

            fn evaluate_challenge(
                &self,
                input: Option<&[u8]>,
                _config: &Config,
                sasl: &mut SaslContext,
            ) -> Result<Option<Vec<u8>>, AuthError> {
                let round = self.rounds.get();
                self.rounds.set(round + 1);
                match round {
                    0 => {
                        assert!(input.is_none());
                        Ok(Some(b"first".to_vec()))
                    },
                    _ => {
                        assert_eq!(input, Some(b"server-nonce".as_slice()));
                        sasl.set_complete();
                        Ok(Some(b"final".to_vec()))
                    },
                }
            }
        }

        let bus = Rc::new(EventBus::new());
        let writer = RecordingWriter::new();
        let ctx = Context::new(password_config(), bus, writer.clone()).unwrap();

        let sasl = Rc::new(SaslModule::new());
        sasl.add_mechanism(Rc::new(TwoStep {
            rounds: Cell::new(0),
        }));
        let mut registry = Registry::new();
        registry.register(Rc::clone(&sasl) as Rc<dyn Module>).unwrap();

        sasl.start_auth(&ctx).unwrap();
        let auth = h_take_one(&writer);
        assert_eq!(auth.attr("mechanism"), Some("TWO-STEP"));
        assert_eq!(auth.text(), BASE64.encode(b"first"));
        assert_eq!(sasl.auth_state(), AuthState::InProgress);

        let challenge = Element::builder("challenge", XMLNS)
            .append(BASE64.encode(b"server-nonce"))
            .build();
        registry.dispatch(&ctx, &challenge).unwrap();

        let response = h_take_one(&writer);
        assert!(response.is("response", XMLNS));
        assert_eq!(response.text(), BASE64.encode(b"final"));
        assert_eq!(sasl.auth_state(), AuthState::InProgress);

        registry.dispatch(&ctx, &sasl_element("success")).unwrap();
        assert_eq!(sasl.auth_state(), AuthState::Success);
    }

    fn h_take_one(writer: &RecordingWriter) -> Element {
        let mut written = writer.take();
        assert_eq!(written.len(), 1);
        written.remove(0)
    }

    #[test]
    fn malformed_challenge_payload_is_an_error() {
        struct Greedy;
        impl SaslMechanism for Greedy {
            fn name(&self) -> &'static str {
                "GREEDY"
            }
            fn is_allowed(&self, _config: &Config) -> bool {
                true
            }
            fn evaluate_challenge(
                &self,
                _input: Option<&[u8]>,
                _config: &Config,
                _sasl: &mut SaslContext,
            ) -> Result<Option<Vec<u8>>, AuthError> {
                Ok(None)
            }
        }

        let bus = Rc::new(EventBus::new());
        let writer = RecordingWriter::new();
        let ctx = Context::new(password_config(), bus, writer.clone()).unwrap();
        let sasl = Rc::new(SaslModule::new());
        sasl.add_mechanism(Rc::new(Greedy));
        let mut registry = Registry::new();
        registry.register(Rc::clone(&sasl) as Rc<dyn Module>).unwrap();
        sasl.start_auth(&ctx).unwrap();
        writer.take();

        let challenge = Element::builder("challenge", XMLNS)
            .append("%%% not base64 %%%")
            .build();
        let result = registry.dispatch(&ctx, &challenge);
        assert!(matches!(
            result,
            Err(ProtocolError::Auth(AuthError::BadEncoding(_)))
        ));
    }

    #[test]
    fn clear_resets_to_unknown_and_allows_restart() {
        let h = harness(password_config());
        h.sasl.start_auth(&h.ctx).unwrap();
        h.registry.dispatch(&h.ctx, &sasl_element("success")).unwrap();
        assert_eq!(h.sasl.auth_state(), AuthState::Success);

        h.sasl.clear();
        assert_eq!(h.sasl.auth_state(), AuthState::Unknown);
        assert_eq!(h.sasl.context.borrow().mechanism(), None);

        // Idempotent.
        h.sasl.clear();
        assert_eq!(h.sasl.auth_state(), AuthState::Unknown);

        h.sasl.start_auth(&h.ctx).unwrap();
        assert_eq!(h.sasl.auth_state(), AuthState::InProgress);
    }

    #[test]
    fn unexpected_element_kind_is_a_protocol_error() {
        let h = harness(password_config());
        // Bypass dispatch: hand the module an element its criteria would
        // never claim.
        let result = h.sasl.process(&h.ctx, &sasl_element("mechanisms"));
        assert!(matches!(
            result,
            Err(ProtocolError::UnsupportedElement { .. })
        ));
    }

    #[test]
    fn default_mechanism_order_prefers_plain() {
        let h = harness(password_config());
        h.sasl.start_auth(&h.ctx).unwrap();
        assert_eq!(h.sasl.context.borrow().mechanism(), Some("PLAIN"));
    }
}

//! Request state machine
//!
//! A request enters at `recv <code>`, may run one sub-section selected by an
//! attribute value (`authenticate pap`, `accounting Start`, ...) and leaves
//! through `send <reply code>`. Each time the driver needs policy it hands a
//! section name and a [`ProcessState`] to the caller and waits for an
//! [`Outcome`]; nothing else survives between the two calls.

mod auth_log;
pub mod outcome;
pub mod request;
pub mod table;

pub use outcome::Outcome;
pub use request::{Control, ProxyStateCapture, Request};
pub use table::{transition, Phase, RecvResume, SendHook, SubSection, Transition};

use crate::config::AuthLogConfig;
use crate::runtime::SectionRuntime;
use crate::state::{ExchangeContext, SessionTracker, StateError, TOKEN_LENGTH};
use radius_proto::attributes::{ERROR_CAUSE_INVALID_REQUEST, ORIGINAL_PACKET_CODE};
use radius_proto::dictionary::{Dictionary, AUTH_TYPE, AUTH_TYPE_ACCEPT, AUTH_TYPE_REJECT};
use radius_proto::{Attribute, AttributeType, Code};
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Driver errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Invalid packet type ({0})")]
    UnsupportedPacketType(Code),

    #[error("Request already finished")]
    AlreadyDone,

    #[error("{0} is not a reply code")]
    InvalidReplyCode(Code),
}

/// Where a suspended request picks up again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
    AwaitingRecv {
        capture: ProxyStateCapture,
    },
    AwaitingSection {
        sub: &'static SubSection,
        capture: ProxyStateCapture,
    },
    AwaitingSend {
        code: Code,
        capture: ProxyStateCapture,
    },
    Done,
}

/// How a finished request ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Reply(Code),
    NoReply,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    /// Run `section`, then call [`Process::resume`] with its outcome.
    Yield {
        section: String,
        state: ProcessState,
    },
    Done(Disposition),
}

enum Next {
    Run {
        section: String,
        state: ProcessState,
        default: Outcome,
    },
    Finish(Disposition),
}

/// One virtual server's request driver.
pub struct Process {
    dictionary: Arc<Dictionary>,
    sessions: Arc<SessionTracker>,
    runtime: Arc<dyn SectionRuntime>,
    auth_log: AuthLogConfig,
}

fn random_token() -> [u8; TOKEN_LENGTH] {
    let mut token = [0u8; TOKEN_LENGTH];
    rand::rng().fill(&mut token);
    token
}

impl Process {
    pub fn new(
        dictionary: Arc<Dictionary>,
        sessions: Arc<SessionTracker>,
        runtime: Arc<dyn SectionRuntime>,
        auth_log: AuthLogConfig,
    ) -> Self {
        Process {
            dictionary,
            sessions,
            runtime,
            auth_log,
        }
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    /// Run a request to completion, invoking every section it yields.
    pub async fn run(&self, request: &mut Request) -> Result<Disposition, ProcessError> {
        let mut step = self.start(request)?;
        loop {
            match step {
                Step::Done(disposition) => return Ok(disposition),
                Step::Yield { section, state } => {
                    let outcome = self.runtime.invoke(&section, request).await;
                    trace!(section = %section, outcome = %outcome, "section returned");
                    step = self.resume(request, state, outcome)?;
                }
            }
        }
    }

    /// Enter the receive phase.
    pub fn start(&self, request: &mut Request) -> Result<Step, ProcessError> {
        let code = request.packet.code;
        let transition = transition(code)
            .filter(|t| !t.is_send())
            .ok_or(ProcessError::UnsupportedPacketType(code))?;
        let capture = ProxyStateCapture::capture(&request.packet);

        debug!(
            code = %code,
            id = request.packet.identifier,
            client = %request.client_name,
            "processing request"
        );

        if code == Code::AccessRequest {
            let token = request
                .attribute(AttributeType::State)
                .map(|attr| attr.value.clone());
            if let Some(token) = token {
                match self.sessions.resolve(&token) {
                    Ok(Some(context)) => {
                        debug!(tries = context.tries, "resuming session");
                        request.session_state = context.session_state;
                        request.tries = context.tries;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(client = %request.client_name, error = %e, "rejecting request with unusable State");
                        let next = self.enter_send(request, Code::AccessReject, capture)?;
                        return self.drive(request, next);
                    }
                }
            }
        }

        let next = Next::Run {
            section: transition.section_name(),
            state: ProcessState::AwaitingRecv { capture },
            default: transition.default_outcome,
        };
        self.drive(request, next)
    }

    /// Continue after a yielded section returned `outcome`.
    pub fn resume(
        &self,
        request: &mut Request,
        state: ProcessState,
        outcome: Outcome,
    ) -> Result<Step, ProcessError> {
        let next = self.advance(request, state, outcome)?;
        self.drive(request, next)
    }

    fn drive(&self, request: &mut Request, mut next: Next) -> Result<Step, ProcessError> {
        loop {
            match next {
                Next::Finish(disposition) => return Ok(Step::Done(disposition)),
                Next::Run {
                    section,
                    state,
                    default,
                } => {
                    if self.runtime.has_section(&section) {
                        return Ok(Step::Yield { section, state });
                    }
                    trace!(section = %section, "section not configured, assuming {default}");
                    next = self.advance(request, state, default)?;
                }
            }
        }
    }

    fn advance(
        &self,
        request: &mut Request,
        state: ProcessState,
        outcome: Outcome,
    ) -> Result<Next, ProcessError> {
        match state {
            ProcessState::AwaitingRecv { capture } => self.after_recv(request, capture, outcome),
            ProcessState::AwaitingSection { sub, capture } => {
                if let Some(code) = sub.map.get(outcome) {
                    request.reply_code = Some(code);
                }
                let code = *request.reply_code.get_or_insert(sub.fallback);
                debug!(section = sub.prefix, outcome = %outcome, reply = %code, "sub-section done");
                self.enter_send(request, code, capture)
            }
            ProcessState::AwaitingSend { code, capture } => {
                self.after_send(request, code, capture, outcome)
            }
            ProcessState::Done => Err(ProcessError::AlreadyDone),
        }
    }

    fn after_recv(
        &self,
        request: &mut Request,
        capture: ProxyStateCapture,
        outcome: Outcome,
    ) -> Result<Next, ProcessError> {
        let code = request.packet.code;
        let transition = transition(code).ok_or(ProcessError::UnsupportedPacketType(code))?;
        let Phase::Recv(resume) = &transition.phase else {
            return Err(ProcessError::UnsupportedPacketType(code));
        };

        let forced = match request.control.packet_type {
            Some(forced) if table::is_reply_code(forced) => Some(forced),
            Some(forced) => {
                warn!(packet_type = %forced, "ignoring Packet-Type that is not a reply code");
                None
            }
            None => None,
        };
        request.reply_code = forced
            .or_else(|| transition.map.get(outcome))
            .or(request.reply_code);

        match resume {
            RecvResume::Generic => {
                let code = request.reply_code.unwrap_or(Code::DoNotRespond);
                self.enter_send(request, code, capture)
            }
            RecvResume::Access => match request.reply_code {
                Some(code) => self.enter_send(request, code, capture),
                None => self.authenticate(request, capture),
            },
            RecvResume::Keyed(sub) => {
                let code = request.reply_code.unwrap_or(Code::DoNotRespond);
                if code == Code::DoNotRespond {
                    return self.enter_send(request, code, capture);
                }
                match self.keyed_section(request, sub) {
                    Some(section) => Ok(Next::Run {
                        section,
                        state: ProcessState::AwaitingSection { sub, capture },
                        default: Outcome::Noop,
                    }),
                    None => self.enter_send(request, code, capture),
                }
            }
        }
    }

    fn keyed_section(&self, request: &Request, sub: &SubSection) -> Option<String> {
        let value = request.attribute(sub.selector?)?.as_integer().ok()?;
        let Some(name) = self.dictionary.value_name(sub.selector_name, value) else {
            debug!(attribute = sub.selector_name, value, "no name for value, skipping sub-section");
            return None;
        };
        let section = sub.section_name(name);
        if !self.runtime.has_section(&section) {
            debug!("No '{section} {{ ... }}' section found - skipping");
            return None;
        }
        Some(section)
    }

    fn authenticate(
        &self,
        request: &mut Request,
        capture: ProxyStateCapture,
    ) -> Result<Next, ProcessError> {
        let Some(value) = request.control.auth_type else {
            debug!("No Auth-Type found: rejecting the user");
            return self.enter_send(request, Code::AccessReject, capture);
        };
        let Some(name) = self.dictionary.value_name(AUTH_TYPE, value) else {
            debug!(value, "Invalid Auth-Type: rejecting the user");
            return self.enter_send(request, Code::AccessReject, capture);
        };

        match value {
            AUTH_TYPE_ACCEPT => {
                debug!("Auth-Type = Accept, allowing user");
                self.enter_send(request, Code::AccessAccept, capture)
            }
            AUTH_TYPE_REJECT => {
                debug!("Auth-Type = Reject, rejecting user");
                self.enter_send(request, Code::AccessReject, capture)
            }
            _ => {
                let section = table::AUTHENTICATE.section_name(name);
                if !self.runtime.has_section(&section) {
                    debug!("No '{section} {{ ... }}' section found: rejecting the user");
                    return self.enter_send(request, Code::AccessReject, capture);
                }
                Ok(Next::Run {
                    section,
                    state: ProcessState::AwaitingSection {
                        sub: &table::AUTHENTICATE,
                        capture,
                    },
                    default: Outcome::Noop,
                })
            }
        }
    }

    fn enter_send(
        &self,
        request: &mut Request,
        code: Code,
        capture: ProxyStateCapture,
    ) -> Result<Next, ProcessError> {
        let transition = transition(code)
            .filter(|t| t.is_send())
            .ok_or(ProcessError::InvalidReplyCode(code))?;
        request.reply_code = Some(code);

        if code == Code::AccessChallenge && request.reply_attribute(AttributeType::State).is_none() {
            request.reply.push(Attribute {
                attr_type: AttributeType::State.as_u8(),
                value: random_token().to_vec(),
            });
        }

        Ok(Next::Run {
            section: transition.section_name(),
            state: ProcessState::AwaitingSend { code, capture },
            default: transition.default_outcome,
        })
    }

    fn after_send(
        &self,
        request: &mut Request,
        code: Code,
        capture: ProxyStateCapture,
        outcome: Outcome,
    ) -> Result<Next, ProcessError> {
        let transition = transition(code).ok_or(ProcessError::InvalidReplyCode(code))?;
        let Phase::Send(hook) = transition.phase else {
            return Err(ProcessError::InvalidReplyCode(code));
        };

        if let Some(next) = transition.map.get(outcome) {
            if next != code {
                debug!(from = %code, to = %next, outcome = %outcome, "send section changed the reply");
                return self.enter_send(request, next, capture);
            }
        }

        match hook {
            SendHook::AccessAccept => {
                self.log_auth(request, true);
                self.warn_empty_username(request);
                self.discard_session(request);
            }
            SendHook::AccessReject => {
                self.log_auth(request, false);
                self.discard_session(request);
            }
            SendHook::AccessChallenge => {
                if let Err(e) = self.park_session(request) {
                    warn!(client = %request.client_name, error = %e, "failed to store session, not responding");
                    return self.enter_send(request, Code::DoNotRespond, capture);
                }
            }
            SendHook::ProtocolError => self.add_error_attributes(request),
            SendHook::Generic => {}
        }
        capture.restore(&mut request.reply);

        Ok(Next::Finish(if code == Code::DoNotRespond {
            Disposition::NoReply
        } else {
            Disposition::Reply(code)
        }))
    }

    fn log_auth(&self, request: &Request, goodpass: bool) {
        if let Some(line) = auth_log::auth_message(&self.auth_log, &self.dictionary, request, goodpass) {
            info!(target: "radius::auth", "{line}");
        }
    }

    fn warn_empty_username(&self, request: &Request) {
        let anonymous = request
            .user_name()
            .is_some_and(|name| name.starts_with('@'));
        if anonymous && request.control.stripped_user_name.is_none() {
            warn!("User-Name is anonymous, and no Stripped-User-Name exists");
            warn!("Accepting the user and no realm policy was applied");
            warn!("Check the configuration of the realm modules");
        }
    }

    fn discard_session(&self, request: &Request) {
        if let Some(state) = request.attribute(AttributeType::State) {
            self.sessions.discard(&state.value);
        }
    }

    /// Stamp the reply State and park the session-state under it.
    fn park_session(&self, request: &mut Request) -> Result<(), StateError> {
        let seed = request
            .reply_attribute(AttributeType::State)
            .and_then(|attr| <[u8; TOKEN_LENGTH]>::try_from(attr.value.as_slice()).ok())
            .unwrap_or_else(random_token);
        let tries = request.tries.saturating_add(1);
        let token = self.sessions.stamp(seed, tries);

        self.sessions.store(
            &token,
            ExchangeContext {
                session_state: std::mem::take(&mut request.session_state),
                tries,
            },
        )?;
        request.set_reply_attribute(Attribute {
            attr_type: AttributeType::State.as_u8(),
            value: token.to_vec(),
        });
        debug!(tries, "session stored");
        Ok(())
    }

    fn add_error_attributes(&self, request: &mut Request) {
        let has_original_code = request.reply.iter().any(|attr| {
            attr.extended_value()
                .is_some_and(|(ext_type, _)| ext_type == ORIGINAL_PACKET_CODE)
        });
        if !has_original_code {
            let code = u32::from(request.packet.code.as_u8()).to_be_bytes();
            if let Ok(attr) = Attribute::extended(ORIGINAL_PACKET_CODE, &code) {
                request.reply.push(attr);
            }
        }
        if request.reply_attribute(AttributeType::ErrorCause).is_none() {
            request.reply.push(Attribute {
                attr_type: AttributeType::ErrorCause.as_u8(),
                value: ERROR_CAUSE_INVALID_REQUEST.to_be_bytes().to_vec(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SessionConfig;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Fixed outcome per section; every listed section is configured.
    #[derive(Default, Clone)]
    struct Scripted(HashMap<String, Outcome>);

    impl Scripted {
        fn with(mut self, section: &str, outcome: Outcome) -> Self {
            self.0.insert(section.to_string(), outcome);
            self
        }
    }

    #[async_trait]
    impl SectionRuntime for Scripted {
        async fn invoke(&self, section: &str, _request: &mut Request) -> Outcome {
            self.0.get(section).copied().unwrap_or(Outcome::Noop)
        }

        fn has_section(&self, section: &str) -> bool {
            self.0.contains_key(section)
        }
    }

    fn process(runtime: Scripted) -> Process {
        let mut dictionary = Dictionary::standard();
        dictionary.define_value(AUTH_TYPE, "pap", None).unwrap();
        Process::new(
            Arc::new(dictionary),
            Arc::new(SessionTracker::new(&SessionConfig::default(), "default")),
            Arc::new(runtime),
            AuthLogConfig::default(),
        )
    }

    fn access_request() -> Request {
        Request::new(
            radius_proto::Packet::new(Code::AccessRequest, 1, [1u8; 16]),
            b"secret".to_vec(),
            "nas",
        )
    }

    fn pap(process: &Process) -> u32 {
        process.dictionary().value_of(AUTH_TYPE, "pap").unwrap()
    }

    /// Drive synchronously, answering each yield from the runtime's script.
    fn drive(process: &Process, script: &Scripted, request: &mut Request) -> (Vec<String>, Disposition) {
        let mut seen = Vec::new();
        let mut step = process.start(request).unwrap();
        loop {
            match step {
                Step::Done(d) => return (seen, d),
                Step::Yield { section, state } => {
                    let outcome = script.0.get(&section).copied().unwrap_or(Outcome::Noop);
                    seen.push(section);
                    step = process.resume(request, state, outcome).unwrap();
                }
            }
        }
    }

    #[test]
    fn test_bare_access_request_is_rejected() {
        let script = Scripted::default().with("authenticate pap", Outcome::Ok);
        let p = process(script.clone());
        let mut request = access_request();
        let (seen, disposition) = drive(&p, &script, &mut request);
        assert_eq!(disposition, Disposition::Reply(Code::AccessReject));
        assert!(seen.is_empty());
    }

    #[test]
    fn test_recv_failures_always_reject() {
        for outcome in Outcome::ALL.into_iter().filter(|o| o.is_failure()) {
            let script = Scripted::default()
                .with("recv Access-Request", outcome)
                .with("authenticate pap", Outcome::Ok);
            let p = process(script.clone());
            let mut request = access_request();
            request.control.auth_type = Some(pap(&p));
            let (seen, disposition) = drive(&p, &script, &mut request);
            assert_eq!(disposition, Disposition::Reply(Code::AccessReject), "{outcome}");
            assert!(!seen.contains(&"authenticate pap".to_string()));
        }
    }

    #[test]
    fn test_forced_packet_type_wins() {
        let script = Scripted::default().with("recv Access-Request", Outcome::Reject);
        let p = process(script.clone());
        let mut request = access_request();
        request.control.packet_type = Some(Code::AccessAccept);
        let (_, disposition) = drive(&p, &script, &mut request);
        assert_eq!(disposition, Disposition::Reply(Code::AccessAccept));
    }

    #[test]
    fn test_unmapped_recv_outcome_leaves_reply_unset() {
        let script = Scripted::default().with("recv Status-Server", Outcome::Handled);
        let p = process(script.clone());
        let mut request = Request::new(
            radius_proto::Packet::new(Code::StatusServer, 4, [2u8; 16]),
            b"secret".to_vec(),
            "nas",
        );
        let (seen, disposition) = drive(&p, &script, &mut request);
        assert_eq!(seen, vec!["recv Status-Server".to_string()]);
        assert_eq!(disposition, Disposition::NoReply);

        // A reply code chosen during recv survives an unmapped outcome.
        let mut request = Request::new(
            radius_proto::Packet::new(Code::StatusServer, 5, [2u8; 16]),
            b"secret".to_vec(),
            "nas",
        );
        request.reply_code = Some(Code::AccessAccept);
        let (_, disposition) = drive(&p, &script, &mut request);
        assert_eq!(disposition, Disposition::Reply(Code::AccessAccept));
    }

    #[test]
    fn test_authenticate_outcomes() {
        let cases = [
            (Outcome::Ok, Code::AccessAccept),
            (Outcome::Handled, Code::AccessReject),
            (Outcome::Updated, Code::AccessReject),
            (Outcome::Fail, Code::AccessReject),
        ];
        for (outcome, expected) in cases {
            let script = Scripted::default().with("authenticate pap", outcome);
            let p = process(script.clone());
            let mut request = access_request();
            request.control.auth_type = Some(pap(&p));
            let (seen, disposition) = drive(&p, &script, &mut request);
            assert_eq!(seen[0], "authenticate pap");
            assert_eq!(disposition, Disposition::Reply(expected), "{outcome}");
        }
    }

    #[test]
    fn test_auth_type_accept_and_unknown() {
        let script = Scripted::default();
        let p = process(script.clone());

        let mut request = access_request();
        request.control.auth_type = Some(AUTH_TYPE_ACCEPT);
        assert_eq!(drive(&p, &script, &mut request).1, Disposition::Reply(Code::AccessAccept));

        let mut request = access_request();
        request.control.auth_type = Some(9999);
        assert_eq!(drive(&p, &script, &mut request).1, Disposition::Reply(Code::AccessReject));

        // pap is a known value but has no section
        let mut request = access_request();
        request.control.auth_type = Some(pap(&p));
        assert_eq!(drive(&p, &script, &mut request).1, Disposition::Reply(Code::AccessReject));
    }

    #[test]
    fn test_send_failure_turns_accept_into_reject() {
        let script = Scripted::default()
            .with("send Access-Accept", Outcome::Fail)
            .with("send Access-Reject", Outcome::Noop);
        let p = process(script.clone());
        let mut request = access_request();
        request.control.auth_type = Some(AUTH_TYPE_ACCEPT);
        let (seen, disposition) = drive(&p, &script, &mut request);
        assert_eq!(seen, vec!["send Access-Accept", "send Access-Reject"]);
        assert_eq!(disposition, Disposition::Reply(Code::AccessReject));
    }

    #[test]
    fn test_proxy_state_survives_every_phase() {
        let script = Scripted::default()
            .with("recv Access-Request", Outcome::Ok)
            .with("authenticate pap", Outcome::Ok)
            .with("send Access-Accept", Outcome::Ok);
        let p = process(script.clone());
        let mut request = access_request();
        for value in [b"one".to_vec(), vec![0xff, 0x00], b"three".to_vec()] {
            request.packet.add_attribute(Attribute::new(33, value).unwrap());
        }
        request.control.auth_type = Some(pap(&p));
        request.reply.push(Attribute::new(33, b"policy".to_vec()).unwrap());

        let (seen, disposition) = drive(&p, &script, &mut request);
        assert_eq!(seen.len(), 3);
        assert_eq!(disposition, Disposition::Reply(Code::AccessAccept));
        let echoed: Vec<_> = request
            .reply
            .iter()
            .filter(|a| a.attr_type == 33)
            .map(|a| a.value.clone())
            .collect();
        assert_eq!(echoed, vec![b"one".to_vec(), vec![0xff, 0x00], b"three".to_vec()]);
    }

    #[test]
    fn test_challenge_round_trip() {
        let script = Scripted::default();
        let p = process(script.clone());

        let mut first = access_request();
        first.control.packet_type = Some(Code::AccessChallenge);
        first.session_state.push(Attribute::string(18, "round one").unwrap());
        let (_, disposition) = drive(&p, &script, &mut first);
        assert_eq!(disposition, Disposition::Reply(Code::AccessChallenge));
        assert_eq!(p.sessions().len(), 1);

        let token = first.reply_attribute(AttributeType::State).unwrap().value.clone();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert_eq!(token[0], 1);

        let mut second = access_request();
        second.packet.add_attribute(Attribute::new(24, token).unwrap());
        second.control.auth_type = Some(AUTH_TYPE_ACCEPT);
        let (_, disposition) = drive(&p, &script, &mut second);
        assert_eq!(disposition, Disposition::Reply(Code::AccessAccept));
        assert_eq!(second.tries, 1);
        assert_eq!(second.session_state, vec![Attribute::string(18, "round one").unwrap()]);
        assert!(p.sessions().is_empty());
    }

    #[test]
    fn test_malformed_state_rejects_without_recv() {
        let script = Scripted::default().with("recv Access-Request", Outcome::Ok);
        let p = process(script.clone());
        let mut token = p.sessions().stamp([5u8; 16], 1).to_vec();
        token.push(0);

        let mut request = access_request();
        request.packet.add_attribute(Attribute::new(24, token).unwrap());
        request.packet.add_attribute(Attribute::new(33, b"ps".to_vec()).unwrap());
        let (seen, disposition) = drive(&p, &script, &mut request);
        assert!(seen.is_empty());
        assert_eq!(disposition, Disposition::Reply(Code::AccessReject));
        assert!(request.reply.iter().any(|a| a.attr_type == 33 && a.value == b"ps"));
    }

    #[test]
    fn test_accounting_sub_section() {
        let script = Scripted::default().with("accounting Start", Outcome::Fail);
        let p = process(script.clone());
        let mut request = Request::new(
            radius_proto::Packet::new(Code::AccountingRequest, 2, [0u8; 16]),
            b"s".to_vec(),
            "nas",
        );
        request.packet.add_attribute(Attribute::integer(40, 1).unwrap());
        let (seen, disposition) = drive(&p, &script, &mut request);
        assert_eq!(seen, vec!["accounting Start"]);
        assert_eq!(disposition, Disposition::NoReply);

        let mut stop = request.clone();
        stop.reply_code = None;
        stop.packet.attributes = vec![Attribute::integer(40, 2).unwrap()];
        let (seen, disposition) = drive(&p, &script, &mut stop);
        assert!(seen.is_empty());
        assert_eq!(disposition, Disposition::Reply(Code::AccountingResponse));
    }

    #[test]
    fn test_disconnect_nak() {
        let script = Scripted::default().with("recv Disconnect-Request", Outcome::Disallow);
        let p = process(script.clone());
        let mut request = Request::new(
            radius_proto::Packet::new(Code::DisconnectRequest, 3, [0u8; 16]),
            b"s".to_vec(),
            "nas",
        );
        let (_, disposition) = drive(&p, &script, &mut request);
        assert_eq!(disposition, Disposition::Reply(Code::DisconnectNak));
    }

    #[test]
    fn test_protocol_error_attributes() {
        let script = Scripted::default();
        let p = process(script.clone());
        let mut request = Request::new(
            radius_proto::Packet::new(Code::CoaRequest, 4, [0u8; 16]),
            b"s".to_vec(),
            "nas",
        );
        request.control.packet_type = Some(Code::ProtocolError);
        let (_, disposition) = drive(&p, &script, &mut request);
        assert_eq!(disposition, Disposition::Reply(Code::ProtocolError));
        let opc = request
            .reply
            .iter()
            .find_map(|a| a.extended_value().filter(|(t, _)| *t == ORIGINAL_PACKET_CODE))
            .unwrap();
        assert_eq!(opc.1, &[0, 0, 0, 43]);
        assert_eq!(
            request.reply_attribute(AttributeType::ErrorCause).unwrap().as_integer().unwrap(),
            404
        );
    }

    #[test]
    fn test_unsupported_codes() {
        let p = process(Scripted::default());
        for code in [Code::AccessAccept, Code::StatusClient] {
            let mut request = Request::new(radius_proto::Packet::new(code, 1, [0u8; 16]), b"s".to_vec(), "nas");
            assert_eq!(p.start(&mut request), Err(ProcessError::UnsupportedPacketType(code)));
        }
        let mut request = access_request();
        assert_eq!(
            p.resume(&mut request, ProcessState::Done, Outcome::Ok),
            Err(ProcessError::AlreadyDone)
        );
    }

    #[tokio::test]
    async fn test_run_invokes_runtime() {
        let p = process(Scripted::default().with("recv Status-Server", Outcome::Ok));
        let mut request = Request::new(
            radius_proto::Packet::new(Code::StatusServer, 9, [7u8; 16]),
            b"s".to_vec(),
            "nas",
        );
        assert_eq!(p.run(&mut request).await, Ok(Disposition::Reply(Code::AccessAccept)));
    }
}

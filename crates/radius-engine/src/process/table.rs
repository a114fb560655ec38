//! Per-code transition table
//!
//! Every packet code the engine handles has one [`Transition`]. Request
//! codes own a receive phase, reply codes own a send phase; the sum type
//! makes "both" and "neither" unrepresentable. Outcome maps are indexed by
//! [`Outcome`], never by raw code values.

use super::Outcome;
use radius_proto::{AttributeType, Code};

/// Outcome to reply code. `None` leaves the reply code as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeMap([Option<Code>; 9]);

impl OutcomeMap {
    pub const EMPTY: OutcomeMap = OutcomeMap([None; 9]);

    const fn set(mut self, outcomes: &[Outcome], code: Code) -> Self {
        let mut i = 0;
        while i < outcomes.len() {
            self.0[outcomes[i].index()] = Some(code);
            i += 1;
        }
        self
    }

    pub fn get(&self, outcome: Outcome) -> Option<Code> {
        self.0[outcome.index()]
    }
}

const REFUSED: &[Outcome] = &[
    Outcome::Fail,
    Outcome::Invalid,
    Outcome::Reject,
    Outcome::Disallow,
];
const REFUSED_OR_NOTFOUND: &[Outcome] = &[
    Outcome::Fail,
    Outcome::Invalid,
    Outcome::Reject,
    Outcome::Disallow,
    Outcome::NotFound,
];
const PROCESSED: &[Outcome] = &[Outcome::Noop, Outcome::Ok, Outcome::Updated, Outcome::Handled];
const ACKNOWLEDGED: &[Outcome] = &[Outcome::Noop, Outcome::Ok, Outcome::Updated, Outcome::NotFound];

/// A section named after an attribute value, run between receive and send.
#[derive(Debug, PartialEq, Eq)]
pub struct SubSection {
    /// First word of the section name, e.g. `accounting`
    pub prefix: &'static str,
    /// Request attribute holding the selector; `None` reads `control.auth_type`
    pub selector: Option<AttributeType>,
    /// Dictionary attribute naming the selector values
    pub selector_name: &'static str,
    pub map: OutcomeMap,
    /// Reply code when neither the map nor an earlier phase set one
    pub fallback: Code,
}

impl SubSection {
    pub fn section_name(&self, value_name: &str) -> String {
        format!("{} {}", self.prefix, value_name)
    }
}

pub static AUTHENTICATE: SubSection = SubSection {
    prefix: "authenticate",
    selector: None,
    selector_name: radius_proto::dictionary::AUTH_TYPE,
    map: OutcomeMap::EMPTY
        .set(
            &[
                Outcome::Fail,
                Outcome::Invalid,
                Outcome::Noop,
                Outcome::NotFound,
                Outcome::Reject,
                Outcome::Updated,
                Outcome::Disallow,
            ],
            Code::AccessReject,
        )
        .set(&[Outcome::Ok], Code::AccessAccept),
    fallback: Code::AccessReject,
};

pub static ACCOUNTING: SubSection = SubSection {
    prefix: "accounting",
    selector: Some(AttributeType::AcctStatusType),
    selector_name: "Acct-Status-Type",
    map: OutcomeMap::EMPTY
        .set(REFUSED_OR_NOTFOUND, Code::DoNotRespond)
        .set(PROCESSED, Code::AccountingResponse),
    fallback: Code::AccountingResponse,
};

pub static COA: SubSection = SubSection {
    prefix: "coa",
    selector: Some(AttributeType::ServiceType),
    selector_name: "Service-Type",
    map: OutcomeMap::EMPTY
        .set(REFUSED, Code::CoaNak)
        .set(ACKNOWLEDGED, Code::CoaAck)
        .set(&[Outcome::Handled], Code::CoaAck),
    fallback: Code::CoaAck,
};

pub static DISCONNECT: SubSection = SubSection {
    prefix: "disconnect",
    selector: Some(AttributeType::ServiceType),
    selector_name: "Service-Type",
    map: OutcomeMap::EMPTY
        .set(REFUSED, Code::DisconnectNak)
        .set(ACKNOWLEDGED, Code::DisconnectAck)
        .set(&[Outcome::Handled], Code::DisconnectAck),
    fallback: Code::DisconnectAck,
};

/// What happens once the receive section returns.
#[derive(Debug, PartialEq, Eq)]
pub enum RecvResume {
    /// Straight to the send phase
    Generic,
    /// Auth-Type resolution and `authenticate <name>`
    Access,
    /// Optional sub-section selected by a request attribute
    Keyed(&'static SubSection),
}

/// Post-send work for a reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendHook {
    Generic,
    AccessAccept,
    AccessReject,
    AccessChallenge,
    ProtocolError,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Phase {
    Recv(RecvResume),
    Send(SendHook),
}

#[derive(Debug)]
pub struct Transition {
    pub code: Code,
    pub map: OutcomeMap,
    /// Outcome assumed when the section is not configured
    pub default_outcome: Outcome,
    pub phase: Phase,
}

impl Transition {
    const fn recv(code: Code, map: OutcomeMap, resume: RecvResume) -> Self {
        Transition {
            code,
            map,
            default_outcome: Outcome::Noop,
            phase: Phase::Recv(resume),
        }
    }

    const fn send(code: Code, map: OutcomeMap, hook: SendHook) -> Self {
        Transition {
            code,
            map,
            default_outcome: Outcome::Noop,
            phase: Phase::Send(hook),
        }
    }

    /// `recv Access-Request`, `send Access-Accept`, ...
    pub fn section_name(&self) -> String {
        let verb = match self.phase {
            Phase::Recv(_) => "recv",
            Phase::Send(_) => "send",
        };
        format!("{} {}", verb, self.code.name())
    }

    pub fn is_send(&self) -> bool {
        matches!(self.phase, Phase::Send(_))
    }
}

static ACCESS_REQUEST: Transition = Transition::recv(
    Code::AccessRequest,
    OutcomeMap::EMPTY.set(REFUSED_OR_NOTFOUND, Code::AccessReject),
    RecvResume::Access,
);
static ACCESS_ACCEPT: Transition = Transition::send(
    Code::AccessAccept,
    OutcomeMap::EMPTY.set(REFUSED, Code::AccessReject),
    SendHook::AccessAccept,
);
static ACCESS_REJECT: Transition = Transition::send(
    Code::AccessReject,
    OutcomeMap::EMPTY.set(REFUSED, Code::AccessReject),
    SendHook::AccessReject,
);
static ACCESS_CHALLENGE: Transition = Transition::send(
    Code::AccessChallenge,
    OutcomeMap::EMPTY.set(REFUSED, Code::AccessReject),
    SendHook::AccessChallenge,
);
static ACCOUNTING_REQUEST: Transition = Transition::recv(
    Code::AccountingRequest,
    OutcomeMap::EMPTY
        .set(PROCESSED, Code::AccountingResponse)
        .set(REFUSED_OR_NOTFOUND, Code::DoNotRespond),
    RecvResume::Keyed(&ACCOUNTING),
);
static ACCOUNTING_RESPONSE: Transition = Transition::send(
    Code::AccountingResponse,
    OutcomeMap::EMPTY.set(REFUSED_OR_NOTFOUND, Code::DoNotRespond),
    SendHook::Generic,
);
static STATUS_SERVER: Transition = Transition::recv(
    Code::StatusServer,
    OutcomeMap::EMPTY
        .set(&[Outcome::Ok, Outcome::Updated], Code::AccessAccept)
        .set(REFUSED_OR_NOTFOUND, Code::AccessReject)
        .set(&[Outcome::Noop], Code::AccessReject),
    RecvResume::Generic,
);
static COA_REQUEST: Transition = Transition::recv(
    Code::CoaRequest,
    OutcomeMap::EMPTY
        .set(ACKNOWLEDGED, Code::CoaAck)
        .set(REFUSED, Code::CoaNak),
    RecvResume::Keyed(&COA),
);
static COA_ACK: Transition = Transition::send(
    Code::CoaAck,
    OutcomeMap::EMPTY.set(REFUSED, Code::CoaNak),
    SendHook::Generic,
);
static COA_NAK: Transition = Transition::send(
    Code::CoaNak,
    OutcomeMap::EMPTY.set(REFUSED, Code::CoaNak),
    SendHook::Generic,
);
static DISCONNECT_REQUEST: Transition = Transition::recv(
    Code::DisconnectRequest,
    OutcomeMap::EMPTY
        .set(ACKNOWLEDGED, Code::DisconnectAck)
        .set(REFUSED, Code::DisconnectNak),
    RecvResume::Keyed(&DISCONNECT),
);
static DISCONNECT_ACK: Transition = Transition::send(
    Code::DisconnectAck,
    OutcomeMap::EMPTY.set(REFUSED, Code::DisconnectNak),
    SendHook::Generic,
);
static DISCONNECT_NAK: Transition = Transition::send(
    Code::DisconnectNak,
    OutcomeMap::EMPTY.set(REFUSED, Code::DisconnectNak),
    SendHook::Generic,
);
static PROTOCOL_ERROR: Transition = Transition::send(
    Code::ProtocolError,
    OutcomeMap::EMPTY.set(REFUSED, Code::DoNotRespond),
    SendHook::ProtocolError,
);
static DO_NOT_RESPOND: Transition = Transition::send(
    Code::DoNotRespond,
    OutcomeMap::EMPTY
        .set(PROCESSED, Code::DoNotRespond)
        .set(REFUSED_OR_NOTFOUND, Code::DoNotRespond),
    SendHook::Generic,
);

/// Look up the transition for a code. Status-Client has none.
pub fn transition(code: Code) -> Option<&'static Transition> {
    let transition = match code {
        Code::AccessRequest => &ACCESS_REQUEST,
        Code::AccessAccept => &ACCESS_ACCEPT,
        Code::AccessReject => &ACCESS_REJECT,
        Code::AccessChallenge => &ACCESS_CHALLENGE,
        Code::AccountingRequest => &ACCOUNTING_REQUEST,
        Code::AccountingResponse => &ACCOUNTING_RESPONSE,
        Code::StatusServer => &STATUS_SERVER,
        Code::CoaRequest => &COA_REQUEST,
        Code::CoaAck => &COA_ACK,
        Code::CoaNak => &COA_NAK,
        Code::DisconnectRequest => &DISCONNECT_REQUEST,
        Code::DisconnectAck => &DISCONNECT_ACK,
        Code::DisconnectNak => &DISCONNECT_NAK,
        Code::ProtocolError => &PROTOCOL_ERROR,
        Code::DoNotRespond => &DO_NOT_RESPOND,
        Code::StatusClient => return None,
    };
    Some(transition)
}

/// Codes a policy may pick as the reply.
pub fn is_reply_code(code: Code) -> bool {
    transition(code).is_some_and(Transition::is_send)
}

/// Every section name the table can yield, for configuration checks.
pub fn phase_section_names() -> Vec<String> {
    [
        Code::AccessRequest,
        Code::AccessAccept,
        Code::AccessReject,
        Code::AccessChallenge,
        Code::AccountingRequest,
        Code::AccountingResponse,
        Code::StatusServer,
        Code::CoaRequest,
        Code::CoaAck,
        Code::CoaNak,
        Code::DisconnectRequest,
        Code::DisconnectAck,
        Code::DisconnectNak,
        Code::ProtocolError,
        Code::DoNotRespond,
    ]
    .into_iter()
    .filter_map(transition)
    .map(Transition::section_name)
    .collect()
}

/// Sub-sections keyed by selector attribute values.
pub fn sub_sections() -> [&'static SubSection; 4] {
    [&AUTHENTICATE, &ACCOUNTING, &COA, &DISCONNECT]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_request_failures_reject() {
        let map = transition(Code::AccessRequest).unwrap().map;
        for outcome in [
            Outcome::Fail,
            Outcome::Invalid,
            Outcome::Reject,
            Outcome::Disallow,
            Outcome::NotFound,
        ] {
            assert_eq!(map.get(outcome), Some(Code::AccessReject), "{outcome}");
        }
        for outcome in [Outcome::Ok, Outcome::Noop, Outcome::Updated, Outcome::Handled] {
            assert_eq!(map.get(outcome), None, "{outcome}");
        }
    }

    #[test]
    fn test_accounting_request_covers_every_outcome() {
        let map = transition(Code::AccountingRequest).unwrap().map;
        for outcome in Outcome::ALL {
            let expected = if outcome.is_failure() {
                Code::DoNotRespond
            } else {
                Code::AccountingResponse
            };
            assert_eq!(map.get(outcome), Some(expected), "{outcome}");
        }
    }

    #[test]
    fn test_status_server() {
        let map = transition(Code::StatusServer).unwrap().map;
        assert_eq!(map.get(Outcome::Ok), Some(Code::AccessAccept));
        assert_eq!(map.get(Outcome::Updated), Some(Code::AccessAccept));
        assert_eq!(map.get(Outcome::Noop), Some(Code::AccessReject));
        assert_eq!(map.get(Outcome::Handled), None);
    }

    #[test]
    fn test_coa_notfound_is_ack() {
        let map = transition(Code::CoaRequest).unwrap().map;
        assert_eq!(map.get(Outcome::NotFound), Some(Code::CoaAck));
        assert_eq!(map.get(Outcome::Disallow), Some(Code::CoaNak));
        let map = transition(Code::DisconnectRequest).unwrap().map;
        assert_eq!(map.get(Outcome::NotFound), Some(Code::DisconnectAck));
        assert_eq!(map.get(Outcome::Fail), Some(Code::DisconnectNak));
    }

    #[test]
    fn test_do_not_respond_absorbs() {
        let map = transition(Code::DoNotRespond).unwrap().map;
        for outcome in Outcome::ALL {
            assert_eq!(map.get(outcome), Some(Code::DoNotRespond));
        }
    }

    #[test]
    fn test_send_maps_are_closed() {
        // A send phase may only move to a code whose own map keeps it there.
        for name in phase_section_names() {
            let code = Code::from_name(name.split_once(' ').unwrap().1).unwrap();
            let t = transition(code).unwrap();
            if !t.is_send() {
                continue;
            }
            for outcome in Outcome::ALL {
                if let Some(next) = t.map.get(outcome) {
                    let next_t = transition(next).unwrap();
                    assert!(next_t.is_send());
                    assert_eq!(next_t.map.get(outcome), Some(next), "{name} {outcome}");
                }
            }
        }
    }

    #[test]
    fn test_authenticate_map() {
        assert_eq!(AUTHENTICATE.map.get(Outcome::Ok), Some(Code::AccessAccept));
        assert_eq!(AUTHENTICATE.map.get(Outcome::Handled), None);
        assert_eq!(AUTHENTICATE.map.get(Outcome::Updated), Some(Code::AccessReject));
        assert_eq!(AUTHENTICATE.section_name("pap"), "authenticate pap");
    }

    #[test]
    fn test_section_names() {
        assert_eq!(
            transition(Code::AccessRequest).unwrap().section_name(),
            "recv Access-Request"
        );
        assert_eq!(transition(Code::CoaNak).unwrap().section_name(), "send CoA-NAK");
        assert!(transition(Code::StatusClient).is_none());
        assert!(is_reply_code(Code::AccessChallenge));
        assert!(!is_reply_code(Code::AccountingRequest));
    }
}

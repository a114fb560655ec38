//! Requests driven end to end through the configuration-driven runtime
//!
//! No sockets: packets are built in memory and handed to `Process::run`.

use radius_engine::config::{AuthLogConfig, User};
use radius_engine::process::{Disposition, Outcome, Process, Request};
use radius_engine::runtime::{PolicyRuntime, SectionPolicy};
use radius_engine::state::{SessionConfig, SessionTracker};
use radius_proto::auth::{encrypt_user_password, generate_request_authenticator};
use radius_proto::dictionary::Dictionary;
use radius_proto::{Attribute, AttributeType, Code, Packet};
use std::collections::HashMap;
use std::sync::Arc;

const SECRET: &[u8] = b"testing123";

fn users() -> Vec<User> {
    vec![User {
        username: "alice".to_string(),
        password: "wonderland".to_string(),
        attributes: HashMap::from([("Filter-Id".to_string(), "staff".to_string())]),
    }]
}

fn build(sections: &str) -> Process {
    let sections: HashMap<String, SectionPolicy> =
        serde_json::from_str(sections).expect("valid sections");
    let mut dictionary = Dictionary::standard();
    let runtime =
        PolicyRuntime::new(&sections, &users(), &mut dictionary).expect("sections compile");
    Process::new(
        Arc::new(dictionary),
        Arc::new(SessionTracker::new(&SessionConfig::default(), "default")),
        Arc::new(runtime),
        AuthLogConfig {
            auth: true,
            ..Default::default()
        },
    )
}

fn pap_request(user: &str, password: &str) -> Request {
    let vector = generate_request_authenticator();
    let mut packet = Packet::new(Code::AccessRequest, 1, vector);
    packet.add_attribute(Attribute::string(AttributeType::UserName.as_u8(), user).unwrap());
    packet.add_attribute(
        Attribute::new(
            AttributeType::UserPassword.as_u8(),
            encrypt_user_password(password, SECRET, &vector),
        )
        .unwrap(),
    );
    Request::new(packet, SECRET.to_vec(), "test-nas")
}

const PAP: &str = r#"{
    "recv Access-Request": {"auth_type": "pap", "strip_realm": true},
    "authenticate pap": {"check": "pap"},
    "send Access-Reject": {"reply": [{"name": "Reply-Message", "value": "denied"}]}
}"#;

#[tokio::test]
async fn pap_accept_carries_user_attributes() {
    let process = build(PAP);
    let mut request = pap_request("alice@example.org", "wonderland");
    let disposition = process.run(&mut request).await.unwrap();

    assert_eq!(disposition, Disposition::Reply(Code::AccessAccept));
    assert_eq!(request.control.stripped_user_name.as_deref(), Some("alice"));
    let reply = request.into_reply().unwrap();
    assert_eq!(reply.code, Code::AccessAccept);
    assert_eq!(reply.attributes, vec![Attribute::string(11, "staff").unwrap()]);
}

#[tokio::test]
async fn pap_wrong_password_runs_send_reject() {
    let process = build(PAP);
    let mut request = pap_request("alice", "queen-of-hearts");
    let disposition = process.run(&mut request).await.unwrap();

    assert_eq!(disposition, Disposition::Reply(Code::AccessReject));
    assert_eq!(
        request.reply_attribute(AttributeType::ReplyMessage).unwrap().as_string().unwrap(),
        "denied"
    );
}

#[tokio::test]
async fn unknown_user_is_rejected() {
    let process = build(PAP);
    let mut request = pap_request("mallory", "x");
    assert_eq!(
        process.run(&mut request).await.unwrap(),
        Disposition::Reply(Code::AccessReject)
    );
}

#[tokio::test]
async fn two_round_challenge() {
    let process = build(
        r#"{
            "recv Access-Request": {
                "packet_type": "Access-Challenge",
                "reply": [{"name": "Reply-Message", "value": "enter your code"}],
                "session_state": [{"name": "Class", "value": "round-1"}],
                "resumed": {"auth_type": "pap"}
            },
            "authenticate pap": {"check": "pap"}
        }"#,
    );

    let mut first = pap_request("alice", "wonderland");
    assert_eq!(
        process.run(&mut first).await.unwrap(),
        Disposition::Reply(Code::AccessChallenge)
    );
    assert_eq!(process.sessions().len(), 1);
    let state = first.reply_attribute(AttributeType::State).unwrap().clone();

    let mut second = pap_request("alice", "wonderland");
    second.packet.add_attribute(state.clone());
    assert_eq!(
        process.run(&mut second).await.unwrap(),
        Disposition::Reply(Code::AccessAccept)
    );
    assert_eq!(second.tries, 1);
    assert!(process.sessions().is_empty());

    // The token was consumed: a replay starts a fresh exchange.
    let mut replay = pap_request("alice", "wonderland");
    replay.packet.add_attribute(state);
    assert_eq!(
        process.run(&mut replay).await.unwrap(),
        Disposition::Reply(Code::AccessChallenge)
    );
}

#[tokio::test]
async fn accounting_failure_suppresses_reply() {
    let process = build(
        r#"{
            "accounting Start": {"outcome": "ok"},
            "accounting Stop": {"outcome": "fail"}
        }"#,
    );

    let accounting = |status: u32| {
        let mut packet = Packet::new(Code::AccountingRequest, 7, [0u8; 16]);
        packet.add_attribute(Attribute::integer(AttributeType::AcctStatusType.as_u8(), status).unwrap());
        Request::new(packet, SECRET.to_vec(), "test-nas")
    };

    let mut start = accounting(1);
    assert_eq!(
        process.run(&mut start).await.unwrap(),
        Disposition::Reply(Code::AccountingResponse)
    );

    let mut stop = accounting(2);
    assert_eq!(process.run(&mut stop).await.unwrap(), Disposition::NoReply);
    assert!(stop.into_reply().is_none());

    let mut interim = accounting(3);
    assert_eq!(
        process.run(&mut interim).await.unwrap(),
        Disposition::Reply(Code::AccountingResponse)
    );
}

#[tokio::test]
async fn coa_sub_section_outcomes() {
    let process = build(
        r#"{
            "coa Authorize-Only": {"outcome": "ok"},
            "coa Login-User": {"outcome": "disallow"}
        }"#,
    );

    let coa = |service: u32| {
        let mut packet = Packet::new(Code::CoaRequest, 9, [0u8; 16]);
        packet.add_attribute(Attribute::integer(AttributeType::ServiceType.as_u8(), service).unwrap());
        Request::new(packet, SECRET.to_vec(), "dm-client")
    };

    let mut ok = coa(17);
    assert_eq!(process.run(&mut ok).await.unwrap(), Disposition::Reply(Code::CoaAck));

    let mut refused = coa(1);
    assert_eq!(process.run(&mut refused).await.unwrap(), Disposition::Reply(Code::CoaNak));
}

#[tokio::test]
async fn status_server_follows_recv_outcome() {
    for (outcome, expected) in [
        (Outcome::Ok, Code::AccessAccept),
        (Outcome::Noop, Code::AccessReject),
        (Outcome::NotFound, Code::AccessReject),
    ] {
        let process = build(&format!(r#"{{"recv Status-Server": {{"outcome": "{outcome}"}}}}"#));
        let mut request = Request::new(
            Packet::new(Code::StatusServer, 3, generate_request_authenticator()),
            SECRET.to_vec(),
            "monitor",
        );
        assert_eq!(
            process.run(&mut request).await.unwrap(),
            Disposition::Reply(expected),
            "{outcome}"
        );
    }
}

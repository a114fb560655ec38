//! Section runtime
//!
//! The driver only knows section names and outcomes. A [`SectionRuntime`]
//! decides what a section does; [`PolicyRuntime`] is the configuration-driven
//! one the server uses: each section can set control values, add reply and
//! session-state attributes, check a password and return an outcome.

use crate::config::User;
use crate::process::{table, Outcome, Request};
use async_trait::async_trait;
use radius_proto::auth::verify_chap_password;
use radius_proto::dictionary::{Dictionary, DictionaryError, AUTH_TYPE};
use radius_proto::{Attribute, AttributeType, Code};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Unknown section '{0}'")]
    UnknownSection(String),

    #[error("Section '{section}': unknown packet type '{name}'")]
    UnknownCode { section: String, name: String },

    #[error("Section '{section}': {source}")]
    Attribute {
        section: String,
        #[source]
        source: DictionaryError,
    },

    #[error("User '{user}': {source}")]
    UserAttribute {
        user: String,
        #[source]
        source: DictionaryError,
    },

    #[error("Dictionary error: {0}")]
    Dictionary(#[from] DictionaryError),
}

/// Executes the sections a request yields.
#[async_trait]
pub trait SectionRuntime: Send + Sync {
    async fn invoke(&self, section: &str, request: &mut Request) -> Outcome;

    /// Whether `section` is configured. Unconfigured sections are never invoked.
    fn has_section(&self, section: &str) -> bool;
}

/// Built-in credential checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Check {
    /// User-Password against the configured users
    Pap,
    /// CHAP-Password against the configured users
    Chap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    pub value: String,
}

/// What a configured section does.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionPolicy {
    /// Auth-Type to select, e.g. `pap`
    pub auth_type: Option<String>,
    /// Force the reply type, e.g. `Access-Challenge`
    pub packet_type: Option<String>,
    /// Reply code to set; later outcome mappings may still change it
    pub reply_code: Option<String>,
    pub reply: Vec<AttributeSpec>,
    pub session_state: Vec<AttributeSpec>,
    pub check: Option<Check>,
    /// Returned when there is no check
    pub outcome: Option<Outcome>,
    /// Set the stripped user name to the part before '@'
    pub strip_realm: bool,
    /// Text for the auth log line
    pub message: Option<String>,
    /// Used instead when the request continues a challenge exchange
    pub resumed: Option<Box<SectionPolicy>>,
}

#[derive(Debug, Clone, Default)]
struct CompiledPolicy {
    auth_type: Option<u32>,
    packet_type: Option<Code>,
    reply_code: Option<Code>,
    reply: Vec<Attribute>,
    session_state: Vec<Attribute>,
    check: Option<Check>,
    outcome: Option<Outcome>,
    strip_realm: bool,
    message: Option<String>,
    resumed: Option<Box<CompiledPolicy>>,
}

#[derive(Debug, Clone)]
struct Credentials {
    password: String,
    reply: Vec<Attribute>,
}

/// Sections and users from the configuration.
#[derive(Debug, Default)]
pub struct PolicyRuntime {
    sections: HashMap<String, CompiledPolicy>,
    users: HashMap<String, Credentials>,
}

/// Whether `name` is a section the driver can yield, and its sub-section if keyed.
fn classify(name: &str) -> Option<Option<&'static table::SubSection>> {
    if table::phase_section_names().iter().any(|known| known == name) {
        return Some(None);
    }
    let (prefix, value) = name.split_once(' ')?;
    table::sub_sections()
        .into_iter()
        .find(|sub| sub.prefix == prefix && !value.is_empty())
        .map(Some)
}

fn parse_code(section: &str, name: &Option<String>) -> Result<Option<Code>, RuntimeError> {
    name.as_deref()
        .map(|name| {
            Code::from_name(name).ok_or_else(|| RuntimeError::UnknownCode {
                section: section.to_string(),
                name: name.to_string(),
            })
        })
        .transpose()
}

fn build_attributes(
    dictionary: &Dictionary,
    section: &str,
    specs: &[AttributeSpec],
) -> Result<Vec<Attribute>, RuntimeError> {
    specs
        .iter()
        .map(|spec| {
            dictionary
                .make_attribute(&spec.name, &spec.value)
                .map_err(|source| RuntimeError::Attribute {
                    section: section.to_string(),
                    source,
                })
        })
        .collect()
}

fn compile(
    dictionary: &mut Dictionary,
    section: &str,
    policy: &SectionPolicy,
) -> Result<CompiledPolicy, RuntimeError> {
    let auth_type = policy
        .auth_type
        .as_deref()
        .map(|name| dictionary.define_value(AUTH_TYPE, name, None))
        .transpose()?;
    let resumed = policy
        .resumed
        .as_deref()
        .map(|resumed| compile(dictionary, section, resumed).map(Box::new))
        .transpose()?;

    Ok(CompiledPolicy {
        auth_type,
        packet_type: parse_code(section, &policy.packet_type)?,
        reply_code: parse_code(section, &policy.reply_code)?,
        reply: build_attributes(dictionary, section, &policy.reply)?,
        session_state: build_attributes(dictionary, section, &policy.session_state)?,
        check: policy.check,
        outcome: policy.outcome,
        strip_realm: policy.strip_realm,
        message: policy.message.clone(),
        resumed,
    })
}

impl PolicyRuntime {
    /// Compile the configured sections.
    ///
    /// Every `authenticate <name>` section and every `auth_type` a policy
    /// selects becomes an Auth-Type value in `dictionary`, so this must run
    /// before the dictionary is shared.
    pub fn new(
        sections: &HashMap<String, SectionPolicy>,
        users: &[User],
        dictionary: &mut Dictionary,
    ) -> Result<Self, RuntimeError> {
        let mut names: Vec<&String> = sections.keys().collect();
        names.sort();

        for name in &names {
            let Some(kind) = classify(name) else {
                return Err(RuntimeError::UnknownSection(name.to_string()));
            };
            let Some(sub) = kind else { continue };
            let (_, value) = name.split_at(sub.prefix.len() + 1);
            if sub.selector.is_none() {
                dictionary.define_value(AUTH_TYPE, value, None)?;
            } else if dictionary.value_of(sub.selector_name, value).is_none() {
                warn!(
                    section = %name,
                    attribute = sub.selector_name,
                    "section name is not a known value and will never run"
                );
            }
        }

        let mut compiled = HashMap::new();
        for name in names {
            compiled.insert(name.clone(), compile(dictionary, name, &sections[name])?);
        }

        let mut credentials = HashMap::new();
        for user in users {
            let specs: Vec<AttributeSpec> = user
                .attributes
                .iter()
                .map(|(name, value)| AttributeSpec {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect();
            let reply = build_attributes(dictionary, &user.username, &specs).map_err(|e| match e {
                RuntimeError::Attribute { source, .. } => RuntimeError::UserAttribute {
                    user: user.username.clone(),
                    source,
                },
                other => other,
            })?;
            credentials.insert(
                user.username.clone(),
                Credentials {
                    password: user.password.clone(),
                    reply,
                },
            );
        }

        Ok(PolicyRuntime {
            sections: compiled,
            users: credentials,
        })
    }

    /// Configured section names, sorted.
    pub fn section_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sections.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn lookup_user(&self, request: &Request) -> Option<&Credentials> {
        request
            .control
            .stripped_user_name
            .as_deref()
            .and_then(|name| self.users.get(name))
            .or_else(|| request.user_name().and_then(|name| self.users.get(&name)))
    }

    fn check_pap(&self, request: &Request) -> Outcome {
        if request.attribute(AttributeType::UserPassword).is_none() {
            debug!("pap: no User-Password attribute");
            return Outcome::Invalid;
        }
        let Some(user) = self.lookup_user(request) else {
            return Outcome::NotFound;
        };
        let Some(password) = request.user_password() else {
            debug!("pap: User-Password could not be decoded");
            return Outcome::Invalid;
        };
        if bool::from(password.as_bytes().ct_eq(user.password.as_bytes())) {
            Outcome::Ok
        } else {
            Outcome::Reject
        }
    }

    fn check_chap(&self, request: &Request) -> Outcome {
        let Some(chap) = request.attribute(AttributeType::ChapPassword) else {
            debug!("chap: no CHAP-Password attribute");
            return Outcome::Invalid;
        };
        let Some(user) = self.lookup_user(request) else {
            return Outcome::NotFound;
        };
        let challenge = request
            .attribute(AttributeType::ChapChallenge)
            .map(|attr| attr.value.as_slice())
            .unwrap_or(&request.packet.authenticator[..]);
        if verify_chap_password(&chap.value, &user.password, challenge) {
            Outcome::Ok
        } else {
            Outcome::Reject
        }
    }
}

#[async_trait]
impl SectionRuntime for PolicyRuntime {
    async fn invoke(&self, section: &str, request: &mut Request) -> Outcome {
        let Some(mut policy) = self.sections.get(section) else {
            return Outcome::Noop;
        };
        if let Some(resumed) = &policy.resumed {
            if !request.session_state.is_empty() {
                policy = resumed.as_ref();
            }
        }

        if policy.strip_realm {
            if let Some((local, _realm)) = request.user_name().as_deref().and_then(|name| name.split_once('@')) {
                request.control.stripped_user_name = Some(local.to_string());
            }
        }
        if policy.auth_type.is_some() {
            request.control.auth_type = policy.auth_type;
        }
        if policy.packet_type.is_some() {
            request.control.packet_type = policy.packet_type;
        }
        if policy.reply_code.is_some() {
            request.reply_code = policy.reply_code;
        }
        if policy.message.is_some() {
            request.control.module_message = policy.message.clone();
        }
        request.reply.extend(policy.reply.iter().cloned());
        request.session_state.extend(policy.session_state.iter().cloned());

        let outcome = match policy.check {
            Some(Check::Pap) => self.check_pap(request),
            Some(Check::Chap) => self.check_chap(request),
            None => return policy.outcome.unwrap_or(Outcome::Noop),
        };
        if outcome == Outcome::Ok {
            if let Some(user) = self.lookup_user(request) {
                request.reply.extend(user.reply.iter().cloned());
            }
        }
        debug!(section, check = ?policy.check, outcome = %outcome, "credential check");
        outcome
    }

    fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }
}

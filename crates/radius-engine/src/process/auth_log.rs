//! `Login OK` / `Login incorrect` lines

use super::Request;
use crate::config::AuthLogConfig;
use radius_proto::dictionary::{Dictionary, AUTH_TYPE};
use radius_proto::AttributeType;

/// Short description of where the request came from.
fn origin(request: &Request) -> String {
    let port = request
        .attribute(AttributeType::NasPort)
        .and_then(|attr| attr.as_integer().ok())
        .unwrap_or(0);
    let cli = request
        .attribute(AttributeType::CallingStationId)
        .and_then(|attr| attr.as_string().ok())
        .map(|cli| format!(" cli {cli}"))
        .unwrap_or_default();
    format!("from client {} port {}{}", request.client_name, port, cli)
}

/// What to print in the password slot.
fn password_text(dictionary: &Dictionary, request: &Request) -> String {
    if request.attribute(AttributeType::UserPassword).is_none() {
        return match request.control.auth_type {
            Some(value) => format!(
                "<via Auth-Type = {}>",
                dictionary.value_name(AUTH_TYPE, value).unwrap_or("?")
            ),
            None => "<no User-Password attribute>".to_string(),
        };
    }
    if request.attribute(AttributeType::ChapPassword).is_some() {
        return "<CHAP-Password>".to_string();
    }
    request
        .user_password()
        .unwrap_or_else(|| "<undecodable User-Password>".to_string())
}

/// Format the auth log line, or `None` when auth logging is off.
pub(crate) fn auth_message(
    config: &AuthLogConfig,
    dictionary: &Dictionary,
    request: &Request,
    goodpass: bool,
) -> Option<String> {
    if !config.auth {
        return None;
    }

    let mut message = if goodpass { "Login OK" } else { "Login incorrect" }.to_string();
    if let Some(detail) = &request.control.module_message {
        message.push_str(&format!(" ({detail})"));
    }

    let user = if config.stripped_names {
        request
            .control
            .stripped_user_name
            .clone()
            .or_else(|| request.user_name())
    } else {
        request.user_name()
    }
    .unwrap_or_else(|| "<no User-Name attribute>".to_string());

    let (logit, extra) = if goodpass {
        (config.auth_goodpass, config.msg_goodpass.as_deref())
    } else {
        (config.auth_badpass, config.msg_badpass.as_deref())
    };
    let password = if logit {
        format!("/{}", password_text(dictionary, request))
    } else {
        String::new()
    };
    let extra = extra.map(|msg| format!(" {msg}")).unwrap_or_default();

    Some(format!(
        "{}: [{}{}] ({}){}",
        message,
        user,
        password,
        origin(request),
        extra
    ))
}

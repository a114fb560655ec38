use radius_proto::auth::decrypt_user_password;
use radius_proto::{Attribute, AttributeType, Code, Packet};

/// Internal attributes a policy sets for the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Control {
    /// Auth-Type value selecting `authenticate <name>`
    pub auth_type: Option<u32>,
    /// Forced reply code; wins over every outcome mapping
    pub packet_type: Option<Code>,
    /// User name with any realm removed
    pub stripped_user_name: Option<String>,
    /// Appended to the Login OK / Login incorrect line
    pub module_message: Option<String>,
}

/// One request in flight, owned by a single task.
#[derive(Debug, Clone)]
pub struct Request {
    pub packet: Packet,
    /// Shared secret of the client that sent the packet
    pub secret: Vec<u8>,
    pub client_name: String,
    pub control: Control,
    /// `None` until a phase, a mapping or a policy picks one
    pub reply_code: Option<Code>,
    pub reply: Vec<Attribute>,
    /// Attributes carried across challenge rounds
    pub session_state: Vec<Attribute>,
    /// Challenge rounds so far
    pub tries: u8,
}

impl Request {
    pub fn new(packet: Packet, secret: impl Into<Vec<u8>>, client_name: impl Into<String>) -> Self {
        Request {
            packet,
            secret: secret.into(),
            client_name: client_name.into(),
            control: Control::default(),
            reply_code: None,
            reply: Vec::new(),
            session_state: Vec::new(),
            tries: 0,
        }
    }

    pub fn attribute(&self, attr_type: AttributeType) -> Option<&Attribute> {
        self.packet.find_attribute(attr_type.as_u8())
    }

    pub fn user_name(&self) -> Option<String> {
        self.attribute(AttributeType::UserName)
            .and_then(|attr| attr.as_string().ok())
    }

    /// Cleartext User-Password, unhidden with the client secret.
    pub fn user_password(&self) -> Option<String> {
        let attr = self.attribute(AttributeType::UserPassword)?;
        decrypt_user_password(&attr.value, &self.secret, &self.packet.authenticator).ok()
    }

    pub fn reply_attribute(&self, attr_type: AttributeType) -> Option<&Attribute> {
        self.reply.iter().find(|attr| attr.is(attr_type))
    }

    /// Replace the first reply attribute of the same type, or append.
    pub fn set_reply_attribute(&mut self, attribute: Attribute) {
        match self
            .reply
            .iter_mut()
            .find(|attr| attr.attr_type == attribute.attr_type)
        {
            Some(existing) => *existing = attribute,
            None => self.reply.push(attribute),
        }
    }

    /// Build the reply packet, unless the request ends without one.
    pub fn into_reply(self) -> Option<Packet> {
        let code = self.reply_code.filter(|code| *code != Code::DoNotRespond)?;
        let mut reply = Packet::new(code, self.packet.identifier, [0u8; 16]);
        reply.attributes = self.reply;
        reply.socket = self.packet.socket.reversed();
        Some(reply)
    }
}

/// Proxy-State values of a request, in arrival order.
///
/// RFC 2865 Section 5.33: the values are opaque and must be echoed in the
/// reply unchanged. Whatever a policy put in the reply is replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyStateCapture(Vec<Vec<u8>>);

impl ProxyStateCapture {
    pub fn capture(packet: &Packet) -> Self {
        ProxyStateCapture(
            packet
                .find_all_attributes(AttributeType::ProxyState.as_u8())
                .into_iter()
                .map(|attr| attr.value.clone())
                .collect(),
        )
    }

    pub fn restore(&self, reply: &mut Vec<Attribute>) {
        reply.retain(|attr| !attr.is(AttributeType::ProxyState));
        reply.extend(self.0.iter().map(|value| Attribute {
            attr_type: AttributeType::ProxyState.as_u8(),
            value: value.clone(),
        }));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

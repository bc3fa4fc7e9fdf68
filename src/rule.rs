use crate::error::FwError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub const PROTOCOL_TCP: i32 = 6;
pub const PROTOCOL_UDP: i32 = 17;
pub const PROTOCOL_ANY: i32 = 256;

/// Rendered for ports and addresses the service reports as empty.
pub const ANY: &str = "Any";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Protocol {
    Tcp,
    Udp,
    Any,
    /// Any other IANA protocol number, shown as-is.
    Other(i32),
}

impl Protocol {
    pub fn from_code(code: i32) -> Self {
        match code {
            PROTOCOL_TCP => Protocol::Tcp,
            PROTOCOL_UDP => Protocol::Udp,
            PROTOCOL_ANY => Protocol::Any,
            other => Protocol::Other(other),
        }
    }

    #[allow(dead_code)]
    pub fn code(self) -> i32 {
        match self {
            Protocol::Tcp => PROTOCOL_TCP,
            Protocol::Udp => PROTOCOL_UDP,
            Protocol::Any => PROTOCOL_ANY,
            Protocol::Other(code) => code,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("TCP"),
            Protocol::Udp => f.write_str("UDP"),
            Protocol::Any => f.write_str("Any"),
            Protocol::Other(code) => write!(f, "{}", code),
        }
    }
}

impl FromStr for Protocol {
    type Err = FwError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "any" => Ok(Protocol::Any),
            other => other
                .parse::<i32>()
                .map(Protocol::from_code)
                .map_err(|_| FwError::InvalidValue {
                    kind: "protocol",
                    value: s.to_string(),
                }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Action {
    Allow,
    Block,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Allow => f.write_str("Allow"),
            Action::Block => f.write_str("Block"),
        }
    }
}

impl FromStr for Action {
    type Err = FwError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(Action::Allow),
            "block" => Ok(Action::Block),
            _ => Err(FwError::InvalidValue {
                kind: "action",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => f.write_str("Inbound"),
            Direction::Outbound => f.write_str("Outbound"),
        }
    }
}

impl FromStr for Direction {
    type Err = FwError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "in" | "inbound" => Ok(Direction::Inbound),
            "out" | "outbound" => Ok(Direction::Outbound),
            _ => Err(FwError::InvalidValue {
                kind: "direction",
                value: s.to_string(),
            }),
        }
    }
}

/// The rule attributes that can be read and written individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleField {
    Description,
    ApplicationPath,
    LocalPorts,
    RemoteAddresses,
    Protocol,
    Action,
    Direction,
    Enabled,
}

impl RuleField {
    pub fn label(self) -> &'static str {
        match self {
            RuleField::Description => "Description",
            RuleField::ApplicationPath => "Application",
            RuleField::LocalPorts => "Local Ports",
            RuleField::RemoteAddresses => "Remote Addresses",
            RuleField::Protocol => "Protocol",
            RuleField::Action => "Action",
            RuleField::Direction => "Direction",
            RuleField::Enabled => "Enabled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Description(String),
    ApplicationPath(String),
    LocalPorts(String),
    RemoteAddresses(String),
    Protocol(Protocol),
    Action(Action),
    Direction(Direction),
    Enabled(bool),
}

impl FieldValue {
    pub fn field(&self) -> RuleField {
        match self {
            FieldValue::Description(_) => RuleField::Description,
            FieldValue::ApplicationPath(_) => RuleField::ApplicationPath,
            FieldValue::LocalPorts(_) => RuleField::LocalPorts,
            FieldValue::RemoteAddresses(_) => RuleField::RemoteAddresses,
            FieldValue::Protocol(_) => RuleField::Protocol,
            FieldValue::Action(_) => RuleField::Action,
            FieldValue::Direction(_) => RuleField::Direction,
            FieldValue::Enabled(_) => RuleField::Enabled,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Description(s)
            | FieldValue::ApplicationPath(s)
            | FieldValue::LocalPorts(s)
            | FieldValue::RemoteAddresses(s) => f.write_str(s),
            FieldValue::Protocol(p) => write!(f, "{}", p),
            FieldValue::Action(a) => write!(f, "{}", a),
            FieldValue::Direction(d) => write!(f, "{}", d),
            FieldValue::Enabled(true) => f.write_str("Yes"),
            FieldValue::Enabled(false) => f.write_str("No"),
        }
    }
}

/// One independent field write aimed at a rule by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleChange {
    pub rule: String,
    pub value: FieldValue,
}

impl RuleChange {
    pub fn new(rule: impl Into<String>, value: FieldValue) -> Self {
        Self {
            rule: rule.into(),
            value,
        }
    }
}

/// Owned copy of a rule's fields, taken at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSnapshot {
    pub name: String,
    pub description: String,
    pub application: String,
    pub local_ports: String,
    pub remote_addresses: String,
    pub protocol: Protocol,
    pub action: Action,
    pub direction: Direction,
    pub enabled: bool,
}

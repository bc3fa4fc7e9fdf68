use crate::error::{FwError, Result};
use crate::platform::{FirewallRule, PolicyBackend};
use crate::rule::{
    Action, Direction, FieldValue, Protocol, RuleChange, RuleField, RuleSnapshot, ANY,
};
use tracing::{debug, warn};

/// Lookup, read and write access to the rules of one policy session.
pub struct RuleEngine<P: PolicyBackend> {
    policy: P,
}

/// Per-change results of [`RuleEngine::apply`], in request order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<(RuleChange, bool)>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|(_, ok)| *ok)
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|(_, ok)| !*ok).count()
    }
}

impl<P: PolicyBackend> RuleEngine<P> {
    pub fn open() -> Result<Self> {
        Ok(Self::new(P::open()?))
    }

    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    pub fn count(&self) -> Result<usize> {
        self.policy.rule_count()
    }

    pub fn enumerate(&self) -> Result<impl Iterator<Item = Result<P::Rule>> + '_> {
        self.policy.rules()
    }

    /// Case-insensitive exact match on the rule name. Absence is `Ok(None)`.
    pub fn find_by_name(&self, name: &str) -> Result<Option<P::Rule>> {
        for rule in self.policy.rules()? {
            let rule = rule?;
            match rule.name() {
                Ok(candidate) if names_match(&candidate, name) => return Ok(Some(rule)),
                Ok(_) => {}
                Err(e) => debug!("Skipping rule with unreadable name: {}", e),
            }
        }
        debug!("No rule named '{}'", name);
        Ok(None)
    }

    pub fn snapshot(&self, rule: &P::Rule) -> Result<RuleSnapshot> {
        Ok(RuleSnapshot {
            name: rule.name()?,
            description: get_description(rule)?,
            application: get_application_path(rule)?,
            local_ports: get_local_ports(rule)?,
            remote_addresses: get_remote_addresses(rule)?,
            protocol: get_protocol(rule)?,
            action: get_action(rule)?,
            direction: get_direction(rule)?,
            enabled: get_enabled(rule)?,
        })
    }

    /// Looks the rule up and writes one field. Never fails loudly: a missing
    /// rule, a lookup fault or a rejected write all come back as `false`.
    pub fn set(&self, name: &str, value: FieldValue) -> bool {
        let rule = match self.find_by_name(name) {
            Ok(Some(rule)) => rule,
            Ok(None) => {
                warn!("Cannot set {}: rule '{}' not found", value.field().label(), name);
                return false;
            }
            Err(e) => {
                warn!("Cannot set {} on '{}': {}", value.field().label(), name, e);
                return false;
            }
        };
        match rule.write(&value) {
            Ok(()) => {
                debug!("Set {} on '{}' to '{}'", value.field().label(), name, value);
                true
            }
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    /// Applies every change independently; nothing is rolled back when one fails.
    pub fn apply(&self, changes: &[RuleChange]) -> BatchReport {
        let outcomes = changes
            .iter()
            .map(|change| (change.clone(), self.set(&change.rule, change.value.clone())))
            .collect();
        BatchReport { outcomes }
    }
}

// Typed single-field setters; the CLI goes through `apply`.
#[allow(dead_code)]
impl<P: PolicyBackend> RuleEngine<P> {
    pub fn set_description(&self, name: &str, value: &str) -> bool {
        self.set(name, FieldValue::Description(value.to_string()))
    }

    pub fn set_application_path(&self, name: &str, value: &str) -> bool {
        self.set(name, FieldValue::ApplicationPath(value.to_string()))
    }

    pub fn set_local_ports(&self, name: &str, value: &str) -> bool {
        self.set(name, FieldValue::LocalPorts(value.to_string()))
    }

    pub fn set_remote_addresses(&self, name: &str, value: &str) -> bool {
        self.set(name, FieldValue::RemoteAddresses(value.to_string()))
    }

    pub fn set_protocol(&self, name: &str, value: Protocol) -> bool {
        self.set(name, FieldValue::Protocol(value))
    }

    pub fn set_action(&self, name: &str, value: Action) -> bool {
        self.set(name, FieldValue::Action(value))
    }

    pub fn set_direction(&self, name: &str, value: Direction) -> bool {
        self.set(name, FieldValue::Direction(value))
    }

    pub fn set_enabled(&self, name: &str, value: bool) -> bool {
        self.set(name, FieldValue::Enabled(value))
    }
}

fn names_match(candidate: &str, wanted: &str) -> bool {
    candidate.to_lowercase() == wanted.to_lowercase()
}

fn mismatch(field: RuleField, got: &FieldValue) -> FwError {
    FwError::Lookup(format!(
        "service returned {:?} when {} was requested",
        got,
        field.label()
    ))
}

fn read_text(rule: &impl FirewallRule, field: RuleField) -> Result<String> {
    match rule.read(field)? {
        FieldValue::Description(s)
        | FieldValue::ApplicationPath(s)
        | FieldValue::LocalPorts(s)
        | FieldValue::RemoteAddresses(s) => Ok(s),
        other => Err(mismatch(field, &other)),
    }
}

fn any_if_empty(value: String) -> String {
    if value.is_empty() {
        ANY.to_string()
    } else {
        value
    }
}

pub fn get_description(rule: &impl FirewallRule) -> Result<String> {
    read_text(rule, RuleField::Description)
}

pub fn get_application_path(rule: &impl FirewallRule) -> Result<String> {
    read_text(rule, RuleField::ApplicationPath)
}

pub fn get_local_ports(rule: &impl FirewallRule) -> Result<String> {
    read_text(rule, RuleField::LocalPorts).map(any_if_empty)
}

pub fn get_remote_addresses(rule: &impl FirewallRule) -> Result<String> {
    read_text(rule, RuleField::RemoteAddresses).map(any_if_empty)
}

pub fn get_protocol(rule: &impl FirewallRule) -> Result<Protocol> {
    match rule.read(RuleField::Protocol)? {
        FieldValue::Protocol(p) => Ok(p),
        other => Err(mismatch(RuleField::Protocol, &other)),
    }
}

pub fn get_action(rule: &impl FirewallRule) -> Result<Action> {
    match rule.read(RuleField::Action)? {
        FieldValue::Action(a) => Ok(a),
        other => Err(mismatch(RuleField::Action, &other)),
    }
}

pub fn get_direction(rule: &impl FirewallRule) -> Result<Direction> {
    match rule.read(RuleField::Direction)? {
        FieldValue::Direction(d) => Ok(d),
        other => Err(mismatch(RuleField::Direction, &other)),
    }
}

pub fn get_enabled(rule: &impl FirewallRule) -> Result<bool> {
    match rule.read(RuleField::Enabled)? {
        FieldValue::Enabled(e) => Ok(e),
        other => Err(mismatch(RuleField::Enabled, &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{sample_rule, MemoryPolicy};

    fn engine() -> RuleEngine<MemoryPolicy> {
        let mut web = sample_rule("Web Server");
        web.local_ports = "80,443".to_string();
        web.protocol = Protocol::Tcp;
        RuleEngine::new(MemoryPolicy::with_rules(vec![
            sample_rule("Remote Desktop"),
            web,
            sample_rule("!IP Blacklist"),
        ]))
    }

    #[test]
    fn find_by_name_ignores_case() {
        let engine = engine();
        for query in ["Web Server", "web server", "WEB SERVER", "wEb SeRvEr"] {
            let rule = engine.find_by_name(query).unwrap().expect("rule exists");
            assert_eq!(rule.name().unwrap(), "Web Server");
        }
    }

    #[test]
    fn find_by_name_reports_absence_without_error() {
        let engine = engine();
        assert!(engine.find_by_name("Does Not Exist").unwrap().is_none());
        assert!(engine.find_by_name("Web").unwrap().is_none());
    }

    #[test]
    fn find_by_name_skips_rules_whose_name_cannot_be_read() {
        let policy = MemoryPolicy::with_rules(vec![
            sample_rule("Broken"),
            sample_rule("Web Server"),
        ])
        .unreadable_name("Broken");
        let engine = RuleEngine::new(policy);

        let rule = engine.find_by_name("web server").unwrap().expect("rule exists");
        assert_eq!(rule.name().unwrap(), "Web Server");
        assert!(engine.find_by_name("Broken").unwrap().is_none());
    }

    #[test]
    fn find_by_name_surfaces_service_faults() {
        let engine = RuleEngine::new(MemoryPolicy::default().failing_enumeration());
        assert!(matches!(
            engine.find_by_name("anything"),
            Err(FwError::Lookup(_))
        ));
    }

    #[test]
    fn enumeration_yields_count_rules() {
        let engine = engine();
        let listed = engine.enumerate().unwrap().count();
        assert_eq!(listed, engine.count().unwrap());
        assert_eq!(listed, 3);
    }

    #[test]
    fn empty_ports_and_addresses_read_as_any() {
        let engine = engine();
        let rule = engine.find_by_name("Remote Desktop").unwrap().unwrap();
        assert_eq!(get_local_ports(&rule).unwrap(), "Any");
        assert_eq!(get_remote_addresses(&rule).unwrap(), "Any");
        assert_eq!(get_description(&rule).unwrap(), "");
        assert_eq!(get_application_path(&rule).unwrap(), "");
    }

    #[test]
    fn every_field_round_trips() {
        let engine = engine();
        let name = "Web Server";
        assert!(engine.set_description(name, "Public HTTP"));
        assert!(engine.set_application_path(name, r"C:\srv\httpd.exe"));
        assert!(engine.set_local_ports(name, "8080"));
        assert!(engine.set_remote_addresses(name, "10.0.0.0/8"));
        assert!(engine.set_protocol(name, Protocol::Udp));
        assert!(engine.set_action(name, Action::Allow));
        assert!(engine.set_direction(name, Direction::Outbound));
        assert!(engine.set_enabled(name, false));

        let rule = engine.find_by_name(name).unwrap().unwrap();
        assert_eq!(get_description(&rule).unwrap(), "Public HTTP");
        assert_eq!(get_application_path(&rule).unwrap(), r"C:\srv\httpd.exe");
        assert_eq!(get_local_ports(&rule).unwrap(), "8080");
        assert_eq!(get_remote_addresses(&rule).unwrap(), "10.0.0.0/8");
        assert_eq!(get_protocol(&rule).unwrap(), Protocol::Udp);
        assert_eq!(get_action(&rule).unwrap(), Action::Allow);
        assert_eq!(get_direction(&rule).unwrap(), Direction::Outbound);
        assert!(!get_enabled(&rule).unwrap());
    }

    #[test]
    fn setter_on_missing_rule_returns_false() {
        let engine = engine();
        assert!(!engine.set_enabled("Ghost", true));
    }

    #[test]
    fn batch_continues_past_missing_rule() {
        let engine = engine();
        let report = engine.apply(&[
            RuleChange::new("Web Server", FieldValue::Description("one".into())),
            RuleChange::new("Ghost", FieldValue::Enabled(false)),
            RuleChange::new("remote desktop", FieldValue::Action(Action::Allow)),
        ]);

        let results: Vec<bool> = report.outcomes.iter().map(|(_, ok)| *ok).collect();
        assert_eq!(results, vec![true, false, true]);
        assert!(!report.all_succeeded());
        assert_eq!(report.failures(), 1);

        let rdp = engine.find_by_name("Remote Desktop").unwrap().unwrap();
        assert_eq!(get_action(&rdp).unwrap(), Action::Allow);
    }

    #[test]
    fn rejected_write_is_reported_and_others_still_apply() {
        let policy = MemoryPolicy::with_rules(vec![sample_rule("Locked")])
            .reject_writes("Locked", RuleField::LocalPorts);
        let engine = RuleEngine::new(policy);
        let report = engine.apply(&[
            RuleChange::new("Locked", FieldValue::LocalPorts("22".into())),
            RuleChange::new("Locked", FieldValue::Enabled(false)),
        ]);

        let results: Vec<bool> = report.outcomes.iter().map(|(_, ok)| *ok).collect();
        assert_eq!(results, vec![false, true]);

        let rule = engine.find_by_name("locked").unwrap().unwrap();
        assert_eq!(get_local_ports(&rule).unwrap(), "Any");
        assert!(!get_enabled(&rule).unwrap());
    }

    #[test]
    fn snapshot_collects_all_fields() {
        let engine = engine();
        let rule = engine.find_by_name("web server").unwrap().unwrap();
        let snapshot = engine.snapshot(&rule).unwrap();
        assert_eq!(snapshot.name, "Web Server");
        assert_eq!(snapshot.local_ports, "80,443");
        assert_eq!(snapshot.remote_addresses, "Any");
        assert_eq!(snapshot.protocol, Protocol::Tcp);
        assert!(snapshot.enabled);
    }
}

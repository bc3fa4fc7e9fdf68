// src/platform/memory.rs

//! In-process policy used by the unit tests in place of the Windows service.

use crate::error::{FwError, Result};
use crate::platform::{FirewallRule, PolicyBackend};
use crate::rule::{Action, Direction, FieldValue, Protocol, RuleField, RuleSnapshot};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

#[derive(Default)]
pub struct MemoryPolicy {
    rules: Vec<MemoryRule>,
    fail_enumeration: bool,
}

impl MemoryPolicy {
    pub fn with_rules(rules: Vec<RuleSnapshot>) -> Self {
        Self {
            rules: rules.into_iter().map(MemoryRule::new).collect(),
            fail_enumeration: false,
        }
    }

    /// Makes every subsequent enumeration fail at the service level.
    pub fn failing_enumeration(mut self) -> Self {
        self.fail_enumeration = true;
        self
    }

    /// Makes writes to `field` on rule `name` fail.
    pub fn reject_writes(self, name: &str, field: RuleField) -> Self {
        for rule in &self.rules {
            if rule.state.borrow().snapshot.name == name {
                rule.state.borrow_mut().rejected.insert(field);
            }
        }
        self
    }

    /// Makes reading the name of rule `name` fail, as a broken service object would.
    pub fn unreadable_name(self, name: &str) -> Self {
        for rule in &self.rules {
            if rule.state.borrow().snapshot.name == name {
                rule.state.borrow_mut().name_unreadable = true;
            }
        }
        self
    }
}

impl PolicyBackend for MemoryPolicy {
    type Rule = MemoryRule;

    fn open() -> Result<Self> {
        Ok(Self::default())
    }

    fn rule_count(&self) -> Result<usize> {
        Ok(self.rules.len())
    }

    fn rules(&self) -> Result<Box<dyn Iterator<Item = Result<MemoryRule>> + '_>> {
        if self.fail_enumeration {
            return Err(FwError::Lookup("enumerator unavailable".to_string()));
        }
        Ok(Box::new(self.rules.iter().cloned().map(Ok)))
    }
}

struct RuleState {
    snapshot: RuleSnapshot,
    rejected: HashSet<RuleField>,
    name_unreadable: bool,
}

/// Shares state with the policy, like a COM reference to a live rule.
#[derive(Clone)]
pub struct MemoryRule {
    state: Rc<RefCell<RuleState>>,
}

impl MemoryRule {
    fn new(snapshot: RuleSnapshot) -> Self {
        Self {
            state: Rc::new(RefCell::new(RuleState {
                snapshot,
                rejected: HashSet::new(),
                name_unreadable: false,
            })),
        }
    }
}

impl FirewallRule for MemoryRule {
    fn name(&self) -> Result<String> {
        let state = self.state.borrow();
        if state.name_unreadable {
            return Err(FwError::Lookup("name unavailable".to_string()));
        }
        Ok(state.snapshot.name.clone())
    }

    fn read(&self, field: RuleField) -> Result<FieldValue> {
        let state = self.state.borrow();
        let rule = &state.snapshot;
        Ok(match field {
            RuleField::Description => FieldValue::Description(rule.description.clone()),
            RuleField::ApplicationPath => FieldValue::ApplicationPath(rule.application.clone()),
            RuleField::LocalPorts => FieldValue::LocalPorts(rule.local_ports.clone()),
            RuleField::RemoteAddresses => {
                FieldValue::RemoteAddresses(rule.remote_addresses.clone())
            }
            RuleField::Protocol => FieldValue::Protocol(rule.protocol),
            RuleField::Action => FieldValue::Action(rule.action),
            RuleField::Direction => FieldValue::Direction(rule.direction),
            RuleField::Enabled => FieldValue::Enabled(rule.enabled),
        })
    }

    fn write(&self, value: &FieldValue) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.rejected.contains(&value.field()) {
            return Err(FwError::Write {
                rule: state.snapshot.name.clone(),
                field: value.field().label(),
                reason: "access denied".to_string(),
            });
        }
        let rule = &mut state.snapshot;
        match value.clone() {
            FieldValue::Description(v) => rule.description = v,
            FieldValue::ApplicationPath(v) => rule.application = v,
            FieldValue::LocalPorts(v) => rule.local_ports = v,
            FieldValue::RemoteAddresses(v) => rule.remote_addresses = v,
            FieldValue::Protocol(v) => rule.protocol = v,
            FieldValue::Action(v) => rule.action = v,
            FieldValue::Direction(v) => rule.direction = v,
            FieldValue::Enabled(v) => rule.enabled = v,
        }
        Ok(())
    }
}

/// A rule with every text field empty, as the service reports "any".
pub fn sample_rule(name: &str) -> RuleSnapshot {
    RuleSnapshot {
        name: name.to_string(),
        description: String::new(),
        application: String::new(),
        local_ports: String::new(),
        remote_addresses: String::new(),
        protocol: Protocol::Any,
        action: Action::Block,
        direction: Direction::Inbound,
        enabled: true,
    }
}

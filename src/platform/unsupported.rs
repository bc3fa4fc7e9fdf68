// src/platform/unsupported.rs

use crate::elevation::PrivilegeProbe;
use crate::error::{FwError, Result};
use crate::platform::{FirewallRule, PolicyBackend};
use crate::rule::{FieldValue, RuleField};

/// Stand-in used where the Windows Firewall service does not exist.
/// Opening a session always fails with a connection error.
pub struct UnsupportedPolicy;

/// No rule can ever be produced without a session.
pub enum NoRule {}

impl FirewallRule for NoRule {
    fn name(&self) -> Result<String> {
        match *self {}
    }

    fn read(&self, _field: RuleField) -> Result<FieldValue> {
        match *self {}
    }

    fn write(&self, _value: &FieldValue) -> Result<()> {
        match *self {}
    }
}

impl PolicyBackend for UnsupportedPolicy {
    type Rule = NoRule;

    fn open() -> Result<Self> {
        Err(FwError::Connection(format!(
            "Windows Firewall policy service is not available on {}",
            std::env::consts::OS
        )))
    }

    fn rule_count(&self) -> Result<usize> {
        Ok(0)
    }

    fn rules(&self) -> Result<Box<dyn Iterator<Item = Result<NoRule>> + '_>> {
        Ok(Box::new(std::iter::empty()))
    }
}

/// There is no UAC prompt to go through here; the process is treated as privileged.
pub struct UnsupportedPrivileges;

impl PrivilegeProbe for UnsupportedPrivileges {
    fn is_admin(&self) -> bool {
        true
    }

    fn relaunch_elevated(&self, _args: &[String]) -> Result<()> {
        Err(FwError::Elevation(
            "self-elevation is only supported on Windows".to_string(),
        ))
    }
}

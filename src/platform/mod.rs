// src/platform/mod.rs

#[cfg(target_os = "windows")]
mod windows;

#[cfg(not(target_os = "windows"))]
mod unsupported;

#[cfg(test)]
pub mod memory;

#[cfg(target_os = "windows")]
pub use windows::{WindowsPolicy as Policy, WindowsPrivileges as Privileges};

#[cfg(not(target_os = "windows"))]
pub use unsupported::{UnsupportedPolicy as Policy, UnsupportedPrivileges as Privileges};

use crate::error::Result;
use crate::rule::{FieldValue, RuleField};

/// One rule object held by the policy service.
///
/// Dropping the handle releases the reference the service handed out.
pub trait FirewallRule {
    fn name(&self) -> Result<String>;
    fn read(&self, field: RuleField) -> Result<FieldValue>;
    fn write(&self, value: &FieldValue) -> Result<()>;
}

/// A live connection to the firewall policy service.
///
/// The connection is released when the value is dropped.
pub trait PolicyBackend {
    type Rule: FirewallRule;

    fn open() -> Result<Self>
    where
        Self: Sized;

    fn rule_count(&self) -> Result<usize>;

    /// Walks the rule collection as the service reports it at call time.
    fn rules(&self) -> Result<Box<dyn Iterator<Item = Result<Self::Rule>> + '_>>;
}

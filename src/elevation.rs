use crate::error::{FwError, Result};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeState {
    Unprivileged,
    Privileged,
}

/// What the caller must do after the privilege check.
#[derive(Debug)]
pub enum ElevationOutcome {
    /// Already elevated; carry on in this process.
    Continue,
    /// An elevated copy was started; this process should exit.
    Relaunched,
    /// The relaunch did not happen; this process should exit anyway.
    Declined(FwError),
}

impl ElevationOutcome {
    #[allow(dead_code)]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ElevationOutcome::Continue)
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait PrivilegeProbe {
    /// Whether the invoking identity is in the Administrators group.
    fn is_admin(&self) -> bool;

    /// Starts the current executable again behind an elevation prompt.
    fn relaunch_elevated(&self, args: &[String]) -> Result<()>;
}

pub fn check(probe: &dyn PrivilegeProbe) -> PrivilegeState {
    if probe.is_admin() {
        PrivilegeState::Privileged
    } else {
        PrivilegeState::Unprivileged
    }
}

pub fn ensure_elevated(probe: &dyn PrivilegeProbe, args: &[String]) -> ElevationOutcome {
    match check(probe) {
        PrivilegeState::Privileged => ElevationOutcome::Continue,
        PrivilegeState::Unprivileged => {
            info!("Not running as administrator, requesting elevation");
            match probe.relaunch_elevated(args) {
                Ok(()) => {
                    info!("Elevated instance launched");
                    ElevationOutcome::Relaunched
                }
                Err(e) => {
                    error!("Could not relaunch with elevation: {}", e);
                    ElevationOutcome::Declined(e)
                }
            }
        }
    }
}

/// Joins arguments into one Windows command line, quoting where needed.
#[allow(dead_code)]
pub fn join_args(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if !arg.is_empty() && !arg.contains(|c: char| c.is_whitespace() || c == '"') {
                arg.clone()
            } else {
                format!("\"{}\"", arg.replace('"', "\\\""))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

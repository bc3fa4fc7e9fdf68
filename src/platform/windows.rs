// src/platform/windows.rs

use crate::elevation::{self, PrivilegeProbe};
use crate::error::{FwError, Result};
use crate::platform::{FirewallRule, PolicyBackend};
use crate::rule::{Action, Direction, FieldValue, Protocol, RuleField};
use ::windows::core::{w, Interface, IUnknown, BSTR, HSTRING, PCWSTR, VARIANT};
use ::windows::Win32::Foundation::{ERROR_CANCELLED, HWND, S_OK, VARIANT_FALSE, VARIANT_TRUE};
use ::windows::Win32::NetworkManagement::WindowsFirewall::{
    INetFwPolicy2, INetFwRule, INetFwRules, NetFwPolicy2, NET_FW_ACTION_ALLOW,
    NET_FW_ACTION_BLOCK, NET_FW_RULE_DIR_IN, NET_FW_RULE_DIR_OUT,
};
use ::windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoUninitialize, CLSCTX_INPROC_SERVER,
    COINIT_APARTMENTTHREADED,
};
use ::windows::Win32::System::Ole::IEnumVARIANT;
use ::windows::Win32::UI::Shell::{IsUserAnAdmin, ShellExecuteW};
use ::windows::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;
use tracing::debug;

const VT_DISPATCH: u16 = 9;
const VT_UNKNOWN: u16 = 13;

/// Keeps COM initialised on this thread for as long as it lives.
struct ComApartment;

impl ComApartment {
    fn enter() -> Result<Self> {
        unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) }
            .ok()
            .map_err(|e| FwError::Connection(format!("COM initialization failed: {}", e)))?;
        Ok(ComApartment)
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        unsafe { CoUninitialize() };
    }
}

/// Session against `HNetCfg.FwPolicy2`.
///
/// Field order matters: the policy interface is released before COM is torn down.
pub struct WindowsPolicy {
    policy: INetFwPolicy2,
    _apartment: ComApartment,
}

impl WindowsPolicy {
    fn collection(&self) -> Result<INetFwRules> {
        unsafe { self.policy.Rules() }.map_err(|e| FwError::Lookup(e.to_string()))
    }
}

impl PolicyBackend for WindowsPolicy {
    type Rule = WindowsRule;

    fn open() -> Result<Self> {
        let apartment = ComApartment::enter()?;
        let policy: INetFwPolicy2 =
            unsafe { CoCreateInstance(&NetFwPolicy2, None, CLSCTX_INPROC_SERVER) }.map_err(
                |e| {
                    FwError::Connection(format!(
                        "Failed to create firewall policy instance: {}",
                        e
                    ))
                },
            )?;
        debug!("Connected to firewall policy service");
        Ok(Self {
            policy,
            _apartment: apartment,
        })
    }

    fn rule_count(&self) -> Result<usize> {
        let count = unsafe { self.collection()?.Count() }
            .map_err(|e| FwError::Lookup(e.to_string()))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn rules(&self) -> Result<Box<dyn Iterator<Item = Result<WindowsRule>> + '_>> {
        let rules = self.collection()?;
        let enumerator = unsafe { rules._NewEnum() }
            .and_then(|unknown| unknown.cast::<IEnumVARIANT>())
            .map_err(|e| FwError::Lookup(e.to_string()))?;
        Ok(Box::new(RuleEnumerator { inner: enumerator }))
    }
}

struct RuleEnumerator {
    inner: IEnumVARIANT,
}

impl Iterator for RuleEnumerator {
    type Item = Result<WindowsRule>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let mut slot = [VARIANT::default()];
            let mut fetched = 0u32;
            let hr = unsafe { self.inner.Next(&mut slot, &mut fetched) };
            if hr != S_OK || fetched == 0 {
                if hr.is_err() {
                    return Some(Err(FwError::Lookup(hr.message())));
                }
                return None;
            }
            // Elements that do not expose INetFwRule are skipped.
            if let Some(rule) = rule_from_variant(&slot[0]) {
                return Some(Ok(WindowsRule { inner: rule }));
            }
        }
    }
}

fn rule_from_variant(value: &VARIANT) -> Option<INetFwRule> {
    let raw = value.as_raw();
    unsafe {
        let vt = raw.Anonymous.Anonymous.vt;
        if vt != VT_DISPATCH && vt != VT_UNKNOWN {
            return None;
        }
        let ptr = raw.Anonymous.Anonymous.Anonymous.punkVal;
        IUnknown::from_raw_borrowed(&ptr)?.cast::<INetFwRule>().ok()
    }
}

pub struct WindowsRule {
    inner: INetFwRule,
}

impl FirewallRule for WindowsRule {
    fn name(&self) -> Result<String> {
        unsafe { self.inner.Name() }
            .map(|name| name.to_string())
            .map_err(|e| FwError::Lookup(e.to_string()))
    }

    fn read(&self, field: RuleField) -> Result<FieldValue> {
        let rule = &self.inner;
        let value = unsafe {
            match field {
                RuleField::Description => rule
                    .Description()
                    .map(|s| FieldValue::Description(s.to_string())),
                RuleField::ApplicationPath => rule
                    .ApplicationName()
                    .map(|s| FieldValue::ApplicationPath(s.to_string())),
                RuleField::LocalPorts => rule
                    .LocalPorts()
                    .map(|s| FieldValue::LocalPorts(s.to_string())),
                RuleField::RemoteAddresses => rule
                    .RemoteAddresses()
                    .map(|s| FieldValue::RemoteAddresses(s.to_string())),
                RuleField::Protocol => rule
                    .Protocol()
                    .map(|code| FieldValue::Protocol(Protocol::from_code(code))),
                RuleField::Action => rule.Action().map(|action| {
                    FieldValue::Action(if action == NET_FW_ACTION_ALLOW {
                        Action::Allow
                    } else {
                        Action::Block
                    })
                }),
                RuleField::Direction => rule.Direction().map(|direction| {
                    FieldValue::Direction(if direction == NET_FW_RULE_DIR_IN {
                        Direction::Inbound
                    } else {
                        Direction::Outbound
                    })
                }),
                RuleField::Enabled => rule
                    .Enabled()
                    .map(|enabled| FieldValue::Enabled(enabled == VARIANT_TRUE)),
            }
        };
        value.map_err(|e| FwError::Lookup(format!("{}: {}", field.label(), e)))
    }

    fn write(&self, value: &FieldValue) -> Result<()> {
        let rule = &self.inner;
        let outcome = unsafe {
            match value {
                FieldValue::Description(text) => rule.SetDescription(&BSTR::from(text.as_str())),
                FieldValue::ApplicationPath(path) => {
                    rule.SetApplicationName(&BSTR::from(path.as_str()))
                }
                FieldValue::LocalPorts(ports) => rule.SetLocalPorts(&BSTR::from(ports.as_str())),
                FieldValue::RemoteAddresses(addresses) => {
                    rule.SetRemoteAddresses(&BSTR::from(addresses.as_str()))
                }
                FieldValue::Protocol(protocol) => rule.SetProtocol(protocol.code()),
                FieldValue::Action(Action::Allow) => rule.SetAction(NET_FW_ACTION_ALLOW),
                FieldValue::Action(Action::Block) => rule.SetAction(NET_FW_ACTION_BLOCK),
                FieldValue::Direction(Direction::Inbound) => rule.SetDirection(NET_FW_RULE_DIR_IN),
                FieldValue::Direction(Direction::Outbound) => {
                    rule.SetDirection(NET_FW_RULE_DIR_OUT)
                }
                FieldValue::Enabled(true) => rule.SetEnabled(VARIANT_TRUE),
                FieldValue::Enabled(false) => rule.SetEnabled(VARIANT_FALSE),
            }
        };
        outcome.map_err(|e| FwError::Write {
            rule: self.name().unwrap_or_default(),
            field: value.field().label(),
            reason: e.to_string(),
        })
    }
}

/// Administrator check and UAC relaunch through the shell.
pub struct WindowsPrivileges;

impl PrivilegeProbe for WindowsPrivileges {
    fn is_admin(&self) -> bool {
        unsafe { IsUserAnAdmin() }.as_bool()
    }

    fn relaunch_elevated(&self, args: &[String]) -> Result<()> {
        let exe = std::env::current_exe()?;
        let file = HSTRING::from(exe.as_os_str());
        let parameters = HSTRING::from(elevation::join_args(args));

        let instance = unsafe {
            ShellExecuteW(
                HWND::default(),
                w!("runas"),
                &file,
                &parameters,
                PCWSTR::null(),
                SW_SHOWNORMAL,
            )
        };

        // ShellExecute reports success with any value above 32.
        if instance.0 as isize > 32 {
            return Ok(());
        }

        let error = ::windows::core::Error::from_win32();
        if error.code() == ERROR_CANCELLED.to_hresult() {
            Err(FwError::ElevationDeclined(error.message()))
        } else {
            Err(FwError::Elevation(error.to_string()))
        }
    }
}

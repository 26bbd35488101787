#![doc = include_str!("../README.md")]
#![allow(non_upper_case_globals)]

mod attributes;
mod config;
mod error;
mod flags;
mod handle;
mod launcher;
mod native;
mod process;
mod resources;
mod security;

#[cfg(windows)]
mod token;
#[cfg(windows)]
mod win32;

#[cfg(test)]
mod testing;

pub use attributes::{mitigation_payload, AttributeList, ProcThreadAttribute};
pub use config::{EnvironmentBlock, LaunchConfig};
pub use error::{Error, Result};
pub use flags::{CreationFlags, LogonFlags, MitigationOptions, MitigationOptions2};
pub use handle::{BorrowedHandle, HandleValue};
pub use launcher::ProcessLauncher;
pub use native::{
    AttributeListRef, CreateRequest, Credentials, Native, ProcessInformation, StartupInfo,
    STARTF_USESHOWWINDOW, SW_HIDE,
};
pub use process::{LaunchedProcess, STATUS_PROCESS_IS_TERMINATING};
pub use resources::{Resource, ScopedResources};
pub use security::{security_attributes, SecurityAttributes, SecurityDescriptor};

#[cfg(windows)]
pub use handle::OwnedProcess;
#[cfg(windows)]
pub use token::{enable_privilege, PrimaryToken};
#[cfg(windows)]
pub use win32::Win32;

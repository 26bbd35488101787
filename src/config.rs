use std::path::{Path, PathBuf};

use crate::{
    error::{Error, Result},
    flags::{CreationFlags, MitigationOptions, MitigationOptions2},
    handle::BorrowedHandle,
    native::{AttributeListRef, CreateRequest, StartupInfo, STARTF_USESHOWWINDOW, SW_HIDE},
    security::{SecurityAttributes, SecurityDescriptor},
};

/// Describes the process to create. Borrowed by every launch call and never modified by it.
///
/// # Example
///
/// ```rust,ignore
/// let config = LaunchConfig::new("cmd.exe /c dir")
///     .application_name("C:\\Windows\\System32\\cmd.exe")
///     .mitigation(MitigationOptions::BottomUpAslrAlwaysOn)
///     .terminate_on_dispose(true);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LaunchConfig<'a> {
    /// Executable path (`lpApplicationName`); `None` lets the OS take it from the command line.
    pub application_name: Option<String>,

    /// Full command line, program name included.
    pub command_line: Option<String>,

    /// Raw environment block. A UTF-16 block also needs [`CreationFlags::UnicodeEnvironment`].
    pub environment: Option<Vec<u8>>,

    /// Working directory; `None` inherits the caller's.
    pub current_directory: Option<PathBuf>,

    /// Window station and desktop, e.g. `WinSta0\Default`.
    pub desktop: Option<String>,

    /// Console window title.
    pub title: Option<String>,

    /// Creation flags passed through to the OS.
    pub creation_flags: CreationFlags,

    /// Whether the child inherits the caller's inheritable handles.
    pub inherit_handles: bool,

    /// Security descriptor for the new process object.
    pub process_security: Option<SecurityDescriptor>,

    /// Whether the returned process handle is inheritable.
    pub inherit_process_handle: bool,

    /// Security descriptor for the new thread object.
    pub thread_security: Option<SecurityDescriptor>,

    /// Whether the returned thread handle is inheritable.
    pub inherit_thread_handle: bool,

    /// Process to report as the parent. Only borrowed; it must outlive the launch call.
    pub parent_process: Option<BorrowedHandle<'a>>,

    /// First generation mitigation policy.
    pub mitigation_options: MitigationOptions,

    /// Second generation mitigation policy.
    pub mitigation_options2: MitigationOptions2,

    /// Kill the process when the returned [`crate::LaunchedProcess`] is released.
    pub terminate_on_dispose: bool,
}

impl<'a> LaunchConfig<'a> {
    /// Creates a config that runs `command_line` with everything else defaulted.
    pub fn new(command_line: impl Into<String>) -> Self {
        Self {
            command_line: Some(command_line.into()),
            ..Default::default()
        }
    }

    /// Sets the executable path.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Sets the working directory.
    pub fn current_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_directory = Some(dir.into());
        self
    }

    /// Sets the desktop the process starts on.
    pub fn desktop(mut self, desktop: impl Into<String>) -> Self {
        self.desktop = Some(desktop.into());
        self
    }

    /// Sets the console window title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Replaces the creation flags.
    pub fn creation_flags(mut self, flags: CreationFlags) -> Self {
        self.creation_flags = flags;
        self
    }

    /// Reports `parent` as the new process's parent.
    pub fn parent(mut self, parent: BorrowedHandle<'a>) -> Self {
        self.parent_process = Some(parent);
        self
    }

    /// Sets the first generation mitigation policy.
    pub fn mitigation(mut self, options: MitigationOptions) -> Self {
        self.mitigation_options = options;
        self
    }

    /// Sets the second generation mitigation policy.
    pub fn mitigation2(mut self, options: MitigationOptions2) -> Self {
        self.mitigation_options2 = options;
        self
    }

    /// Kills the process when the returned handle wrapper is released.
    pub fn terminate_on_dispose(mut self, terminate: bool) -> Self {
        self.terminate_on_dispose = terminate;
        self
    }

    /// Replaces the environment with `vars` and marks the block as UTF-16.
    pub fn environment_vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.environment = Some(EnvironmentBlock::from_vars(vars));
        self.creation_flags |= CreationFlags::UnicodeEnvironment;
        self
    }

    /// Number of extended startup attributes this config needs (0, 1 or 2).
    pub fn attribute_count(&self) -> u32 {
        let mut count = 0;
        if self.parent_process.is_some() {
            count += 1;
        }
        if !self.mitigation_options.is_empty() || !self.mitigation_options2.is_empty() {
            count += 1;
        }
        count
    }

    /// The fixed part of the startup info shared by every strategy.
    pub(crate) fn startup_info<'w>(&self, wide: &'w WideConfig) -> StartupInfo<'w> {
        StartupInfo {
            desktop: wide.desktop.as_deref(),
            title: wide.title.as_deref(),
            flags: STARTF_USESHOWWINDOW,
            show_window: SW_HIDE,
        }
    }
}

/// Builder for UTF-16 environment blocks (`NAME=value\0...\0\0`).
pub struct EnvironmentBlock;

impl EnvironmentBlock {
    /// Encodes `vars` sorted case-insensitively by name, as `CreateProcessW` expects.
    pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Vec<u8>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut entries: Vec<String> = vars
            .into_iter()
            .map(|(k, v)| format!("{}={}", k.as_ref(), v.as_ref()))
            .collect();
        entries.sort_by_key(|entry| {
            let name = entry.split('=').next().unwrap_or_default();
            name.to_uppercase()
        });

        let mut wide: Vec<u16> = Vec::new();
        for entry in &entries {
            wide.extend(entry.encode_utf16());
            wide.push(0);
        }
        if entries.is_empty() {
            wide.push(0);
        }
        wide.push(0);

        wide.iter().flat_map(|unit| unit.to_le_bytes()).collect()
    }
}

/// Converts a string to a NUL-terminated UTF-16 buffer for a Windows API.
pub(crate) trait ToWide {
    fn to_wide(&self, field: &'static str) -> Result<Vec<u16>>;
}

impl ToWide for str {
    fn to_wide(&self, field: &'static str) -> Result<Vec<u16>> {
        terminate(self.encode_utf16(), field)
    }
}

impl ToWide for Path {
    #[cfg(windows)]
    fn to_wide(&self, field: &'static str) -> Result<Vec<u16>> {
        use std::os::windows::ffi::OsStrExt;

        terminate(self.as_os_str().encode_wide(), field)
    }

    #[cfg(not(windows))]
    fn to_wide(&self, field: &'static str) -> Result<Vec<u16>> {
        terminate(self.to_string_lossy().encode_utf16(), field)
    }
}

fn terminate(units: impl Iterator<Item = u16>, field: &'static str) -> Result<Vec<u16>> {
    let mut wide: Vec<u16> = units.collect();
    if wide.contains(&0) {
        return Err(Error::InvalidString { field });
    }
    wide.push(0);
    Ok(wide)
}

/// UTF-16 copies of a config's strings, alive for the duration of one launch call.
#[derive(Debug, Default)]
pub(crate) struct WideConfig {
    pub application_name: Option<Vec<u16>>,
    pub command_line: Option<Vec<u16>>,
    pub current_directory: Option<Vec<u16>>,
    pub desktop: Option<Vec<u16>>,
    pub title: Option<Vec<u16>>,
}

impl WideConfig {
    pub fn new(config: &LaunchConfig<'_>) -> Result<Self> {
        Ok(Self {
            application_name: wide(config.application_name.as_deref(), "application_name")?,
            command_line: wide(config.command_line.as_deref(), "command_line")?,
            current_directory: config
                .current_directory
                .as_deref()
                .map(|dir| dir.to_wide("current_directory"))
                .transpose()?,
            desktop: wide(config.desktop.as_deref(), "desktop")?,
            title: wide(config.title.as_deref(), "title")?,
        })
    }

    /// Assembles the request shared by all strategies.
    pub fn request<'w>(
        &'w self,
        config: &'w LaunchConfig<'_>,
        process_attributes: Option<SecurityAttributes>,
        thread_attributes: Option<SecurityAttributes>,
        creation_flags: CreationFlags,
        attribute_list: Option<AttributeListRef>,
    ) -> CreateRequest<'w> {
        CreateRequest {
            application_name: self.application_name.as_deref(),
            command_line: self.command_line.as_deref(),
            process_attributes,
            thread_attributes,
            inherit_handles: config.inherit_handles,
            creation_flags,
            environment: config.environment.as_deref(),
            current_directory: self.current_directory.as_deref(),
            startup: config.startup_info(self),
            attribute_list,
        }
    }
}

fn wide(value: Option<&str>, field: &'static str) -> Result<Option<Vec<u16>>> {
    value.map(|s| s.to_wide(field)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::HandleValue;

    fn utf16_le(bytes: &[u8]) -> Vec<u16> {
        bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    #[test]
    fn attribute_count_tracks_parent_and_mitigation() {
        let parent = unsafe { BorrowedHandle::borrow_raw(HandleValue(0x44)) };

        assert_eq!(LaunchConfig::new("cmd.exe").attribute_count(), 0);
        assert_eq!(LaunchConfig::new("cmd.exe").parent(parent).attribute_count(), 1);
        assert_eq!(
            LaunchConfig::new("cmd.exe")
                .mitigation2(MitigationOptions2::StrictControlFlowGuardAlwaysOn)
                .attribute_count(),
            1
        );
        assert_eq!(
            LaunchConfig::new("cmd.exe")
                .parent(parent)
                .mitigation(MitigationOptions::DepEnable)
                .mitigation2(MitigationOptions2::LoadIntegrityContinuityAudit)
                .attribute_count(),
            2
        );
    }

    #[test]
    fn wide_strings_are_nul_terminated() {
        let wide = "cmd".to_wide("command_line").expect("wide");
        assert_eq!(wide, vec![b'c' as u16, b'm' as u16, b'd' as u16, 0]);
    }

    #[test]
    fn interior_nul_is_rejected_with_the_field_name() {
        let config = LaunchConfig::new("cmd.exe\0/c dir");
        let err = WideConfig::new(&config).expect_err("interior nul");
        assert_eq!(err, Error::InvalidString { field: "command_line" });
    }

    #[test]
    fn startup_info_hides_the_window_and_carries_desktop() {
        let config = LaunchConfig::new("cmd.exe").desktop("WinSta0\\Default").title("winspawn");
        let wide = WideConfig::new(&config).expect("wide");
        let startup = config.startup_info(&wide);

        assert_eq!(startup.flags, STARTF_USESHOWWINDOW);
        assert_eq!(startup.show_window, SW_HIDE);
        assert_eq!(startup.desktop.map(|d| d.len()), Some("WinSta0\\Default".len() + 1));
        assert_eq!(startup.title.and_then(|t| t.last().copied()), Some(0));
    }

    #[test]
    fn environment_block_is_sorted_and_double_terminated() {
        let block = EnvironmentBlock::from_vars([("path", "C:\\bin"), ("A", "1")]);
        let text = String::from_utf16_lossy(&utf16_le(&block));
        assert_eq!(text, "A=1\0path=C:\\bin\0\0");
    }

    #[test]
    fn empty_environment_block_is_two_nuls() {
        let block = EnvironmentBlock::from_vars(Vec::<(String, String)>::new());
        assert_eq!(block, vec![0, 0, 0, 0]);
    }

    #[test]
    fn environment_vars_sets_the_unicode_flag() {
        let config = LaunchConfig::new("cmd.exe").environment_vars([("K", "V")]);
        assert!(config.creation_flags.contains(CreationFlags::UnicodeEnvironment));
        assert!(config.environment.is_some());
    }
}

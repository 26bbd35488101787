use tracing::{debug, warn};

use crate::{
    attributes::AttributeList,
    config::{LaunchConfig, ToWide, WideConfig},
    error::Result,
    flags::{CreationFlags, LogonFlags},
    handle::BorrowedHandle,
    native::{Credentials, Native, ProcessInformation},
    process::LaunchedProcess,
    resources::ScopedResources,
    security::security_attributes,
};

/// Creates processes through one of the Windows creation entry points.
///
/// The launcher keeps no state between calls; each method takes a [`LaunchConfig`],
/// issues one native creation call (two for [`ProcessLauncher::create_as_user`] when
/// it falls back) and returns a [`LaunchedProcess`] owning the new handles.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher<N> {
    native: N,
}

#[cfg(windows)]
impl ProcessLauncher<crate::Win32> {
    /// A launcher that calls the Win32 API.
    pub fn new() -> Self {
        Self { native: crate::Win32 }
    }
}

impl<N: Native + Clone> ProcessLauncher<N> {
    /// A launcher driving an explicit backend.
    pub fn with_native(native: N) -> Self {
        Self { native }
    }

    /// The backend this launcher calls.
    pub fn native(&self) -> &N {
        &self.native
    }

    /// Creates a process with a primary `token` through `CreateProcessAsUserW`.
    ///
    /// `CreateProcessAsUserW` needs `SeAssignPrimaryTokenPrivilege`; when it fails the
    /// call is retried once through `CreateProcessWithTokenW`, which only needs
    /// `SeImpersonatePrivilege`. If both fail, the second error is returned.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let token = PrimaryToken::from_process(pid)?;
    /// let process = ProcessLauncher::new().create_as_user(token.borrow(), &config)?;
    /// ```
    pub fn create_as_user(
        &self,
        token: BorrowedHandle<'_>,
        config: &LaunchConfig<'_>,
    ) -> Result<LaunchedProcess<N>> {
        debug!(command_line = ?config.command_line, "creating process as user");
        let wide = WideConfig::new(config)?;
        let mut resources = ScopedResources::new();
        let process_attributes = security_attributes(
            config.process_security.as_ref(),
            config.inherit_process_handle,
            &mut resources,
        );
        let thread_attributes = security_attributes(
            config.thread_security.as_ref(),
            config.inherit_thread_handle,
            &mut resources,
        );
        let request = wide.request(
            config,
            process_attributes,
            thread_attributes,
            config.creation_flags,
            None,
        );

        let info = match self.native.create_process_as_user(token, &request) {
            Ok(info) => info,
            Err(err) => {
                warn!(
                    error = %err,
                    "CreateProcessAsUserW failed, retrying with CreateProcessWithTokenW"
                );
                self.native
                    .create_process_with_token(token, LogonFlags::None, &request)?
            }
        };

        Ok(self.wrap(info, config))
    }

    /// [`ProcessLauncher::create_as_user`] with a config built from the common fields.
    pub fn create_as_user_simple(
        &self,
        token: BorrowedHandle<'_>,
        application_name: Option<&str>,
        command_line: &str,
        flags: CreationFlags,
        desktop: Option<&str>,
    ) -> Result<LaunchedProcess<N>> {
        let config = simple_config(application_name, command_line, flags, desktop);
        self.create_as_user(token, &config)
    }

    /// Creates a process under the given credentials through `CreateProcessWithLogonW`.
    ///
    /// Security descriptors, handle inheritance and extended attributes in `config`
    /// are not supported by this entry point and are ignored.
    pub fn create_with_logon(
        &self,
        username: &str,
        domain: Option<&str>,
        password: &str,
        logon_flags: LogonFlags,
        config: &LaunchConfig<'_>,
    ) -> Result<LaunchedProcess<N>> {
        debug!(username, ?logon_flags, "creating process with logon");
        let wide = WideConfig::new(config)?;
        let username = username.to_wide("username")?;
        let domain = domain.map(|d| d.to_wide("domain")).transpose()?;
        let password = password.to_wide("password")?;
        let credentials = Credentials {
            username: &username,
            domain: domain.as_deref(),
            password: &password,
        };
        let request = wide.request(config, None, None, config.creation_flags, None);

        let info = self
            .native
            .create_process_with_logon(&credentials, logon_flags, &request)?;
        Ok(self.wrap(info, config))
    }

    /// [`ProcessLauncher::create_with_logon`] with a config built from the common fields.
    #[allow(clippy::too_many_arguments)]
    pub fn create_with_logon_simple(
        &self,
        username: &str,
        domain: Option<&str>,
        password: &str,
        logon_flags: LogonFlags,
        application_name: Option<&str>,
        command_line: &str,
        flags: CreationFlags,
        desktop: Option<&str>,
    ) -> Result<LaunchedProcess<N>> {
        let config = simple_config(application_name, command_line, flags, desktop);
        self.create_with_logon(username, domain, password, logon_flags, &config)
    }

    /// Creates a process through `CreateProcessW` with an extended startup info.
    ///
    /// The parent-process and mitigation-policy attributes of `config` go into the
    /// attribute list, and `ExtendedStartupInfoPresent` is always added to the flags.
    pub fn create(&self, config: &LaunchConfig<'_>) -> Result<LaunchedProcess<N>> {
        debug!(command_line = ?config.command_line, "creating process");
        let wide = WideConfig::new(config)?;
        let mut resources = ScopedResources::new();
        let process_attributes = security_attributes(
            config.process_security.as_ref(),
            config.inherit_process_handle,
            &mut resources,
        );
        let thread_attributes = security_attributes(
            config.thread_security.as_ref(),
            config.inherit_thread_handle,
            &mut resources,
        );
        let mut attribute_list = AttributeList::for_config(&self.native, config)?;
        let request = wide.request(
            config,
            process_attributes,
            thread_attributes,
            config.creation_flags | CreationFlags::ExtendedStartupInfoPresent,
            attribute_list.as_mut().map(|list| list.as_raw()),
        );

        let info = self.native.create_process(&request)?;
        Ok(self.wrap(info, config))
    }

    /// [`ProcessLauncher::create`] reporting `parent` as the new process's parent.
    pub fn create_with_parent(
        &self,
        parent: BorrowedHandle<'_>,
        application_name: Option<&str>,
        command_line: &str,
        flags: CreationFlags,
        desktop: Option<&str>,
    ) -> Result<LaunchedProcess<N>> {
        let config = simple_config(application_name, command_line, flags, desktop).parent(parent);
        self.create(&config)
    }

    fn wrap(&self, info: ProcessInformation, config: &LaunchConfig<'_>) -> LaunchedProcess<N> {
        debug!(pid = info.process_id, tid = info.thread_id, "process created");
        LaunchedProcess::from_information(self.native.clone(), info, config.terminate_on_dispose)
    }
}

fn simple_config<'a>(
    application_name: Option<&str>,
    command_line: &str,
    flags: CreationFlags,
    desktop: Option<&str>,
) -> LaunchConfig<'a> {
    LaunchConfig {
        application_name: application_name.map(str::to_owned),
        command_line: Some(command_line.to_owned()),
        creation_flags: flags,
        desktop: desktop.map(str::to_owned),
        ..Default::default()
    }
}

use core::{
    ffi::c_void,
    mem::{size_of, zeroed},
    ptr::{null, null_mut},
};

use windows_sys::Win32::{
    Foundation::{CloseHandle, GetLastError, FALSE, TRUE},
    Security::SECURITY_ATTRIBUTES,
    System::Threading::{
        CreateProcessAsUserW, CreateProcessW, CreateProcessWithLogonW, CreateProcessWithTokenW,
        DeleteProcThreadAttributeList, InitializeProcThreadAttributeList, TerminateProcess,
        UpdateProcThreadAttribute, PROCESS_INFORMATION, STARTUPINFOEXW, STARTUPINFOW,
    },
};

use crate::{
    error::{Error, Result},
    flags::{CreationFlags, LogonFlags},
    handle::{BorrowedHandle, HandleValue},
    native::{CreateRequest, Credentials, Native, ProcessInformation, StartupInfo},
    security::SecurityAttributes,
};

/// The [`Native`] backend that calls kernel32/advapi32 directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Win32;

/// Wraps the calling thread's last error for `function`.
fn last_error(function: &'static str) -> Error {
    Error::native(function, unsafe { GetLastError() })
}

fn startup_info(startup: &StartupInfo<'_>, cb: usize) -> STARTUPINFOW {
    // lpDesktop and lpTitle are declared mutable but never written by the OS.
    STARTUPINFOW {
        cb: cb as u32,
        lpDesktop: startup.desktop.map_or(null_mut(), |d| d.as_ptr() as *mut u16),
        lpTitle: startup.title.map_or(null_mut(), |t| t.as_ptr() as *mut u16),
        dwFlags: startup.flags,
        wShowWindow: startup.show_window,
        ..unsafe { zeroed() }
    }
}

fn security_attributes(attributes: Option<SecurityAttributes>) -> Option<SECURITY_ATTRIBUTES> {
    attributes.map(|sa| SECURITY_ATTRIBUTES {
        nLength: size_of::<SECURITY_ATTRIBUTES>() as u32,
        lpSecurityDescriptor: sa.descriptor.map_or(null_mut(), |p| p.as_ptr().cast()),
        bInheritHandle: if sa.inherit_handle { TRUE } else { FALSE },
    })
}

fn as_ptr<T>(value: &Option<T>) -> *const T {
    value.as_ref().map_or(null(), |v| v as *const T)
}

fn wide_ptr(value: Option<&[u16]>) -> *const u16 {
    value.map_or(null(), <[u16]>::as_ptr)
}

/// The fields every creation entry point shares, laid out as the API wants them.
struct Marshaled {
    command_line: Option<Vec<u16>>,
    environment: *const c_void,
}

impl Marshaled {
    fn new(request: &CreateRequest<'_>) -> Self {
        Self {
            // lpCommandLine may be modified in place by the OS, so it gets its own copy.
            command_line: request.command_line.map(<[u16]>::to_vec),
            environment: request.environment.map_or(null(), |e| e.as_ptr().cast()),
        }
    }

    fn command_line(&mut self) -> *mut u16 {
        self.command_line.as_mut().map_or(null_mut(), |c| c.as_mut_ptr())
    }
}

fn information(pi: &PROCESS_INFORMATION) -> ProcessInformation {
    ProcessInformation {
        process: HandleValue::from(pi.hProcess),
        thread: HandleValue::from(pi.hThread),
        process_id: pi.dwProcessId,
        thread_id: pi.dwThreadId,
    }
}

impl Native for Win32 {
    fn attribute_list_size(&self, count: u32) -> usize {
        let mut size = 0;

        // Expected to fail with ERROR_INSUFFICIENT_BUFFER; only the size is wanted.
        unsafe { InitializeProcThreadAttributeList(null_mut(), count, 0, &mut size) };
        size
    }

    unsafe fn initialize_attribute_list(
        &self,
        list: *mut c_void,
        count: u32,
        size: usize,
    ) -> Result<()> {
        let mut size = size;
        if InitializeProcThreadAttributeList(list, count, 0, &mut size) == FALSE {
            return Err(last_error("InitializeProcThreadAttributeList"));
        }
        Ok(())
    }

    unsafe fn update_attribute(
        &self,
        list: *mut c_void,
        attribute: usize,
        value: &[u8],
    ) -> Result<()> {
        if UpdateProcThreadAttribute(
            list,
            0,
            attribute,
            value.as_ptr().cast(),
            value.len(),
            null_mut(),
            null(),
        ) == FALSE
        {
            return Err(last_error("UpdateProcThreadAttribute"));
        }
        Ok(())
    }

    unsafe fn delete_attribute_list(&self, list: *mut c_void) -> Result<()> {
        DeleteProcThreadAttributeList(list);
        Ok(())
    }

    fn create_process_as_user(
        &self,
        token: BorrowedHandle<'_>,
        request: &CreateRequest<'_>,
    ) -> Result<ProcessInformation> {
        let mut marshaled = Marshaled::new(request);
        let process_attributes = security_attributes(request.process_attributes);
        let thread_attributes = security_attributes(request.thread_attributes);
        let si = startup_info(&request.startup, size_of::<STARTUPINFOW>());
        let mut pi = unsafe { zeroed::<PROCESS_INFORMATION>() };

        if unsafe {
            CreateProcessAsUserW(
                token.raw().as_ptr(),
                wide_ptr(request.application_name),
                marshaled.command_line(),
                as_ptr(&process_attributes),
                as_ptr(&thread_attributes),
                if request.inherit_handles { TRUE } else { FALSE },
                request.creation_flags.bits(),
                marshaled.environment,
                wide_ptr(request.current_directory),
                &si,
                &mut pi,
            )
        } == FALSE
        {
            return Err(last_error("CreateProcessAsUserW"));
        }

        Ok(information(&pi))
    }

    fn create_process_with_token(
        &self,
        token: BorrowedHandle<'_>,
        logon_flags: LogonFlags,
        request: &CreateRequest<'_>,
    ) -> Result<ProcessInformation> {
        let mut marshaled = Marshaled::new(request);
        let si = startup_info(&request.startup, size_of::<STARTUPINFOW>());
        let mut pi = unsafe { zeroed::<PROCESS_INFORMATION>() };

        if unsafe {
            CreateProcessWithTokenW(
                token.raw().as_ptr(),
                logon_flags.bits(),
                wide_ptr(request.application_name),
                marshaled.command_line(),
                request.creation_flags.bits(),
                marshaled.environment,
                wide_ptr(request.current_directory),
                &si,
                &mut pi,
            )
        } == FALSE
        {
            return Err(last_error("CreateProcessWithTokenW"));
        }

        Ok(information(&pi))
    }

    fn create_process_with_logon(
        &self,
        credentials: &Credentials<'_>,
        logon_flags: LogonFlags,
        request: &CreateRequest<'_>,
    ) -> Result<ProcessInformation> {
        let mut marshaled = Marshaled::new(request);
        let si = startup_info(&request.startup, size_of::<STARTUPINFOW>());
        let mut pi = unsafe { zeroed::<PROCESS_INFORMATION>() };

        if unsafe {
            CreateProcessWithLogonW(
                credentials.username.as_ptr(),
                wide_ptr(credentials.domain),
                credentials.password.as_ptr(),
                logon_flags.bits(),
                wide_ptr(request.application_name),
                marshaled.command_line(),
                request.creation_flags.bits(),
                marshaled.environment,
                wide_ptr(request.current_directory),
                &si,
                &mut pi,
            )
        } == FALSE
        {
            return Err(last_error("CreateProcessWithLogonW"));
        }

        Ok(information(&pi))
    }

    fn create_process(&self, request: &CreateRequest<'_>) -> Result<ProcessInformation> {
        let mut marshaled = Marshaled::new(request);
        let process_attributes = security_attributes(request.process_attributes);
        let thread_attributes = security_attributes(request.thread_attributes);
        let extended = request.attribute_list.is_some()
            || request.creation_flags.contains(CreationFlags::ExtendedStartupInfoPresent);
        let si = STARTUPINFOEXW {
            StartupInfo: startup_info(
                &request.startup,
                if extended { size_of::<STARTUPINFOEXW>() } else { size_of::<STARTUPINFOW>() },
            ),
            lpAttributeList: request.attribute_list.map_or(null_mut(), |list| list.ptr),
        };
        let mut pi = unsafe { zeroed::<PROCESS_INFORMATION>() };

        if unsafe {
            CreateProcessW(
                wide_ptr(request.application_name),
                marshaled.command_line(),
                as_ptr(&process_attributes),
                as_ptr(&thread_attributes),
                if request.inherit_handles { TRUE } else { FALSE },
                request.creation_flags.bits(),
                marshaled.environment,
                wide_ptr(request.current_directory),
                (&si as *const STARTUPINFOEXW).cast(),
                &mut pi,
            )
        } == FALSE
        {
            return Err(last_error("CreateProcessW"));
        }

        Ok(information(&pi))
    }

    fn terminate_process(&self, process: HandleValue, exit_code: u32) -> Result<()> {
        if unsafe { TerminateProcess(process.as_ptr(), exit_code) } == FALSE {
            return Err(last_error("TerminateProcess"));
        }
        Ok(())
    }

    fn close_handle(&self, handle: HandleValue) -> Result<()> {
        if unsafe { CloseHandle(handle.as_ptr()) } == FALSE {
            return Err(last_error("CloseHandle"));
        }
        Ok(())
    }
}

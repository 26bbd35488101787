use core::ffi::c_void;

use crate::{
    error::Result,
    flags::{CreationFlags, LogonFlags},
    handle::{BorrowedHandle, HandleValue},
    security::SecurityAttributes,
};

/// `STARTF_USESHOWWINDOW`.
pub const STARTF_USESHOWWINDOW: u32 = 0x0000_0001;

/// `SW_HIDE`.
pub const SW_HIDE: u16 = 0;

/// The fields of `STARTUPINFOW` the launcher fills in. Strings are NUL-terminated UTF-16.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupInfo<'a> {
    /// `lpDesktop`.
    pub desktop: Option<&'a [u16]>,
    /// `lpTitle`.
    pub title: Option<&'a [u16]>,
    /// `dwFlags`.
    pub flags: u32,
    /// `wShowWindow`, read when `flags` has [`STARTF_USESHOWWINDOW`].
    pub show_window: u16,
}

/// An initialized `PROC_THREAD_ATTRIBUTE_LIST` handed to [`Native::create_process`].
///
/// Only the raw address is carried; the owning [`crate::AttributeList`] keeps the
/// buffer and every value it references alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeListRef {
    /// Address of the initialized list.
    pub ptr: *mut c_void,
    /// Number of attributes the list was sized for.
    pub count: u32,
}

/// Everything a creation entry point needs beyond its strategy-specific arguments.
///
/// Entry points that have no use for a field (`CreateProcessWithLogonW` has no
/// security attributes, only `CreateProcessW` takes an attribute list) ignore it.
#[derive(Debug, Clone, Copy)]
pub struct CreateRequest<'a> {
    /// `lpApplicationName`.
    pub application_name: Option<&'a [u16]>,
    /// `lpCommandLine`; backends copy it, since the OS may write to it.
    pub command_line: Option<&'a [u16]>,
    /// `lpProcessAttributes`.
    pub process_attributes: Option<SecurityAttributes>,
    /// `lpThreadAttributes`.
    pub thread_attributes: Option<SecurityAttributes>,
    /// `bInheritHandles`.
    pub inherit_handles: bool,
    /// `dwCreationFlags`.
    pub creation_flags: CreationFlags,
    /// `lpEnvironment`.
    pub environment: Option<&'a [u8]>,
    /// `lpCurrentDirectory`.
    pub current_directory: Option<&'a [u16]>,
    /// The startup info fields.
    pub startup: StartupInfo<'a>,
    /// `lpAttributeList` of the extended startup info.
    pub attribute_list: Option<AttributeListRef>,
}

/// Credentials for `CreateProcessWithLogonW`, NUL-terminated UTF-16.
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    /// `lpUsername`.
    pub username: &'a [u16],
    /// `lpDomain`; `None` for UPN user names.
    pub domain: Option<&'a [u16]>,
    /// `lpPassword`.
    pub password: &'a [u16],
}

/// The `PROCESS_INFORMATION` returned by a successful creation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessInformation {
    /// Handle to the new process.
    pub process: HandleValue,
    /// Handle to its initial thread.
    pub thread: HandleValue,
    /// The process ID.
    pub process_id: u32,
    /// The initial thread ID.
    pub thread_id: u32,
}

/// The OS surface the launcher drives.
///
/// Every fallible method returns [`crate::Error::Native`] carrying the last-error code
/// of the failing call.
pub trait Native {
    /// Returns the buffer size `InitializeProcThreadAttributeList` needs for `count` attributes.
    fn attribute_list_size(&self, count: u32) -> usize;

    /// Initializes an attribute list in place.
    ///
    /// # Safety
    ///
    /// `list` must point to `size` writable, pointer-aligned bytes.
    unsafe fn initialize_attribute_list(
        &self,
        list: *mut c_void,
        count: u32,
        size: usize,
    ) -> Result<()>;

    /// Records `value` under `attribute` in an initialized list.
    ///
    /// # Safety
    ///
    /// `list` must be initialized, and `value` must stay at the same address until
    /// the list is deleted; the OS stores the pointer, not a copy.
    unsafe fn update_attribute(
        &self,
        list: *mut c_void,
        attribute: usize,
        value: &[u8],
    ) -> Result<()>;

    /// Deletes an initialized attribute list.
    ///
    /// # Safety
    ///
    /// `list` must be initialized and not already deleted.
    unsafe fn delete_attribute_list(&self, list: *mut c_void) -> Result<()>;

    /// `CreateProcessAsUserW`.
    fn create_process_as_user(
        &self,
        token: BorrowedHandle<'_>,
        request: &CreateRequest<'_>,
    ) -> Result<ProcessInformation>;

    /// `CreateProcessWithTokenW`.
    fn create_process_with_token(
        &self,
        token: BorrowedHandle<'_>,
        logon_flags: LogonFlags,
        request: &CreateRequest<'_>,
    ) -> Result<ProcessInformation>;

    /// `CreateProcessWithLogonW`.
    fn create_process_with_logon(
        &self,
        credentials: &Credentials<'_>,
        logon_flags: LogonFlags,
        request: &CreateRequest<'_>,
    ) -> Result<ProcessInformation>;

    /// `CreateProcessW`, passing `STARTUPINFOEXW` when `request.attribute_list` is set
    /// or the creation flags ask for it.
    fn create_process(&self, request: &CreateRequest<'_>) -> Result<ProcessInformation>;

    /// `TerminateProcess`.
    fn terminate_process(&self, process: HandleValue, exit_code: u32) -> Result<()>;

    /// `CloseHandle`.
    fn close_handle(&self, handle: HandleValue) -> Result<()>;
}

use core::marker::PhantomData;

/// A raw kernel handle value as it crosses the native boundary.
///
/// `HandleValue` carries no ownership. Owning wrappers ([`crate::LaunchedProcess`],
/// `OwnedProcess`, `PrimaryToken`) decide when the handle is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct HandleValue(pub isize);

impl HandleValue {
    /// The null handle.
    pub const NULL: HandleValue = HandleValue(0);

    /// `INVALID_HANDLE_VALUE`.
    pub const INVALID: HandleValue = HandleValue(-1);

    /// Checks if the value may refer to an open handle.
    ///
    /// `-1` is also the current-process pseudo handle; it is treated as invalid here
    /// because no owning wrapper ever stores it.
    pub fn is_valid(self) -> bool {
        self != Self::NULL && self != Self::INVALID
    }

    /// Returns the raw value as the native pointer type.
    pub fn as_ptr(self) -> *mut core::ffi::c_void {
        self.0 as *mut core::ffi::c_void
    }
}

impl<T> From<*mut T> for HandleValue {
    fn from(ptr: *mut T) -> Self {
        HandleValue(ptr as isize)
    }
}

/// A handle borrowed for `'a`, used where the OS only records the value for the
/// duration of a call (the parent-process attribute, a token passed to a creation call).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorrowedHandle<'a> {
    raw: HandleValue,
    _scope: PhantomData<&'a ()>,
}

impl<'a> BorrowedHandle<'a> {
    /// Borrows a raw handle value.
    ///
    /// # Safety
    ///
    /// `raw` must stay open for the whole of `'a`.
    pub unsafe fn borrow_raw(raw: HandleValue) -> Self {
        Self {
            raw,
            _scope: PhantomData,
        }
    }

    /// Gets the raw handle value.
    pub fn raw(&self) -> HandleValue {
        self.raw
    }
}

#[cfg(windows)]
impl<'a> From<std::os::windows::io::BorrowedHandle<'a>> for BorrowedHandle<'a> {
    fn from(handle: std::os::windows::io::BorrowedHandle<'a>) -> Self {
        use std::os::windows::io::AsRawHandle;

        // The std borrow already guarantees the handle is open for 'a.
        unsafe { BorrowedHandle::borrow_raw(HandleValue::from(handle.as_raw_handle())) }
    }
}

/// An owned handle to an existing process, opened by id.
///
/// Used to pick a parent for [`crate::LaunchConfig::parent`]: open the process with
/// [`OwnedProcess::CREATE_PROCESS`] and borrow it into the config.
#[cfg(windows)]
#[derive(Debug)]
pub struct OwnedProcess {
    handle: HandleValue,
    process_id: u32,
}

#[cfg(windows)]
impl OwnedProcess {
    /// `PROCESS_CREATE_PROCESS`, required to use the process as a parent.
    pub const CREATE_PROCESS: u32 = windows_sys::Win32::System::Threading::PROCESS_CREATE_PROCESS;

    /// `PROCESS_QUERY_LIMITED_INFORMATION`.
    pub const QUERY_LIMITED_INFORMATION: u32 =
        windows_sys::Win32::System::Threading::PROCESS_QUERY_LIMITED_INFORMATION;

    /// Opens process `process_id` with `access` rights.
    pub fn open(process_id: u32, access: u32) -> crate::Result<Self> {
        use windows_sys::Win32::{Foundation::{GetLastError, FALSE}, System::Threading::OpenProcess};

        let handle = HandleValue::from(unsafe { OpenProcess(access, FALSE, process_id) });
        if !handle.is_valid() {
            return Err(crate::Error::native("OpenProcess", unsafe { GetLastError() }));
        }

        Ok(Self { handle, process_id })
    }

    /// Gets the process ID.
    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    /// Borrows the handle, for instance as a parent-process override.
    pub fn borrow(&self) -> BorrowedHandle<'_> {
        unsafe { BorrowedHandle::borrow_raw(self.handle) }
    }
}

#[cfg(windows)]
impl Drop for OwnedProcess {
    fn drop(&mut self) {
        unsafe { windows_sys::Win32::Foundation::CloseHandle(self.handle.as_ptr()) };
    }
}

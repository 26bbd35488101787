use core::{
    mem::zeroed,
    ptr::{null, null_mut},
};

use tracing::debug;
use windows_sys::Win32::{
    Foundation::{CloseHandle, GetLastError, ERROR_NOT_ALL_ASSIGNED, FALSE, HANDLE, LUID},
    Security::{
        AdjustTokenPrivileges, DuplicateTokenEx, LookupPrivilegeValueW, SecurityImpersonation,
        TokenPrimary, LUID_AND_ATTRIBUTES, SE_PRIVILEGE_ENABLED, TOKEN_ADJUST_PRIVILEGES,
        TOKEN_ALL_ACCESS, TOKEN_DUPLICATE, TOKEN_PRIVILEGES, TOKEN_QUERY,
    },
    System::Threading::{GetCurrentProcess, OpenProcessToken},
};

use crate::{
    config::ToWide,
    error::{Error, Result},
    handle::{BorrowedHandle, HandleValue, OwnedProcess},
};

/// An owned primary token, as required by `CreateProcessAsUserW` and `CreateProcessWithTokenW`.
#[derive(Debug)]
pub struct PrimaryToken {
    handle: HandleValue,
}

impl PrimaryToken {
    /// Duplicates the current process token into a primary token.
    pub fn current() -> Result<Self> {
        Self::duplicate_from(unsafe { GetCurrentProcess() })
    }

    /// Duplicates the token of process `pid` into a primary token.
    ///
    /// Opening another user's process usually needs `SeDebugPrivilege`
    /// (see [`enable_privilege`]).
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// enable_privilege("SeDebugPrivilege")?;
    /// let token = PrimaryToken::from_process(winlogon_pid)?;
    /// ```
    pub fn from_process(pid: u32) -> Result<Self> {
        let process = OwnedProcess::open(pid, OwnedProcess::QUERY_LIMITED_INFORMATION)?;
        Self::duplicate_from(process.borrow().raw().as_ptr())
    }

    fn duplicate_from(process: HANDLE) -> Result<Self> {
        unsafe {
            let mut h_token = null_mut();
            if OpenProcessToken(process, TOKEN_DUPLICATE | TOKEN_QUERY, &mut h_token) == FALSE {
                return Err(Error::native("OpenProcessToken", GetLastError()));
            }

            // Duplicate the token to ensure it's a primary token
            let mut h_duptoken = null_mut();
            let duplicated = DuplicateTokenEx(
                h_token,
                TOKEN_ALL_ACCESS,
                null(),
                SecurityImpersonation,
                TokenPrimary,
                &mut h_duptoken,
            );
            let code = GetLastError();
            CloseHandle(h_token);
            if duplicated == FALSE {
                return Err(Error::native("DuplicateTokenEx", code));
            }

            Ok(Self {
                handle: HandleValue::from(h_duptoken),
            })
        }
    }

    /// Borrows the token for a launch call.
    pub fn borrow(&self) -> BorrowedHandle<'_> {
        unsafe { BorrowedHandle::borrow_raw(self.handle) }
    }
}

impl Drop for PrimaryToken {
    fn drop(&mut self) {
        unsafe { CloseHandle(self.handle.as_ptr()) };
    }
}

/// Enables a privilege on the current process token.
///
/// Returns `Ok(false)` when the token does not hold the privilege at all.
///
/// # Example
///
/// ```rust,ignore
/// if !enable_privilege("SeAssignPrimaryTokenPrivilege")? {
///     // CreateProcessAsUserW will fail and the launcher will fall back.
/// }
/// ```
pub fn enable_privilege(name: &str) -> Result<bool> {
    let name = name.to_wide("privilege")?;
    unsafe {
        let mut h_token = null_mut();
        let access = TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY;
        if OpenProcessToken(GetCurrentProcess(), access, &mut h_token) == FALSE {
            return Err(Error::native("OpenProcessToken", GetLastError()));
        }

        let mut token_priv = TOKEN_PRIVILEGES {
            PrivilegeCount: 1,
            Privileges: [LUID_AND_ATTRIBUTES {
                Luid: zeroed(),
                Attributes: SE_PRIVILEGE_ENABLED,
            }; 1],
        };
        let luid = &mut token_priv.Privileges[0].Luid as *mut LUID;
        if LookupPrivilegeValueW(null(), name.as_ptr(), luid) == FALSE {
            let code = GetLastError();
            CloseHandle(h_token);
            return Err(Error::native("LookupPrivilegeValueW", code));
        }

        // AdjustTokenPrivileges succeeds even when nothing was assigned; the last error tells.
        let adjusted =
            AdjustTokenPrivileges(h_token, FALSE, &token_priv, 0, null_mut(), null_mut());
        let code = GetLastError();
        CloseHandle(h_token);
        if adjusted == FALSE {
            return Err(Error::native("AdjustTokenPrivileges", code));
        }

        let enabled = code != ERROR_NOT_ALL_ASSIGNED;
        debug!(enabled, "privilege adjustment finished");
        Ok(enabled)
    }
}

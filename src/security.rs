use core::ptr::NonNull;

use crate::{
    error::{Error, Result},
    resources::ScopedResources,
};

/// Size of the self-relative `SECURITY_DESCRIPTOR_RELATIVE` header.
const HEADER_LEN: usize = 20;
const SECURITY_DESCRIPTOR_REVISION: u8 = 1;
const SE_SELF_RELATIVE: u16 = 0x8000;

/// A self-relative security descriptor in its binary form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityDescriptor {
    bytes: Vec<u8>,
}

impl SecurityDescriptor {
    /// Wraps an already serialized self-relative descriptor.
    ///
    /// Only the header is checked: at least 20 bytes, revision 1 and
    /// `SE_SELF_RELATIVE` set in the control word.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() < HEADER_LEN {
            return Err(Error::InvalidDescriptor {
                reason: "shorter than the self-relative header",
            });
        }
        if bytes[0] != SECURITY_DESCRIPTOR_REVISION {
            return Err(Error::InvalidDescriptor {
                reason: "unsupported revision",
            });
        }
        let control = u16::from_le_bytes([bytes[2], bytes[3]]);
        if control & SE_SELF_RELATIVE == 0 {
            return Err(Error::InvalidDescriptor {
                reason: "not self-relative",
            });
        }

        Ok(Self { bytes })
    }

    /// The binary form handed to the OS.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copies the binary form into a fresh buffer owned by the caller.
    pub fn to_buffer(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

#[cfg(windows)]
impl SecurityDescriptor {
    /// Parses an SDDL string (for example `D:(A;;GA;;;SY)`) into a descriptor.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let sd = SecurityDescriptor::from_sddl("D:(A;;GA;;;BA)(A;;GA;;;SY)")?;
    /// ```
    pub fn from_sddl(sddl: &str) -> Result<Self> {
        use crate::config::ToWide;
        use windows_sys::Win32::{
            Foundation::{GetLastError, LocalFree, FALSE},
            Security::Authorization::{
                ConvertStringSecurityDescriptorToSecurityDescriptorW, SDDL_REVISION_1,
            },
        };

        let sddl = sddl.to_wide("sddl")?;
        let mut descriptor = core::ptr::null_mut();
        let mut len = 0u32;
        unsafe {
            if ConvertStringSecurityDescriptorToSecurityDescriptorW(
                sddl.as_ptr(),
                SDDL_REVISION_1,
                &mut descriptor,
                &mut len,
            ) == FALSE
            {
                return Err(Error::native(
                    "ConvertStringSecurityDescriptorToSecurityDescriptorW",
                    GetLastError(),
                ));
            }

            // The OS allocates the descriptor with LocalAlloc; copy it out and free it.
            let bytes = core::slice::from_raw_parts(descriptor as *const u8, len as usize).to_vec();
            LocalFree(descriptor);
            Self::from_bytes(bytes)
        }
    }
}

/// The portable form of `SECURITY_ATTRIBUTES` for one handle of a creation call.
///
/// `descriptor` points into a buffer owned by the [`ScopedResources`] the value was
/// derived with; it is only valid while that list is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityAttributes {
    /// `bInheritHandle`.
    pub inherit_handle: bool,
    /// `lpSecurityDescriptor`; `None` means the default descriptor.
    pub descriptor: Option<NonNull<u8>>,
}

/// Builds the security attributes for one handle.
///
/// Returns `None` when there is no descriptor and no inheritance, which the OS reads
/// as "default descriptor, not inheritable". Otherwise the descriptor (if any) is
/// copied into `resources` so that it outlives the creation call.
pub fn security_attributes<'a>(
    descriptor: Option<&SecurityDescriptor>,
    inherit: bool,
    resources: &mut ScopedResources<'a>,
) -> Option<SecurityAttributes> {
    if descriptor.is_none() && !inherit {
        return None;
    }

    // `from_bytes` guarantees a non-empty buffer, so the pointer is a real allocation.
    let descriptor = descriptor.map(|sd| {
        let buffer = resources.add(sd.to_buffer());
        NonNull::from(buffer.as_mut_slice()).cast::<u8>()
    });

    Some(SecurityAttributes {
        inherit_handle: inherit,
        descriptor,
    })
}

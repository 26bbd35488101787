use thiserror::Error;

/// Errors returned by the launcher and its native backends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A native call returned failure; `code` is the thread's last-error value.
    #[error("{function} Failed With Error {code}: {}", describe(.code))]
    Native {
        function: &'static str,
        code: u32,
    },

    /// A string argument cannot be passed to Windows because it contains a NUL.
    #[error("`{field}` contains an interior NUL character")]
    InvalidString { field: &'static str },

    /// Bytes passed as a security descriptor are not a self-relative descriptor.
    #[error("invalid security descriptor: {reason}")]
    InvalidDescriptor { reason: &'static str },
}

impl Error {
    /// Builds an [`Error::Native`] for `function` from an explicit last-error code.
    pub fn native(function: &'static str, code: u32) -> Self {
        Error::Native { function, code }
    }

    /// Returns the last-error code carried by a native failure.
    pub fn code(&self) -> Option<u32> {
        match self {
            Error::Native { code, .. } => Some(*code),
            Error::InvalidString { .. } | Error::InvalidDescriptor { .. } => None,
        }
    }
}

/// Formats a last-error code into the system's message text.
fn describe(code: &u32) -> String {
    std::io::Error::from_raw_os_error(*code as i32).to_string()
}

/// Result alias used across the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_error_names_the_function_and_code() {
        let err = Error::native("CreateProcessW", 5);
        let message = err.to_string();
        assert!(message.starts_with("CreateProcessW Failed With Error 5: "));
        assert_eq!(err.code(), Some(5));
    }

    #[test]
    fn invalid_string_has_no_code() {
        let err = Error::InvalidString { field: "command_line" };
        assert_eq!(err.code(), None);
        assert!(err.to_string().contains("command_line"));
    }
}

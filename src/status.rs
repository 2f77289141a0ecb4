//! Integer status codes
//!
//! A `Status` is a compact code that can cross an FFI or logging boundary:
//!
//! ```text
//!   code == 0              ok
//!   -1000 < code < 0       OS errno (negated)
//!   code <= -1000          local code, described by LOCAL_DESCRIPTIONS
//! ```
//!
//! Rich errors inside the crate are `CinderError`; convert with
//! `Status::from(&err)` when a plain code is needed.

use std::borrow::Cow;
use std::io;

use crate::error::{CinderError, ErrorKind};

/// First code reserved for local (non-OS) errors
const LOCAL_BASE: i32 = 1000;

/// Local error descriptions, sorted by code
const LOCAL_DESCRIPTIONS: &[(i32, &str)] = &[
    (1000, "local error"),
    (1001, "not found"),
    (1002, "corruption"),
    (1003, "not supported"),
    (1004, "invalid argument"),
    (1005, "io error"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Status {
    code: i32,
}

impl Status {
    pub const OK: Status = Status { code: 0 };
    pub const LOCAL_ERROR: Status = Status { code: -LOCAL_BASE };
    pub const NOT_FOUND: Status = Status { code: -1001 };
    pub const CORRUPTION: Status = Status { code: -1002 };
    pub const NOT_SUPPORTED: Status = Status { code: -1003 };
    pub const INVALID_ARGUMENT: Status = Status { code: -1004 };
    pub const IO_ERROR: Status = Status { code: -1005 };

    /// Wrap a raw code
    pub const fn from_code(code: i32) -> Self {
        Status { code }
    }

    /// Status for an OS errno (positive, as reported by the OS)
    pub const fn from_errno(errno: i32) -> Self {
        Status { code: -errno }
    }

    pub const fn code(&self) -> i32 {
        self.code
    }

    pub const fn is_ok(&self) -> bool {
        self.code == 0
    }

    pub const fn is_error(&self) -> bool {
        self.code < 0
    }

    pub const fn is_system_error(&self) -> bool {
        self.code < 0 && self.code > -LOCAL_BASE
    }

    pub const fn is_local_error(&self) -> bool {
        self.code <= -LOCAL_BASE
    }

    /// Human-readable description, `None` for non-error codes
    pub fn describe(&self) -> Option<Cow<'static, str>> {
        if self.is_system_error() {
            Some(Cow::Owned(os_description(-self.code)))
        } else if self.is_local_error() {
            Some(Cow::Borrowed(local_description(-self.code)))
        } else {
            None
        }
    }
}

/// Look up a local code, falling back to the generic entry
fn local_description(code: i32) -> &'static str {
    match LOCAL_DESCRIPTIONS.binary_search_by_key(&code, |&(num, _)| num) {
        Ok(idx) => LOCAL_DESCRIPTIONS[idx].1,
        Err(_) => LOCAL_DESCRIPTIONS[0].1,
    }
}

fn os_description(errno: i32) -> String {
    let message = io::Error::from_raw_os_error(errno).to_string();
    // std appends " (os error N)" to the strerror text
    match message.rfind(" (os error") {
        Some(pos) => message[..pos].to_string(),
        None => message,
    }
}

impl From<&CinderError> for Status {
    fn from(err: &CinderError) -> Self {
        if let CinderError::Io(io_err) = err {
            if let Some(errno) = io_err.raw_os_error() {
                if errno > 0 && errno < LOCAL_BASE {
                    return Status::from_errno(errno);
                }
            }
        }
        match err.kind() {
            ErrorKind::NotFound => Status::NOT_FOUND,
            ErrorKind::Corruption => Status::CORRUPTION,
            ErrorKind::NotSupported => Status::NOT_SUPPORTED,
            ErrorKind::InvalidArgument => Status::INVALID_ARGUMENT,
            ErrorKind::Io => Status::IO_ERROR,
        }
    }
}

impl<T> From<&crate::Result<T>> for Status {
    fn from(result: &crate::Result<T>) -> Self {
        match result {
            Ok(_) => Status::OK,
            Err(err) => Status::from(err),
        }
    }
}

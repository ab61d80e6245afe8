//! NUL-terminated UTF-16 buffers for `LPCWSTR` parameters.

use std::fmt;
use std::path::Path;

use crate::errors::AutoItError;

/// An owned, NUL-terminated UTF-16 string.
///
/// The terminator is always present, so [`WideString::as_ptr`] can be
/// handed to any `LPCWSTR` parameter for as long as the value lives.
#[derive(Clone, PartialEq, Eq)]
pub struct WideString {
    buf: Vec<u16>,
}

impl WideString {
    /// Encode `text` as UTF-16, rejecting interior NULs (the native side
    /// would silently truncate at them).
    pub fn new(text: &str) -> Result<Self, AutoItError> {
        Self::from_units(text.encode_utf16(), text)
    }

    /// The empty string, used for omitted optional text parameters.
    pub fn empty() -> Self {
        Self { buf: vec![0] }
    }

    /// Encode a filesystem path without a lossy UTF-8 round trip on Windows.
    pub fn from_path(path: &Path) -> Result<Self, AutoItError> {
        #[cfg(windows)]
        {
            use std::os::windows::ffi::OsStrExt;
            Self::from_units(path.as_os_str().encode_wide(), &path.to_string_lossy())
        }
        #[cfg(not(windows))]
        {
            let text = path.to_str().ok_or_else(|| {
                AutoItError::InvalidArgument(format!("path is not valid UTF-8: {}", path.display()))
            })?;
            Self::new(text)
        }
    }

    fn from_units(units: impl Iterator<Item = u16>, shown: &str) -> Result<Self, AutoItError> {
        let mut buf: Vec<u16> = units.collect();
        if buf.contains(&0) {
            return Err(AutoItError::InvalidArgument(format!(
                "string contains an interior NUL: {shown:?}"
            )));
        }
        buf.push(0);
        Ok(Self { buf })
    }

    /// Pointer to the first code unit; valid while `self` is alive.
    pub fn as_ptr(&self) -> *const u16 {
        self.buf.as_ptr()
    }

    /// Code units without the terminator.
    pub fn as_units(&self) -> &[u16] {
        &self.buf[..self.buf.len() - 1]
    }

    pub fn is_empty(&self) -> bool {
        self.buf.len() == 1
    }

    /// Decode back to UTF-8 (lossy), mainly for logging and tests.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(self.as_units())
    }
}

impl fmt::Debug for WideString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

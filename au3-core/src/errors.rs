//! Error types for `au3_core`.
//!
//! All failures are funnelled through [`AutoItError`], which uses
//! `thiserror` for `Display` and `Error` derives.  PyO3 conversion is
//! handled in the `au3-pyo3` crate, keeping this crate PyO3-free.

use thiserror::Error;

use crate::types::ShutdownFlags;

/// Why `AU3_ProcessSetPriority` reported failure, decoded from `AU3_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PriorityFailure {
    /// `AU3_error() == 1`: the priority could not be applied.
    #[error("set priority failed")]
    SetFailed,

    /// `AU3_error() == 2`: the priority class is not supported by the OS.
    #[error("unsupported priority class")]
    UnsupportedClass,
}

/// Top-level error type for the `au3_core` library.
///
/// The first four variants are the typed failures of the process facade;
/// the rest cover loading and argument marshaling.
#[derive(Debug, Error)]
pub enum AutoItError {
    /// `Run` / `RunAs` family reported `AU3_error() == 1`.
    #[error("ProcessLaunchError: {0}")]
    ProcessLaunchError(String),

    /// `ProcessSetPriority` failed with a recognised error code.
    #[error("ProcessControlError: {0}")]
    ProcessControlError(PriorityFailure),

    /// `ProcessWait` / `ProcessWaitClose` returned 0.
    #[error("TimeoutError: {0}")]
    TimeoutError(String),

    /// `Shutdown` returned 0.
    #[error("ShutdownError: shutdown with flags {0} failed")]
    ShutdownError(ShutdownFlags),

    /// The AutoItX DLL could not be loaded.
    #[error("LibraryLoadError: {0}")]
    LibraryLoadError(String),

    /// The loaded DLL does not export a required `AU3_*` symbol.
    #[error("MissingEntryPoint: {0} not exported by the AutoItX library")]
    MissingEntryPoint(&'static str),

    /// An argument cannot be marshaled to its native representation.
    #[error("InvalidArgument: {0}")]
    InvalidArgument(String),

    /// AutoItX only exists on Windows.
    #[error("UnsupportedPlatform: AutoItX is only available on Windows")]
    UnsupportedPlatform,

    /// [`crate::init`] was called after the shared library was set up.
    #[error("AlreadyInitialized: the AutoItX library is already loaded")]
    AlreadyInitialized,
}

/// Convert a `windows::core::Error` (Win32 loader failure) into a
/// `AutoItError::LibraryLoadError`.
#[cfg(windows)]
impl From<windows::core::Error> for AutoItError {
    fn from(err: windows::core::Error) -> Self {
        AutoItError::LibraryLoadError(format!("Windows error: {err}"))
    }
}

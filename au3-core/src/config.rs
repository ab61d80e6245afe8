//! Where to find the AutoItX DLL.
//!
//! The default name follows the AutoItX distribution (`AutoItX3_x64.dll`
//! for 64-bit hosts, `AutoItX3.dll` otherwise) and is resolved through the
//! normal DLL search order.  `AUTOITX_DLL` overrides it with a name or an
//! absolute path.

use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable that overrides [`LibraryConfig::dll_path`].
pub const DLL_ENV_VAR: &str = "AUTOITX_DLL";

#[cfg(target_pointer_width = "64")]
pub const DEFAULT_DLL_NAME: &str = "AutoItX3_x64.dll";
#[cfg(not(target_pointer_width = "64"))]
pub const DEFAULT_DLL_NAME: &str = "AutoItX3.dll";

/// Loader configuration for [`crate::library::AutoItLibrary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    pub dll_path: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            dll_path: PathBuf::from(DEFAULT_DLL_NAME),
        }
    }
}

impl LibraryConfig {
    pub fn new(dll_path: impl Into<PathBuf>) -> Self {
        Self {
            dll_path: dll_path.into(),
        }
    }

    /// Default configuration with `AUTOITX_DLL` applied when set and non-empty.
    pub fn from_env() -> Self {
        Self::from_override(std::env::var_os(DLL_ENV_VAR))
    }

    fn from_override(value: Option<OsString>) -> Self {
        match value {
            Some(path) if !path.is_empty() => Self::new(path),
            _ => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dll_name() {
        let config = LibraryConfig::default();
        assert_eq!(config.dll_path, PathBuf::from(DEFAULT_DLL_NAME));
        assert!(DEFAULT_DLL_NAME.starts_with("AutoItX3"));
    }

    #[test]
    fn test_override_applies() {
        let config = LibraryConfig::from_override(Some(OsString::from("C:\\tools\\AutoItX3.dll")));
        assert_eq!(config.dll_path, PathBuf::from("C:\\tools\\AutoItX3.dll"));
    }

    #[test]
    fn test_empty_override_ignored() {
        assert_eq!(LibraryConfig::from_override(Some(OsString::new())), LibraryConfig::default());
        assert_eq!(LibraryConfig::from_override(None), LibraryConfig::default());
    }
}

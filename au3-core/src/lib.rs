//! `au3_core` -- Pure Rust process-control facade over the AutoItX DLL.
//!
//! This crate contains all marshaling and error interpretation with **no
//! PyO3 dependency**.  It can be consumed by:
//! - `au3-pyo3` (PyO3 Python extension)
//! - `au3-cli` (standalone `au3-process` tool)
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`errors`] | `AutoItError` enum via `thiserror` |
//! | [`types`] | Process ids, show/logon/priority enums, shutdown bits, option structs |
//! | [`wide`] | NUL-terminated UTF-16 argument buffers |
//! | [`native`] | `Au3Api` trait -- one method per `AU3_*` entry point |
//! | [`library`] | `AutoItLibrary` -- `LoadLibraryW` / `GetProcAddress` loader |
//! | [`config`] | `LibraryConfig` -- DLL location, `AUTOITX_DLL` override |
//! | [`process`] | `ProcessControl` facade plus process-wide free functions |
//!
//! # Usage
//!
//! ```no_run
//! use au3_core::{process, RunOptions, ShowState};
//!
//! let pid = process::run("notepad.exe", &RunOptions::with_show(ShowState::Maximized))?;
//! process::process_wait_close(pid, None)?;
//! # Ok::<(), au3_core::AutoItError>(())
//! ```

pub mod config;
pub mod errors;
pub mod library;
pub mod native;
pub mod process;
pub mod types;
pub mod wide;

pub use config::LibraryConfig;
pub use errors::{AutoItError, PriorityFailure};
pub use process::{init, ProcessControl};
pub use types::{
    Credentials, LogonMode, Pid, Priority, ProcessId, RunAsOptions, RunOptions, ShowState,
    ShutdownFlags,
};

//! The native AutoItX entry-point surface.
//!
//! [`Au3Api`] has one method per `AU3_*` export used by the facade, with
//! arguments already marshaled to their native shape (`LPCWSTR` as
//! [`WideString`], `int` as `i32`).  [`crate::library::AutoItLibrary`] is
//! the real implementation; tests plug in a scripted one.
//!
//! # Last-error register
//!
//! `AU3_error` returns state left behind by the previous call on *any*
//! thread.  Implementations are driven through `&mut self` and the facade
//! keeps them behind a mutex, reading [`Au3Api::error`] under the same
//! lock as the call it describes (see [`NativeOutcome`]).

use crate::errors::AutoItError;
use crate::types::Credentials;
use crate::wide::WideString;

/// `RunAs` credentials marshaled to wide strings.
#[derive(Clone)]
pub struct NativeAccount {
    pub user: WideString,
    pub domain: WideString,
    pub password: WideString,
}

impl NativeAccount {
    pub fn new(credentials: &Credentials) -> Result<Self, AutoItError> {
        Ok(Self {
            user: WideString::new(&credentials.user)?,
            domain: WideString::new(&credentials.domain)?,
            password: WideString::new(&credentials.password)?,
        })
    }
}

/// Raw return value of a native call paired with the `AU3_error` value
/// read immediately after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeOutcome {
    pub ret: i32,
    pub error: i32,
}

/// One method per AutoItX process-management export.
pub trait Au3Api: Send {
    /// `AU3_Run(szProgram, szDir, nShowFlag)` -> PID, or 0 with error 1.
    fn run(&mut self, program: &WideString, dir: &WideString, show: i32) -> i32;

    /// `AU3_RunWait(szProgram, szDir, nShowFlag)` -> exit code.
    fn run_wait(&mut self, program: &WideString, dir: &WideString, show: i32) -> i32;

    /// `AU3_RunAs(szUser, szDomain, szPassword, nLogonFlag, szProgram, szDir, nShowFlag)`.
    fn run_as(
        &mut self,
        account: &NativeAccount,
        logon: i32,
        program: &WideString,
        dir: &WideString,
        show: i32,
    ) -> i32;

    /// `AU3_RunAsWait(...)`, same parameters as `AU3_RunAs`.
    fn run_as_wait(
        &mut self,
        account: &NativeAccount,
        logon: i32,
        program: &WideString,
        dir: &WideString,
        show: i32,
    ) -> i32;

    fn process_close(&mut self, process: &WideString) -> i32;

    fn process_exists(&mut self, process: &WideString) -> i32;

    fn process_set_priority(&mut self, process: &WideString, priority: i32) -> i32;

    /// `AU3_ProcessWait(szProcess, nTimeout)`; `nTimeout` is in seconds.
    fn process_wait(&mut self, process: &WideString, timeout_secs: i32) -> i32;

    fn process_wait_close(&mut self, process: &WideString, timeout_secs: i32) -> i32;

    fn shutdown(&mut self, flags: i32) -> i32;

    /// `AU3_error()`.
    fn error(&mut self) -> i32;
}

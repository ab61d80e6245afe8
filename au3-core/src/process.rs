//! Process control facade over the AutoItX process functions.
//!
//! Every operation marshals its arguments, calls the matching `AU3_*`
//! export and reads `AU3_error` under the same lock, then turns the pair
//! into a typed result.  No operation retries.
//!
//! # Thread safety
//!
//! `AU3_error` is a single unsynchronised register inside the DLL, and any
//! export may overwrite it.  [`ProcessControl`] wraps the API in a
//! `parking_lot::Mutex` held across each native call and its error read,
//! so it is safe to share between threads.
//!
//! The wait family never holds the lock for longer than one
//! [`WAIT_SLICE_SECS`] native wait: it loops over short `AU3_ProcessWait*`
//! calls and hands the lock over fairly between them, so a `run` on
//! another thread can start the process being waited for.  `run_wait` and
//! `run_as_wait` need their error read paired with the call and keep the
//! lock for the lifetime of the launched program; threads that must keep
//! launching meanwhile should use `run` plus `process_wait_close`.
//!
//! # Process-wide instance
//!
//! The free functions ([`run`], [`process_exists`], ...) use one shared
//! [`ProcessControl<AutoItLibrary>`], loaded on first use from
//! [`LibraryConfig::from_env`] or installed explicitly with [`init`].  It
//! is never reloaded.

use std::sync::OnceLock;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::config::LibraryConfig;
use crate::errors::{AutoItError, PriorityFailure};
use crate::library::AutoItLibrary;
use crate::native::{Au3Api, NativeAccount, NativeOutcome};
use crate::types::{Credentials, Pid, Priority, ProcessId, RunAsOptions, RunOptions, ShutdownFlags};
use crate::wide::WideString;

/// `AU3_error` value reported by a failed launch or priority change.
const ERROR_FAILED: i32 = 1;
/// `AU3_error` value for an unsupported priority class.
const ERROR_UNSUPPORTED_PRIORITY: i32 = 2;

/// Seconds passed to each native wait call.
pub const WAIT_SLICE_SECS: i32 = 1;

/// Convert a wait timeout to whole seconds, 0 meaning "no limit".
///
/// A finite timeout is rounded up and never below 1, so it cannot
/// collapse into the unbounded case.
pub fn timeout_secs(timeout: Option<Duration>) -> i32 {
    match timeout {
        None => 0,
        Some(d) => {
            let mut secs = d.as_secs();
            if d.subsec_nanos() > 0 {
                secs += 1;
            }
            i32::try_from(secs.max(1)).unwrap_or(i32::MAX)
        }
    }
}

fn working_dir(options: &RunOptions) -> Result<WideString, AutoItError> {
    match &options.working_dir {
        Some(dir) => WideString::from_path(dir),
        None => Ok(WideString::empty()),
    }
}

// ---------------------------------------------------------------------------
// Facade
// ---------------------------------------------------------------------------

/// Typed front end for an [`Au3Api`] implementation.
///
/// Calls are serialised on one lock. Waits give it up between
/// [`WAIT_SLICE_SECS`] slices, but `run_wait` and `run_as_wait` hold it
/// until the launched program exits and block every other call on this
/// instance meanwhile (see the module docs).
pub struct ProcessControl<A: Au3Api> {
    api: Mutex<A>,
}

impl<A: Au3Api> ProcessControl<A> {
    pub fn new(api: A) -> Self {
        Self {
            api: Mutex::new(api),
        }
    }

    pub fn into_inner(self) -> A {
        self.api.into_inner()
    }

    /// Run one native call and read `AU3_error` before releasing the lock.
    fn invoke(&self, op: &'static str, call: impl FnOnce(&mut A) -> i32) -> NativeOutcome {
        let mut api = self.api.lock();
        let ret = call(&mut *api);
        let error = api.error();
        MutexGuard::unlock_fair(api);
        log::debug!("{op}: ret={ret} error={error}");
        NativeOutcome { ret, error }
    }

    fn launch_result(
        op: &'static str,
        program: &str,
        outcome: NativeOutcome,
    ) -> Result<i32, AutoItError> {
        if outcome.error == ERROR_FAILED {
            log::warn!("{op}: starting {program} failed");
            return Err(AutoItError::ProcessLaunchError(format!("start {program} failed")));
        }
        Ok(outcome.ret)
    }

    /// Launch `program` without waiting and return its PID.
    pub fn run(&self, program: &str, options: &RunOptions) -> Result<Pid, AutoItError> {
        let wide_program = WideString::new(program)?;
        let dir = working_dir(options)?;
        let show = options.show.as_raw();
        log::debug!("AU3_Run({program}, {dir:?}, {show})");

        let outcome = self.invoke("AU3_Run", |api| api.run(&wide_program, &dir, show));
        Self::launch_result("AU3_Run", program, outcome).map(|ret| Pid(ret as u32))
    }

    /// Launch `program` and block until it exits; returns the exit code.
    pub fn run_wait(&self, program: &str, options: &RunOptions) -> Result<i32, AutoItError> {
        let wide_program = WideString::new(program)?;
        let dir = working_dir(options)?;
        let show = options.show.as_raw();
        log::debug!("AU3_RunWait({program}, {dir:?}, {show})");

        let outcome = self.invoke("AU3_RunWait", |api| api.run_wait(&wide_program, &dir, show));
        Self::launch_result("AU3_RunWait", program, outcome)
    }

    /// Launch `program` as another user without waiting.
    pub fn run_as(
        &self,
        credentials: &Credentials,
        program: &str,
        options: &RunAsOptions,
    ) -> Result<Pid, AutoItError> {
        let account = NativeAccount::new(credentials)?;
        let wide_program = WideString::new(program)?;
        let dir = working_dir(&options.run)?;
        let logon = options.logon.as_raw();
        let show = options.run.show.as_raw();
        log::debug!(
            "AU3_RunAs({}\\{}, logon={logon}, {program}, {dir:?}, {show})",
            credentials.domain,
            credentials.user
        );

        let outcome = self.invoke("AU3_RunAs", |api| {
            api.run_as(&account, logon, &wide_program, &dir, show)
        });
        Self::launch_result("AU3_RunAs", program, outcome).map(|ret| Pid(ret as u32))
    }

    /// Blocking variant of [`ProcessControl::run_as`]; returns the exit code.
    pub fn run_as_wait(
        &self,
        credentials: &Credentials,
        program: &str,
        options: &RunAsOptions,
    ) -> Result<i32, AutoItError> {
        let account = NativeAccount::new(credentials)?;
        let wide_program = WideString::new(program)?;
        let dir = working_dir(&options.run)?;
        let logon = options.logon.as_raw();
        let show = options.run.show.as_raw();
        log::debug!(
            "AU3_RunAsWait({}\\{}, logon={logon}, {program}, {dir:?}, {show})",
            credentials.domain,
            credentials.user
        );

        let outcome = self.invoke("AU3_RunAsWait", |api| {
            api.run_as_wait(&account, logon, &wide_program, &dir, show)
        });
        Self::launch_result("AU3_RunAsWait", program, outcome)
    }

    /// PID of the first matching process, or `None` when there is none.
    ///
    /// A native 0 can also hide an unreported failure; it is not
    /// disambiguated further.
    pub fn process_exists(&self, process: &ProcessId) -> Result<Option<Pid>, AutoItError> {
        let name = WideString::new(&process.to_string())?;
        log::debug!("AU3_ProcessExists({process})");

        let outcome = self.invoke("AU3_ProcessExists", |api| api.process_exists(&name));
        Ok(match outcome.ret {
            0 => None,
            pid => Some(Pid(pid as u32)),
        })
    }

    /// Ask the process to terminate; returns the native success flag.
    pub fn process_close(&self, process: &ProcessId) -> Result<bool, AutoItError> {
        let name = WideString::new(&process.to_string())?;
        log::debug!("AU3_ProcessClose({process})");

        let outcome = self.invoke("AU3_ProcessClose", |api| api.process_close(&name));
        Ok(outcome.ret != 0)
    }

    /// Change the priority class of a process.
    ///
    /// A native 0 with an unrecognised error code is returned as
    /// `Ok(false)`.
    pub fn process_set_priority(
        &self,
        process: &ProcessId,
        priority: Priority,
    ) -> Result<bool, AutoItError> {
        let name = WideString::new(&process.to_string())?;
        let raw = priority.as_raw();
        log::debug!("AU3_ProcessSetPriority({process}, {raw})");

        let outcome = self.invoke("AU3_ProcessSetPriority", |api| {
            api.process_set_priority(&name, raw)
        });
        if outcome.ret != 0 {
            return Ok(true);
        }
        let failure = match outcome.error {
            ERROR_FAILED => PriorityFailure::SetFailed,
            ERROR_UNSUPPORTED_PRIORITY => PriorityFailure::UnsupportedClass,
            _ => return Ok(false),
        };
        log::warn!("AU3_ProcessSetPriority({process}, {priority:?}): {failure}");
        Err(AutoItError::ProcessControlError(failure))
    }

    /// Repeat a [`WAIT_SLICE_SECS`] native wait until it reports success or
    /// `timeout` is used up, releasing the lock between slices.
    ///
    /// Returns `false` on timeout.
    fn wait_sliced(
        &self,
        op: &'static str,
        process: &ProcessId,
        timeout: Option<Duration>,
        wait: fn(&mut A, &WideString, i32) -> i32,
    ) -> Result<bool, AutoItError> {
        let name = WideString::new(&process.to_string())?;
        let slices = timeout_secs(timeout);
        log::debug!("{op}({process}, timeout={slices}s)");

        let mut elapsed = 0;
        loop {
            let outcome = self.invoke(op, |api| wait(api, &name, WAIT_SLICE_SECS));
            if outcome.ret != 0 {
                return Ok(true);
            }
            elapsed += 1;
            if slices != 0 && elapsed >= slices {
                log::warn!("{op}({process}, {slices}s) timed out");
                return Ok(false);
            }
        }
    }

    /// Block until the process exists or `timeout` elapses.
    ///
    /// `None` waits indefinitely.  A native 0 on the last slice is always a
    /// timeout, whatever `AU3_error` says.
    pub fn process_wait(
        &self,
        process: &ProcessId,
        timeout: Option<Duration>,
    ) -> Result<(), AutoItError> {
        if self.wait_sliced("AU3_ProcessWait", process, timeout, A::process_wait)? {
            return Ok(());
        }
        Err(AutoItError::TimeoutError(format!(
            "waiting for {process} to appear timed out"
        )))
    }

    /// Block until the process no longer exists or `timeout` elapses.
    pub fn process_wait_close(
        &self,
        process: &ProcessId,
        timeout: Option<Duration>,
    ) -> Result<(), AutoItError> {
        if self.wait_sliced("AU3_ProcessWaitClose", process, timeout, A::process_wait_close)? {
            return Ok(());
        }
        Err(AutoItError::TimeoutError(format!(
            "waiting for {process} to close timed out"
        )))
    }

    /// Log off, shut down, reboot or power down the machine.
    pub fn shutdown(&self, flags: ShutdownFlags) -> Result<(), AutoItError> {
        log::info!("AU3_Shutdown({flags})");
        let outcome = self.invoke("AU3_Shutdown", |api| api.shutdown(flags.bits()));
        if outcome.ret == 0 {
            log::warn!("AU3_Shutdown({flags}) failed");
            return Err(AutoItError::ShutdownError(flags));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Process-wide instance
// ---------------------------------------------------------------------------

static SHARED: OnceLock<ProcessControl<AutoItLibrary>> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Load AutoItX from `config` and install it as the process-wide instance.
///
/// Fails with [`AutoItError::AlreadyInitialized`] if an instance exists.
pub fn init(config: &LibraryConfig) -> Result<(), AutoItError> {
    let _guard = INIT_LOCK.lock();
    if SHARED.get().is_some() {
        return Err(AutoItError::AlreadyInitialized);
    }
    let control = ProcessControl::new(AutoItLibrary::load(config)?);
    SHARED
        .set(control)
        .map_err(|_| AutoItError::AlreadyInitialized)
}

/// The process-wide facade, loading it from the environment on first use.
///
/// Load failures are not cached; the next call tries again.
pub fn shared() -> Result<&'static ProcessControl<AutoItLibrary>, AutoItError> {
    if let Some(control) = SHARED.get() {
        return Ok(control);
    }
    let _guard = INIT_LOCK.lock();
    if let Some(control) = SHARED.get() {
        return Ok(control);
    }
    let control = ProcessControl::new(AutoItLibrary::load(&LibraryConfig::from_env())?);
    Ok(SHARED.get_or_init(|| control))
}

/// [`ProcessControl::run`] on the shared instance.
pub fn run(program: &str, options: &RunOptions) -> Result<Pid, AutoItError> {
    shared()?.run(program, options)
}

/// [`ProcessControl::run_wait`] on the shared instance.
pub fn run_wait(program: &str, options: &RunOptions) -> Result<i32, AutoItError> {
    shared()?.run_wait(program, options)
}

/// [`ProcessControl::run_as`] on the shared instance.
pub fn run_as(
    credentials: &Credentials,
    program: &str,
    options: &RunAsOptions,
) -> Result<Pid, AutoItError> {
    shared()?.run_as(credentials, program, options)
}

/// [`ProcessControl::run_as_wait`] on the shared instance.
pub fn run_as_wait(
    credentials: &Credentials,
    program: &str,
    options: &RunAsOptions,
) -> Result<i32, AutoItError> {
    shared()?.run_as_wait(credentials, program, options)
}

pub fn process_exists(process: impl Into<ProcessId>) -> Result<Option<Pid>, AutoItError> {
    shared()?.process_exists(&process.into())
}

pub fn process_close(process: impl Into<ProcessId>) -> Result<bool, AutoItError> {
    shared()?.process_close(&process.into())
}

pub fn process_set_priority(
    process: impl Into<ProcessId>,
    priority: Priority,
) -> Result<bool, AutoItError> {
    shared()?.process_set_priority(&process.into(), priority)
}

pub fn process_wait(
    process: impl Into<ProcessId>,
    timeout: Option<Duration>,
) -> Result<(), AutoItError> {
    shared()?.process_wait(&process.into(), timeout)
}

pub fn process_wait_close(
    process: impl Into<ProcessId>,
    timeout: Option<Duration>,
) -> Result<(), AutoItError> {
    shared()?.process_wait_close(&process.into(), timeout)
}

pub fn shutdown(flags: ShutdownFlags) -> Result<(), AutoItError> {
    shared()?.shutdown(flags)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
    use std::sync::{mpsc, Arc};
    use std::thread;

    use super::*;
    use crate::types::{LogonMode, ShowState};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Run {
            program: String,
            dir: String,
            show: i32,
            wait: bool,
        },
        RunAs {
            user: String,
            domain: String,
            password: String,
            logon: i32,
            program: String,
            dir: String,
            show: i32,
            wait: bool,
        },
        Close(String),
        Exists(String),
        SetPriority(String, i32),
        Wait(String, i32),
        WaitClose(String, i32),
        Shutdown(i32),
    }

    /// Returns queued `(ret, error)` pairs and records every call.
    #[derive(Default)]
    struct ScriptedApi {
        script: VecDeque<(i32, i32)>,
        last_error: i32,
        calls: Vec<Call>,
        error_reads: usize,
    }

    impl ScriptedApi {
        fn with(script: &[(i32, i32)]) -> Self {
            Self {
                script: script.iter().copied().collect(),
                ..Self::default()
            }
        }

        fn next(&mut self, call: Call) -> i32 {
            self.calls.push(call);
            let (ret, error) = self.script.pop_front().unwrap_or((0, 0));
            self.last_error = error;
            ret
        }
    }

    impl Au3Api for ScriptedApi {
        fn run(&mut self, program: &WideString, dir: &WideString, show: i32) -> i32 {
            self.next(Call::Run {
                program: program.to_string_lossy(),
                dir: dir.to_string_lossy(),
                show,
                wait: false,
            })
        }

        fn run_wait(&mut self, program: &WideString, dir: &WideString, show: i32) -> i32 {
            self.next(Call::Run {
                program: program.to_string_lossy(),
                dir: dir.to_string_lossy(),
                show,
                wait: true,
            })
        }

        fn run_as(
            &mut self,
            account: &NativeAccount,
            logon: i32,
            program: &WideString,
            dir: &WideString,
            show: i32,
        ) -> i32 {
            self.next(Call::RunAs {
                user: account.user.to_string_lossy(),
                domain: account.domain.to_string_lossy(),
                password: account.password.to_string_lossy(),
                logon,
                program: program.to_string_lossy(),
                dir: dir.to_string_lossy(),
                show,
                wait: false,
            })
        }

        fn run_as_wait(
            &mut self,
            account: &NativeAccount,
            logon: i32,
            program: &WideString,
            dir: &WideString,
            show: i32,
        ) -> i32 {
            self.next(Call::RunAs {
                user: account.user.to_string_lossy(),
                domain: account.domain.to_string_lossy(),
                password: account.password.to_string_lossy(),
                logon,
                program: program.to_string_lossy(),
                dir: dir.to_string_lossy(),
                show,
                wait: true,
            })
        }

        fn process_close(&mut self, process: &WideString) -> i32 {
            self.next(Call::Close(process.to_string_lossy()))
        }

        fn process_exists(&mut self, process: &WideString) -> i32 {
            self.next(Call::Exists(process.to_string_lossy()))
        }

        fn process_set_priority(&mut self, process: &WideString, priority: i32) -> i32 {
            self.next(Call::SetPriority(process.to_string_lossy(), priority))
        }

        fn process_wait(&mut self, process: &WideString, timeout_secs: i32) -> i32 {
            self.next(Call::Wait(process.to_string_lossy(), timeout_secs))
        }

        fn process_wait_close(&mut self, process: &WideString, timeout_secs: i32) -> i32 {
            self.next(Call::WaitClose(process.to_string_lossy(), timeout_secs))
        }

        fn shutdown(&mut self, flags: i32) -> i32 {
            self.next(Call::Shutdown(flags))
        }

        fn error(&mut self) -> i32 {
            self.error_reads += 1;
            self.last_error
        }
    }

    fn control(script: &[(i32, i32)]) -> ProcessControl<ScriptedApi> {
        ProcessControl::new(ScriptedApi::with(script))
    }

    #[test]
    fn test_run_marshals_defaults() {
        let ctl = control(&[(4321, 0)]);
        let pid = ctl.run("notepad.exe", &RunOptions::default()).unwrap();
        assert_eq!(pid, Pid(4321));

        let api = ctl.into_inner();
        assert_eq!(
            api.calls,
            vec![Call::Run {
                program: "notepad.exe".into(),
                dir: String::new(),
                show: 1,
                wait: false,
            }]
        );
        assert_eq!(api.error_reads, 1);
    }

    #[test]
    fn test_run_passes_working_dir_and_show() {
        let ctl = control(&[(99, 0)]);
        let options = RunOptions::with_show(ShowState::Hide).working_dir("C:\\temp");
        ctl.run("cmd.exe", &options).unwrap();
        assert_eq!(
            ctl.into_inner().calls[0],
            Call::Run {
                program: "cmd.exe".into(),
                dir: "C:\\temp".into(),
                show: 0,
                wait: false,
            }
        );
    }

    #[test]
    fn test_run_error_one_is_launch_error() {
        let ctl = control(&[(0, 1)]);
        let err = ctl.run("missing.exe", &RunOptions::default()).unwrap_err();
        match err {
            AutoItError::ProcessLaunchError(msg) => assert!(msg.contains("missing.exe")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_run_other_error_codes_pass_through() {
        // Only error 1 signals a launch failure.
        let ctl = control(&[(0, 2)]);
        assert_eq!(ctl.run("odd.exe", &RunOptions::default()).unwrap(), Pid(0));
    }

    #[test]
    fn test_run_wait_returns_exit_code() {
        let ctl = control(&[(3, 0), (0, 1)]);
        assert_eq!(ctl.run_wait("tool.exe", &RunOptions::default()).unwrap(), 3);
        assert!(matches!(
            ctl.run_wait("tool.exe", &RunOptions::default()),
            Err(AutoItError::ProcessLaunchError(_))
        ));
        let api = ctl.into_inner();
        assert!(matches!(api.calls[0], Call::Run { wait: true, .. }));
    }

    #[test]
    fn test_run_as_marshals_credentials_and_logon() {
        let ctl = control(&[(555, 0), (7, 0)]);
        let creds = Credentials::new("svc", "CORP", "s3cret");
        let options = RunAsOptions {
            logon: LogonMode::NetCredentialsOnly,
            run: RunOptions::with_show(ShowState::Minimize),
        };
        assert_eq!(ctl.run_as(&creds, "app.exe", &options).unwrap(), Pid(555));
        assert_eq!(ctl.run_as_wait(&creds, "app.exe", &RunAsOptions::default()).unwrap(), 7);

        let api = ctl.into_inner();
        assert_eq!(
            api.calls[0],
            Call::RunAs {
                user: "svc".into(),
                domain: "CORP".into(),
                password: "s3cret".into(),
                logon: 2,
                program: "app.exe".into(),
                dir: String::new(),
                show: 6,
                wait: false,
            }
        );
        assert!(matches!(api.calls[1], Call::RunAs { logon: 1, show: 1, wait: true, .. }));
    }

    #[test]
    fn test_run_as_failure() {
        let ctl = control(&[(0, 1), (0, 1)]);
        let creds = Credentials::new("u", "", "p");
        assert!(matches!(
            ctl.run_as(&creds, "x.exe", &RunAsOptions::default()),
            Err(AutoItError::ProcessLaunchError(_))
        ));
        assert!(matches!(
            ctl.run_as_wait(&creds, "x.exe", &RunAsOptions::default()),
            Err(AutoItError::ProcessLaunchError(_))
        ));
    }

    #[test]
    fn test_invalid_argument_never_reaches_native() {
        let ctl = control(&[]);
        assert!(matches!(
            ctl.run("bad\0.exe", &RunOptions::default()),
            Err(AutoItError::InvalidArgument(_))
        ));
        let creds = Credentials::new("u", "d", "p\0w");
        assert!(matches!(
            ctl.run_as(&creds, "x.exe", &RunAsOptions::default()),
            Err(AutoItError::InvalidArgument(_))
        ));
        let api = ctl.into_inner();
        assert!(api.calls.is_empty());
        assert_eq!(api.error_reads, 0);
    }

    #[test]
    fn test_process_exists_zero_is_none() {
        // Error register is ignored for existence checks.
        let ctl = control(&[(0, 1), (1234, 0)]);
        assert_eq!(ctl.process_exists(&"ghost.exe".into()).unwrap(), None);
        assert_eq!(ctl.process_exists(&1234_u32.into()).unwrap(), Some(Pid(1234)));
        let api = ctl.into_inner();
        assert_eq!(api.calls[1], Call::Exists("1234".into()));
    }

    #[test]
    fn test_process_close_flag() {
        let ctl = control(&[(1, 0), (0, 0)]);
        assert!(ctl.process_close(&"notepad.exe".into()).unwrap());
        assert!(!ctl.process_close(&"notepad.exe".into()).unwrap());
    }

    #[test]
    fn test_set_priority_outcomes_for_every_level() {
        for priority in Priority::ALL {
            for (ret, error) in [(1, 0), (0, 1), (0, 2), (0, 0), (0, 3)] {
                let ctl = control(&[(ret, error)]);
                let result = ctl.process_set_priority(&"app.exe".into(), priority);
                match (ret, error) {
                    (1, _) => assert!(result.unwrap()),
                    (0, 1) => assert!(matches!(
                        result,
                        Err(AutoItError::ProcessControlError(PriorityFailure::SetFailed))
                    )),
                    (0, 2) => assert!(matches!(
                        result,
                        Err(AutoItError::ProcessControlError(PriorityFailure::UnsupportedClass))
                    )),
                    _ => assert!(!result.unwrap()),
                }
                assert_eq!(
                    ctl.into_inner().calls,
                    vec![Call::SetPriority("app.exe".into(), priority.as_raw())]
                );
            }
        }
    }

    #[test]
    fn test_process_wait_zero_is_timeout_regardless_of_error() {
        for error in [0, 1, 2] {
            let ctl = control(&[(0, error)]);
            let err = ctl
                .process_wait(&"never.exe".into(), Some(Duration::from_secs(2)))
                .unwrap_err();
            assert!(matches!(err, AutoItError::TimeoutError(_)));
            assert_eq!(
                ctl.into_inner().calls,
                vec![Call::Wait("never.exe".into(), 1), Call::Wait("never.exe".into(), 1)]
            );
        }
    }

    #[test]
    fn test_process_wait_success_and_infinite_timeout() {
        let ctl = control(&[(1, 0)]);
        ctl.process_wait(&"app.exe".into(), None).unwrap();
        assert_eq!(ctl.into_inner().calls, vec![Call::Wait("app.exe".into(), 1)]);
    }

    #[test]
    fn test_process_wait_without_timeout_keeps_polling() {
        let ctl = control(&[(0, 0), (0, 1), (0, 0), (1, 0)]);
        ctl.process_wait(&"slow.exe".into(), None).unwrap();
        let api = ctl.into_inner();
        assert_eq!(api.calls.len(), 4);
        assert!(api.calls.iter().all(|c| *c == Call::Wait("slow.exe".into(), 1)));
    }

    #[test]
    fn test_process_wait_close() {
        let ctl = control(&[(1, 0), (0, 0)]);
        ctl.process_wait_close(&Pid(42).into(), None).unwrap();
        assert!(matches!(
            ctl.process_wait_close(&"app.exe".into(), Some(Duration::from_millis(1500))),
            Err(AutoItError::TimeoutError(_))
        ));
        let api = ctl.into_inner();
        assert_eq!(
            api.calls,
            vec![
                Call::WaitClose("42".into(), 1),
                Call::WaitClose("app.exe".into(), 1),
                Call::WaitClose("app.exe".into(), 1),
            ]
        );
    }

    #[test]
    fn test_timeout_secs_rounding() {
        assert_eq!(timeout_secs(None), 0);
        assert_eq!(timeout_secs(Some(Duration::ZERO)), 1);
        assert_eq!(timeout_secs(Some(Duration::from_millis(10))), 1);
        assert_eq!(timeout_secs(Some(Duration::from_secs(5))), 5);
        assert_eq!(timeout_secs(Some(Duration::from_millis(5001))), 6);
        assert_eq!(timeout_secs(Some(Duration::from_secs(u64::MAX))), i32::MAX);
    }

    #[test]
    fn test_shutdown_bits_and_failure() {
        let ctl = control(&[(1, 0), (0, 0)]);
        ctl.shutdown(ShutdownFlags::REBOOT | ShutdownFlags::FORCE).unwrap();
        let err = ctl.shutdown(ShutdownFlags::LOGOFF).unwrap_err();
        assert!(matches!(err, AutoItError::ShutdownError(f) if f == ShutdownFlags::LOGOFF));
        assert_eq!(ctl.into_inner().calls, vec![Call::Shutdown(6), Call::Shutdown(0)]);
    }

    /// Shared error register that another thread can clobber between a
    /// call and its error read unless the facade serialises them.
    struct RacyApi {
        register: Arc<AtomicI32>,
    }

    impl RacyApi {
        fn launch(&mut self, program: &WideString) -> i32 {
            let failing = program.to_string_lossy().starts_with("fail");
            self.register.store(if failing { 1 } else { 0 }, Ordering::SeqCst);
            thread::yield_now();
            if failing {
                0
            } else {
                100
            }
        }
    }

    impl Au3Api for RacyApi {
        fn run(&mut self, program: &WideString, _: &WideString, _: i32) -> i32 {
            self.launch(program)
        }
        fn run_wait(&mut self, program: &WideString, _: &WideString, _: i32) -> i32 {
            self.launch(program)
        }
        fn run_as(
            &mut self,
            _: &NativeAccount,
            _: i32,
            program: &WideString,
            _: &WideString,
            _: i32,
        ) -> i32 {
            self.launch(program)
        }
        fn run_as_wait(
            &mut self,
            _: &NativeAccount,
            _: i32,
            program: &WideString,
            _: &WideString,
            _: i32,
        ) -> i32 {
            self.launch(program)
        }
        fn process_close(&mut self, _: &WideString) -> i32 {
            0
        }
        fn process_exists(&mut self, _: &WideString) -> i32 {
            0
        }
        fn process_set_priority(&mut self, _: &WideString, _: i32) -> i32 {
            0
        }
        fn process_wait(&mut self, _: &WideString, _: i32) -> i32 {
            0
        }
        fn process_wait_close(&mut self, _: &WideString, _: i32) -> i32 {
            0
        }
        fn shutdown(&mut self, _: i32) -> i32 {
            0
        }
        fn error(&mut self) -> i32 {
            self.register.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_call_and_error_read_are_atomic_across_threads() {
        let ctl = Arc::new(ProcessControl::new(RacyApi {
            register: Arc::new(AtomicI32::new(0)),
        }));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ctl = Arc::clone(&ctl);
                thread::spawn(move || {
                    let program = if i % 2 == 0 { "fail.exe" } else { "ok.exe" };
                    for _ in 0..200 {
                        let result = ctl.run(program, &RunOptions::default());
                        if i % 2 == 0 {
                            assert!(matches!(result, Err(AutoItError::ProcessLaunchError(_))));
                        } else {
                            assert_eq!(result.unwrap(), Pid(100));
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    /// `run` marks the process as started; `process_wait` polls for it
    /// for a few milliseconds per slice.
    struct LaunchFlagApi {
        started: Arc<AtomicBool>,
    }

    impl Au3Api for LaunchFlagApi {
        fn run(&mut self, _: &WideString, _: &WideString, _: i32) -> i32 {
            self.started.store(true, Ordering::SeqCst);
            100
        }
        fn run_wait(&mut self, _: &WideString, _: &WideString, _: i32) -> i32 {
            0
        }
        fn run_as(
            &mut self,
            _: &NativeAccount,
            _: i32,
            _: &WideString,
            _: &WideString,
            _: i32,
        ) -> i32 {
            0
        }
        fn run_as_wait(
            &mut self,
            _: &NativeAccount,
            _: i32,
            _: &WideString,
            _: &WideString,
            _: i32,
        ) -> i32 {
            0
        }
        fn process_close(&mut self, _: &WideString) -> i32 {
            0
        }
        fn process_exists(&mut self, _: &WideString) -> i32 {
            0
        }
        fn process_set_priority(&mut self, _: &WideString, _: i32) -> i32 {
            0
        }
        fn process_wait(&mut self, _: &WideString, _: i32) -> i32 {
            for _ in 0..20 {
                if self.started.load(Ordering::SeqCst) {
                    return 1;
                }
                thread::sleep(Duration::from_millis(1));
            }
            0
        }
        fn process_wait_close(&mut self, _: &WideString, _: i32) -> i32 {
            0
        }
        fn shutdown(&mut self, _: i32) -> i32 {
            0
        }
        fn error(&mut self) -> i32 {
            0
        }
    }

    fn launch_flag_control() -> Arc<ProcessControl<LaunchFlagApi>> {
        Arc::new(ProcessControl::new(LaunchFlagApi {
            started: Arc::new(AtomicBool::new(false)),
        }))
    }

    fn spawn_wait(
        ctl: &Arc<ProcessControl<LaunchFlagApi>>,
    ) -> mpsc::Receiver<Result<(), AutoItError>> {
        let (tx, rx) = mpsc::channel();
        let ctl = Arc::clone(ctl);
        thread::spawn(move || {
            let _ = tx.send(ctl.process_wait(&"app.exe".into(), None));
        });
        rx
    }

    fn spawn_run(
        ctl: &Arc<ProcessControl<LaunchFlagApi>>,
    ) -> mpsc::Receiver<Result<Pid, AutoItError>> {
        let (tx, rx) = mpsc::channel();
        let ctl = Arc::clone(ctl);
        thread::spawn(move || {
            let _ = tx.send(ctl.run("app.exe", &RunOptions::default()));
        });
        rx
    }

    #[test]
    fn test_unbounded_wait_lets_run_from_another_thread_through() {
        let ctl = launch_flag_control();
        let waited = spawn_wait(&ctl);
        thread::sleep(Duration::from_millis(50));
        let ran = spawn_run(&ctl);

        let pid = ran.recv_timeout(Duration::from_secs(10)).expect("run blocked by wait");
        assert_eq!(pid.unwrap(), Pid(100));
        let waited = waited
            .recv_timeout(Duration::from_secs(10))
            .expect("wait never saw the launch");
        assert!(waited.is_ok());
    }

    #[test]
    fn test_wait_after_run_returns_at_once() {
        let ctl = launch_flag_control();
        let ran = spawn_run(&ctl);
        assert_eq!(ran.recv_timeout(Duration::from_secs(10)).unwrap().unwrap(), Pid(100));

        let waited = spawn_wait(&ctl);
        assert!(waited.recv_timeout(Duration::from_secs(10)).unwrap().is_ok());
    }
}

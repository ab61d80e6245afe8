//! `autoit_process` -- Thin PyO3 wrappers around `au3_core::process`.
//!
//! Function names, argument order and defaults follow the `autoit.process`
//! Python API (`run(filename, work_dir="", show_flag=SW_SHOWNORMAL)` and so
//! on).  Blocking calls release the GIL via `py.allow_threads()`; all logic
//! lives in `au3_core`.

use std::time::Duration;

use pyo3::create_exception;
use pyo3::exceptions::{PyException, PyRuntimeError, PyTimeoutError, PyValueError};
use pyo3::prelude::*;

use au3_core::errors::AutoItError;
use au3_core::{
    process, Credentials, LogonMode, Priority, ProcessId, RunAsOptions, RunOptions, ShowState,
    ShutdownFlags,
};

create_exception!(
    autoit_process,
    ProcessError,
    PyException,
    "Raised when AutoItX fails to start, re-prioritise or shut down."
);

// ---------------------------------------------------------------------------
// Error conversion helper
// ---------------------------------------------------------------------------

fn to_py_err(e: AutoItError) -> PyErr {
    match e {
        AutoItError::ProcessLaunchError(_)
        | AutoItError::ProcessControlError(_)
        | AutoItError::ShutdownError(_) => ProcessError::new_err(e.to_string()),
        AutoItError::TimeoutError(msg) => PyTimeoutError::new_err(msg),
        AutoItError::InvalidArgument(msg) => PyValueError::new_err(msg),
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Argument conversion
// ---------------------------------------------------------------------------

/// A process given either as its name or as a PID.
#[derive(FromPyObject)]
enum ProcessArg {
    Pid(u32),
    Name(String),
}

impl From<ProcessArg> for ProcessId {
    fn from(arg: ProcessArg) -> Self {
        match arg {
            ProcessArg::Pid(pid) => ProcessId::Pid(pid),
            ProcessArg::Name(name) => ProcessId::Name(name),
        }
    }
}

fn run_options(work_dir: &str, show_flag: i32) -> Result<RunOptions, AutoItError> {
    let mut options = RunOptions::with_show(ShowState::try_from(show_flag)?);
    if !work_dir.is_empty() {
        options = options.working_dir(work_dir);
    }
    Ok(options)
}

fn run_as_options(
    logon_flag: i32,
    work_dir: &str,
    show_flag: i32,
) -> Result<RunAsOptions, AutoItError> {
    Ok(RunAsOptions {
        logon: LogonMode::try_from(logon_flag)?,
        run: run_options(work_dir, show_flag)?,
    })
}

/// Python timeouts are whole seconds with 0 meaning "wait forever".
fn wait_timeout(timeout: u64) -> Option<Duration> {
    (timeout > 0).then(|| Duration::from_secs(timeout))
}

// ---------------------------------------------------------------------------
// run family
// ---------------------------------------------------------------------------

/// Run an external program without waiting; returns its PID.
#[pyfunction]
#[pyo3(signature = (filename, work_dir="", show_flag=1))]
fn run(py: Python<'_>, filename: &str, work_dir: &str, show_flag: i32) -> PyResult<u32> {
    let options = run_options(work_dir, show_flag).map_err(to_py_err)?;
    let filename = filename.to_owned();
    py.allow_threads(move || process::run(&filename, &options))
        .map(|pid| pid.0)
        .map_err(to_py_err)
}

/// Run an external program and wait for it to exit; returns the exit code.
#[pyfunction]
#[pyo3(signature = (filename, work_dir="", show_flag=1))]
fn run_wait(py: Python<'_>, filename: &str, work_dir: &str, show_flag: i32) -> PyResult<i32> {
    let options = run_options(work_dir, show_flag).map_err(to_py_err)?;
    let filename = filename.to_owned();
    py.allow_threads(move || process::run_wait(&filename, &options))
        .map_err(to_py_err)
}

/// Run an external program under another account.
#[pyfunction]
#[pyo3(signature = (user, domain, password, filename, logon_flag=1, work_dir="", show_flag=1))]
#[allow(clippy::too_many_arguments)]
fn run_as(
    py: Python<'_>,
    user: &str,
    domain: &str,
    password: &str,
    filename: &str,
    logon_flag: i32,
    work_dir: &str,
    show_flag: i32,
) -> PyResult<u32> {
    let options = run_as_options(logon_flag, work_dir, show_flag).map_err(to_py_err)?;
    let credentials = Credentials::new(user, domain, password);
    let filename = filename.to_owned();
    py.allow_threads(move || process::run_as(&credentials, &filename, &options))
        .map(|pid| pid.0)
        .map_err(to_py_err)
}

/// Blocking variant of `run_as`; returns the exit code.
#[pyfunction]
#[pyo3(signature = (user, domain, password, filename, logon_flag=1, work_dir="", show_flag=1))]
#[allow(clippy::too_many_arguments)]
fn run_as_wait(
    py: Python<'_>,
    user: &str,
    domain: &str,
    password: &str,
    filename: &str,
    logon_flag: i32,
    work_dir: &str,
    show_flag: i32,
) -> PyResult<i32> {
    let options = run_as_options(logon_flag, work_dir, show_flag).map_err(to_py_err)?;
    let credentials = Credentials::new(user, domain, password);
    let filename = filename.to_owned();
    py.allow_threads(move || process::run_as_wait(&credentials, &filename, &options))
        .map_err(to_py_err)
}

// ---------------------------------------------------------------------------
// process functions
// ---------------------------------------------------------------------------

/// PID of the named process, or 0 when it does not exist.
#[pyfunction]
fn process_exists(py: Python<'_>, process: ProcessArg) -> PyResult<u32> {
    let id = ProcessId::from(process);
    let pid = py
        .allow_threads(move || process::process_exists(id))
        .map_err(to_py_err)?;
    Ok(pid.map(|p| p.0).unwrap_or(0))
}

/// Terminate a named process.
#[pyfunction]
fn process_close(py: Python<'_>, process: ProcessArg) -> PyResult<bool> {
    let id = ProcessId::from(process);
    py.allow_threads(move || process::process_close(id))
        .map_err(to_py_err)
}

/// Change the priority of a process (0 = idle ... 5 = realtime).
#[pyfunction]
fn process_set_priority(py: Python<'_>, process: ProcessArg, priority: i32) -> PyResult<bool> {
    let priority = Priority::try_from(priority).map_err(to_py_err)?;
    let id = ProcessId::from(process);
    py.allow_threads(move || process::process_set_priority(id, priority))
        .map_err(to_py_err)
}

/// Pause until a given process exists.
#[pyfunction]
#[pyo3(signature = (process, timeout=0))]
fn process_wait(py: Python<'_>, process: ProcessArg, timeout: u64) -> PyResult<i32> {
    let id = ProcessId::from(process);
    py.allow_threads(move || process::process_wait(id, wait_timeout(timeout)))
        .map(|()| 1)
        .map_err(to_py_err)
}

/// Pause until a given process does not exist.
#[pyfunction]
#[pyo3(signature = (process, timeout=0))]
fn process_wait_close(py: Python<'_>, process: ProcessArg, timeout: u64) -> PyResult<i32> {
    let id = ProcessId::from(process);
    py.allow_threads(move || process::process_wait_close(id, wait_timeout(timeout)))
        .map(|()| 1)
        .map_err(to_py_err)
}

/// Shut down the system; `code` combines 0 logoff, 1 shutdown, 2 reboot,
/// 4 force, 8 power down.
#[pyfunction]
fn shutdown(py: Python<'_>, code: i32) -> PyResult<i32> {
    py.allow_threads(move || process::shutdown(ShutdownFlags(code)))
        .map(|()| 1)
        .map_err(to_py_err)
}

// ---------------------------------------------------------------------------
// Module registration
// ---------------------------------------------------------------------------

/// Register the `autoit_process` Python module.
#[pymodule]
fn autoit_process(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(run, m)?)?;
    m.add_function(wrap_pyfunction!(run_wait, m)?)?;
    m.add_function(wrap_pyfunction!(run_as, m)?)?;
    m.add_function(wrap_pyfunction!(run_as_wait, m)?)?;
    m.add_function(wrap_pyfunction!(process_exists, m)?)?;
    m.add_function(wrap_pyfunction!(process_close, m)?)?;
    m.add_function(wrap_pyfunction!(process_set_priority, m)?)?;
    m.add_function(wrap_pyfunction!(process_wait, m)?)?;
    m.add_function(wrap_pyfunction!(process_wait_close, m)?)?;
    m.add_function(wrap_pyfunction!(shutdown, m)?)?;

    m.add("ProcessError", m.py().get_type::<ProcessError>())?;

    m.add("SW_HIDE", ShowState::Hide.as_raw())?;
    m.add("SW_SHOWNORMAL", ShowState::Normal.as_raw())?;
    m.add("SW_MINIMIZE", ShowState::Minimize.as_raw())?;
    m.add("SW_MAXIMIZE", ShowState::Maximized.as_raw())?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("__doc__", "AutoItX process control for Python.")?;

    Ok(())
}


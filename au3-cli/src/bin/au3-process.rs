//! Standalone CLI tool for AutoItX process control.

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;

use au3_core::{
    process, AutoItError, Credentials, LibraryConfig, LogonMode, Priority, ProcessId,
    RunAsOptions, RunOptions, ShowState, ShutdownFlags,
};

#[derive(Parser)]
#[command(name = "au3-process", about = "Run, wait for and control processes via AutoItX")]
struct Args {
    /// AutoItX DLL to load (overrides AUTOITX_DLL)
    #[arg(long, global = true)]
    dll: Option<PathBuf>,

    /// Print the result as a JSON object
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs)]
struct LaunchArgs {
    /// Program to run
    program: String,
    /// Working directory
    #[arg(short, long)]
    dir: Option<PathBuf>,
    /// Window state: hide, normal, maximized, minimize, ... or the SW_* number
    #[arg(short, long, default_value = "normal", value_parser = parse_value::<ShowState>)]
    show: ShowState,
}

#[derive(ClapArgs)]
struct AccountArgs {
    /// User name
    #[arg(short, long)]
    user: String,
    /// Domain name
    #[arg(long, default_value = "")]
    domain: String,
    /// Password
    #[arg(short, long)]
    password: String,
    /// Logon mode: no-profile, load-profile, net-credentials-only
    #[arg(long, default_value = "load-profile", value_parser = parse_value::<LogonMode>)]
    logon: LogonMode,
}

#[derive(ClapArgs)]
struct WaitArgs {
    /// Process name or PID
    #[arg(value_parser = parse_value::<ProcessId>)]
    process: ProcessId,
    /// Timeout in seconds (omit or 0 to wait indefinitely)
    #[arg(short, long)]
    timeout: Option<u64>,
}

impl WaitArgs {
    /// Seconds with 0 meaning "no limit", as in the Python module.
    fn timeout(&self) -> Option<Duration> {
        self.timeout
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Start a program without waiting; prints its PID
    Run(LaunchArgs),
    /// Start a program and wait for it to exit; prints its exit code
    RunWait(LaunchArgs),
    /// Start a program as another user without waiting
    RunAs {
        #[command(flatten)]
        account: AccountArgs,
        #[command(flatten)]
        launch: LaunchArgs,
    },
    /// Start a program as another user and wait for it to exit
    RunAsWait {
        #[command(flatten)]
        account: AccountArgs,
        #[command(flatten)]
        launch: LaunchArgs,
    },
    /// Print the PID of a process, or 0 if it does not exist
    Exists {
        #[arg(value_parser = parse_value::<ProcessId>)]
        process: ProcessId,
    },
    /// Terminate a process
    Close {
        #[arg(value_parser = parse_value::<ProcessId>)]
        process: ProcessId,
    },
    /// Change the priority of a process
    SetPriority {
        #[arg(value_parser = parse_value::<ProcessId>)]
        process: ProcessId,
        /// idle, below-normal, normal, above-normal, high, realtime (or 0-5)
        #[arg(value_parser = parse_value::<Priority>)]
        priority: Priority,
    },
    /// Wait until a process exists
    Wait(WaitArgs),
    /// Wait until a process no longer exists
    WaitClose(WaitArgs),
    /// Log off, shut down, reboot or power down
    Shutdown {
        /// logoff, shutdown, reboot, force, power-down (repeatable)
        #[arg(short, long = "flag", value_parser = parse_value::<ShutdownFlags>)]
        flags: Vec<ShutdownFlags>,
    },
}

fn parse_value<T: FromStr<Err = AutoItError>>(s: &str) -> Result<T, String> {
    s.parse::<T>().map_err(|e| e.to_string())
}

#[derive(Serialize)]
struct Outcome {
    operation: &'static str,
    result: serde_json::Value,
}

impl Outcome {
    fn new(operation: &'static str, result: impl Into<serde_json::Value>) -> Self {
        Self {
            operation,
            result: result.into(),
        }
    }
}

fn run_options(launch: &LaunchArgs) -> RunOptions {
    RunOptions {
        working_dir: launch.dir.clone(),
        show: launch.show,
    }
}

fn run_as_parts(account: &AccountArgs, launch: &LaunchArgs) -> (Credentials, RunAsOptions) {
    let credentials = Credentials::new(&account.user, &account.domain, &account.password);
    let options = RunAsOptions {
        logon: account.logon,
        run: run_options(launch),
    };
    (credentials, options)
}

fn execute(command: &Command) -> Result<Outcome, AutoItError> {
    match command {
        Command::Run(launch) => {
            let pid = process::run(&launch.program, &run_options(launch))?;
            Ok(Outcome::new("run", pid.0))
        }
        Command::RunWait(launch) => {
            let code = process::run_wait(&launch.program, &run_options(launch))?;
            Ok(Outcome::new("run-wait", code))
        }
        Command::RunAs { account, launch } => {
            let (credentials, options) = run_as_parts(account, launch);
            let pid = process::run_as(&credentials, &launch.program, &options)?;
            Ok(Outcome::new("run-as", pid.0))
        }
        Command::RunAsWait { account, launch } => {
            let (credentials, options) = run_as_parts(account, launch);
            let code = process::run_as_wait(&credentials, &launch.program, &options)?;
            Ok(Outcome::new("run-as-wait", code))
        }
        Command::Exists { process: id } => {
            let pid = process::process_exists(id.clone())?;
            Ok(Outcome::new("exists", pid.map(|p| p.0).unwrap_or(0)))
        }
        Command::Close { process: id } => {
            let closed = process::process_close(id.clone())?;
            Ok(Outcome::new("close", closed))
        }
        Command::SetPriority {
            process: id,
            priority,
        } => {
            let changed = process::process_set_priority(id.clone(), *priority)?;
            Ok(Outcome::new("set-priority", changed))
        }
        Command::Wait(wait) => {
            process::process_wait(wait.process.clone(), wait.timeout())?;
            Ok(Outcome::new("wait", true))
        }
        Command::WaitClose(wait) => {
            process::process_wait_close(wait.process.clone(), wait.timeout())?;
            Ok(Outcome::new("wait-close", true))
        }
        Command::Shutdown { flags } => {
            let combined = flags
                .iter()
                .fold(ShutdownFlags::LOGOFF, |acc, flag| acc | *flag);
            process::shutdown(combined)?;
            Ok(Outcome::new("shutdown", combined.to_string()))
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Some(dll) = &args.dll {
        if let Err(e) = au3_core::init(&LibraryConfig::new(dll)) {
            eprintln!("au3-process: {e}");
            return ExitCode::FAILURE;
        }
    }

    match execute(&args.command) {
        Ok(outcome) => {
            if args.json {
                match serde_json::to_string(&outcome) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("au3-process: JSON serialization failed: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                match &outcome.result {
                    serde_json::Value::String(s) => println!("{s}"),
                    other => println!("{other}"),
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::debug!("{} failed: {e:?}", command_name(&args.command));
            eprintln!("au3-process: {e}");
            ExitCode::FAILURE
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Run(_) => "run",
        Command::RunWait(_) => "run-wait",
        Command::RunAs { .. } => "run-as",
        Command::RunAsWait { .. } => "run-as-wait",
        Command::Exists { .. } => "exists",
        Command::Close { .. } => "close",
        Command::SetPriority { .. } => "set-priority",
        Command::Wait(_) => "wait",
        Command::WaitClose(_) => "wait-close",
        Command::Shutdown { .. } => "shutdown",
    }
}

//! Argument and result types for the process facade.
//!
//! Each enum carries the exact integer AutoItX expects for the
//! corresponding `int` parameter; [`ShutdownFlags`] is passed through bit
//! for bit.  All types parse from lower-case names (`FromStr`) and
//! (de)serialize with `serde` so the CLI and Python layers can share them.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AutoItError;

// ---------------------------------------------------------------------------
// Process identity
// ---------------------------------------------------------------------------

/// A process id as returned by `Run` / `RunAs` / `ProcessExists`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a target process by executable name or numeric PID.
///
/// AutoItX takes both forms as a single string, so a PID is rendered as
/// its decimal text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessId {
    Pid(u32),
    Name(String),
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessId::Pid(pid) => write!(f, "{pid}"),
            ProcessId::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for ProcessId {
    fn from(name: &str) -> Self {
        ProcessId::Name(name.to_owned())
    }
}

impl From<String> for ProcessId {
    fn from(name: String) -> Self {
        ProcessId::Name(name)
    }
}

impl From<&String> for ProcessId {
    fn from(name: &String) -> Self {
        ProcessId::Name(name.clone())
    }
}

impl From<u32> for ProcessId {
    fn from(pid: u32) -> Self {
        ProcessId::Pid(pid)
    }
}

impl From<Pid> for ProcessId {
    fn from(pid: Pid) -> Self {
        ProcessId::Pid(pid.0)
    }
}

/// Parses an all-digit string as a PID, anything else as a name.
impl FromStr for ProcessId {
    type Err = AutoItError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(AutoItError::InvalidArgument("empty process identifier".into()));
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(pid) = s.parse::<u32>() {
                return Ok(ProcessId::Pid(pid));
            }
        }
        Ok(ProcessId::Name(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Show state
// ---------------------------------------------------------------------------

/// Initial window state of a launched program (Win32 `SW_*` values).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShowState {
    Hide,
    #[default]
    Normal,
    ShowMinimized,
    Maximized,
    ShowNoActivate,
    Show,
    Minimize,
    ShowMinNoActive,
    ShowNa,
    Restore,
    ShowDefault,
}

impl ShowState {
    const ALL: [(ShowState, &'static str); 11] = [
        (ShowState::Hide, "hide"),
        (ShowState::Normal, "normal"),
        (ShowState::ShowMinimized, "show-minimized"),
        (ShowState::Maximized, "maximized"),
        (ShowState::ShowNoActivate, "show-no-activate"),
        (ShowState::Show, "show"),
        (ShowState::Minimize, "minimize"),
        (ShowState::ShowMinNoActive, "show-min-no-active"),
        (ShowState::ShowNa, "show-na"),
        (ShowState::Restore, "restore"),
        (ShowState::ShowDefault, "show-default"),
    ];

    /// The `nShowFlag` value passed to `AU3_Run*`.
    pub fn as_raw(self) -> i32 {
        match self {
            ShowState::Hide => 0,
            ShowState::Normal => 1,
            ShowState::ShowMinimized => 2,
            ShowState::Maximized => 3,
            ShowState::ShowNoActivate => 4,
            ShowState::Show => 5,
            ShowState::Minimize => 6,
            ShowState::ShowMinNoActive => 7,
            ShowState::ShowNa => 8,
            ShowState::Restore => 9,
            ShowState::ShowDefault => 10,
        }
    }
}

impl TryFrom<i32> for ShowState {
    type Error = AutoItError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        ShowState::ALL
            .iter()
            .map(|(state, _)| *state)
            .find(|state| state.as_raw() == raw)
            .ok_or_else(|| AutoItError::InvalidArgument(format!("unknown show flag {raw}")))
    }
}

impl FromStr for ShowState {
    type Err = AutoItError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(raw) = s.parse::<i32>() {
            return ShowState::try_from(raw);
        }
        ShowState::ALL
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s))
            .map(|(state, _)| *state)
            .ok_or_else(|| AutoItError::InvalidArgument(format!("unknown show state '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Logon mode
// ---------------------------------------------------------------------------

/// Profile / credential handling for `RunAs` launches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogonMode {
    /// Do not load the user profile.
    NoProfile,
    /// Load the user profile.
    #[default]
    LoadProfile,
    /// Use the credentials for network access only.
    NetCredentialsOnly,
}

impl LogonMode {
    pub fn as_raw(self) -> i32 {
        match self {
            LogonMode::NoProfile => 0,
            LogonMode::LoadProfile => 1,
            LogonMode::NetCredentialsOnly => 2,
        }
    }
}

impl TryFrom<i32> for LogonMode {
    type Error = AutoItError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(LogonMode::NoProfile),
            1 => Ok(LogonMode::LoadProfile),
            2 => Ok(LogonMode::NetCredentialsOnly),
            _ => Err(AutoItError::InvalidArgument(format!("unknown logon flag {raw}"))),
        }
    }
}

impl FromStr for LogonMode {
    type Err = AutoItError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "0" | "no-profile" => Ok(LogonMode::NoProfile),
            "1" | "load-profile" => Ok(LogonMode::LoadProfile),
            "2" | "net-credentials-only" => Ok(LogonMode::NetCredentialsOnly),
            _ => Err(AutoItError::InvalidArgument(format!("unknown logon mode '{s}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Process priority class, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Idle,
    BelowNormal,
    Normal,
    AboveNormal,
    High,
    /// Use with caution, may make the system unstable.
    Realtime,
}

impl Priority {
    pub const ALL: [Priority; 6] = [
        Priority::Idle,
        Priority::BelowNormal,
        Priority::Normal,
        Priority::AboveNormal,
        Priority::High,
        Priority::Realtime,
    ];

    pub fn as_raw(self) -> i32 {
        self as i32
    }

    fn name(self) -> &'static str {
        match self {
            Priority::Idle => "idle",
            Priority::BelowNormal => "below-normal",
            Priority::Normal => "normal",
            Priority::AboveNormal => "above-normal",
            Priority::High => "high",
            Priority::Realtime => "realtime",
        }
    }
}

impl TryFrom<i32> for Priority {
    type Error = AutoItError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        usize::try_from(raw)
            .ok()
            .and_then(|idx| Priority::ALL.get(idx).copied())
            .ok_or_else(|| AutoItError::InvalidArgument(format!("priority {raw} not in 0..=5")))
    }
}

impl FromStr for Priority {
    type Err = AutoItError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(raw) = s.parse::<i32>() {
            return Priority::try_from(raw);
        }
        Priority::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| AutoItError::InvalidArgument(format!("unknown priority '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Shutdown flags
// ---------------------------------------------------------------------------

/// Bit set passed unchanged to `AU3_Shutdown`.
///
/// `LOGOFF` is the empty set; combine the rest with `|`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShutdownFlags(pub i32);

impl ShutdownFlags {
    pub const LOGOFF: ShutdownFlags = ShutdownFlags(0);
    pub const SHUTDOWN: ShutdownFlags = ShutdownFlags(1);
    pub const REBOOT: ShutdownFlags = ShutdownFlags(2);
    pub const FORCE: ShutdownFlags = ShutdownFlags(4);
    pub const POWER_DOWN: ShutdownFlags = ShutdownFlags(8);

    const NAMED: [(ShutdownFlags, &'static str); 4] = [
        (ShutdownFlags::SHUTDOWN, "shutdown"),
        (ShutdownFlags::REBOOT, "reboot"),
        (ShutdownFlags::FORCE, "force"),
        (ShutdownFlags::POWER_DOWN, "power-down"),
    ];

    pub fn bits(self) -> i32 {
        self.0
    }

    /// True when every bit of `other` is set in `self`.
    pub fn contains(self, other: ShutdownFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ShutdownFlags {
    type Output = ShutdownFlags;

    fn bitor(self, rhs: ShutdownFlags) -> ShutdownFlags {
        ShutdownFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ShutdownFlags {
    fn bitor_assign(&mut self, rhs: ShutdownFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ShutdownFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("logoff");
        }
        let mut parts: Vec<String> = Vec::new();
        let mut known = 0;
        for (flag, name) in ShutdownFlags::NAMED {
            if self.contains(flag) {
                parts.push(name.to_owned());
                known |= flag.0;
            }
        }
        let unknown = self.0 & !known;
        if unknown != 0 {
            parts.push(format!("0x{unknown:X}"));
        }
        f.write_str(&parts.join("|"))
    }
}

/// Parses a single flag name or a raw integer.
impl FromStr for ShutdownFlags {
    type Err = AutoItError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(raw) = s.parse::<i32>() {
            return Ok(ShutdownFlags(raw));
        }
        if s.eq_ignore_ascii_case("logoff") {
            return Ok(ShutdownFlags::LOGOFF);
        }
        ShutdownFlags::NAMED
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s))
            .map(|(flag, _)| *flag)
            .ok_or_else(|| AutoItError::InvalidArgument(format!("unknown shutdown flag '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Option structs
// ---------------------------------------------------------------------------

/// Account used by `run_as` / `run_as_wait`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub domain: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        user: impl Into<String>,
        domain: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            domain: domain.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("domain", &self.domain)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Options shared by every launch operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Working directory; `None` lets AutoItX use the current directory.
    pub working_dir: Option<PathBuf>,
    pub show: ShowState,
}

impl RunOptions {
    pub fn with_show(show: ShowState) -> Self {
        Self {
            show,
            ..Self::default()
        }
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Options for `run_as` / `run_as_wait`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunAsOptions {
    pub logon: LogonMode,
    #[serde(flatten)]
    pub run: RunOptions,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

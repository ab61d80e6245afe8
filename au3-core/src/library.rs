//! AutoItX DLL loader.
//!
//! [`AutoItLibrary`] wraps `LoadLibraryW` / `GetProcAddress` / `FreeLibrary`
//! and resolves every `AU3_*` export the facade needs into a typed
//! `extern "system"` function pointer up front, so a missing export is
//! reported at load time rather than on first use.
//!
//! On non-Windows targets the type is uninhabited and
//! [`AutoItLibrary::load`] always fails with
//! [`AutoItError::UnsupportedPlatform`].

pub use imp::AutoItLibrary;

#[cfg(windows)]
mod imp {
    use std::path::PathBuf;

    use windows::core::{PCSTR, PCWSTR};
    use windows::Win32::Foundation::{FreeLibrary, HMODULE};
    use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};

    use crate::config::LibraryConfig;
    use crate::errors::AutoItError;
    use crate::native::{Au3Api, NativeAccount};
    use crate::wide::WideString;

    type InitFn = unsafe extern "system" fn();
    type ErrorFn = unsafe extern "system" fn() -> i32;
    type RunFn = unsafe extern "system" fn(*const u16, *const u16, i32) -> i32;
    type RunAsFn = unsafe extern "system" fn(
        *const u16,
        *const u16,
        *const u16,
        i32,
        *const u16,
        *const u16,
        i32,
    ) -> i32;
    type ProcessFn = unsafe extern "system" fn(*const u16) -> i32;
    type ProcessIntFn = unsafe extern "system" fn(*const u16, i32) -> i32;
    type ShutdownFn = unsafe extern "system" fn(i32) -> i32;

    struct EntryPoints {
        error: ErrorFn,
        run: RunFn,
        run_wait: RunFn,
        run_as: RunAsFn,
        run_as_wait: RunAsFn,
        process_close: ProcessFn,
        process_exists: ProcessFn,
        process_set_priority: ProcessIntFn,
        process_wait: ProcessIntFn,
        process_wait_close: ProcessIntFn,
        shutdown: ShutdownFn,
    }

    /// A loaded AutoItX DLL with all process-management exports resolved.
    pub struct AutoItLibrary {
        module: HMODULE,
        path: PathBuf,
        entry: EntryPoints,
    }

    // The module handle and export addresses are process-wide and never
    // tied to the loading thread; exclusive access is enforced by `&mut self`.
    unsafe impl Send for AutoItLibrary {}

    /// Resolve `name` (NUL-terminated) and reinterpret it as `F`.
    ///
    /// # Safety
    ///
    /// `F` must be the exact `extern "system"` signature of the export.
    unsafe fn resolve<F: Copy>(module: HMODULE, name: &'static str) -> Result<F, AutoItError> {
        debug_assert!(name.ends_with('\0'));
        let symbol = &name[..name.len() - 1];
        match unsafe { GetProcAddress(module, PCSTR(name.as_ptr())) } {
            Some(proc) => {
                debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of_val(&proc));
                Ok(unsafe { std::mem::transmute_copy::<_, F>(&proc) })
            }
            None => Err(AutoItError::MissingEntryPoint(symbol)),
        }
    }

    impl AutoItLibrary {
        /// Load the DLL named by `config`, resolve its exports and call
        /// `AU3_Init`.
        pub fn load(config: &LibraryConfig) -> Result<Self, AutoItError> {
            let wide_path = WideString::from_path(&config.dll_path)?;
            let module = unsafe { LoadLibraryW(PCWSTR(wide_path.as_ptr())) }.map_err(|e| {
                AutoItError::LibraryLoadError(format!(
                    "LoadLibraryW({}) failed: {e}",
                    config.dll_path.display()
                ))
            })?;

            let entry = match unsafe { Self::resolve_all(module) } {
                Ok(entry) => entry,
                Err(e) => {
                    let _ = unsafe { FreeLibrary(module) };
                    return Err(e);
                }
            };

            log::info!("loaded AutoItX from {}", config.dll_path.display());

            Ok(Self {
                module,
                path: config.dll_path.clone(),
                entry,
            })
        }

        unsafe fn resolve_all(module: HMODULE) -> Result<EntryPoints, AutoItError> {
            let init: InitFn = unsafe { resolve(module, "AU3_Init\0")? };
            let entry = unsafe {
                EntryPoints {
                    error: resolve(module, "AU3_error\0")?,
                    run: resolve(module, "AU3_Run\0")?,
                    run_wait: resolve(module, "AU3_RunWait\0")?,
                    run_as: resolve(module, "AU3_RunAs\0")?,
                    run_as_wait: resolve(module, "AU3_RunAsWait\0")?,
                    process_close: resolve(module, "AU3_ProcessClose\0")?,
                    process_exists: resolve(module, "AU3_ProcessExists\0")?,
                    process_set_priority: resolve(module, "AU3_ProcessSetPriority\0")?,
                    process_wait: resolve(module, "AU3_ProcessWait\0")?,
                    process_wait_close: resolve(module, "AU3_ProcessWaitClose\0")?,
                    shutdown: resolve(module, "AU3_Shutdown\0")?,
                }
            };
            unsafe { init() };
            Ok(entry)
        }
    }

    impl Drop for AutoItLibrary {
        fn drop(&mut self) {
            if let Err(e) = unsafe { FreeLibrary(self.module) } {
                log::warn!("FreeLibrary({}) failed: {e}", self.path.display());
            }
        }
    }

    impl Au3Api for AutoItLibrary {
        fn run(&mut self, program: &WideString, dir: &WideString, show: i32) -> i32 {
            unsafe { (self.entry.run)(program.as_ptr(), dir.as_ptr(), show) }
        }

        fn run_wait(&mut self, program: &WideString, dir: &WideString, show: i32) -> i32 {
            unsafe { (self.entry.run_wait)(program.as_ptr(), dir.as_ptr(), show) }
        }

        fn run_as(
            &mut self,
            account: &NativeAccount,
            logon: i32,
            program: &WideString,
            dir: &WideString,
            show: i32,
        ) -> i32 {
            unsafe {
                (self.entry.run_as)(
                    account.user.as_ptr(),
                    account.domain.as_ptr(),
                    account.password.as_ptr(),
                    logon,
                    program.as_ptr(),
                    dir.as_ptr(),
                    show,
                )
            }
        }

        fn run_as_wait(
            &mut self,
            account: &NativeAccount,
            logon: i32,
            program: &WideString,
            dir: &WideString,
            show: i32,
        ) -> i32 {
            unsafe {
                (self.entry.run_as_wait)(
                    account.user.as_ptr(),
                    account.domain.as_ptr(),
                    account.password.as_ptr(),
                    logon,
                    program.as_ptr(),
                    dir.as_ptr(),
                    show,
                )
            }
        }

        fn process_close(&mut self, process: &WideString) -> i32 {
            unsafe { (self.entry.process_close)(process.as_ptr()) }
        }

        fn process_exists(&mut self, process: &WideString) -> i32 {
            unsafe { (self.entry.process_exists)(process.as_ptr()) }
        }

        fn process_set_priority(&mut self, process: &WideString, priority: i32) -> i32 {
            unsafe { (self.entry.process_set_priority)(process.as_ptr(), priority) }
        }

        fn process_wait(&mut self, process: &WideString, timeout_secs: i32) -> i32 {
            unsafe { (self.entry.process_wait)(process.as_ptr(), timeout_secs) }
        }

        fn process_wait_close(&mut self, process: &WideString, timeout_secs: i32) -> i32 {
            unsafe { (self.entry.process_wait_close)(process.as_ptr(), timeout_secs) }
        }

        fn shutdown(&mut self, flags: i32) -> i32 {
            unsafe { (self.entry.shutdown)(flags) }
        }

        fn error(&mut self) -> i32 {
            unsafe { (self.entry.error)() }
        }
    }
}

#[cfg(not(windows))]
mod imp {
    use std::convert::Infallible;

    use crate::config::LibraryConfig;
    use crate::errors::AutoItError;
    use crate::native::{Au3Api, NativeAccount};
    use crate::wide::WideString;

    /// Placeholder on platforms without AutoItX; cannot be constructed.
    pub struct AutoItLibrary {
        never: Infallible,
    }

    impl AutoItLibrary {
        pub fn load(config: &LibraryConfig) -> Result<Self, AutoItError> {
            log::debug!(
                "refusing to load {} on a non-Windows target",
                config.dll_path.display()
            );
            Err(AutoItError::UnsupportedPlatform)
        }
    }

    impl Au3Api for AutoItLibrary {
        fn run(&mut self, _: &WideString, _: &WideString, _: i32) -> i32 {
            match self.never {}
        }

        fn run_wait(&mut self, _: &WideString, _: &WideString, _: i32) -> i32 {
            match self.never {}
        }

        fn run_as(
            &mut self,
            _: &NativeAccount,
            _: i32,
            _: &WideString,
            _: &WideString,
            _: i32,
        ) -> i32 {
            match self.never {}
        }

        fn run_as_wait(
            &mut self,
            _: &NativeAccount,
            _: i32,
            _: &WideString,
            _: &WideString,
            _: i32,
        ) -> i32 {
            match self.never {}
        }

        fn process_close(&mut self, _: &WideString) -> i32 {
            match self.never {}
        }

        fn process_exists(&mut self, _: &WideString) -> i32 {
            match self.never {}
        }

        fn process_set_priority(&mut self, _: &WideString, _: i32) -> i32 {
            match self.never {}
        }

        fn process_wait(&mut self, _: &WideString, _: i32) -> i32 {
            match self.never {}
        }

        fn process_wait_close(&mut self, _: &WideString, _: i32) -> i32 {
            match self.never {}
        }

        fn shutdown(&mut self, _: i32) -> i32 {
            match self.never {}
        }

        fn error(&mut self) -> i32 {
            match self.never {}
        }
    }

}

use std::ffi::{c_void, CStr};

use anyhow::{bail, Context, Result};
use libc::{c_int, c_long};

use props::{Backup, PatchTarget, Trampoline, UnloadGate};

use crate::dlfcn::{dlopen_loaded, dlsym};

const LIBC: &CStr = c"libc.so";

const MIN_API_VERSION: c_long = 1;

/// Redirects `target` to `replacement`, storing an entry to the original
/// in `backup`. Returns 0 on success.
pub type HookFunction = unsafe extern "C" fn(
    target: *mut c_void,
    replacement: *mut c_void,
    backup: *mut *mut c_void,
) -> c_int;

/// Services the host hands over when the library is loaded.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HostApi {
    pub version: c_long,
    pub hook_function: Option<HookFunction>,
    pub allow_unload: *mut c_int,
}

// `allow_unload` points into the host, which outlives this library.
unsafe impl Send for HostApi {}

impl HostApi {
    pub fn is_valid(&self) -> bool {
        if self.version < MIN_API_VERSION {
            return false
        }

        self.hook_function.is_some()
    }

    pub fn patcher(&self) -> Option<HostPatcher> {
        self.hook_function.map(|hook| HostPatcher { hook })
    }

    pub fn unload_flag(&self) -> UnloadFlag {
        UnloadFlag(self.allow_unload)
    }
}

/// Patches entry points of the process's libc through the host.
pub struct HostPatcher {
    hook: HookFunction,
}

impl PatchTarget for HostPatcher {
    fn install(&self, symbol: &CStr, replacement: *const c_void, backup: &Backup) -> Result<Trampoline> {
        let libc = dlopen_loaded(LIBC)?;
        let target = dlsym(&libc, symbol)?;

        patch(self.hook, target, replacement, backup)
    }
}

/// The host writes the original into `backup` before the patch is live.
fn patch(hook: HookFunction, target: *mut c_void, replacement: *const c_void, backup: &Backup) -> Result<Trampoline> {
    let res = unsafe { hook(target, replacement as *mut c_void, backup.as_mut_ptr()) };

    if res != 0 {
        bail!("hook function returned {res}");
    }

    backup.load().context("hook function returned no trampoline")
}

pub struct UnloadFlag(*mut c_int);

impl UnloadGate for UnloadFlag {
    fn set_unload_allowed(&self, allowed: bool) {
        if let Some(flag) = unsafe { self.0.as_mut() } {
            *flag = allowed as c_int;
        }
    }
}

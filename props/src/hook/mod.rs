//! Redirection of the native property lookups.
//!
//! Exactly one entry point is redirected per process, chosen by API level:
//!
//! | API       | entry point                        | strategy        |
//! |-----------|------------------------------------|-----------------|
//! | 30 and up | `__system_property_read_callback`  | [`Strategy::ReadCallback`] |
//! | 26 ..= 29 | `__system_property_find`           | [`Strategy::Find`] |
//! | below 26  | `__system_property_get`            | [`Strategy::DirectGet`] |
//!
//! The replacements are plain `extern "C"` functions without user data, so
//! the context and the trampoline are parked in statics at install time.
//! The trampoline slot is handed to the patcher, which fills it before the
//! redirect goes live.

use std::ffi::{c_void, CStr};
use std::mem;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

use anyhow::{bail, Context, Result};
use common::lazy::LateInit;
use libc::{c_char, c_int};

use crate::context::PropContext;
use crate::info;

pub mod find;
pub mod get;
pub mod read_callback;

/// Opaque native property handle.
#[repr(C)]
pub struct PropInfo {
    _private: [u8; 0],
}

pub type PropCallback = unsafe extern "C" fn(
    cookie: *mut c_void,
    name: *const c_char,
    value: *const c_char,
    serial: u32,
);

pub type FindFn = unsafe extern "C" fn(name: *const c_char) -> *const PropInfo;

pub type ReadCallbackFn = unsafe extern "C" fn(
    pi: *const PropInfo,
    callback: Option<PropCallback>,
    cookie: *mut c_void,
);

pub type GetFn = unsafe extern "C" fn(name: *const c_char, value: *mut c_char) -> c_int;

/// Entry to the original, un-redirected implementation.
#[derive(Debug, Clone, Copy)]
pub struct Trampoline(NonNull<c_void>);

impl Trampoline {
    pub fn new(addr: *mut c_void) -> Option<Self> {
        NonNull::new(addr).map(Self)
    }

    pub fn addr(&self) -> *mut c_void {
        self.0.as_ptr()
    }

    /// # Safety
    /// `F` must be the function pointer type of the redirected symbol.
    unsafe fn cast<F: Copy>(&self) -> F {
        debug_assert_eq!(mem::size_of::<F>(), mem::size_of::<*mut c_void>());
        mem::transmute_copy(&self.0)
    }
}

/// Where a patcher stores the entry to the original.
///
/// Read lock-free by the replacements, so a redirect that fires while
/// [`PatchTarget::install`] is still running already finds the original.
pub struct Backup(AtomicPtr<c_void>);

impl Backup {
    #[allow(clippy::new_without_default)]
    pub const fn new() -> Self {
        Self(AtomicPtr::new(ptr::null_mut()))
    }

    /// The slot as a `void **`, for hook functions that write the backup
    /// themselves.
    pub fn as_mut_ptr(&self) -> *mut *mut c_void {
        self.0.as_ptr()
    }

    pub fn store(&self, trampoline: Trampoline) {
        self.0.store(trampoline.addr(), Ordering::Release);
    }

    pub fn load(&self) -> Option<Trampoline> {
        Trampoline::new(self.0.load(Ordering::Acquire))
    }

    /// # Safety
    /// `F` must be the function pointer type of the redirected symbol.
    unsafe fn original<F: Copy>(&self) -> Option<F> {
        self.load().map(|trampoline| trampoline.cast())
    }
}

/// The binary-patching capability: redirect `symbol` to `replacement`.
///
/// The original must be reachable through `backup` before the redirect can
/// be hit; the returned trampoline is the same entry.
pub trait PatchTarget {
    fn install(&self, symbol: &CStr, replacement: *const c_void, backup: &Backup) -> Result<Trampoline>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ReadCallback,
    Find,
    DirectGet,
}

impl Strategy {
    pub fn for_api_level(api: i32) -> Self {
        match api {
            30.. => Self::ReadCallback,
            26..=29 => Self::Find,
            _ => Self::DirectGet,
        }
    }

    pub fn symbol(self) -> &'static CStr {
        match self {
            Self::ReadCallback => c"__system_property_read_callback",
            Self::Find => c"__system_property_find",
            Self::DirectGet => c"__system_property_get",
        }
    }

    fn replacement(self) -> *const c_void {
        match self {
            Self::ReadCallback => read_callback::replacement as ReadCallbackFn as *const c_void,
            Self::Find => find::replacement as FindFn as *const c_void,
            Self::DirectGet => get::replacement as GetFn as *const c_void,
        }
    }

    fn backup(self) -> &'static Backup {
        match self {
            Self::ReadCallback => &read_callback::ORIGINAL,
            Self::Find => &find::ORIGINAL,
            Self::DirectGet => &get::ORIGINAL,
        }
    }
}

static CONTEXT: LateInit<&'static PropContext> = LateInit::new();

pub(crate) fn context() -> Option<&'static PropContext> {
    CONTEXT.get().copied()
}

/// Redirects the entry point of `strategy`. Only one strategy can be
/// installed per process; further calls fail without patching anything.
pub fn install(ctx: &'static PropContext, strategy: Strategy, patcher: &dyn PatchTarget) -> Result<()> {
    if CONTEXT.init(ctx).is_err() {
        bail!("interception is already installed in this process");
    }

    let symbol = strategy.symbol();
    let backup = strategy.backup();
    let trampoline = patcher.install(symbol, strategy.replacement(), backup)
        .with_context(|| format!("failed to redirect {}", symbol.to_string_lossy()))?;

    match backup.load() {
        Some(stored) if stored.addr() != trampoline.addr() => {
            bail!("patcher stored {:p} but returned {:p}", stored.addr(), trampoline.addr())
        }
        Some(_) => {}
        None => backup.store(trampoline),
    }

    info!("{:?} interception installed on {}", strategy, symbol.to_string_lossy());

    Ok(())
}

/// Borrows a C string as UTF-8; `None` for null or non-UTF-8 input.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn as_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None
    }

    CStr::from_ptr(ptr).to_str().ok()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_by_api_level() {
        assert_eq!(Strategy::for_api_level(21), Strategy::DirectGet);
        assert_eq!(Strategy::for_api_level(25), Strategy::DirectGet);
        assert_eq!(Strategy::for_api_level(26), Strategy::Find);
        assert_eq!(Strategy::for_api_level(29), Strategy::Find);
        assert_eq!(Strategy::for_api_level(30), Strategy::ReadCallback);
        assert_eq!(Strategy::for_api_level(35), Strategy::ReadCallback);
    }

    #[test]
    fn trampoline_rejects_null() {
        assert!(Trampoline::new(std::ptr::null_mut()).is_none());
    }

    #[test]
    fn backup_slot_is_writable_as_void_pointer() {
        let backup = Backup::new();
        assert!(backup.load().is_none());

        let original = fake::find as FindFn as *mut c_void;
        unsafe { *backup.as_mut_ptr() = original };

        assert_eq!(backup.load().map(|trampoline| trampoline.addr()), Some(original));

        let find: FindFn = unsafe { backup.original() }.unwrap();
        assert_eq!(unsafe { find(c"ro.build.type".as_ptr()) }, fake::system_handle("ro.build.type"));
    }
}

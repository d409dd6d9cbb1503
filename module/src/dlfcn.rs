use std::ffi::{c_void, CStr};

use anyhow::{bail, Result};

fn dlerror(what: &str) -> Result<()> {
    let err = unsafe { libc::dlerror() };

    if err.is_null() {
        bail!("{what} failed");
    }

    let err = unsafe { CStr::from_ptr(err).to_string_lossy() };
    bail!("{what} failed: {err}");
}

pub struct LibraryHandle(*mut c_void);

impl Drop for LibraryHandle {
    fn drop(&mut self) {
        unsafe { libc::dlclose(self.0) };
    }
}

/// Opens a library already mapped into the process.
pub fn dlopen_loaded(library: &CStr) -> Result<LibraryHandle> {
    let handle = unsafe {
        libc::dlopen(library.as_ptr(), libc::RTLD_NOW | libc::RTLD_NOLOAD)
    };

    if handle.is_null() {
        dlerror("dlopen")?;
    }

    Ok(LibraryHandle(handle))
}

pub fn dlsym(handle: &LibraryHandle, symbol: &CStr) -> Result<*mut c_void> {
    let addr = unsafe { libc::dlsym(handle.0, symbol.as_ptr()) };

    if addr.is_null() {
        dlerror("dlsym")?;
    }

    Ok(addr)
}

//! `__system_property_get`, before API 26.

use std::ptr;

use libc::{c_char, c_int};

use super::{as_str, Backup, GetFn};
use crate::context::PropContext;
use crate::layout::PROP_VALUE_MAX;
use crate::warn;

pub(super) static ORIGINAL: Backup = Backup::new();

pub(super) unsafe extern "C" fn replacement(name: *const c_char, value: *mut c_char) -> c_int {
    let Some(original) = ORIGINAL.original::<GetFn>() else {
        if !value.is_null() {
            *value = 0;
        }
        return 0
    };

    match super::context() {
        Some(ctx) => intercept(ctx, original, name, value),
        None => original(name, value),
    }
}

/// Runs the original for every name, then overwrites the caller's buffer
/// when `name` is overridden. Returns the length of what the buffer holds.
///
/// # Safety
/// `value` must be null or point to at least `PROP_VALUE_MAX` writable
/// bytes, and `original` must be safe to call with the same arguments.
pub unsafe fn intercept(ctx: &PropContext, original: GetFn, name: *const c_char, value: *mut c_char) -> c_int {
    let len = original(name, value);

    if value.is_null() {
        return len
    }

    let Some(record) = as_str(name).and_then(|name| ctx.store().find(name)) else {
        return len
    };

    let bytes = record.value().as_bytes();
    if bytes.len() >= PROP_VALUE_MAX {
        warn!("override of {} does not fit the caller's buffer", record.name());
        return len
    }

    ptr::copy_nonoverlapping(bytes.as_ptr(), value as *mut u8, bytes.len());
    *value.add(bytes.len()) = 0;

    bytes.len() as c_int
}

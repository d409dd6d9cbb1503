//! `__system_property_read_callback`, API 30 and later.
//!
//! Handles come from the untouched resolver, so every handle seen here is
//! genuine; the override is substituted at read time instead.

use std::ffi::c_void;


use super::{Backup, PropCallback, PropInfo, ReadCallbackFn};
use crate::context::PropContext;
use crate::shadow::ShadowRecord;

pub(super) static ORIGINAL: Backup = Backup::new();

pub(super) unsafe extern "C" fn replacement(
    pi: *const PropInfo,
    callback: Option<PropCallback>,
    cookie: *mut c_void,
) {
    let Some(original) = ORIGINAL.original::<ReadCallbackFn>() else {
        return
    };

    match super::context() {
        Some(ctx) => intercept(ctx, original, pi, callback, cookie),
        None => original(pi, callback, cookie),
    }
}

/// # Safety
/// `pi` must be null or a live property handle, and `original` must be safe
/// to call with the same arguments.
pub unsafe fn intercept(
    ctx: &PropContext,
    original: ReadCallbackFn,
    pi: *const PropInfo,
    callback: Option<PropCallback>,
    cookie: *mut c_void,
) {
    match (callback, substitute(ctx, pi)) {
        (Some(callback), Some(shadow)) => {
            callback(cookie, shadow.name().as_ptr(), shadow.value().as_ptr(), shadow.serial());
        }
        _ => original(pi, callback, cookie),
    }
}

unsafe fn substitute<'a>(ctx: &'a PropContext, pi: *const PropInfo) -> Option<&'a ShadowRecord> {
    if pi.is_null() {
        return None
    }

    let shadows = ctx.shadows()?;

    if let Some(shadow) = shadows.by_handle(pi) {
        return Some(shadow)
    }

    let name = shadows.layout().read_name(pi as *const u8).to_str().ok()?;
    let shadow = shadows.get(name)?;

    // a genuine handle means the system has a value
    if ctx.prefer_system() {
        ctx.yield_to_system(name);
        return None
    }

    if ctx.is_yielding(name) {
        return None
    }

    Some(shadow)
}

//! `__system_property_find`, API 26 to 29.
//!
//! Overridden names resolve to their shadow record, which the untouched
//! native readers then dereference. This is also where "prefer system" is
//! decided: a genuine handle wins and the name joins the yield set.

use std::ptr;

use libc::c_char;

use super::{as_str, Backup, FindFn, PropInfo};
use crate::context::PropContext;
use crate::{error, debug};

pub(super) static ORIGINAL: Backup = Backup::new();

pub(super) unsafe extern "C" fn replacement(name: *const c_char) -> *const PropInfo {
    let Some(original) = ORIGINAL.original::<FindFn>() else {
        return ptr::null()
    };

    match super::context() {
        Some(ctx) => intercept(ctx, original, name),
        None => original(name),
    }
}

/// # Safety
/// `name` must be null or a NUL-terminated string, and `original` must be
/// safe to call with it.
pub unsafe fn intercept(ctx: &PropContext, original: FindFn, name: *const c_char) -> *const PropInfo {
    let Some(key) = as_str(name) else {
        return original(name)
    };

    if ctx.store().find(key).is_none() {
        return original(name)
    }

    // always resolved: tells whether a genuine value exists
    let system = original(name);

    if ctx.prefer_system() && !system.is_null() {
        ctx.yield_to_system(key);
        return system
    }

    match ctx.shadows().and_then(|shadows| shadows.get(key)) {
        Some(shadow) => {
            if ctx.stop_yielding(key) {
                shadow.restamp();
            }

            debug!("find {} -> shadow {:p}", key, shadow.as_ptr());
            shadow.as_ptr()
        }
        None => {
            error!("no shadow record for overridden property {}, using the system handle", key);
            system
        }
    }
}

use crate::lazy::Lazy;

/// Value buffer size of a native property, trailing NUL included.
pub const PROP_VALUE_MAX: usize = 92;

/// Assumed when `ro.build.version.sdk` can't be read.
pub const DEFAULT_SDK_VERSION: i32 = 30;

static SDK_VERSION: Lazy<i32> = Lazy::new(|| {
    parse_sdk_version(getprop("ro.build.version.sdk").as_deref())
});

#[cfg(target_os = "android")]
extern "C" {
    fn __system_property_get(name: *const libc::c_char, value: *mut libc::c_char) -> libc::c_int;
}

#[cfg(target_os = "android")]
pub fn getprop(name: &str) -> Option<String> {
    use std::ffi::{CStr, CString};

    let name = CString::new(name).ok()?;
    let mut buffer = [0u8; PROP_VALUE_MAX];

    let len = unsafe {
        __system_property_get(name.as_ptr(), buffer.as_mut_ptr() as _)
    };

    if len <= 0 {
        return None
    }

    let prop = CStr::from_bytes_until_nul(&buffer).ok()?;
    Some(prop.to_string_lossy().into())
}

#[cfg(not(target_os = "android"))]
pub fn getprop(_name: &str) -> Option<String> {
    None
}

pub fn sdk_version() -> i32 {
    *SDK_VERSION
}

fn parse_sdk_version(raw: Option<&str>) -> i32 {
    raw.and_then(|value| value.trim().parse().ok())
        .filter(|level| *level > 0)
        .unwrap_or(DEFAULT_SDK_VERSION)
}

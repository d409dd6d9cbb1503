use std::cell::Cell;
use std::ffi::{c_void, CStr, CString};
use std::mem;
use std::ptr;

use anyhow::Result;
use libc::{c_char, c_int};

use props::hook::GetFn;
use props::layout::PROP_VALUE_MAX;
use props::{Activation, ActivationState, Backup, Loader, PatchTarget, PropContext, Strategy, Trampoline, UnloadGate};

const API_LEVEL: i32 = 23;

const SYSTEM: [(&str, &str); 2] = [("ro.product.brand", "Google"), ("ro.build.type", "user")];

unsafe extern "C" fn system_get(name: *const c_char, value: *mut c_char) -> c_int {
    let name = CStr::from_ptr(name).to_str().unwrap();
    let found = SYSTEM.iter().find(|(key, _)| *key == name).map_or("", |(_, value)| *value);

    ptr::copy_nonoverlapping(found.as_ptr(), value as *mut u8, found.len());
    *value.add(found.len()) = 0;
    found.len() as c_int
}

fn read(get: GetFn, name: &CStr) -> (c_int, String) {
    let mut buffer = [0x7f as c_char; PROP_VALUE_MAX];

    let len = unsafe { get(name.as_ptr(), buffer.as_mut_ptr()) };
    let value = unsafe { CStr::from_ptr(buffer.as_ptr()) };

    (len, value.to_string_lossy().into())
}

/// Fills the backup first and reads a property before returning, the way a
/// live inline hook can be entered by another thread.
#[derive(Default)]
struct Patcher {
    symbol: Cell<Option<CString>>,
    replacement: Cell<usize>,
    during_install: Cell<Option<(c_int, String)>>,
}

impl PatchTarget for Patcher {
    fn install(&self, symbol: &CStr, replacement: *const c_void, backup: &Backup) -> Result<Trampoline> {
        self.symbol.set(Some(symbol.into()));
        self.replacement.set(replacement as usize);

        let original = system_get as GetFn as *mut c_void;
        unsafe { *backup.as_mut_ptr() = original };

        let get: GetFn = unsafe { mem::transmute(replacement) };
        self.during_install.set(Some(read(get, c"ro.build.type")));

        Ok(Trampoline::new(original).unwrap())
    }
}

#[derive(Default)]
struct Gate(Cell<Option<bool>>);

impl UnloadGate for Gate {
    fn set_unload_allowed(&self, allowed: bool) {
        self.0.set(Some(allowed));
    }
}

#[test]
fn targeted_process_reads_override() {
    let mut loader = Loader::new();
    loader.property("ro.product.brand", "Xiaomi");
    loader.property("ro.vendor.only", "override");
    loader.package("com.example.app");
    let ctx: &'static PropContext = Box::leak(Box::new(loader.finish()));

    let patcher = Patcher::default();
    let gate = Gate::default();
    let mut activation = Activation::new();
    activation.pre_specialize(Some(10123), Some("/data/data/com.example.app"));

    let state = activation.post_specialize(ctx, API_LEVEL, &patcher, &gate);
    assert_eq!(state, ActivationState::Active(Strategy::DirectGet));
    assert_eq!(gate.0.get(), Some(false));
    assert_eq!(patcher.symbol.take().as_deref(), Some(c"__system_property_get"));
    assert_eq!(patcher.during_install.take(), Some((4, "user".into())));

    let get: GetFn = unsafe { mem::transmute(patcher.replacement.get()) };

    assert_eq!(read(get, c"ro.product.brand"), (6, "Xiaomi".into()));
    assert_eq!(read(get, c"ro.vendor.only"), (8, "override".into()));
    assert_eq!(read(get, c"ro.build.type"), (4, "user".into()));
    assert_eq!(read(get, c"ro.nowhere"), (0, "".into()));
}

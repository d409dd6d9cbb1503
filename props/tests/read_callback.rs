use std::cell::Cell;
use std::ffi::{c_void, CStr};
use std::mem;
use std::sync::atomic::Ordering;
use std::sync::OnceLock;

use anyhow::Result;
use libc::c_char;

use props::hook::{PropCallback, PropInfo, ReadCallbackFn};
use props::layout::PropInfoLayout;
use props::shadow::ShadowIndex;
use props::store::serial_generation;
use props::{Activation, ActivationState, Backup, Loader, OverrideStore, PatchTarget, PropContext, Strategy, Trampoline, UnloadGate};

const API_LEVEL: i32 = 34;

fn system() -> &'static ShadowIndex {
    static SYSTEM: OnceLock<ShadowIndex> = OnceLock::new();

    SYSTEM.get_or_init(|| {
        let mut store = OverrideStore::new();
        store.put("ro.product.brand", "Google");
        store.put("ro.build.type", "user");
        ShadowIndex::build(&store, PropInfoLayout::SerialFirst).unwrap()
    })
}

unsafe extern "C" fn system_read_callback(pi: *const PropInfo, callback: Option<PropCallback>, cookie: *mut c_void) {
    let layout = PropInfoLayout::SerialFirst;
    let block = pi as *const u8;
    let serial = layout.serial(block).load(Ordering::Acquire);

    if let Some(callback) = callback {
        callback(cookie, layout.read_name(block).as_ptr(), layout.read_value(block).as_ptr(), serial);
    }
}

#[derive(Default)]
struct Seen {
    value: String,
    serial: u32,
}

unsafe extern "C" fn collect(cookie: *mut c_void, _name: *const c_char, value: *const c_char, serial: u32) {
    let seen = &mut *(cookie as *mut Seen);
    seen.value = CStr::from_ptr(value).to_string_lossy().into();
    seen.serial = serial;
}

#[derive(Default)]
struct Patcher(Cell<usize>);

impl PatchTarget for Patcher {
    fn install(&self, symbol: &CStr, replacement: *const c_void, _backup: &Backup) -> Result<Trampoline> {
        assert_eq!(symbol, c"__system_property_read_callback");
        self.0.set(replacement as usize);
        Ok(Trampoline::new(system_read_callback as ReadCallbackFn as *mut c_void).unwrap())
    }
}

struct Gate;

impl UnloadGate for Gate {
    fn set_unload_allowed(&self, allowed: bool) {
        assert!(!allowed);
    }
}

fn read(read_callback: ReadCallbackFn, name: &str) -> Seen {
    let mut seen = Seen::default();
    let pi = system().get(name).unwrap().as_ptr();

    unsafe { read_callback(pi, Some(collect), &mut seen as *mut Seen as _) };
    seen
}

#[test]
fn targeted_process_reads_override() {
    let mut loader = Loader::new();
    loader.property("ro.product.brand", "Xiaomi");
    loader.package("com.example.app");
    let ctx: &'static PropContext = Box::leak(Box::new(loader.finish()));

    let patcher = Patcher::default();
    let mut activation = Activation::new();
    activation.pre_specialize(Some(1010123), Some("/mnt/expand/0a1b-2c3d/user/10/com.example.app"));

    let state = activation.post_specialize(ctx, API_LEVEL, &patcher, &Gate);
    assert_eq!(state, ActivationState::Active(Strategy::ReadCallback));

    let read_callback: ReadCallbackFn = unsafe { mem::transmute(patcher.0.get()) };

    let seen = read(read_callback, "ro.product.brand");
    let record = ctx.store().find("ro.product.brand").unwrap();
    assert_eq!(seen.value, "Xiaomi");
    assert_eq!(serial_generation(seen.serial), record.serial());

    assert_eq!(read(read_callback, "ro.build.type").value, "user");
}

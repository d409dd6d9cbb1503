use std::ffi::CStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use ctor::ctor;
use libc::{c_char, c_int};
use log::{info, warn, LevelFilter};

use common::lazy::Lazy;
use common::properties::sdk_version;
use common::debug_select;
#[cfg(target_os = "android")]
use common::dump_tombstone_on_panic;
use props::{Activation, Loader, PropContext, UnloadGate};

use crate::abi::HostApi;
use crate::source::DirSource;

mod abi;
mod dlfcn;
mod source;

const CONFIG_PATH: &str = "/data/misc/mph/config";

struct ModuleContext {
    host: Option<HostApi>,
    props: Option<&'static PropContext>,
    activation: Activation,
}

impl ModuleContext {
    fn new() -> Self {
        Self {
            host: None,
            props: None,
            activation: Activation::new(),
        }
    }
}

static G_MODULE: Lazy<Mutex<ModuleContext>> = Lazy::new(|| Mutex::new(ModuleContext::new()));

fn module<'a>() -> MutexGuard<'a, ModuleContext> {
    G_MODULE.lock().unwrap_or_else(PoisonError::into_inner)
}

#[ctor]
fn init() {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(debug_select!(LevelFilter::Trace, LevelFilter::Info))
            .with_tag("MPH")
    );

    #[cfg(target_os = "android")]
    dump_tombstone_on_panic();
}

/// Called by the host once the library is mapped into zygote.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn mph_on_load(api: *const HostApi) -> bool {
    let Some(api) = (unsafe { api.as_ref() }) else {
        warn!("host api table is missing");
        return false
    };

    if !api.is_valid() {
        warn!("unsupported host api version {}", api.version);
        return false
    }

    let mut lock = module();
    lock.host.replace(*api);

    if lock.props.is_none() {
        let ctx = Loader::new().load(&DirSource::new(CONFIG_PATH));
        lock.props.replace(Box::leak(Box::new(ctx)));
    }

    // read while no property entry point is redirected
    info!("module loaded, api level {}", sdk_version());

    true
}

/// Called before specialization, and again after it, with the app data
/// directory of the process.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn mph_pre_specialize(uid: c_int, app_data_dir: *const c_char) {
    let app_data_dir = if app_data_dir.is_null() {
        None
    } else {
        unsafe { CStr::from_ptr(app_data_dir) }.to_str().ok()
    };

    module().activation.pre_specialize(Some(uid), app_data_dir);
}

/// `res` is 0 in the specialized app process and non-zero in zygote.
#[no_mangle]
pub extern "C" fn mph_post_specialize(res: c_int) {
    let mut lock = module();
    let ModuleContext { host, props, activation } = &mut *lock;

    let Some(host) = host else {
        warn!("post specialize before the module was loaded");
        return
    };

    let gate = host.unload_flag();

    let (Some(props), Some(patcher), 0) = (*props, host.patcher(), res) else {
        gate.set_unload_allowed(true);
        return
    };

    let state = activation.post_specialize(props, sdk_version(), &patcher, &gate);
    info!("{}: {:?}", activation.package(), state);
}

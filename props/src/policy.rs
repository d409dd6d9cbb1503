use crate::context::PropContext;
use crate::hook::{self, PatchTarget, Strategy};
use crate::layout::PropInfoLayout;
use crate::{debug, error, info, warn};

const DATA_ROOTS: [&str; 2] = ["/data/", "/mnt/expand/"];

const PER_USER_RANGE: i32 = 100000;

/// Package identifier of an app data directory: the last path segment of a
/// path under `/data/` or `/mnt/expand/`, empty for anything else.
pub fn package_from_data_dir(path: &str) -> &str {
    if !DATA_ROOTS.iter().any(|root| path.starts_with(root)) {
        return ""
    }

    path.rsplit('/').next().unwrap_or_default()
}

/// Host switch telling whether the library may be unloaded.
pub trait UnloadGate {
    fn set_unload_allowed(&self, allowed: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Unactivated,
    ShadowAllocated,
    Active(Strategy),
    Declined,
}

/// Per-process activation decision, driven by the specialize callbacks.
#[derive(Debug)]
pub struct Activation {
    uid: Option<i32>,
    package: String,
    state: ActivationState,
}

impl Default for Activation {
    fn default() -> Self {
        Self::new()
    }
}

impl Activation {
    pub fn new() -> Self {
        Self {
            uid: None,
            package: String::new(),
            state: ActivationState::Unactivated,
        }
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// Records who this process is about to become. Called before and after
    /// specialization; the latest call wins.
    pub fn pre_specialize(&mut self, uid: Option<i32>, app_data_dir: Option<&str>) {
        self.uid = uid;
        self.package = app_data_dir.map(package_from_data_dir).unwrap_or_default().into();

        debug!("pre specialize: uid={:?}, package={:?}", self.uid, self.package);
    }

    /// Decides once whether this process gets interception, and installs it.
    /// Later calls report the decision already taken.
    pub fn post_specialize(
        &mut self,
        ctx: &'static PropContext,
        api_level: i32,
        patcher: &dyn PatchTarget,
        gate: &dyn UnloadGate,
    ) -> ActivationState {
        if self.state != ActivationState::Unactivated {
            return self.state
        }

        if self.package.is_empty() || !ctx.store().has_target(&self.package) {
            debug!("{:?} is not a target, declining", self.package);
            return self.decline(gate)
        }

        let layout = PropInfoLayout::for_api_level(api_level);
        if let Err(err) = ctx.prepare(layout) {
            error!("refusing to intercept {}: {:#}", self.package, err);
            return self.decline(gate)
        }

        self.state = ActivationState::ShadowAllocated;

        match self.uid {
            Some(uid) => info!("install hook for {}:{}", uid / PER_USER_RANGE, self.package),
            None => info!("install hook for {}", self.package),
        }

        // must be in place before the first redirect exists
        gate.set_unload_allowed(false);

        let strategy = Strategy::for_api_level(api_level);
        match hook::install(ctx, strategy, patcher) {
            Ok(()) => self.state = ActivationState::Active(strategy),
            Err(err) => warn!("interception unavailable, native behavior kept: {:#}", err),
        }

        self.state
    }

    fn decline(&mut self, gate: &dyn UnloadGate) -> ActivationState {
        self.state = ActivationState::Declined;
        gate.set_unload_allowed(true);
        self.state
    }
}

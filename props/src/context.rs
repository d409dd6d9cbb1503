use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use common::lazy::LateInit;

use crate::debug;
use crate::layout::PropInfoLayout;
use crate::shadow::ShadowIndex;
use crate::store::OverrideStore;

/// Everything interception needs, built once per library load and shared
/// by reference with the activation policy and the installed hook.
pub struct PropContext {
    store: OverrideStore,
    prefer_system: bool,
    shadows: LateInit<ShadowIndex>,
    // names currently answered with the genuine system handle
    yielding: Mutex<HashSet<String>>,
}

impl PropContext {
    pub fn new(store: OverrideStore, prefer_system: bool) -> Self {
        Self {
            store,
            prefer_system,
            shadows: LateInit::new(),
            yielding: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &OverrideStore {
        &self.store
    }

    pub fn prefer_system(&self) -> bool {
        self.prefer_system
    }

    /// Allocates the shadow records. Repeated calls hand back the index
    /// built by the first one.
    pub fn prepare(&self, layout: PropInfoLayout) -> Result<&ShadowIndex> {
        if let Some(index) = self.shadows.get() {
            debug!("shadow records already prepared ({} entries)", index.len());
            return Ok(index)
        }

        layout.validate()?;
        let index = ShadowIndex::build(&self.store, layout)?;

        if self.shadows.init(index).is_err() {
            debug!("shadow records prepared concurrently, keeping the first index");
        }

        Ok(&*self.shadows)
    }

    pub fn shadows(&self) -> Option<&ShadowIndex> {
        self.shadows.get()
    }

    pub fn yield_to_system(&self, name: &str) {
        let mut lock = self.yielding();
        if !lock.contains(name) {
            lock.insert(name.into());
        }
    }

    /// Returns whether `name` was yielding before.
    pub fn stop_yielding(&self, name: &str) -> bool {
        self.yielding().remove(name)
    }

    pub fn is_yielding(&self, name: &str) -> bool {
        self.yielding().contains(name)
    }

    // A panic on another thread must not take property reads down with it.
    fn yielding(&self) -> MutexGuard<'_, HashSet<String>> {
        self.yielding.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

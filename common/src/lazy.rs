use std::ops::Deref;
use std::sync::OnceLock;

pub use once_cell::sync::Lazy;

/// A cell written once after startup, then read freely.
///
/// `Deref` panics on an uninitialized cell; code reachable from native
/// callers must use [`LateInit::get`] instead.
pub struct LateInit<T> {
    lock: OnceLock<T>
}

impl<T> LateInit<T> {
    #[allow(clippy::new_without_default)]
    pub const fn new() -> Self {
        Self { lock: OnceLock::new() }
    }

    pub fn init(&self, value: T) -> Result<(), T> {
        self.lock.set(value)
    }

    pub fn get(&self) -> Option<&T> {
        self.lock.get()
    }

    pub fn initialized(&self) -> bool {
        self.lock.get().is_some()
    }
}

impl<T> Deref for LateInit<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.lock.get().expect("use of uninitialized value")
    }
}

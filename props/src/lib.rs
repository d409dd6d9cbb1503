//! Per-process virtualization of native system properties.
//!
//! Configuration is loaded into a [`PropContext`] once per library load.
//! When a process specializes into a targeted package, [`Activation`]
//! allocates the shadow records and redirects one native lookup entry
//! point, chosen by API level; from then on overridden names read back the
//! configured values.

mod logs;

pub mod config;
pub mod context;
pub mod hook;
pub mod layout;
pub mod policy;
pub mod shadow;
pub mod store;

pub use config::{ConfigSource, Loader};
pub use context::PropContext;
pub use hook::{Backup, PatchTarget, Strategy, Trampoline};
pub use policy::{Activation, ActivationState, UnloadGate};
pub use store::{OverrideRecord, OverrideStore};

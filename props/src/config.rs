use anyhow::Result;

use crate::context::PropContext;
use crate::store::OverrideStore;
use crate::{debug, info, warn};

/// Property entry that turns on "prefer system" instead of overriding.
pub const PREFER_SYSTEM_ENTRY: &str = "prefer_system";

const RESERVED_MARKER: char = '.';

/// Where overrides and target packages come from.
pub trait ConfigSource {
    fn for_each_property(&self, handler: &mut dyn FnMut(&str, &str)) -> Result<()>;
    fn for_each_package(&self, handler: &mut dyn FnMut(&str)) -> Result<()>;
}

/// Builds the process context from configuration entries. Malformed entries
/// are skipped, never fatal.
#[derive(Debug, Default)]
pub struct Loader {
    store: OverrideStore,
    prefer_system: bool,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(&mut self, name: &str, value: &str) {
        if name.is_empty() || name.starts_with(RESERVED_MARKER) {
            return
        }

        if name == PREFER_SYSTEM_ENTRY {
            if !self.prefer_system {
                info!("system values take precedence over overrides");
            }
            self.prefer_system = true;
            return
        }

        debug!("add prop {} as {}", name, value);
        self.store.put(name, value);
    }

    pub fn package(&mut self, name: &str) {
        if name.is_empty() || name.starts_with(RESERVED_MARKER) {
            return
        }

        debug!("add package {}", name);
        self.store.add_target(name);
    }

    pub fn load(mut self, source: &dyn ConfigSource) -> PropContext {
        if let Err(err) = source.for_each_property(&mut |name, value| self.property(name, value)) {
            warn!("failed to load properties: {:#}", err);
        }

        if let Err(err) = source.for_each_package(&mut |name| self.package(name)) {
            warn!("failed to load packages: {:#}", err);
        }

        self.finish()
    }

    pub fn finish(self) -> PropContext {
        if self.store.targets() == 0 {
            info!("hook target package list is empty");
        }

        if self.store.is_empty() {
            info!("hook prop list is empty");
        }

        info!("{} props loaded for {} packages", self.store.len(), self.store.targets());

        PropContext::new(self.store, self.prefer_system)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::*;

    struct Entries {
        props: Vec<(&'static str, &'static str)>,
        packages: Vec<&'static str>,
    }

    impl ConfigSource for Entries {
        fn for_each_property(&self, handler: &mut dyn FnMut(&str, &str)) -> Result<()> {
            self.props.iter().for_each(|(name, value)| handler(name, value));
            Ok(())
        }

        fn for_each_package(&self, handler: &mut dyn FnMut(&str)) -> Result<()> {
            self.packages.iter().for_each(|name| handler(name));
            Ok(())
        }
    }

    struct Broken;

    impl ConfigSource for Broken {
        fn for_each_property(&self, handler: &mut dyn FnMut(&str, &str)) -> Result<()> {
            handler("ro.product.brand", "Xiaomi");
            bail!("disk on fire")
        }

        fn for_each_package(&self, _handler: &mut dyn FnMut(&str)) -> Result<()> {
            bail!("no packages directory")
        }
    }

    #[test]
    fn loads_props_and_packages() {
        let ctx = Loader::new().load(&Entries {
            props: vec![("ro.product.brand", "Xiaomi"), (".hidden", "x"), ("", "y")],
            packages: vec!["com.example.app", ".nomedia"],
        });

        assert_eq!(ctx.store().len(), 1);
        assert_eq!(ctx.store().find("ro.product.brand").unwrap().value(), "Xiaomi");
        assert!(ctx.store().has_target("com.example.app"));
        assert!(!ctx.store().has_target(".nomedia"));
        assert!(!ctx.prefer_system());
    }

    #[test]
    fn prefer_system_entry_is_a_switch() {
        let ctx = Loader::new().load(&Entries {
            props: vec![("ro.product.brand", "Xiaomi"), (PREFER_SYSTEM_ENTRY, "")],
            packages: vec![],
        });

        assert!(ctx.prefer_system());
        assert!(ctx.store().find(PREFER_SYSTEM_ENTRY).is_none());
    }

    #[test]
    fn source_errors_do_not_abort() {
        let ctx = Loader::new().load(&Broken);
        assert_eq!(ctx.store().len(), 1);
    }
}

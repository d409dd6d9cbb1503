use std::collections::{HashMap, HashSet};

/// Serials move in steps of two so bit 0, the native "dirty" flag, stays clear.
const SERIAL_STEP: u32 = 2;

/// Bit 16 of a native serial marks a long property.
const SERIAL_LONG_FLAG: u32 = 1 << 16;

/// Native serials carry the value length in their top byte; the dirty and
/// long flags never appear in a generation.
const SERIAL_GENERATION_MASK: u32 = 0x00ff_fffe & !SERIAL_LONG_FLAG;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideRecord {
    name: String,
    value: String,
    serial: u32,
}

impl OverrideRecord {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Generation stamp, increasing across `put` calls until it wraps at
    /// 24 bits.
    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// The serial as native readers expect it: value length in bits 24..32,
    /// generation below, dirty bit clear.
    pub fn stamp(&self) -> u32 {
        stamp(self.value.len(), self.serial)
    }
}

pub(crate) fn stamp(value_len: usize, generation: u32) -> u32 {
    ((value_len as u32) << 24) | (generation & SERIAL_GENERATION_MASK)
}

/// The generation after `generation`, stepping over the long flag.
pub(crate) fn next_generation(generation: u32) -> u32 {
    let mut next = generation.wrapping_add(SERIAL_STEP);
    if next & SERIAL_LONG_FLAG != 0 {
        next = next.wrapping_add(SERIAL_LONG_FLAG);
    }

    next & SERIAL_GENERATION_MASK
}

/// Generation half of a native serial, see [`OverrideRecord::stamp`].
pub fn serial_generation(serial: u32) -> u32 {
    serial & SERIAL_GENERATION_MASK
}

/// Property overrides and the packages they apply to.
///
/// Filled by a single thread while loading configuration, read-only once
/// interception is active. Calling `put` while hooks are installed is not
/// supported.
#[derive(Debug)]
pub struct OverrideStore {
    props: HashMap<String, OverrideRecord>,
    packages: HashSet<String>,
    next_serial: u32,
}

impl Default for OverrideStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OverrideStore {
    pub fn new() -> Self {
        Self {
            props: HashMap::new(),
            packages: HashSet::new(),
            next_serial: SERIAL_STEP,
        }
    }

    /// Inserts or replaces the override for `name`. Empty names are ignored.
    pub fn put(&mut self, name: &str, value: &str) {
        if name.is_empty() {
            return
        }

        let serial = self.next_serial;
        self.next_serial = next_generation(serial);

        self.props.insert(name.into(), OverrideRecord {
            name: name.into(),
            value: value.into(),
            serial,
        });
    }

    pub fn find(&self, name: &str) -> Option<&OverrideRecord> {
        self.props.get(name)
    }

    pub fn records(&self) -> impl Iterator<Item = &OverrideRecord> {
        self.props.values()
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn add_target(&mut self, package: &str) {
        if package.is_empty() {
            return
        }

        self.packages.insert(package.into());
    }

    pub fn has_target(&self, package: &str) -> bool {
        self.packages.contains(package)
    }

    pub fn targets(&self) -> usize {
        self.packages.len()
    }
}

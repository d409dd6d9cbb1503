use std::alloc::{self, Layout};
use std::collections::HashMap;
use std::ffi::CStr;
use std::mem;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Context, Result};

use crate::hook::PropInfo;
use crate::layout::PropInfoLayout;
use crate::store::{self, OverrideRecord, OverrideStore};

/// A `prop_info` look-alike handed to native callers in place of the real
/// handle.
///
/// Blocks are never freed: callers may keep handles for as long as the
/// process lives.
pub struct ShadowRecord {
    block: NonNull<u8>,
    layout: PropInfoLayout,
}

// Name and value are written once before the record is published; the
// serial is only touched atomically.
unsafe impl Send for ShadowRecord {}
unsafe impl Sync for ShadowRecord {}

impl ShadowRecord {
    fn allocate(layout: PropInfoLayout, record: &OverrideRecord) -> Result<Self> {
        layout.check_fits(record.name(), record.value())?;

        let size = layout.schema().size;
        let alloc_layout = Layout::from_size_align(size, mem::align_of::<AtomicU32>())?;

        let block = NonNull::new(unsafe { alloc::alloc_zeroed(alloc_layout) })
            .with_context(|| format!("failed to allocate {size} bytes for `{}`", record.name()))?;

        unsafe {
            layout.write(block.as_ptr(), record.name(), record.value(), record.stamp());
        }

        Ok(Self { block, layout })
    }

    pub fn as_ptr(&self) -> *const PropInfo {
        self.block.as_ptr() as *const PropInfo
    }

    pub fn name(&self) -> &CStr {
        unsafe { self.layout.read_name(self.block.as_ptr()) }
    }

    pub fn value(&self) -> &CStr {
        unsafe { self.layout.read_value(self.block.as_ptr()) }
    }

    pub fn serial(&self) -> u32 {
        self.serial_cell().load(Ordering::Acquire)
    }

    /// Moves the serial to the next generation so readers that cached the
    /// previous serial notice a change.
    pub fn restamp(&self) {
        let cell = self.serial_cell();
        let current = cell.load(Ordering::Acquire);
        let generation = store::next_generation(store::serial_generation(current));

        cell.store(store::stamp(self.value().to_bytes().len(), generation), Ordering::Release);
    }

    fn serial_cell(&self) -> &AtomicU32 {
        unsafe { self.layout.serial(self.block.as_ptr()) }
    }
}

/// Name to shadow record, one entry per override, plus the reverse map from
/// block address to name.
pub struct ShadowIndex {
    layout: PropInfoLayout,
    records: HashMap<String, ShadowRecord>,
    handles: HashMap<usize, String>,
}

impl ShadowIndex {
    /// Allocates every record up front. An entry that does not fit the
    /// layout fails the whole build: truncating it would spill into the
    /// neighbouring field.
    pub fn build(store: &OverrideStore, layout: PropInfoLayout) -> Result<Self> {
        let mut records = HashMap::with_capacity(store.len());
        let mut handles = HashMap::with_capacity(store.len());

        for record in store.records() {
            let shadow = ShadowRecord::allocate(layout, record)
                .with_context(|| format!("can't shadow property `{}`", record.name()))?;
            handles.insert(shadow.as_ptr() as usize, record.name().to_owned());
            records.insert(record.name().to_owned(), shadow);
        }

        Ok(Self { layout, records, handles })
    }

    pub fn layout(&self) -> PropInfoLayout {
        self.layout
    }

    pub fn get(&self, name: &str) -> Option<&ShadowRecord> {
        self.records.get(name)
    }

    /// Finds the record whose block `pi` points at, if it is one of ours.
    pub fn by_handle(&self, pi: *const PropInfo) -> Option<&ShadowRecord> {
        self.handles.get(&(pi as usize)).and_then(|name| self.records.get(name))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

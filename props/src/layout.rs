//! Byte layout of bionic's `prop_info`.
//!
//! Callers of the native property API dereference the opaque handle
//! directly, so a shadow block has to reproduce the host layout exactly.
//! Layouts are described as explicit offset tables and checked against
//! `#[repr(C)]` mirrors before anything is allocated.

use std::ffi::CStr;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{bail, Result};

pub use common::properties::PROP_VALUE_MAX;

/// Name buffer of the pre-Lollipop layout, trailing NUL included.
pub const LEGACY_NAME_MAX: usize = 32;

/// Name space reserved behind a serial-first shadow, trailing NUL included.
pub const NAME_MAX: usize = 128;

const SERIAL_FIRST_SINCE: i32 = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub serial: usize,
    pub value: usize,
    pub name: usize,
    pub name_capacity: usize,
    pub size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropInfoLayout {
    /// `{ serial, value[92], name[] }`, API 21 and later.
    SerialFirst,
    /// `{ name[32], serial, value[92] }`, before API 21.
    NameFirst,
}

#[allow(dead_code)]
#[repr(C)]
struct SerialFirstMirror {
    serial: AtomicU32,
    value: [u8; PROP_VALUE_MAX],
    name: [u8; NAME_MAX],
}

#[allow(dead_code)]
#[repr(C)]
struct NameFirstMirror {
    name: [u8; LEGACY_NAME_MAX],
    serial: AtomicU32,
    value: [u8; PROP_VALUE_MAX],
}

macro_rules! mirror_schema {
    ($mirror: ty, name_capacity: $capacity: expr) => {
        Schema {
            serial: mem::offset_of!($mirror, serial),
            value: mem::offset_of!($mirror, value),
            name: mem::offset_of!($mirror, name),
            name_capacity: $capacity,
            size: mem::size_of::<$mirror>(),
        }
    };
}

impl PropInfoLayout {
    pub fn for_api_level(api: i32) -> Self {
        if api >= SERIAL_FIRST_SINCE {
            Self::SerialFirst
        } else {
            Self::NameFirst
        }
    }

    pub const fn schema(self) -> Schema {
        match self {
            Self::SerialFirst => Schema {
                serial: 0,
                value: 4,
                name: 96,
                name_capacity: NAME_MAX,
                size: 224,
            },
            Self::NameFirst => Schema {
                name: 0,
                serial: 32,
                value: 36,
                name_capacity: LEGACY_NAME_MAX,
                size: 128,
            },
        }
    }

    fn mirror(self) -> Schema {
        match self {
            // trailing field, runs to the end of the block
            Self::SerialFirst => mirror_schema!(
                SerialFirstMirror,
                name_capacity: mem::size_of::<SerialFirstMirror>() - mem::offset_of!(SerialFirstMirror, name)
            ),
            Self::NameFirst => mirror_schema!(
                NameFirstMirror,
                name_capacity: mem::offset_of!(NameFirstMirror, serial) - mem::offset_of!(NameFirstMirror, name)
            ),
        }
    }

    /// Fails if the offset table disagrees with the compiler's view of the
    /// mirror struct.
    pub fn validate(self) -> Result<()> {
        let expected = self.schema();
        let actual = self.mirror();

        if expected != actual {
            bail!("{self:?} layout mismatch: expected {expected:?}, found {actual:?}");
        }

        if expected.serial % mem::align_of::<AtomicU32>() != 0 {
            bail!("{self:?} layout puts the serial at unaligned offset {}", expected.serial);
        }

        Ok(())
    }

    /// Rejects entries that would spill out of their fixed-size field.
    pub fn check_fits(self, name: &str, value: &str) -> Result<()> {
        let schema = self.schema();

        if name.bytes().any(|b| b == 0) || value.bytes().any(|b| b == 0) {
            bail!("property `{}` contains an interior NUL", name.escape_default());
        }

        if name.len() >= schema.name_capacity {
            bail!(
                "property name `{name}` is {} bytes, the {self:?} layout holds at most {}",
                name.len(), schema.name_capacity - 1
            );
        }

        if value.len() >= PROP_VALUE_MAX {
            bail!(
                "value of `{name}` is {} bytes, at most {} fit in a property",
                value.len(), PROP_VALUE_MAX - 1
            );
        }

        Ok(())
    }

    /// Writes a complete block.
    ///
    /// # Safety
    /// `block` must point to `schema().size` writable bytes aligned for
    /// `AtomicU32`, and `name`/`value` must have passed [`Self::check_fits`].
    pub unsafe fn write(self, block: *mut u8, name: &str, value: &str, serial: u32) {
        let schema = self.schema();

        ptr::write_bytes(block, 0, schema.size);
        ptr::copy_nonoverlapping(name.as_ptr(), block.add(schema.name), name.len());
        ptr::copy_nonoverlapping(value.as_ptr(), block.add(schema.value), value.len());

        self.serial(block).store(serial, Ordering::Release);
    }

    /// # Safety
    /// `block` must point to a live block in this layout.
    pub unsafe fn serial<'a>(self, block: *const u8) -> &'a AtomicU32 {
        &*(block.add(self.schema().serial) as *const AtomicU32)
    }

    /// # Safety
    /// `block` must point to a live, NUL-terminated block in this layout.
    pub unsafe fn read_name<'a>(self, block: *const u8) -> &'a CStr {
        CStr::from_ptr(block.add(self.schema().name).cast())
    }

    /// # Safety
    /// Same as [`Self::read_name`].
    pub unsafe fn read_value<'a>(self, block: *const u8) -> &'a CStr {
        CStr::from_ptr(block.add(self.schema().value).cast())
    }
}

//! The hardware translation table.
//!
//! One 32-bit entry per device page, at register offset
//! `TABLE_BASE + index * 4`. An entry holds either zero (unmapped) or the
//! physical page number currently mapped at that index. This module only
//! composes offsets and values; the I/O itself happens behind
//! [`RegisterWriter`].

use crate::page::{DevicePage, FrameNumber, TABLE_ENTRIES};

/// The register-write primitive supplied by the owning driver.
///
/// Implementations perform the actual MMIO store into the device register
/// space. A recording implementation makes the table fully testable without
/// hardware.
pub trait RegisterWriter {
    /// Writes a 32-bit value to the device register at `byte_offset`.
    fn write_register(&mut self, value: u32, byte_offset: u32);
}

/// Owns the register writer and the entry addressing scheme.
pub(crate) struct TranslationTable<W> {
    writer: W,
}

impl<W: RegisterWriter> TranslationTable<W> {
    pub(crate) fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Zeroes every hardware slot, including the ones the allocator never
    /// hands out.
    pub(crate) fn clear_all(&mut self) {
        for index in 0..TABLE_ENTRIES {
            self.writer.write_register(0, DevicePage::new(index).entry_offset());
        }
    }

    /// Points `page` at the given physical page number.
    pub(crate) fn set(&mut self, page: DevicePage, frame: FrameNumber) {
        self.writer.write_register(frame.entry_value(), page.entry_offset());
    }

    /// Marks `page` unmapped.
    pub(crate) fn clear(&mut self, page: DevicePage) {
        self.writer.write_register(0, page.entry_offset());
    }
}

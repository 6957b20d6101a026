//! Address and page-number types for the device translation window.
//!
//! The device cannot reach host memory directly; it addresses everything
//! through a small page-indexed window backed by a hardware translation
//! table. This module provides newtypes for the three quantities involved:
//! host physical addresses, physical page numbers (the values written into
//! table entries), and device page indices (the slots they are written to).

use core::fmt;
use core::ops::Add;

/// Size of one device page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Number of low address bits covered by one page.
pub const PAGE_SHIFT: u32 = 12;

/// Register offset of translation table entry 0.
pub const TABLE_BASE: u32 = 0x9000;

/// Number of hardware table slots.
pub const TABLE_ENTRIES: u32 = 0x1000;

/// Largest allocatable run of device pages, one below the slot count.
pub const MAX_PAGES: u32 = 4095;

/// Returns the number of device pages needed to cover `len` bytes.
#[inline]
pub const fn pages_for_len(len: usize) -> usize {
    len.div_ceil(PAGE_SIZE)
}

/// A host physical (DMA) address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PhysAddr(u64);

impl PhysAddr {
    /// Creates a new physical address.
    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw address value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the physical page number containing this address.
    #[inline]
    pub const fn frame(self) -> FrameNumber {
        FrameNumber(self.0 >> PAGE_SHIFT)
    }

    /// Checks whether the address sits on a device page boundary.
    #[inline]
    pub const fn is_page_aligned(self) -> bool {
        self.0 & (PAGE_SIZE as u64 - 1) == 0
    }
}

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysAddr({:#x})", self.0)
    }
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for PhysAddr {
    #[inline]
    fn from(addr: u64) -> Self {
        Self::new(addr)
    }
}

/// A physical page number: a physical address with its low [`PAGE_SHIFT`]
/// bits removed. This is the value stored in a hardware table entry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct FrameNumber(u64);

impl FrameNumber {
    /// Creates a new frame number.
    #[inline]
    pub const fn new(number: u64) -> Self {
        Self(number)
    }

    /// Returns the raw frame number.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the 32-bit encoding written into a table entry.
    ///
    /// The hardware table holds 32-bit entries, so frame numbers beyond
    /// that width are truncated.
    #[inline]
    pub const fn entry_value(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Debug for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameNumber({})", self.0)
    }
}

impl fmt::Display for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add<u64> for FrameNumber {
    type Output = Self;

    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

/// An index into the device's translation window, in `[0, 4095]`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct DevicePage(u32);

impl DevicePage {
    /// Creates a new device page index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw page index.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the register offset of this page's table entry.
    #[inline]
    pub const fn entry_offset(self) -> u32 {
        TABLE_BASE + self.0 * 4
    }
}

impl fmt::Debug for DevicePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DevicePage({})", self.0)
    }
}

impl fmt::Display for DevicePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add<u32> for DevicePage {
    type Output = Self;

    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0 + rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_for_len_rounds_up() {
        assert_eq!(pages_for_len(0), 0);
        assert_eq!(pages_for_len(1), 1);
        assert_eq!(pages_for_len(PAGE_SIZE), 1);
        assert_eq!(pages_for_len(PAGE_SIZE + 1), 2);
        assert_eq!(pages_for_len(2 * PAGE_SIZE), 2);
    }

    #[test]
    fn phys_addr_frame() {
        let addr = PhysAddr::new(0x1234_5000);
        assert_eq!(addr.frame(), FrameNumber::new(0x12345));
    }

    #[test]
    fn phys_addr_alignment() {
        assert!(PhysAddr::new(0).is_page_aligned());
        assert!(PhysAddr::new(0x8000).is_page_aligned());
        assert!(!PhysAddr::new(0x8001).is_page_aligned());
        assert!(!PhysAddr::new(0x8800).is_page_aligned());
    }

    #[test]
    fn frame_number_entry_value() {
        let frame = FrameNumber::new(0x12345);
        assert_eq!(frame.entry_value(), 0x12345);
        assert_eq!((frame + 1).entry_value(), 0x12346);
    }

    #[test]
    fn device_page_entry_offset() {
        assert_eq!(DevicePage::new(0).entry_offset(), TABLE_BASE);
        assert_eq!(DevicePage::new(1).entry_offset(), TABLE_BASE + 4);
        assert_eq!(DevicePage::new(4095).entry_offset(), TABLE_BASE + 4 * 4095);
    }

    #[test]
    fn device_page_add() {
        let page = DevicePage::new(10);
        assert_eq!(page + 5, DevicePage::new(15));
    }

    #[test]
    fn debug_formats() {
        assert_eq!(format!("{:?}", PhysAddr::new(0x1000)), "PhysAddr(0x1000)");
        assert_eq!(format!("{:?}", FrameNumber::new(7)), "FrameNumber(7)");
        assert_eq!(format!("{:?}", DevicePage::new(7)), "DevicePage(7)");
    }
}

#![cfg_attr(not(test), no_std)]

//! # S2 IOMMU
//!
//! Device-local address-space allocator for the S2 camera ISP. The device
//! can only reach host memory through a 4096-slot page translation table in
//! its register space, so every DMA buffer must be mapped into that window
//! before use. This crate provides:
//!
//! - First-fit allocation of device pages within the fixed window.
//! - Translation programming for contiguous buffers and scatter-gather
//!   lists, via a caller-supplied register-write primitive.
//! - Leak-free teardown that zeroes table entries before reclaiming pages.
//!
//! The crate performs no I/O itself; the owning driver implements
//! [`RegisterWriter`] on top of its MMIO mapping.

extern crate alloc;

mod iommu;
mod page;
mod region;
mod table;

pub use iommu::{Iommu, MappedObject, SgSegment};
pub use page::{
    DevicePage, FrameNumber, MAX_PAGES, PAGE_SHIFT, PAGE_SIZE, PhysAddr, TABLE_BASE,
    TABLE_ENTRIES, pages_for_len,
};
pub use region::{AllocError, Region, RegionAllocator};
pub use table::RegisterWriter;

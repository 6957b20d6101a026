//! Device-side IOMMU: translation programming over the region allocator.
//!
//! The device reaches host memory exclusively through its translation
//! window. Mapping a buffer means allocating a run of device pages and
//! writing one table entry per page; unmapping zeroes those entries and
//! returns the run. The hardware table and the occupancy bookkeeping are
//! kept behind one handle so they cannot diverge.

use crate::page::{DevicePage, MAX_PAGES, PAGE_SIZE, PhysAddr, pages_for_len};
use crate::region::{AllocError, Region, RegionAllocator};
use crate::table::{RegisterWriter, TranslationTable};

/// One segment of a scatter-gather list: a physically contiguous block.
///
/// The address must sit on a device page boundary; a misaligned segment is
/// logged and then mapped with the address as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SgSegment {
    /// Physical address of the segment's first byte.
    pub addr: PhysAddr,
    /// Segment length in bytes.
    pub len: usize,
}

impl SgSegment {
    /// Creates a new scatter-gather segment.
    pub const fn new(addr: PhysAddr, len: usize) -> Self {
        Self { addr, len }
    }
}

/// A live mapping in the device's translation window.
///
/// Records the granted run exactly as the underlying [`Region`] and is
/// consumed by [`Iommu::unmap`]; a released mapping cannot be unmapped a
/// second time because the handle no longer exists.
#[derive(Debug, PartialEq, Eq)]
pub struct MappedObject {
    region: Region,
}

impl MappedObject {
    /// Returns the first device page index of this mapping.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.region.offset()
    }

    /// Returns the number of device pages this mapping covers.
    #[inline]
    pub fn pages(&self) -> u32 {
        self.region.pages()
    }
}

struct Inner<W> {
    table: TranslationTable<W>,
    allocator: RegionAllocator,
}

/// The device-wide translation window: a fixed range of 4096 device pages
/// and the hardware table that backs them.
///
/// Operations take `&self`; the table and occupancy state live behind a
/// single lock so every mapping call observes and updates both together.
pub struct Iommu<W: RegisterWriter> {
    inner: spin::Mutex<Inner<W>>,
}

impl<W: RegisterWriter> Iommu<W> {
    /// Brings up the translation window: zeroes every hardware slot, then
    /// creates the page allocator over `[0, 4095]`.
    pub fn new(writer: W) -> Result<Self, AllocError> {
        let mut table = TranslationTable::new(writer);
        table.clear_all();

        let allocator = RegionAllocator::new(0, MAX_PAGES)?;

        Ok(Self {
            inner: spin::Mutex::new(Inner { table, allocator }),
        })
    }

    /// Maps a physically contiguous buffer into the translation window.
    ///
    /// Allocates `ceil(len / 4096)` device pages and points each at the
    /// corresponding page of the buffer, in increasing page order. Fails
    /// with [`AllocError::InvalidSize`] before touching any state if the
    /// buffer is empty or needs more than [`MAX_PAGES`] pages, and with
    /// [`AllocError::Exhausted`] if no free run is large enough.
    pub fn map_contiguous(&self, addr: PhysAddr, len: usize) -> Result<MappedObject, AllocError> {
        let pages = pages_for_len(len);
        if pages == 0 || pages > MAX_PAGES as usize {
            return Err(AllocError::InvalidSize);
        }
        let pages = pages as u32;

        let inner = &mut *self.inner.lock();
        let region = inner.allocator.allocate(pages)?;

        let base = addr.frame();
        for i in 0..pages {
            inner
                .table
                .set(DevicePage::new(region.offset() + i), base + u64::from(i));
        }

        log::debug!("mapped {} pages at offset {}", region.pages(), region.offset());
        Ok(MappedObject { region })
    }

    /// Maps a scatter-gather list into one contiguous run of device pages.
    ///
    /// Segments are walked in input order, each in 4096-byte strides; the
    /// destination index simply keeps counting across segment boundaries.
    /// A segment whose address is not page-aligned is logged as a contract
    /// violation and mapped with the address as given.
    pub fn map_scattered(&self, segments: &[SgSegment]) -> Result<MappedObject, AllocError> {
        let total_len: usize = segments.iter().map(|s| s.len).sum();
        let pages = pages_for_len(total_len);
        if pages == 0 || pages > MAX_PAGES as usize {
            return Err(AllocError::InvalidSize);
        }
        let pages = pages as u32;

        let inner = &mut *self.inner.lock();
        let region = inner.allocator.allocate(pages)?;

        let mut dest = DevicePage::new(region.offset());
        for segment in segments {
            if !segment.addr.is_page_aligned() {
                log::warn!("scatter segment at {} is not page-aligned", segment.addr);
            }

            let mut frame = segment.addr.frame();
            let mut consumed = 0;
            while consumed < segment.len {
                inner.table.set(dest, frame);
                dest = dest + 1;
                frame = frame + 1;
                consumed += PAGE_SIZE;
            }
        }

        log::debug!("mapped {} pages at offset {}", region.pages(), region.offset());
        Ok(MappedObject { region })
    }

    /// Tears down a mapping: zeroes every table entry it wrote, then
    /// returns the run to the allocator.
    pub fn unmap(&self, object: MappedObject) {
        let MappedObject { region } = object;

        let inner = &mut *self.inner.lock();
        for i in 0..region.pages() {
            inner.table.clear(DevicePage::new(region.offset() + i));
        }

        log::debug!("unmapped {} pages at offset {}", region.pages(), region.offset());
        inner.allocator.release(region);
    }

    /// Returns the number of free pages in the translation window.
    pub fn free_pages(&self) -> u32 {
        self.inner.lock().allocator.free_pages()
    }

    /// Returns true if every page in `[offset, offset + pages)` is free.
    pub fn is_free(&self, offset: u32, pages: u32) -> bool {
        self.inner.lock().allocator.is_free(offset, pages)
    }
}

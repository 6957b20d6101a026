//! First-fit allocation of device translation pages.
//!
//! Occupancy is tracked memblock-style: a sorted list of reserved runs over
//! a fixed page range. Free space is whatever the list does not cover, so
//! allocation scans the gaps between reserved runs in ascending order and
//! grants the first one large enough.

use alloc::vec::Vec;

/// Number of region slots reserved up front for bookkeeping.
const INITIAL_REGIONS: usize = 128;

/// Errors that can occur while allocating device pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// Backing storage for the allocator's bookkeeping could not be reserved.
    OutOfMemory,
    /// The requested size is zero or exceeds the table capacity.
    InvalidSize,
    /// No contiguous free run of the requested size exists.
    Exhausted,
}

/// One granted run of contiguous device pages.
///
/// A `Region` is created by a successful [`RegionAllocator::allocate`] call
/// and consumed by [`RegionAllocator::release`]. It is deliberately not
/// `Clone`, so a run cannot be released twice.
#[derive(Debug, PartialEq, Eq)]
pub struct Region {
    offset: u32,
    pages: u32,
}

impl Region {
    /// Returns the first page index of this run, relative to the range start.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Returns the number of pages in this run.
    #[inline]
    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// Returns the page index just past the end of this run.
    #[inline]
    fn end(&self) -> u32 {
        self.offset + self.pages
    }
}

/// First-fit allocator for the device's translation window.
///
/// Manages the page range `[start, end]` (inclusive) as a set of disjoint
/// reserved runs. Requests are additionally bounded by [`crate::MAX_PAGES`],
/// matching the hardware's capacity limit.
pub struct RegionAllocator {
    start: u32,
    end: u32,
    /// Reserved runs, sorted by offset and pairwise disjoint.
    reserved: Vec<Region>,
}

impl RegionAllocator {
    /// Creates an allocator over the inclusive page range `[start, end]`,
    /// with the entire range initially free.
    ///
    /// Bookkeeping storage is reserved up front; failure to do so surfaces
    /// as [`AllocError::OutOfMemory`].
    pub fn new(start: u32, end: u32) -> Result<Self, AllocError> {
        assert!(start <= end, "range start must not exceed range end");

        let mut reserved = Vec::new();
        reserved
            .try_reserve(INITIAL_REGIONS)
            .map_err(|_| AllocError::OutOfMemory)?;

        Ok(Self {
            start,
            end,
            reserved,
        })
    }

    /// Returns the total number of pages in the managed range.
    #[inline]
    pub fn range_pages(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Allocates the first free run of exactly `pages` contiguous slots.
    ///
    /// Returns [`AllocError::InvalidSize`] if `pages` is zero or exceeds
    /// [`crate::MAX_PAGES`], and [`AllocError::Exhausted`] if no gap is
    /// large enough. Failed calls leave occupancy untouched.
    pub fn allocate(&mut self, pages: u32) -> Result<Region, AllocError> {
        if pages == 0 || pages > crate::MAX_PAGES {
            return Err(AllocError::InvalidSize);
        }

        // Scan the gap before each reserved run, then the tail gap.
        let mut cursor = 0;
        let mut insert_at = self.reserved.len();

        for (i, run) in self.reserved.iter().enumerate() {
            if run.offset - cursor >= pages {
                insert_at = i;
                break;
            }
            cursor = run.end();
        }

        if insert_at == self.reserved.len() && self.range_pages() - cursor < pages {
            log::error!(
                "failed to allocate device pages (size: {pages}, start: {}, end: {})",
                self.start,
                self.end
            );
            return Err(AllocError::Exhausted);
        }

        let granted = Region {
            offset: cursor,
            pages,
        };
        self.reserved.insert(
            insert_at,
            Region {
                offset: cursor,
                pages,
            },
        );

        Ok(granted)
    }

    /// Releases a previously granted run, making its exact range available
    /// for subsequent allocations.
    pub fn release(&mut self, region: Region) {
        if let Some(index) = self.reserved.iter().position(|r| *r == region) {
            self.reserved.remove(index);
        }
    }

    /// Returns the total number of free pages in the range.
    pub fn free_pages(&self) -> u32 {
        let reserved: u32 = self.reserved.iter().map(|r| r.pages).sum();
        self.range_pages() - reserved
    }

    /// Returns the size of the largest free run.
    pub fn largest_free_run(&self) -> u32 {
        let mut largest = 0;
        let mut cursor = 0;

        for run in &self.reserved {
            largest = largest.max(run.offset - cursor);
            cursor = run.end();
        }

        largest.max(self.range_pages() - cursor)
    }

    /// Returns true if every page in `[offset, offset + pages)` is free.
    pub fn is_free(&self, offset: u32, pages: u32) -> bool {
        self.reserved
            .iter()
            .all(|r| offset + pages <= r.offset || r.end() <= offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_PAGES;

    fn device_allocator() -> RegionAllocator {
        RegionAllocator::new(0, MAX_PAGES).unwrap()
    }

    #[test]
    fn starts_fully_free() {
        let allocator = device_allocator();
        assert_eq!(allocator.range_pages(), 4096);
        assert_eq!(allocator.free_pages(), 4096);
        assert_eq!(allocator.largest_free_run(), 4096);
    }

    #[test]
    fn rejects_zero_pages() {
        let mut allocator = device_allocator();
        assert_eq!(allocator.allocate(0), Err(AllocError::InvalidSize));
    }

    #[test]
    fn rejects_oversized_request() {
        let mut allocator = device_allocator();
        assert_eq!(
            allocator.allocate(MAX_PAGES + 1),
            Err(AllocError::InvalidSize)
        );
    }

    #[test]
    fn allocates_max_run() {
        let mut allocator = device_allocator();
        let region = allocator.allocate(MAX_PAGES).unwrap();
        assert_eq!(region.offset(), 0);
        assert_eq!(region.pages(), MAX_PAGES);
        assert_eq!(allocator.free_pages(), 1);
    }

    #[test]
    fn grants_sequential_offsets() {
        let mut allocator = device_allocator();
        let a = allocator.allocate(16).unwrap();
        let b = allocator.allocate(32).unwrap();
        let c = allocator.allocate(8).unwrap();

        assert_eq!(a.offset(), 0);
        assert_eq!(b.offset(), 16);
        assert_eq!(c.offset(), 48);
        assert_eq!(allocator.free_pages(), 4096 - 56);
    }

    #[test]
    fn granted_runs_stay_disjoint() {
        let mut allocator = device_allocator();
        let sizes = [7, 1, 300, 42, 9, 128];
        let regions: Vec<Region> = sizes
            .iter()
            .map(|&n| allocator.allocate(n).unwrap())
            .collect();

        for (i, a) in regions.iter().enumerate() {
            assert!(a.offset() + a.pages() <= 4096);
            for b in regions.iter().skip(i + 1) {
                let disjoint =
                    a.offset() + a.pages() <= b.offset() || b.offset() + b.pages() <= a.offset();
                assert!(disjoint, "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn released_run_is_reused() {
        let mut allocator = device_allocator();
        let a = allocator.allocate(100).unwrap();
        let _b = allocator.allocate(50).unwrap();

        let freed_offset = a.offset();
        allocator.release(a);
        assert!(allocator.is_free(freed_offset, 100));

        // First fit lands back in the hole that was just freed.
        let c = allocator.allocate(100).unwrap();
        assert_eq!(c.offset(), freed_offset);
    }

    #[test]
    fn first_fit_picks_earliest_gap() {
        let mut allocator = device_allocator();
        let _a = allocator.allocate(10).unwrap();
        let b = allocator.allocate(10).unwrap();
        let _c = allocator.allocate(10).unwrap();

        allocator.release(b);

        // A request small enough for the hole goes there; a larger one
        // skips past the occupied tail.
        let d = allocator.allocate(5).unwrap();
        assert_eq!(d.offset(), 10);
        let e = allocator.allocate(10).unwrap();
        assert_eq!(e.offset(), 30);
    }

    #[test]
    fn exhaustion_leaves_occupancy_unchanged() {
        let mut allocator = device_allocator();
        let _big = allocator.allocate(4000).unwrap();
        let free_before = allocator.free_pages();

        assert_eq!(allocator.allocate(200), Err(AllocError::Exhausted));
        assert_eq!(allocator.free_pages(), free_before);

        // Failure is repeatable.
        assert_eq!(allocator.allocate(200), Err(AllocError::Exhausted));
        assert_eq!(allocator.free_pages(), free_before);
    }

    #[test]
    fn fragmented_range_exhausts_large_request() {
        let mut allocator = device_allocator();
        let a = allocator.allocate(2000).unwrap();
        let _b = allocator.allocate(2000).unwrap();
        allocator.release(a);

        // 2096 pages are free but the largest run is only 2000.
        assert_eq!(allocator.free_pages(), 2096);
        assert_eq!(allocator.largest_free_run(), 2000);
        assert_eq!(allocator.allocate(2001), Err(AllocError::Exhausted));
    }

    #[test]
    fn drains_to_single_tail_slot() {
        let mut allocator = device_allocator();
        let _a = allocator.allocate(MAX_PAGES).unwrap();
        let b = allocator.allocate(1).unwrap();
        assert_eq!(b.offset(), MAX_PAGES);
        assert_eq!(allocator.free_pages(), 0);
        assert_eq!(allocator.allocate(1), Err(AllocError::Exhausted));
    }
}

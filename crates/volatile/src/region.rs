use core::mem::{align_of, size_of};

use crate::ptr::VolatilePtr;

/// A contiguous range of bytes that is only ever accessed with volatile operations.
///
/// This is what a memory mapped BAR looks like to a driver: a base address and a length,
/// with registers of different widths at fixed byte offsets.
#[derive(Debug, Clone, Copy)]
pub struct VolatileRegion {
    base: VolatilePtr<u8>,
    len: usize,
}

impl VolatileRegion {
    /// Creates a region covering `len` bytes starting at `base`.
    ///
    /// # Safety
    /// `base` must be non-null and valid for volatile reads and writes of `len` bytes for as long
    /// as the region (or any copy of it) is used.
    pub const unsafe fn new(base: *mut u8, len: usize) -> Self {
        Self {
            base: unsafe { VolatilePtr::new_unchecked(base) },
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    fn check<T>(&self, offset: usize) {
        let end = offset.checked_add(size_of::<T>());
        assert!(
            end.is_some_and(|end| end <= self.len),
            "volatile access at {:#x} (+{}) is outside of the {:#x} byte region",
            offset,
            size_of::<T>(),
            self.len
        );
        assert!(
            (self.base.as_ptr() as usize + offset) % align_of::<T>() == 0,
            "misaligned volatile access at {:#x}",
            offset
        );
    }

    /// Volatile reads a `T` at `offset` bytes into the region.
    ///
    /// # Panics
    /// Panics if the access does not fit in the region.
    pub fn read<T: Copy>(&self, offset: usize) -> T {
        self.check::<T>(offset);
        // SAFETY: bounds checked above, validity guaranteed by the constructor
        let ptr: VolatilePtr<T> = unsafe { self.base.byte_add(offset) };
        ptr.get()
    }

    /// Volatile writes a `T` at `offset` bytes into the region.
    ///
    /// # Panics
    /// Panics if the access does not fit in the region.
    pub fn write<T: Copy>(&self, offset: usize, value: T) {
        self.check::<T>(offset);
        // SAFETY: bounds checked above, validity guaranteed by the constructor
        let ptr: VolatilePtr<T> = unsafe { self.base.byte_add(offset) };
        ptr.set(value);
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn mixed_width_access() {
        let mut backing = [0u32; 4];
        let region = unsafe { VolatileRegion::new(backing.as_mut_ptr().cast(), 16) };
        region.write::<u8>(1, 0xaa);
        region.write::<u16>(4, 0x1234);
        assert_eq!(region.read::<u8>(1), 0xaa);
        assert_eq!(region.read::<u16>(4), 0x1234);
        assert_eq!(region.read::<u32>(0), u32::from_ne_bytes([0, 0xaa, 0, 0]));
    }

    #[test]
    #[should_panic(expected = "outside of the")]
    fn access_past_the_end_panics() {
        let mut backing = [0u32; 1];
        let region = unsafe { VolatileRegion::new(backing.as_mut_ptr().cast(), 4) };
        region.read::<u16>(3);
    }
}

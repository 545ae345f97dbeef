use alloc::boxed::Box;
use volatile::VolatileRegion;
use x86_64::{PhysAddr, VirtAddr};

use super::{IoMapper, RegisterIo};
use crate::{DeviceError, DeviceResult};

/// A memory mapped register window
#[derive(Debug)]
pub struct MmioRegion {
    region: VolatileRegion,
}

impl MmioRegion {
    /// # Safety
    /// `base` must point to `len` bytes of mapped device memory, which stays mapped for the
    /// lifetime of the region.
    pub unsafe fn new(base: *mut u8, len: usize) -> Self {
        Self {
            region: unsafe { VolatileRegion::new(base, len) },
        }
    }
}

impl RegisterIo for MmioRegion {
    fn len(&self) -> usize {
        self.region.len()
    }

    fn read8(&self, offset: usize) -> u8 {
        self.region.read::<u8>(offset)
    }

    fn read16(&self, offset: usize) -> u16 {
        u16::from_le(self.region.read::<u16>(offset))
    }

    fn write8(&self, offset: usize, value: u8) {
        self.region.write::<u8>(offset, value)
    }

    fn write16(&self, offset: usize, value: u16) {
        self.region.write::<u16>(offset, value.to_le())
    }
}

/// Maps device memory through the higher half direct map
///
/// All of physical memory is mapped at a fixed offset by the bootloader, so mapping a device
/// window is just an address translation. The direct map is uncached for MMIO ranges.
#[derive(Debug)]
pub struct DirectMapper {
    phys_offset: u64,
}

impl DirectMapper {
    /// # Safety
    /// All physical memory, including device memory, must be mapped at `phys_offset`.
    pub const unsafe fn new(phys_offset: u64) -> Self {
        Self { phys_offset }
    }

    fn translate(&self, start: PhysAddr) -> DeviceResult<VirtAddr> {
        let virt = start
            .as_u64()
            .checked_add(self.phys_offset)
            .ok_or(DeviceError::InvalidArgument)?;
        VirtAddr::try_new(virt).map_err(|_| DeviceError::InvalidArgument)
    }
}

impl IoMapper for DirectMapper {
    fn ioremap(&self, start: PhysAddr, len: u64) -> DeviceResult<Box<dyn RegisterIo>> {
        if start.is_null() || len == 0 {
            return Err(DeviceError::InvalidArgument);
        }
        let len = usize::try_from(len).map_err(|_| DeviceError::InvalidArgument)?;
        let base = self.translate(start)?;
        // SAFETY: the direct map covers all physical memory
        Ok(Box::new(unsafe { MmioRegion::new(base.as_mut_ptr(), len) }))
    }

    fn iounmap(&self, _start: PhysAddr, region: Box<dyn RegisterIo>) {
        // Nothing to tear down in the direct map
        drop(region);
    }
}

//! Register access
//!
//! Drivers never touch device memory directly; they go through [`RegisterIo`], which is either a
//! real memory mapped window ([`mmio::MmioRegion`]) or a simulated register bank
//! ([`sim::SimRegisterFile`]).

use alloc::{boxed::Box, sync::Arc};
use core::{mem::ManuallyDrop, ops::Deref};
use x86_64::PhysAddr;

use crate::DeviceResult;

pub mod mmio;
pub mod sim;

/// Byte / word access to the registers of a device, at byte offsets into its register window
///
/// Accesses take `&self`: every access is a side effect on the device, not on Rust-visible state.
pub trait RegisterIo: Send + Sync {
    /// Size of the register window in bytes
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read8(&self, offset: usize) -> u8;
    fn read16(&self, offset: usize) -> u16;
    fn write8(&self, offset: usize, value: u8);
    fn write16(&self, offset: usize, value: u16);
}

/// Maps physical device memory into the kernel address space
pub trait IoMapper: Send + Sync {
    fn ioremap(&self, start: PhysAddr, len: u64) -> DeviceResult<Box<dyn RegisterIo>>;
    fn iounmap(&self, start: PhysAddr, region: Box<dyn RegisterIo>);
}

/// An owned mapping of device memory
///
/// The mapping is released through the mapper that created it when this is dropped, so it is
/// unmapped exactly once no matter how the owner goes away.
pub struct IoMem {
    start: PhysAddr,
    regs: ManuallyDrop<Box<dyn RegisterIo>>,
    mapper: Arc<dyn IoMapper>,
}

impl IoMem {
    pub fn map(mapper: &Arc<dyn IoMapper>, start: PhysAddr, len: u64) -> DeviceResult<Self> {
        let regs = mapper.ioremap(start, len)?;
        log::debug!("io: mapped {:#x} bytes at {:#x}", len, start.as_u64());
        Ok(Self {
            start,
            regs: ManuallyDrop::new(regs),
            mapper: mapper.clone(),
        })
    }

    pub fn start(&self) -> PhysAddr {
        self.start
    }
}

impl Deref for IoMem {
    type Target = dyn RegisterIo;

    fn deref(&self) -> &Self::Target {
        &**self.regs
    }
}

impl Drop for IoMem {
    fn drop(&mut self) {
        log::debug!("io: unmapping {:#x}", self.start.as_u64());
        // SAFETY: `regs` is never touched again after this
        let regs = unsafe { ManuallyDrop::take(&mut self.regs) };
        self.mapper.iounmap(self.start, regs);
    }
}

impl core::fmt::Debug for IoMem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IoMem")
            .field("start", &format_args!("{:#x}", self.start.as_u64()))
            .field("len", &format_args!("{:#x}", self.regs.len()))
            .finish()
    }
}

//! Simulated devices
//!
//! A register bank backed by ordinary memory, and a mapper handing such banks out. Used to drive
//! driver logic without the hardware, and to check which registers a driver touched.

use alloc::{boxed::Box, collections::btree_map::BTreeMap, sync::Arc, vec, vec::Vec};
use core::sync::atomic::{AtomicUsize, Ordering};
use spin::Mutex;
use x86_64::PhysAddr;

use super::{IoMapper, RegisterIo};
use crate::{DeviceError, DeviceResult};

/// A write a driver made to a simulated register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterWrite {
    Byte { offset: usize, value: u8 },
    Word { offset: usize, value: u16 },
}

#[derive(Debug)]
struct SimState {
    bytes: Vec<u8>,
    writes: Vec<RegisterWrite>,
    reads: usize,
}

/// A simulated register bank
///
/// Behaves like plain little-endian memory. Clones share the same bank, so a test can keep one
/// handle while the driver owns another.
#[derive(Debug, Clone)]
pub struct SimRegisterFile {
    state: Arc<Mutex<SimState>>,
}

impl SimRegisterFile {
    pub fn new(len: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                bytes: vec![0; len],
                writes: Vec::new(),
                reads: 0,
            })),
        }
    }

    /// Sets a register as the hardware would, without recording a driver write
    pub fn poke8(&self, offset: usize, value: u8) {
        self.state.lock().bytes[offset] = value;
    }

    pub fn poke16(&self, offset: usize, value: u16) {
        self.state.lock().bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// Reads a register without counting it as a driver access
    pub fn peek8(&self, offset: usize) -> u8 {
        self.state.lock().bytes[offset]
    }

    /// All writes made through [`RegisterIo`] since creation or the last [`Self::clear_writes`]
    pub fn writes(&self) -> Vec<RegisterWrite> {
        self.state.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }

    pub fn read_count(&self) -> usize {
        self.state.lock().reads
    }
}

impl RegisterIo for SimRegisterFile {
    fn len(&self) -> usize {
        self.state.lock().bytes.len()
    }

    fn read8(&self, offset: usize) -> u8 {
        let mut state = self.state.lock();
        state.reads += 1;
        state.bytes[offset]
    }

    fn read16(&self, offset: usize) -> u16 {
        let mut state = self.state.lock();
        state.reads += 1;
        u16::from_le_bytes([state.bytes[offset], state.bytes[offset + 1]])
    }

    fn write8(&self, offset: usize, value: u8) {
        let mut state = self.state.lock();
        state.bytes[offset] = value;
        state.writes.push(RegisterWrite::Byte { offset, value });
    }

    fn write16(&self, offset: usize, value: u16) {
        let mut state = self.state.lock();
        state.bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
        state.writes.push(RegisterWrite::Word { offset, value });
    }
}

/// A mapper for simulated device memory
///
/// Only addresses registered with [`SimMapper::add_region`] can be mapped; anything else fails
/// like an exhausted ioremap would.
#[derive(Debug, Default)]
pub struct SimMapper {
    regions: Mutex<BTreeMap<u64, SimRegisterFile>>,
    maps: AtomicUsize,
    unmaps: AtomicUsize,
    unmapped: Mutex<Vec<PhysAddr>>,
}

impl SimMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_region(&self, start: PhysAddr, regs: SimRegisterFile) {
        self.regions.lock().insert(start.as_u64(), regs);
    }

    /// Total successful mappings
    pub fn map_count(&self) -> usize {
        self.maps.load(Ordering::SeqCst)
    }

    pub fn unmap_count(&self) -> usize {
        self.unmaps.load(Ordering::SeqCst)
    }

    /// Mappings that were made but not released yet
    pub fn live_mappings(&self) -> usize {
        self.map_count() - self.unmap_count()
    }

    /// Start addresses of released mappings, in release order
    pub fn unmapped(&self) -> Vec<PhysAddr> {
        self.unmapped.lock().clone()
    }
}

impl IoMapper for SimMapper {
    fn ioremap(&self, start: PhysAddr, len: u64) -> DeviceResult<Box<dyn RegisterIo>> {
        let regions = self.regions.lock();
        let regs = regions.get(&start.as_u64()).ok_or(DeviceError::OutOfMemory)?;
        if len > regs.len() as u64 {
            return Err(DeviceError::InvalidArgument);
        }
        self.maps.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(regs.clone()))
    }

    fn iounmap(&self, start: PhysAddr, region: Box<dyn RegisterIo>) {
        drop(region);
        self.unmaps.fetch_add(1, Ordering::SeqCst);
        self.unmapped.lock().push(start);
    }
}

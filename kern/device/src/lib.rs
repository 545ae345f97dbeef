//! Devices
//!
//! The device / driver model is inspired by the Linux kernel.
//! Buses discover devices and hand them to the drivers that claim them; drivers in turn register
//! what they found with a subsystem (gameports, virtual terminals) which the rest of the kernel
//! talks to. Everything a driver needs from the kernel is passed to it through a
//! [`DriverContext`], so drivers never reach for global state.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use alloc::sync::Arc;

use hadron_base::util::timer::Timer;

pub mod error;
pub mod gameport;
pub mod io;
pub mod mem;
pub mod pci;
pub mod vt;

pub use error::{DeviceError, DeviceResult};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeviceClass {
    /// Unclassified device
    Unclassified,
    MassStorageController,
    NetworkController,
    DisplayController,
    MultimediaController,
    BridgeDevice,
    InputDeviceController,
    Unknown(u8),
}

impl DeviceClass {
    pub fn from_u8(value: u8) -> DeviceClass {
        match value {
            0x00 => DeviceClass::Unclassified,
            0x01 => DeviceClass::MassStorageController,
            0x02 => DeviceClass::NetworkController,
            0x03 => DeviceClass::DisplayController,
            0x04 => DeviceClass::MultimediaController,
            0x06 => DeviceClass::BridgeDevice,
            0x09 => DeviceClass::InputDeviceController,
            other => DeviceClass::Unknown(other),
        }
    }
}

/// The kernel services a driver may use while probing and removing devices
#[derive(Clone)]
pub struct DriverContext {
    /// Maps device memory into the kernel address space
    pub mapper: Arc<dyn io::IoMapper>,
    /// Used for settle delays and speed measurements
    pub timer: Arc<dyn Timer>,
    pub gameports: Arc<gameport::GameportRegistry>,
}

impl DriverContext {
    pub fn new(mapper: Arc<dyn io::IoMapper>, timer: Arc<dyn Timer>) -> Self {
        let gameports = Arc::new(gameport::GameportRegistry::new(timer.clone()));
        Self {
            mapper,
            timer,
            gameports,
        }
    }
}

impl core::fmt::Debug for DriverContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DriverContext")
            .field("gameports", &self.gameports.len())
            .finish_non_exhaustive()
    }
}

use alloc::vec::Vec;

use super::{PCIDev, PCIDriver};
use crate::{DeviceError, DeviceResult, DriverContext};

/// The devices found on the PCI bus, and the drivers registered for them
///
/// Enumeration happens elsewhere; the bus only binds drivers to the devices it is given and
/// unbinds them again.
#[derive(Debug, Default)]
pub struct PCIBus {
    devices: Vec<PCIDev>,
    drivers: Vec<&'static PCIDriver>,
}

impl PCIBus {
    pub const fn new() -> Self {
        Self {
            devices: Vec::new(),
            drivers: Vec::new(),
        }
    }

    /// Adds a device found during enumeration, returning its index
    pub fn add_device(&mut self, dev: PCIDev) -> usize {
        self.devices.push(dev);
        self.devices.len() - 1
    }

    /// Adds a device that showed up after boot, and offers it to the registered drivers
    pub fn hotplug(&mut self, dev: PCIDev, ctx: &DriverContext) -> usize {
        let index = self.add_device(dev);
        let drivers = self.drivers.clone();
        for driver in drivers {
            if Self::try_bind(&mut self.devices[index], driver, ctx) {
                break;
            }
        }
        index
    }

    pub fn devices(&self) -> &[PCIDev] {
        &self.devices
    }

    pub fn device(&self, index: usize) -> Option<&PCIDev> {
        self.devices.get(index)
    }

    pub fn device_mut(&mut self, index: usize) -> Option<&mut PCIDev> {
        self.devices.get_mut(index)
    }

    fn try_bind(dev: &mut PCIDev, driver: &'static PCIDriver, ctx: &DriverContext) -> bool {
        if dev.driver.is_some() {
            return false;
        }
        let Some(id) = driver.match_device(dev) else {
            return false;
        };
        match (driver.probe)(dev, id, ctx) {
            Ok(()) => {
                log::debug!("pci{}: bound to {}", dev.slot_name(), driver.name);
                dev.driver = Some(driver);
                true
            }
            Err(e) => {
                log::warn!("pci{}: {} probe failed: {} ({})", dev.slot_name(), driver.name, e, e.errno());
                dev.driver_data = None;
                dev.disable();
                false
            }
        }
    }

    /// Registers a driver and probes every unbound device it matches
    ///
    /// Returns the number of devices the driver was bound to. A driver that claims nothing is
    /// not kept around, and [`DeviceError::NoDevice`] is returned.
    pub fn register_driver(&mut self, driver: &'static PCIDriver, ctx: &DriverContext) -> DeviceResult<usize> {
        if self.drivers.iter().any(|d| core::ptr::eq(*d, driver)) {
            return Err(DeviceError::Busy);
        }
        log::debug!("pci: registering driver {} {}", driver.name, driver.version);
        let mut bound = 0;
        for dev in self.devices.iter_mut() {
            if Self::try_bind(dev, driver, ctx) {
                bound += 1;
            }
        }
        if bound == 0 {
            return Err(DeviceError::NoDevice);
        }
        self.drivers.push(driver);
        Ok(bound)
    }

    /// Unbinds a driver from all of its devices and forgets about it
    pub fn unregister_driver(&mut self, driver: &'static PCIDriver, ctx: &DriverContext) -> DeviceResult<()> {
        let position = self
            .drivers
            .iter()
            .position(|d| core::ptr::eq(*d, driver))
            .ok_or(DeviceError::NotFound)?;
        self.drivers.remove(position);
        for dev in self.devices.iter_mut() {
            if dev.driver.is_some_and(|d| core::ptr::eq(d, driver)) {
                Self::unbind(dev, ctx);
            }
        }
        Ok(())
    }

    /// Removes a device from the bus (hot-unplug), unbinding its driver first
    pub fn remove_device(&mut self, index: usize, ctx: &DriverContext) -> Option<PCIDev> {
        if index >= self.devices.len() {
            return None;
        }
        let mut dev = self.devices.remove(index);
        Self::unbind(&mut dev, ctx);
        Some(dev)
    }

    fn unbind(dev: &mut PCIDev, ctx: &DriverContext) {
        if let Some(driver) = dev.driver.take() {
            log::debug!("pci{}: unbinding {}", dev.slot_name(), driver.name);
            (driver.remove)(dev, ctx);
            dev.driver_data = None;
        }
    }
}

use alloc::{boxed::Box, format, string::String};
use core::any::Any;
use hadron_base::util::version::SemVer;
use x86_64::PhysAddr;

mod bus;
pub use bus::*;

use crate::{DeviceClass, DeviceResult, DriverContext};

/// Number of address regions (BARs) a PCI function exposes
pub const PCI_NUM_RESOURCES: usize = 6;

pub const PCI_VENDOR_ID_TRIDENT: u16 = 0x1023;
pub const PCI_VENDOR_ID_AUREAL: u16 = 0x12eb;
pub const PCI_VENDOR_ID_INTEL: u16 = 0x8086;
pub const PCI_VENDOR_ID_QEMU: u16 = 0x1234;

/// Name of a vendor, for the ones we know about
pub fn vendor_name(vendor: u16) -> Option<&'static str> {
    match vendor {
        PCI_VENDOR_ID_TRIDENT => Some("Trident"),
        PCI_VENDOR_ID_AUREAL => Some("Aureal"),
        PCI_VENDOR_ID_INTEL => Some("Intel"),
        PCI_VENDOR_ID_QEMU => Some("QEMU"),
        _ => None,
    }
}

bitflags::bitflags! {
    /// Type flags of a device address region
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ResourceFlags: u32 {
        /// Port I/O space
        const IO = 0x0000_0100;
        /// Memory space
        const MEM = 0x0000_0200;
        const PREFETCH = 0x0000_2000;
    }
}

bitflags::bitflags! {
    /// The decoding enables of the PCI command register
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PCICommand: u16 {
        const IO_SPACE = 1 << 0;
        const MEMORY_SPACE = 1 << 1;
        const BUS_MASTER = 1 << 2;
    }
}

/// An address region of a PCI function, as assigned by the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciResource {
    pub start: PhysAddr,
    pub len: u64,
    pub flags: ResourceFlags,
}

impl PciResource {
    /// An unpopulated BAR
    pub const EMPTY: PciResource = PciResource {
        start: PhysAddr::zero(),
        len: 0,
        flags: ResourceFlags::empty(),
    };

    pub const fn io(start: u64, len: u64) -> Self {
        Self {
            start: PhysAddr::new_truncate(start),
            len,
            flags: ResourceFlags::IO,
        }
    }

    pub const fn mem(start: u64, len: u64) -> Self {
        Self {
            start: PhysAddr::new_truncate(start),
            len,
            flags: ResourceFlags::MEM,
        }
    }

    /// Returns true if this is a populated memory mapped region, i.e. something ioremap can map
    pub fn is_mmio(&self) -> bool {
        self.flags.contains(ResourceFlags::MEM) && !self.flags.contains(ResourceFlags::IO) && self.len != 0
    }

    pub fn is_io(&self) -> bool {
        self.flags.contains(ResourceFlags::IO) && self.len != 0
    }
}

/// A PCI device
///
/// This is a device that is connected to the PCI bus or PCI-E bus
/// Despite the name, this is actually a PCI function
pub struct PCIDev {
    pub bus: u8,
    pub slot: u8,
    pub function: u8,
    pub vendor: u16,
    pub device: u16,
    pub subvendor: u16,
    pub subdevice: u16,
    pub class: DeviceClass,
    pub subclass: u8,
    /// The Revision ID of the device
    pub revision: u8,
    /// Human readable name, used for logging and handed to subsystems
    pub name: String,
    /// The address regions of the device
    pub resources: [PciResource; PCI_NUM_RESOURCES],
    command: PCICommand,
    driver: Option<&'static PCIDriver>,
    /// Driver data for the device
    ///
    /// Drivers should only store their data here, and avoid using any state anywhere else
    driver_data: Option<Box<dyn Any + Send + Sync>>,
}

impl PCIDev {
    pub fn new(bus: u8, slot: u8, function: u8, vendor: u16, device: u16) -> Self {
        let name = match vendor_name(vendor) {
            Some(vendor_name) => format!("{} PCI device {:04x}", vendor_name, device),
            None => format!("PCI device {:04x}:{:04x}", vendor, device),
        };
        Self {
            bus,
            slot,
            function,
            vendor,
            device,
            subvendor: PCIDeviceId::ANY_SUBVENDOR,
            subdevice: PCIDeviceId::ANY_SUBDEVICE,
            class: DeviceClass::Unclassified,
            subclass: 0,
            revision: 0,
            name,
            resources: [PciResource::EMPTY; PCI_NUM_RESOURCES],
            command: PCICommand::empty(),
            driver: None,
            driver_data: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_class(mut self, class: DeviceClass, subclass: u8) -> Self {
        self.class = class;
        self.subclass = subclass;
        self
    }

    pub fn with_subsystem(mut self, subvendor: u16, subdevice: u16) -> Self {
        self.subvendor = subvendor;
        self.subdevice = subdevice;
        self
    }

    /// # Panics
    /// Panics if `index` is not a valid BAR number
    pub fn with_resource(mut self, index: usize, resource: PciResource) -> Self {
        self.resources[index] = resource;
        self
    }

    /// The bus address of the function, e.g. `00:0d.0`
    pub fn slot_name(&self) -> String {
        format!("{:02x}:{:02x}.{}", self.bus, self.slot, self.function)
    }

    pub fn resource(&self, index: usize) -> Option<&PciResource> {
        self.resources.get(index)
    }

    /// Turns on address decoding for the regions the device has
    pub fn enable(&mut self) -> DeviceResult<()> {
        let mut command = self.command;
        for resource in &self.resources {
            if resource.is_io() {
                command |= PCICommand::IO_SPACE;
            } else if resource.is_mmio() {
                command |= PCICommand::MEMORY_SPACE;
            }
        }
        if command != self.command {
            log::debug!("pci{}: enabling device ({:?})", self.slot_name(), command);
        }
        self.command = command;
        Ok(())
    }

    /// Turns address decoding off again
    pub fn disable(&mut self) {
        if self.is_enabled() {
            log::debug!("pci{}: disabling device", self.slot_name());
        }
        self.command.remove(PCICommand::IO_SPACE | PCICommand::MEMORY_SPACE);
    }

    pub fn is_enabled(&self) -> bool {
        self.command.intersects(PCICommand::IO_SPACE | PCICommand::MEMORY_SPACE)
    }

    pub fn command(&self) -> PCICommand {
        self.command
    }

    /// The driver currently bound to the device
    pub fn driver(&self) -> Option<&'static PCIDriver> {
        self.driver
    }

    pub fn set_driver_data<T: Any + Send + Sync>(&mut self, data: T) {
        self.driver_data = Some(Box::new(data));
    }

    pub fn driver_data<T: Any>(&self) -> Option<&T> {
        self.driver_data.as_ref()?.downcast_ref()
    }

    /// Takes the driver data out of the device, if it is a `T`
    pub fn take_driver_data<T: Any>(&mut self) -> Option<T> {
        if !self.driver_data.as_ref()?.is::<T>() {
            return None;
        }
        self.driver_data.take()?.downcast::<T>().ok().map(|data| *data)
    }
}

impl core::fmt::Debug for PCIDev {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PCIDev")
            .field("slot", &self.slot_name())
            .field("vendor", &format_args!("{:#x}", self.vendor))
            .field("device", &format_args!("{:#x}", self.device))
            .field("name", &self.name)
            .field("command", &self.command)
            .field("driver", &self.driver.map(|driver| driver.name))
            .finish_non_exhaustive()
    }
}

/// An entry of a driver's id table
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PCIDeviceId {
    /// The vendor ID of the device, use 0xFFFF for any vendor
    pub vendor: u16,
    pub device: u16,
    pub subvendor: u16,
    pub subdevice: u16,
    pub class: DeviceClass,
    pub subclass: u8,
    /// Driver private tag, handed back to the driver's probe
    pub driver_data: usize,
}

impl PCIDeviceId {
    pub const ANY_VENDOR: u16 = 0xFFFF;
    pub const ANY_SUBVENDOR: u16 = 0xFFFF;
    pub const ANY_DEVICE: u16 = 0xFFFF;
    pub const ANY_SUBDEVICE: u16 = 0xFFFF;
    pub const ANY_CLASS: DeviceClass = DeviceClass::Unknown(0xFF);
    pub const ANY_SUBCLASS: u8 = 0xFF;

    /// Matches a vendor / device pair, with any subsystem and class
    pub const fn new(vendor: u16, device: u16, driver_data: usize) -> Self {
        Self {
            vendor,
            device,
            subvendor: Self::ANY_SUBVENDOR,
            subdevice: Self::ANY_SUBDEVICE,
            class: Self::ANY_CLASS,
            subclass: Self::ANY_SUBCLASS,
            driver_data,
        }
    }

    pub fn matches(&self, dev: &PCIDev) -> bool {
        let vendor_matches = self.vendor == PCIDeviceId::ANY_VENDOR || self.vendor == dev.vendor;
        let device_matches = self.device == PCIDeviceId::ANY_DEVICE || self.device == dev.device;
        let subvendor_matches = self.subvendor == PCIDeviceId::ANY_SUBVENDOR || self.subvendor == dev.subvendor;
        let subdevice_matches = self.subdevice == PCIDeviceId::ANY_SUBDEVICE || self.subdevice == dev.subdevice;
        let class_matches = self.class == PCIDeviceId::ANY_CLASS || self.class == dev.class;
        let subclass_matches = self.subclass == PCIDeviceId::ANY_SUBCLASS || self.subclass == dev.subclass;
        vendor_matches && device_matches && subvendor_matches && subdevice_matches && class_matches && subclass_matches
    }
}

impl core::fmt::Debug for PCIDeviceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PCIDeviceId")
            .field("vendor", &format_args!("{:#x}", self.vendor))
            .field("device", &format_args!("{:#x}", self.device))
            .field("subvendor", &format_args!("{:#x}", self.subvendor))
            .field("subdevice", &format_args!("{:#x}", self.subdevice))
            .field("class", &self.class)
            .field("subclass", &self.subclass)
            .field("driver_data", &self.driver_data)
            .finish()
    }
}

/// Called when a device matches one of the driver's ids
pub type PCIProbeFn = fn(&mut PCIDev, &PCIDeviceId, &DriverContext) -> DeviceResult<()>;
/// Called when a bound device goes away, or the driver is unregistered
pub type PCIRemoveFn = fn(&mut PCIDev, &DriverContext);

#[derive(Debug)]
pub struct PCIDriver {
    pub name: &'static str,
    pub version: SemVer,
    pub id_table: &'static [PCIDeviceId],
    pub probe: PCIProbeFn,
    pub remove: PCIRemoveFn,
}

impl PCIDriver {
    /// Returns the first id table entry matching `dev`
    pub fn match_device(&self, dev: &PCIDev) -> Option<&'static PCIDeviceId> {
        self.id_table.iter().find(|id| id.matches(dev))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_wildcards() {
        let dev = PCIDev::new(0, 0x0d, 0, PCI_VENDOR_ID_TRIDENT, 0x2000)
            .with_class(DeviceClass::MultimediaController, 1)
            .with_subsystem(0x1023, 0x1234);
        assert!(PCIDeviceId::new(PCI_VENDOR_ID_TRIDENT, 0x2000, 0).matches(&dev));
        assert!(!PCIDeviceId::new(PCI_VENDOR_ID_TRIDENT, 0x2001, 0).matches(&dev));
        assert!(PCIDeviceId::new(PCIDeviceId::ANY_VENDOR, PCIDeviceId::ANY_DEVICE, 0).matches(&dev));
        let strict_class = PCIDeviceId {
            class: DeviceClass::InputDeviceController,
            ..PCIDeviceId::new(PCI_VENDOR_ID_TRIDENT, 0x2000, 0)
        };
        assert!(!strict_class.matches(&dev));
    }

    #[test]
    fn slot_name_format() {
        let dev = PCIDev::new(0, 0x0d, 0, 0x12eb, 0x0001);
        assert_eq!(dev.slot_name(), "00:0d.0");
        assert_eq!(dev.name, "Aureal PCI device 0001");
    }

    #[test]
    fn enable_turns_on_decoding_for_present_regions() {
        let mut dev = PCIDev::new(0, 1, 0, 0x1023, 0x2000)
            .with_resource(0, PciResource::io(0xd000, 0x100))
            .with_resource(1, PciResource::mem(0xfebf_0000, 0x1000));
        assert!(!dev.is_enabled());
        dev.enable().unwrap();
        assert_eq!(dev.command(), PCICommand::IO_SPACE | PCICommand::MEMORY_SPACE);
        dev.disable();
        assert!(!dev.is_enabled());
    }

    #[test]
    fn driver_data_round_trip() {
        let mut dev = PCIDev::new(0, 1, 0, 0x1023, 0x2000);
        dev.set_driver_data(7usize);
        assert_eq!(dev.driver_data::<usize>(), Some(&7));
        assert_eq!(dev.take_driver_data::<u32>(), None);
        assert_eq!(dev.take_driver_data::<usize>(), Some(7));
        assert_eq!(dev.driver_data::<usize>(), None);
    }
}

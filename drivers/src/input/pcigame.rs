//! PCI gameport driver
//!
//! The gameport of the Trident 4DWave and Aureal Vortex / Vortex 2 sound chips. Besides the
//! legacy joystick port, these chips can sample the stick positions themselves ("cooked" mode),
//! and expose the results in their memory mapped registers.

use alloc::{boxed::Box, format, sync::Arc};
use core::time::Duration;
use hadron_base::util::{timer::Timer, version::SemVer};
use hadron_device::{
    DeviceError, DeviceResult, DriverContext,
    gameport::{AXIS_DISCONNECTED, BUS_PCI, CookedReading, Gameport, GameportId, GameportMode, GameportOps, InputId},
    io::IoMem,
    mem::try_box_uninit,
    pci::{PCI_NUM_RESOURCES, PCI_VENDOR_ID_AUREAL, PCI_VENDOR_ID_TRIDENT, PCIBus, PCIDev, PCIDeviceId, PCIDriver},
};
use static_assertions::{assert_impl_all, const_assert};

use crate::config;

pub const PCIGAME_4DWAVE: usize = 0;
pub const PCIGAME_VORTEX: usize = 1;
pub const PCIGAME_VORTEX2: usize = 2;
const PCIGAME_NR: usize = 3;

const_assert!(PCIGAME_4DWAVE < PCIGAME_NR && PCIGAME_VORTEX < PCIGAME_NR && PCIGAME_VORTEX2 < PCIGAME_NR);

/// Time the ADC needs after being enabled before the axis registers are valid
pub const PCIGAME_DATA_WAIT: Duration = Duration::from_millis(20);

/// Register layout of one chip family, offsets are into the memory mapped window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciGameData {
    /// Gameport control register
    pub gcr: usize,
    pub legacy: usize,
    /// First axis register
    pub axes: usize,
    /// Distance between two axis registers
    pub axsize: usize,
    /// What an axis without a stick reads as
    pub axmax: u16,
    /// Control register value that turns on the ADC
    pub adcmode: u8,
}

impl PciGameData {
    /// Bytes of register window needed to reach every register of the layout
    pub const fn window_size(&self) -> u64 {
        let control = (if self.gcr > self.legacy { self.gcr } else { self.legacy }) + 1;
        // Four 16 bit axis registers
        let axes = self.axes + 3 * self.axsize + 2;
        (if control > axes { control } else { axes }) as u64
    }
}

pub static PCIGAME_DATA: [PciGameData; PCIGAME_NR] = [
    // 4DWave
    PciGameData {
        gcr: 0x00030,
        legacy: 0x00031,
        axes: 0x00034,
        axsize: 2,
        axmax: 0xffff,
        adcmode: 0x80,
    },
    // Vortex
    PciGameData {
        gcr: 0x1100c,
        legacy: 0x11008,
        axes: 0x11010,
        axsize: 4,
        axmax: 0x1fff,
        adcmode: 0x40,
    },
    // Vortex 2
    PciGameData {
        gcr: 0x2880c,
        legacy: 0x28808,
        axes: 0x28810,
        axsize: 4,
        axmax: 0x1fff,
        adcmode: 0x40,
    },
];

static PCIGAME_IDS: [PCIDeviceId; 4] = [
    // Trident 4DWave DX
    PCIDeviceId::new(PCI_VENDOR_ID_TRIDENT, 0x2000, PCIGAME_4DWAVE),
    // Trident 4DWave NX
    PCIDeviceId::new(PCI_VENDOR_ID_TRIDENT, 0x2001, PCIGAME_4DWAVE),
    PCIDeviceId::new(PCI_VENDOR_ID_AUREAL, 0x0001, PCIGAME_VORTEX),
    PCIDeviceId::new(PCI_VENDOR_ID_AUREAL, 0x0002, PCIGAME_VORTEX2),
];

#[used]
#[cfg_attr(target_os = "none", unsafe(link_section = ".pci_drivers"))]
pub static DRIVER: PCIDriver = PCIDriver {
    name: "pcigame",
    version: SemVer::new(0, 0, 1),
    id_table: &PCIGAME_IDS,
    probe,
    remove,
};

/// The gameport of one chip
pub struct PciGame {
    data: &'static PciGameData,
    regs: IoMem,
    timer: Arc<dyn Timer>,
}

assert_impl_all!(PciGame: Send, Sync);

impl PciGame {
    pub fn new(data: &'static PciGameData, regs: IoMem, timer: Arc<dyn Timer>) -> Self {
        Self { data, regs, timer }
    }
}

impl GameportOps for PciGame {
    fn read(&mut self) -> u8 {
        self.regs.read8(self.data.legacy)
    }

    fn trigger(&mut self) {
        self.regs.write8(self.data.legacy, 0xff);
    }

    fn cooked_read(&mut self) -> DeviceResult<CookedReading> {
        let data = self.data;
        // Buttons are active low, in the high nibble
        let buttons = (!self.regs.read8(data.legacy) >> 4) & 0xf;
        let axes = core::array::from_fn(|i| match self.regs.read16(data.axes + i * data.axsize) {
            raw if raw == data.axmax => AXIS_DISCONNECTED,
            raw => i32::from(raw),
        });
        Ok(CookedReading { buttons, axes })
    }

    fn open(&mut self, mode: GameportMode) -> DeviceResult<()> {
        match mode {
            GameportMode::Cooked => {
                self.regs.write8(self.data.gcr, self.data.adcmode);
                self.timer.delay(PCIGAME_DATA_WAIT);
                Ok(())
            }
            GameportMode::Raw => {
                self.regs.write8(self.data.gcr, 0);
                Ok(())
            }
            _ => Err(DeviceError::InvalidArgument),
        }
    }
}

fn probe(dev: &mut PCIDev, id: &PCIDeviceId, ctx: &DriverContext) -> DeviceResult<()> {
    let data = PCIGAME_DATA.get(id.driver_data).ok_or(DeviceError::InvalidArgument)?;

    dev.enable()?;

    let Some(region) = dev.resources[..PCI_NUM_RESOURCES].iter().find(|r| r.is_mmio()).copied() else {
        log::warn!("pci{}: pcigame: no memory mapped I/O region", dev.slot_name());
        return Err(DeviceError::NoIoRegion { slot: dev.slot_name() });
    };

    let needed = data.window_size();
    if region.len < needed {
        log::warn!(
            "pci{}: pcigame: I/O region of {:#x} bytes, registers need {:#x}",
            dev.slot_name(),
            region.len,
            needed
        );
        return Err(DeviceError::RegionTooSmall {
            slot: dev.slot_name(),
            len: region.len,
            needed,
        });
    }

    let mut game = try_box_uninit::<PciGame>()?;
    let regs = IoMem::map(&ctx.mapper, region.start, region.len)?;
    game.write(PciGame::new(data, regs, ctx.timer.clone()));
    // SAFETY: just initialised
    let ops: Box<dyn GameportOps> = unsafe { game.assume_init() };

    let phys = format!("pci{}/gameport0", dev.slot_name());
    let id = InputId {
        bustype: BUS_PCI,
        vendor: dev.vendor,
        product: dev.device,
        version: 0,
    };
    let port = Gameport::new(dev.name.clone(), phys, id, ops).with_fuzz(config::GAMEPORT_FUZZ);
    let gameport = ctx.gameports.register_port(port)?;
    dev.set_driver_data::<GameportId>(gameport);

    log::info!(
        "gameport: {} at pci{} speed {} kHz",
        dev.name,
        dev.slot_name(),
        ctx.gameports.speed(gameport).unwrap_or(0)
    );
    Ok(())
}

fn remove(dev: &mut PCIDev, ctx: &DriverContext) {
    let Some(gameport) = dev.take_driver_data::<GameportId>() else {
        return;
    };
    match ctx.gameports.unregister_port(gameport) {
        // Dropping the port releases the chip's register window
        Ok(port) => drop(port),
        Err(e) => log::warn!("pci{}: pcigame: gameport{} already gone: {}", dev.slot_name(), gameport, e),
    }
}

/// Registers the driver, returning the number of chips it was bound to
pub fn init(bus: &mut PCIBus, ctx: &DriverContext) -> DeviceResult<usize> {
    bus.register_driver(&DRIVER, ctx)
}

pub fn exit(bus: &mut PCIBus, ctx: &DriverContext) -> DeviceResult<()> {
    bus.unregister_driver(&DRIVER, ctx)
}

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use hadron_base::util::{
    logging,
    timer::{Timer, TimerTicks},
};
use hadron_device::{
    DeviceError, DriverContext,
    gameport::{BUS_PCI, GameportMode},
    io::{
        IoMapper,
        sim::{RegisterWrite, SimMapper, SimRegisterFile},
    },
    pci::{PCI_VENDOR_ID_AUREAL, PCI_VENDOR_ID_TRIDENT, PCIBus, PCIDev, PciResource},
};
use hadron_drivers::input::pcigame::{self, PCIGAME_DATA_WAIT};
use x86_64::PhysAddr;

const TRIDENT_BASE: u64 = 0xfebf_0000;
const VORTEX_BASE: u64 = 0xfea0_0000;
const VORTEX2_BASE: u64 = 0xfe80_0000;

/// A 1 MHz clock that advances one tick per reading, and doesn't wait in `delay`
#[derive(Default)]
struct FakeTimer {
    ticks: AtomicU64,
    delays: Mutex<Vec<Duration>>,
}

impl Timer for FakeTimer {
    fn now(&self) -> TimerTicks {
        TimerTicks(self.ticks.fetch_add(1, Ordering::Relaxed))
    }

    fn frequency(&self) -> u64 {
        1_000_000
    }

    fn delay(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

struct Machine {
    bus: PCIBus,
    ctx: DriverContext,
    mapper: Arc<SimMapper>,
    timer: Arc<FakeTimer>,
}

impl Machine {
    fn new() -> Self {
        logging::init(log::LevelFilter::Info);
        let mapper = Arc::new(SimMapper::new());
        let timer = Arc::new(FakeTimer::default());
        let ctx = DriverContext::new(mapper.clone() as Arc<dyn IoMapper>, timer.clone());
        Self {
            bus: PCIBus::new(),
            ctx,
            mapper,
            timer,
        }
    }

    /// Adds a chip with its register window at `base`
    fn add_chip(&mut self, slot: u8, vendor: u16, device: u16, name: &str, base: u64, len: usize) -> SimRegisterFile {
        let regs = SimRegisterFile::new(len);
        self.mapper.add_region(PhysAddr::new(base), regs.clone());
        let dev = PCIDev::new(0, slot, 0, vendor, device)
            .with_name(name)
            .with_resource(0, PciResource::io(0xe000 + slot as u64 * 0x100, 0x100))
            .with_resource(1, PciResource::mem(base, len as u64));
        self.bus.add_device(dev);
        regs
    }

    fn port_of(&self, index: usize) -> usize {
        *self.bus.device(index).unwrap().driver_data::<usize>().unwrap()
    }
}

#[test]
fn attaches_every_supported_chip() {
    let mut machine = Machine::new();
    machine.add_chip(4, PCI_VENDOR_ID_TRIDENT, 0x2000, "Trident 4DWave DX", TRIDENT_BASE, 0x100);
    machine.add_chip(5, PCI_VENDOR_ID_TRIDENT, 0x2001, "Trident 4DWave NX", TRIDENT_BASE + 0x1000, 0x100);
    machine.add_chip(6, PCI_VENDOR_ID_AUREAL, 0x0001, "Aureal Vortex", VORTEX_BASE, 0x20000);
    machine.add_chip(7, PCI_VENDOR_ID_AUREAL, 0x0002, "Aureal Vortex 2", VORTEX2_BASE, 0x40000);
    machine.bus.add_device(PCIDev::new(0, 8, 0, 0x8086, 0x2415));

    assert_eq!(pcigame::init(&mut machine.bus, &machine.ctx), Ok(4));
    assert_eq!(machine.ctx.gameports.len(), 4);
    assert_eq!(machine.mapper.map_count(), 4);
    assert!(machine.bus.device(4).unwrap().driver().is_none());

    let port = machine.port_of(2);
    machine
        .ctx
        .gameports
        .with_port(port, |port| {
            assert_eq!(port.name, "Aureal Vortex");
            assert_eq!(port.phys, "pci00:06.0/gameport0");
            assert_eq!(port.id.bustype, BUS_PCI);
            assert_eq!(port.id.vendor, PCI_VENDOR_ID_AUREAL);
            assert_eq!(port.id.product, 0x0001);
            assert_eq!(port.fuzz, 64);
        })
        .unwrap();

    // One tick per round of 50 reads at 1 MHz
    assert_eq!(machine.ctx.gameports.speed(port), Some(50_000));
    assert!(logging::dmesg_contains("gameport: Aureal Vortex at pci00:06.0 speed 50000 kHz"));
    assert!(machine.bus.device(0).unwrap().is_enabled());
}

#[test]
fn cooked_reads_through_the_registry() {
    let mut machine = Machine::new();
    let regs = machine.add_chip(4, PCI_VENDOR_ID_TRIDENT, 0x2000, "Trident 4DWave DX", TRIDENT_BASE, 0x100);
    pcigame::init(&mut machine.bus, &machine.ctx).unwrap();
    // Speed measurement switched the port to raw mode
    regs.clear_writes();

    regs.poke8(0x31, 0x5f);
    regs.poke16(0x34, 0x0400);
    regs.poke16(0x36, 0xffff);
    regs.poke16(0x38, 0xffff);
    regs.poke16(0x3a, 0x0123);

    let port = machine.port_of(0);
    let reading = machine
        .ctx
        .gameports
        .with_port(port, |port| {
            port.open(GameportMode::Cooked)?;
            port.cooked_read()
        })
        .unwrap()
        .unwrap();

    assert_eq!(reading.buttons, 0xa);
    assert_eq!(reading.axes, [0x400, -1, -1, 0x123]);
    assert_eq!(regs.writes(), [RegisterWrite::Byte { offset: 0x30, value: 0x80 }]);
    assert_eq!(*machine.timer.delays.lock().unwrap(), [PCIGAME_DATA_WAIT]);
}

#[test]
fn unknown_mode_writes_nothing() {
    let mut machine = Machine::new();
    let regs = machine.add_chip(6, PCI_VENDOR_ID_AUREAL, 0x0002, "Aureal Vortex 2", VORTEX2_BASE, 0x40000);
    pcigame::init(&mut machine.bus, &machine.ctx).unwrap();
    regs.clear_writes();

    let port = machine.port_of(0);
    let result = machine.ctx.gameports.with_port(port, |port| port.open(GameportMode::Disabled));
    assert_eq!(result, Some(Err(DeviceError::InvalidArgument)));
    assert!(regs.writes().is_empty());

    machine.ctx.gameports.with_port(port, |port| port.trigger());
    assert_eq!(regs.writes(), [RegisterWrite::Byte { offset: 0x28808, value: 0xff }]);
}

#[test]
fn exit_unmaps_every_chip_once() {
    let mut machine = Machine::new();
    machine.add_chip(4, PCI_VENDOR_ID_TRIDENT, 0x2000, "Trident 4DWave DX", TRIDENT_BASE, 0x100);
    machine.add_chip(6, PCI_VENDOR_ID_AUREAL, 0x0001, "Aureal Vortex", VORTEX_BASE, 0x20000);
    pcigame::init(&mut machine.bus, &machine.ctx).unwrap();
    assert_eq!(machine.mapper.live_mappings(), 2);

    pcigame::exit(&mut machine.bus, &machine.ctx).unwrap();
    assert_eq!(machine.mapper.unmap_count(), 2);
    assert_eq!(machine.mapper.live_mappings(), 0);
    let mut unmapped = machine.mapper.unmapped();
    unmapped.sort();
    assert_eq!(unmapped, [PhysAddr::new(VORTEX_BASE), PhysAddr::new(TRIDENT_BASE)]);
    assert!(machine.ctx.gameports.is_empty());
    assert!(machine.bus.devices().iter().all(|dev| dev.driver().is_none()));

    assert_eq!(pcigame::exit(&mut machine.bus, &machine.ctx), Err(DeviceError::NotFound));
    assert_eq!(machine.mapper.unmap_count(), 2);
}

#[test]
fn hot_unplug_and_replug() {
    let mut machine = Machine::new();
    machine.add_chip(4, PCI_VENDOR_ID_TRIDENT, 0x2000, "Trident 4DWave DX", TRIDENT_BASE, 0x100);
    pcigame::init(&mut machine.bus, &machine.ctx).unwrap();

    let dev = machine.bus.remove_device(0, &machine.ctx).unwrap();
    assert!(dev.driver().is_none());
    assert_eq!(machine.mapper.unmapped(), [PhysAddr::new(TRIDENT_BASE)]);
    assert!(machine.ctx.gameports.is_empty());

    let index = machine.bus.hotplug(
        PCIDev::new(0, 4, 0, PCI_VENDOR_ID_TRIDENT, 0x2000).with_resource(0, PciResource::mem(TRIDENT_BASE, 0x100)),
        &machine.ctx,
    );
    assert!(machine.bus.device(index).unwrap().driver().is_some());
    assert_eq!(machine.ctx.gameports.len(), 1);
    assert_eq!(machine.mapper.live_mappings(), 1);
}

#[test]
fn chip_without_memory_region_is_refused() {
    let mut machine = Machine::new();
    let dev = PCIDev::new(0, 9, 0, PCI_VENDOR_ID_AUREAL, 0x0001).with_resource(0, PciResource::io(0xd000, 0x40));
    machine.bus.add_device(dev);

    assert_eq!(pcigame::init(&mut machine.bus, &machine.ctx), Err(DeviceError::NoDevice));
    assert_eq!(machine.mapper.map_count(), 0);
    assert!(machine.ctx.gameports.is_empty());
    assert!(machine.bus.device(0).unwrap().driver().is_none());
    assert!(logging::dmesg_contains("pci00:09.0: no memory mapped I/O region"));
}

#[test]
fn chip_with_short_region_is_refused() {
    let mut machine = Machine::new();
    // Vortex registers start at 0x11008, far past this window
    machine.add_chip(11, PCI_VENDOR_ID_AUREAL, 0x0001, "Aureal Vortex", VORTEX_BASE, 0x1000);

    assert_eq!(pcigame::init(&mut machine.bus, &machine.ctx), Err(DeviceError::NoDevice));
    assert_eq!(machine.mapper.map_count(), 0);
    assert!(machine.ctx.gameports.is_empty());
    assert!(machine.bus.device(0).unwrap().driver().is_none());
    assert!(logging::dmesg_contains(
        "pci00:0b.0: I/O region of 0x1000 bytes is too small, need 0x1101e"
    ));
}

#[test]
fn region_exactly_covering_the_registers_is_enough() {
    let mut machine = Machine::new();
    machine.add_chip(12, PCI_VENDOR_ID_TRIDENT, 0x2000, "Trident 4DWave DX", TRIDENT_BASE, 0x3c);
    assert_eq!(pcigame::init(&mut machine.bus, &machine.ctx), Ok(1));
}

#[test]
fn failed_mapping_leaves_nothing_behind() {
    let mut machine = Machine::new();
    // No simulated memory behind this window
    let dev = PCIDev::new(0, 10, 0, PCI_VENDOR_ID_TRIDENT, 0x2001).with_resource(2, PciResource::mem(0xfd00_0000, 0x100));
    machine.bus.add_device(dev);

    assert_eq!(pcigame::init(&mut machine.bus, &machine.ctx), Err(DeviceError::NoDevice));
    assert_eq!(machine.mapper.map_count(), 0);
    assert_eq!(machine.mapper.unmap_count(), 0);
    assert!(machine.ctx.gameports.is_empty());
    assert!(machine.bus.device(0).unwrap().driver_data::<usize>().is_none());
}

//! Allocation failure while attaching, kept in its own test binary since it swaps the global
//! allocator.

use std::{
    alloc::{GlobalAlloc, Layout, System},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use hadron_base::util::{
    logging,
    timer::{Timer, TimerTicks},
};
use hadron_device::{
    DeviceError, DriverContext,
    io::{IoMapper, sim::{SimMapper, SimRegisterFile}},
    pci::{PCI_VENDOR_ID_AUREAL, PCIBus, PCIDev, PciResource},
};
use hadron_drivers::input::pcigame::{self, PciGame};
use x86_64::PhysAddr;

/// Fails the next allocation shaped like a [`PciGame`] once armed
struct FailingAlloc {
    armed: AtomicBool,
}

unsafe impl GlobalAlloc for FailingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout == Layout::new::<PciGame>() && self.armed.swap(false, Ordering::SeqCst) {
            return core::ptr::null_mut();
        }
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static ALLOC: FailingAlloc = FailingAlloc {
    armed: AtomicBool::new(false),
};

struct NullTimer;

impl Timer for NullTimer {
    fn now(&self) -> TimerTicks {
        TimerTicks(0)
    }

    fn frequency(&self) -> u64 {
        1_000_000
    }
}

#[test]
fn out_of_memory_fails_before_mapping() {
    logging::init(log::LevelFilter::Warn);
    let mapper = Arc::new(SimMapper::new());
    mapper.add_region(PhysAddr::new(0xfea0_0000), SimRegisterFile::new(0x20000));
    let ctx = DriverContext::new(mapper.clone() as Arc<dyn IoMapper>, Arc::new(NullTimer));
    let mut bus = PCIBus::new();
    bus.add_device(
        PCIDev::new(0, 6, 0, PCI_VENDOR_ID_AUREAL, 0x0001).with_resource(0, PciResource::mem(0xfea0_0000, 0x20000)),
    );

    ALLOC.armed.store(true, Ordering::SeqCst);
    assert_eq!(pcigame::init(&mut bus, &ctx), Err(DeviceError::NoDevice));
    ALLOC.armed.store(false, Ordering::SeqCst);

    assert_eq!(mapper.map_count(), 0);
    assert!(ctx.gameports.is_empty());
    assert!(bus.device(0).unwrap().driver().is_none());
    assert!(logging::dmesg_contains("probe failed: out of memory"));
}

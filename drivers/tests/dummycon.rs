use std::sync::Arc;

use hadron_base::util::{
    logging,
    timer::{Timer, TimerTicks},
};
use hadron_device::{
    DeviceError, DriverContext,
    io::sim::SimMapper,
    pci::PCIBus,
    vt::{BlankMode, VtSubsystem},
};
use hadron_drivers::video::dummycon::{self, DUMMY_COLUMNS, DUMMY_ROWS, DUMMY_VT};

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
fn binds_and_logs_geometry() {
    logging::init(log::LevelFilter::Info);
    let vt = VtSubsystem::new();
    dummycon::dummycon_init(&vt).unwrap();

    let display = vt.display().unwrap();
    assert!(core::ptr::eq(display, &DUMMY_VT));
    assert_eq!(display.display_desc(), Some("dummy device"));
    assert!(!display.is_heap_owned());

    let vc = vt.console(0).unwrap();
    assert_eq!((vc.cols, vc.rows), (DUMMY_COLUMNS, DUMMY_ROWS));
    assert!(vc.can_do_color);
    assert_eq!(vt.resize_count(), 0);

    let line = format!("Console: mono dummy device {}x{}", DUMMY_COLUMNS, DUMMY_ROWS);
    assert!(logging::dmesg_contains(&line));
}

#[test]
fn refused_binding_is_no_device() {
    let vt = VtSubsystem::new();
    dummycon::dummycon_init(&vt).unwrap();
    assert_eq!(dummycon::dummycon_init(&vt), Err(DeviceError::NoDevice));
}

#[test]
fn reinit_resizes_to_default() {
    let vt = VtSubsystem::new();
    dummycon::dummycon_init(&vt).unwrap();
    vt.allocate_console(1).unwrap();
    assert_eq!(vt.resize_count(), 0);

    vt.reinit_console(1).unwrap();
    assert_eq!(vt.resize_count(), 1);
    let vc = vt.console(1).unwrap();
    assert_eq!((vc.cols, vc.rows), (DUMMY_COLUMNS, DUMMY_ROWS));
}

#[test]
fn console_still_keeps_text() {
    let vt = VtSubsystem::new();
    dummycon::dummycon_init(&vt).unwrap();

    vt.write(0, "hello\nworld").unwrap();
    for _ in 0..DUMMY_ROWS {
        vt.write(0, "\n").unwrap();
    }
    vt.blank(BlankMode::Normal).unwrap();
    vt.switch_console(0).unwrap();

    let vc = vt.console(0).unwrap();
    assert_eq!(vc.y, DUMMY_ROWS - 1);
    assert!(vc.line(0).iter().all(|&c| c == b' '));
}

#[test]
fn driver_bring_up() {
    let vt = VtSubsystem::new();
    let mut bus = PCIBus::new();
    let ctx = DriverContext::new(Arc::new(SimMapper::new()), Arc::new(NullTimer));

    hadron_drivers::init(&mut bus, &ctx, &vt).unwrap();
    assert_eq!(vt.display().and_then(|d| d.display_desc()), Some("dummy device"));
    assert!(ctx.gameports.is_empty());
    assert!(hadron_base::util::timer::TIMER.read().is_some());
}

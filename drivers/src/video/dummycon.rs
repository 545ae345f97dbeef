//! Dummy console
//!
//! A console that draws nothing. It keeps the VT layer happy on machines that have no text
//! display, until a real display driver takes over.

use hadron_device::{
    DeviceError, DeviceResult,
    vt::{BlankMode, ConsoleSwitch, CursorMode, FontOp, ScrollDir, VcData, VcResize, VtDisplay, VtSubsystem},
};

use crate::config;
use static_assertions::const_assert;

pub const DUMMY_COLUMNS: u16 = config::DUMMY_CONSOLE_COLUMNS;
pub const DUMMY_ROWS: u16 = config::DUMMY_CONSOLE_ROWS;

const_assert!(DUMMY_COLUMNS > 0 && DUMMY_ROWS > 0);

pub struct DummyConsole;

impl ConsoleSwitch for DummyConsole {
    fn startup(&self, default_mode: &mut VcData, _init: bool) -> &'static str {
        default_mode.cols = DUMMY_COLUMNS;
        default_mode.rows = DUMMY_ROWS;
        "dummy device"
    }

    fn init(&self, vc: &mut VcData, init: bool, vt: &dyn VcResize) {
        vc.can_do_color = true;
        if init {
            vc.cols = DUMMY_COLUMNS;
            vc.rows = DUMMY_ROWS;
        } else if let Err(e) = vt.resize(vc, DUMMY_COLUMNS, DUMMY_ROWS) {
            log::warn!("dummycon: vt{} resize failed: {}", vc.num, e);
        }
    }

    fn deinit(&self, _vc: &VcData) {}

    fn clear(&self, _vc: &VcData, _y: u16, _x: u16, _height: u16, _width: u16) {}

    fn putc(&self, _vc: &VcData, _c: u16, _y: u16, _x: u16) {}

    fn putcs(&self, _vc: &VcData, _s: &[u16], _y: u16, _x: u16) {}

    fn cursor(&self, _vc: &VcData, _mode: CursorMode) {}

    fn scroll_region(&self, _vc: &VcData, _top: u16, _bottom: u16, _dir: ScrollDir, _count: u16) -> bool {
        false
    }

    fn bmove(&self, _vc: &VcData, _sy: u16, _sx: u16, _dy: u16, _dx: u16, _height: u16, _width: u16) {}

    fn switch(&self, _vc: &VcData) -> bool {
        false
    }

    fn blank(&self, _vc: &VcData, _mode: BlankMode) -> bool {
        false
    }

    fn font_op(&self, _vc: &VcData, _op: &mut FontOp) -> DeviceResult<()> {
        Ok(())
    }

    fn set_palette(&self, _vc: &VcData, _table: &[u8]) -> DeviceResult<()> {
        Ok(())
    }

    fn scroll(&self, _vc: &VcData, _lines: i32) -> bool {
        false
    }
}

pub static DUMMY_CON: DummyConsole = DummyConsole;

/// The one dummy display, it lives as long as the kernel does
pub static DUMMY_VT: VtDisplay = VtDisplay::new(&DUMMY_CON, false);

/// Binds the dummy console to the VT layer
pub fn dummycon_init(vt: &VtSubsystem) -> DeviceResult<()> {
    let desc = vt.map_display(&DUMMY_VT, true).map_err(|e| {
        log::debug!("dummycon: display not bound: {}", e);
        DeviceError::NoDevice
    })?;
    log::info!("Console: mono {} {}x{}", desc, DUMMY_COLUMNS, DUMMY_ROWS);
    Ok(())
}

use alloc::vec::Vec;

use super::{VcData, VcResize};
use crate::DeviceResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    Erase,
    Draw,
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDir {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlankMode {
    Unblank,
    Normal,
    Powerdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontOpKind {
    Set,
    Get,
    SetDefault,
    Copy,
}

/// A font request for the console driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontOp {
    pub op: FontOpKind,
    pub width: u32,
    pub height: u32,
    pub charcount: u32,
    pub data: Vec<u8>,
}

/// The console "switch": how the virtual terminal layer drives a display
///
/// The VT layer keeps the text of every console in its screen buffer and calls into the switch
/// to make the display reflect it. Operations that return `bool` report whether the driver did
/// the work itself; `false` makes the VT layer fall back to doing it in software.
pub trait ConsoleSwitch: Send + Sync {
    /// Called once when the display is bound. Fills in the default mode of the display and
    /// returns its description.
    fn startup(&self, default_mode: &mut VcData, init: bool) -> &'static str;
    /// Sets up a console on this display. `init` is true the first time a console is set up, and
    /// false when an existing console is taken over, in which case geometry changes must go
    /// through `vt`.
    fn init(&self, vc: &mut VcData, init: bool, vt: &dyn VcResize);
    fn deinit(&self, vc: &VcData);
    fn clear(&self, vc: &VcData, y: u16, x: u16, height: u16, width: u16);
    fn putc(&self, vc: &VcData, c: u16, y: u16, x: u16);
    fn putcs(&self, vc: &VcData, s: &[u16], y: u16, x: u16);
    fn cursor(&self, vc: &VcData, mode: CursorMode);
    fn scroll_region(&self, vc: &VcData, top: u16, bottom: u16, dir: ScrollDir, count: u16) -> bool;
    #[allow(clippy::too_many_arguments)]
    fn bmove(&self, vc: &VcData, sy: u16, sx: u16, dy: u16, dx: u16, height: u16, width: u16);
    /// Returns true if the VT layer has to redraw the console
    fn switch(&self, vc: &VcData) -> bool;
    fn blank(&self, vc: &VcData, mode: BlankMode) -> bool;
    fn font_op(&self, vc: &VcData, op: &mut FontOp) -> DeviceResult<()>;
    fn set_palette(&self, vc: &VcData, table: &[u8]) -> DeviceResult<()>;
    fn scroll(&self, vc: &VcData, lines: i32) -> bool;
}

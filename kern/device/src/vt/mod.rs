//! Virtual terminals
//!
//! The VT layer owns the text of every virtual console and drives a display through its
//! [`ConsoleSwitch`]. A display is bound once with [`VtSubsystem::map_display`]; consoles are then
//! allocated on it, written to and switched between.

use alloc::{collections::btree_map::BTreeMap, vec, vec::Vec};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use spin::{Mutex, Once, RwLock};

mod consw;
pub use consw::*;

use crate::{DeviceError, DeviceResult};

pub const MAX_NR_CONSOLES: usize = 63;
/// Number of palette bytes: 16 colours, 3 components each
pub const PALETTE_LEN: usize = 16 * 3;
/// A space, light grey on black
pub const BLANK_CELL: u16 = 0x0720;
const DEFAULT_ATTR: u8 = 0x07;

/// The state of one virtual console
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcData {
    pub num: usize,
    pub cols: u16,
    pub rows: u16,
    pub can_do_color: bool,
    /// Cursor position
    pub x: u16,
    pub y: u16,
    /// Scroll region, `top..bottom`
    pub top: u16,
    pub bottom: u16,
    pub attr: u8,
    screen: Vec<u16>,
    screen_cols: u16,
}

impl VcData {
    pub const fn new(num: usize) -> Self {
        Self {
            num,
            cols: 0,
            rows: 0,
            can_do_color: false,
            x: 0,
            y: 0,
            top: 0,
            bottom: 0,
            attr: DEFAULT_ATTR,
            screen: Vec::new(),
            screen_cols: 0,
        }
    }

    /// Size of the screen buffer in bytes
    pub fn screenbuf_size(&self) -> usize {
        self.screen.len() * 2
    }

    pub fn cell(&self, x: u16, y: u16) -> Option<u16> {
        if x >= self.cols || y >= self.rows {
            return None;
        }
        self.screen.get(y as usize * self.cols as usize + x as usize).copied()
    }

    /// The characters of row `y`, without attributes
    pub fn line(&self, y: u16) -> Vec<u8> {
        (0..self.cols)
            .filter_map(|x| self.cell(x, y))
            .map(|cell| (cell & 0xff) as u8)
            .collect()
    }

    fn row(&self, y: u16) -> &[u16] {
        let start = y as usize * self.cols as usize;
        &self.screen[start..start + self.cols as usize]
    }

    fn set_cell(&mut self, x: u16, y: u16, cell: u16) {
        let index = y as usize * self.cols as usize + x as usize;
        if let Some(slot) = self.screen.get_mut(index) {
            *slot = cell;
        }
    }

    /// Makes the screen buffer match `cols` x `rows`, keeping what fits of the old contents
    fn realloc_screen(&mut self) {
        let size = self.cols as usize * self.rows as usize;
        if self.screen.len() == size && self.screen_cols == self.cols {
            return;
        }
        let mut screen = vec![BLANK_CELL; size];
        if self.screen_cols != 0 {
            let old_rows = self.screen.len() / self.screen_cols as usize;
            let copy_cols = self.cols.min(self.screen_cols) as usize;
            for y in 0..old_rows.min(self.rows as usize) {
                let old = y * self.screen_cols as usize;
                let new = y * self.cols as usize;
                screen[new..new + copy_cols].copy_from_slice(&self.screen[old..old + copy_cols]);
            }
        }
        self.screen = screen;
        self.screen_cols = self.cols;
        self.top = 0;
        self.bottom = self.rows;
        self.x = self.x.min(self.cols.saturating_sub(1));
        self.y = self.y.min(self.rows.saturating_sub(1));
    }

    /// Moves the lines of `top..bottom` by `count` in `dir`, blanking the lines that scroll in
    fn shift_lines(&mut self, top: u16, bottom: u16, dir: ScrollDir, count: u16) {
        let cols = self.cols as usize;
        let (top, bottom, count) = (top as usize, bottom as usize, count as usize);
        let region = &mut self.screen[top * cols..bottom * cols];
        match dir {
            ScrollDir::Up => {
                region.copy_within(count * cols.., 0);
                let len = region.len();
                region[len - count * cols..].fill(BLANK_CELL);
            }
            ScrollDir::Down => {
                let len = region.len();
                region.copy_within(..len - count * cols, count * cols);
                region[..count * cols].fill(BLANK_CELL);
            }
        }
    }
}

/// Changes the geometry of a console
pub trait VcResize {
    fn resize(&self, vc: &mut VcData, cols: u16, rows: u16) -> DeviceResult<()>;
}

/// A display the VT layer can bind to
///
/// Holds the console switch of the display and its default mode. It is `const` constructible,
/// so display drivers can keep theirs in a `static`.
pub struct VtDisplay {
    sw: &'static dyn ConsoleSwitch,
    heap_owned: bool,
    default_mode: Mutex<VcData>,
    desc: Once<&'static str>,
}

impl VtDisplay {
    pub const fn new(sw: &'static dyn ConsoleSwitch, heap_owned: bool) -> Self {
        Self {
            sw,
            heap_owned,
            default_mode: Mutex::new(VcData::new(0)),
            desc: Once::new(),
        }
    }

    pub fn switch(&self) -> &'static dyn ConsoleSwitch {
        self.sw
    }

    /// Whether the descriptor was allocated by the VT layer (and is freed with it), rather than
    /// owned by the driver that registered it
    pub fn is_heap_owned(&self) -> bool {
        self.heap_owned
    }

    pub fn default_mode(&self) -> VcData {
        self.default_mode.lock().clone()
    }

    /// The description returned by the display on startup, once bound
    pub fn display_desc(&self) -> Option<&'static str> {
        self.desc.get().copied()
    }
}

impl core::fmt::Debug for VtDisplay {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VtDisplay")
            .field("desc", &self.display_desc())
            .field("heap_owned", &self.heap_owned)
            .field("default_mode", &*self.default_mode.lock())
            .finish()
    }
}

/// The virtual terminal layer
pub struct VtSubsystem {
    display: RwLock<Option<&'static VtDisplay>>,
    consoles: Mutex<BTreeMap<usize, VcData>>,
    fg_console: AtomicUsize,
    blanked: AtomicBool,
    resizes: AtomicUsize,
}

impl VtSubsystem {
    pub const fn new() -> Self {
        Self {
            display: RwLock::new(None),
            consoles: Mutex::new(BTreeMap::new()),
            fg_console: AtomicUsize::new(0),
            blanked: AtomicBool::new(false),
            resizes: AtomicUsize::new(0),
        }
    }

    fn sw(&self) -> DeviceResult<&'static dyn ConsoleSwitch> {
        (*self.display.read()).map(|vt| vt.sw).ok_or(DeviceError::NoDevice)
    }

    fn visual_init(&self, sw: &dyn ConsoleSwitch, vc: &mut VcData, init: bool) {
        sw.init(vc, init, self);
        vc.realloc_screen();
    }

    /// Binds a display to the VT layer and sets up the first console on it
    ///
    /// Only one display can be bound; while one is, others are refused with
    /// [`DeviceError::Busy`]. Returns the description of the display.
    pub fn map_display(&self, vt: &'static VtDisplay, init: bool) -> DeviceResult<&'static str> {
        let mut display = self.display.write();
        if let Some(bound) = *display {
            log::warn!("vt: display already claimed by {}", bound.display_desc().unwrap_or("unknown"));
            return Err(DeviceError::Busy);
        }

        let sw = vt.sw;
        let mut vc = {
            let mut mode = vt.default_mode.lock();
            let desc = sw.startup(&mut mode, init);
            vt.desc.call_once(|| desc);
            self.visual_init(sw, &mut mode, true);
            mode.clone()
        };
        vc.num = 0;
        self.visual_init(sw, &mut vc, init);

        let desc = vt.display_desc().unwrap_or_default();
        log::debug!("vt: bound {} ({}x{})", desc, vc.cols, vc.rows);
        self.consoles.lock().insert(0, vc);
        self.fg_console.store(0, Ordering::Relaxed);
        *display = Some(vt);
        Ok(desc)
    }

    /// The currently bound display
    pub fn display(&self) -> Option<&'static VtDisplay> {
        *self.display.read()
    }

    /// Sets up console `num` for the first time. Allocating an existing console does nothing.
    pub fn allocate_console(&self, num: usize) -> DeviceResult<()> {
        if num >= MAX_NR_CONSOLES {
            return Err(DeviceError::InvalidArgument);
        }
        let sw = self.sw()?;
        let mut consoles = self.consoles.lock();
        if consoles.contains_key(&num) {
            return Ok(());
        }
        let mut vc = VcData::new(num);
        self.visual_init(sw, &mut vc, true);
        consoles.insert(num, vc);
        Ok(())
    }

    /// Sets up an existing console again, as when its display driver takes it over
    pub fn reinit_console(&self, num: usize) -> DeviceResult<()> {
        let sw = self.sw()?;
        let mut consoles = self.consoles.lock();
        let vc = consoles.get_mut(&num).ok_or(DeviceError::NotFound)?;
        self.visual_init(sw, vc, false);
        Ok(())
    }

    pub fn deallocate_console(&self, num: usize) -> DeviceResult<()> {
        if num == self.fg_console() {
            return Err(DeviceError::Busy);
        }
        let sw = self.sw()?;
        let vc = self.consoles.lock().remove(&num).ok_or(DeviceError::NotFound)?;
        sw.deinit(&vc);
        Ok(())
    }

    /// A snapshot of console `num`
    pub fn console(&self, num: usize) -> Option<VcData> {
        self.consoles.lock().get(&num).cloned()
    }

    pub fn fg_console(&self) -> usize {
        self.fg_console.load(Ordering::Relaxed)
    }

    pub fn is_blanked(&self) -> bool {
        self.blanked.load(Ordering::Relaxed)
    }

    /// Number of resize requests seen, including ones that didn't change anything
    pub fn resize_count(&self) -> usize {
        self.resizes.load(Ordering::Relaxed)
    }

    /// Writes text to a console
    pub fn write(&self, num: usize, text: &str) -> DeviceResult<()> {
        let sw = self.sw()?;
        let visible = num == self.fg_console();
        let mut consoles = self.consoles.lock();
        let vc = consoles.get_mut(&num).ok_or(DeviceError::NotFound)?;
        if vc.cols == 0 || vc.rows == 0 {
            return Ok(());
        }

        if visible {
            sw.cursor(vc, CursorMode::Erase);
        }
        for c in text.chars() {
            match c {
                '\n' => {
                    vc.x = 0;
                    Self::line_feed(sw, vc, visible);
                }
                '\r' => vc.x = 0,
                c => {
                    if vc.x >= vc.cols {
                        vc.x = 0;
                        Self::line_feed(sw, vc, visible);
                    }
                    let glyph = if c.is_ascii() { c as u16 } else { b'?' as u16 };
                    let cell = ((vc.attr as u16) << 8) | glyph;
                    vc.set_cell(vc.x, vc.y, cell);
                    if visible {
                        sw.putc(vc, cell, vc.y, vc.x);
                    }
                    vc.x += 1;
                }
            }
        }
        if visible {
            sw.cursor(vc, CursorMode::Draw);
        }
        Ok(())
    }

    fn line_feed(sw: &dyn ConsoleSwitch, vc: &mut VcData, visible: bool) {
        if vc.y + 1 >= vc.bottom {
            let (top, bottom) = (vc.top, vc.bottom);
            Self::scroll_lines(sw, vc, top, bottom, ScrollDir::Up, 1, visible);
        } else {
            vc.y += 1;
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn scroll_lines(
        sw: &dyn ConsoleSwitch,
        vc: &mut VcData,
        top: u16,
        bottom: u16,
        dir: ScrollDir,
        count: u16,
        visible: bool,
    ) {
        if top >= bottom || count == 0 {
            return;
        }
        let count = count.min(bottom - top);
        vc.shift_lines(top, bottom, dir, count);
        if !visible || sw.scroll_region(vc, top, bottom, dir, count) {
            return;
        }
        // The driver didn't scroll, move the block and clear what scrolled in
        let height = bottom - top - count;
        let cols = vc.cols;
        match dir {
            ScrollDir::Up => {
                sw.bmove(vc, top + count, 0, top, 0, height, cols);
                sw.clear(vc, bottom - count, 0, count, cols);
            }
            ScrollDir::Down => {
                sw.bmove(vc, top, 0, top + count, 0, height, cols);
                sw.clear(vc, top, 0, count, cols);
            }
        }
    }

    /// Scrolls `top..bottom` of a console by `count` lines
    pub fn scroll_region(&self, num: usize, top: u16, bottom: u16, dir: ScrollDir, count: u16) -> DeviceResult<()> {
        let sw = self.sw()?;
        let visible = num == self.fg_console();
        let mut consoles = self.consoles.lock();
        let vc = consoles.get_mut(&num).ok_or(DeviceError::NotFound)?;
        if bottom > vc.rows {
            return Err(DeviceError::InvalidArgument);
        }
        Self::scroll_lines(sw, vc, top, bottom, dir, count, visible);
        Ok(())
    }

    /// Moves the view of the foreground console through its scrollback
    ///
    /// Returns false if the display keeps no scrollback.
    pub fn scrollback(&self, lines: i32) -> DeviceResult<bool> {
        let sw = self.sw()?;
        let consoles = self.consoles.lock();
        let vc = consoles.get(&self.fg_console()).ok_or(DeviceError::NotFound)?;
        Ok(sw.scroll(vc, lines))
    }

    /// Brings console `num` to the foreground
    pub fn switch_console(&self, num: usize) -> DeviceResult<()> {
        let sw = self.sw()?;
        let consoles = self.consoles.lock();
        let vc = consoles.get(&num).ok_or(DeviceError::NotFound)?;
        self.fg_console.store(num, Ordering::Relaxed);
        if sw.switch(vc) {
            for y in 0..vc.rows {
                sw.putcs(vc, vc.row(y), y, 0);
            }
        }
        sw.cursor(vc, CursorMode::Draw);
        Ok(())
    }

    pub fn blank(&self, mode: BlankMode) -> DeviceResult<()> {
        let sw = self.sw()?;
        let consoles = self.consoles.lock();
        let vc = consoles.get(&self.fg_console()).ok_or(DeviceError::NotFound)?;
        if !sw.blank(vc, mode) {
            log::trace!("vt: {:?} not handled by the display", mode);
        }
        self.blanked.store(mode != BlankMode::Unblank, Ordering::Relaxed);
        Ok(())
    }

    pub fn set_palette(&self, num: usize, table: &[u8]) -> DeviceResult<()> {
        if table.len() != PALETTE_LEN {
            return Err(DeviceError::InvalidArgument);
        }
        let sw = self.sw()?;
        let consoles = self.consoles.lock();
        let vc = consoles.get(&num).ok_or(DeviceError::NotFound)?;
        sw.set_palette(vc, table)
    }

    pub fn font_op(&self, num: usize, op: &mut FontOp) -> DeviceResult<()> {
        let sw = self.sw()?;
        let consoles = self.consoles.lock();
        let vc = consoles.get(&num).ok_or(DeviceError::NotFound)?;
        sw.font_op(vc, op)
    }
}

impl VcResize for VtSubsystem {
    fn resize(&self, vc: &mut VcData, cols: u16, rows: u16) -> DeviceResult<()> {
        if cols == 0 || rows == 0 {
            return Err(DeviceError::InvalidArgument);
        }
        self.resizes.fetch_add(1, Ordering::Relaxed);
        if vc.cols == cols && vc.rows == rows {
            return Ok(());
        }
        log::debug!("vt{}: resizing {}x{} -> {}x{}", vc.num, vc.cols, vc.rows, cols, rows);
        vc.cols = cols;
        vc.rows = rows;
        vc.realloc_screen();
        Ok(())
    }
}

impl Default for VtSubsystem {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for VtSubsystem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VtSubsystem")
            .field("display", &self.display())
            .field("consoles", &self.consoles.lock().len())
            .field("fg_console", &self.fg_console())
            .finish()
    }
}

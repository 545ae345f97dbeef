//! Gameports
//!
//! A gameport is the analog joystick interface of old sound cards. Drivers for the chips that
//! carry one register a [`Gameport`] here; joystick drivers then poll it through
//! [`GameportOps`].

use alloc::{boxed::Box, collections::btree_map::BTreeMap, string::String, sync::Arc};
use core::sync::atomic::{AtomicUsize, Ordering};
use hadron_base::util::timer::Timer;
use spin::Mutex;

use crate::{DeviceError, DeviceResult};

/// Bus type of an input device, as reported to userspace
pub const BUS_PCI: u16 = 0x01;

/// Reported for an axis with nothing plugged in
pub const AXIS_DISCONNECTED: i32 = -1;

/// Number of legacy reads per speed measurement round
const SPEED_READS: u64 = 50;
const SPEED_ROUNDS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputId {
    pub bustype: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameportMode {
    Disabled = 0,
    /// Timing based reads of the legacy port
    Raw = 1,
    /// Axis positions converted by the chip
    Cooked = 2,
}

impl TryFrom<u8> for GameportMode {
    type Error = DeviceError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GameportMode::Disabled),
            1 => Ok(GameportMode::Raw),
            2 => Ok(GameportMode::Cooked),
            _ => Err(DeviceError::InvalidArgument),
        }
    }
}

/// A decoded reading: button mask and axis positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookedReading {
    /// One bit per button, set when pressed
    pub buttons: u8,
    /// [`AXIS_DISCONNECTED`] for axes without a stick
    pub axes: [i32; 4],
}

/// The operations a gameport provides
pub trait GameportOps: Send {
    /// Reads the legacy port
    fn read(&mut self) -> u8;
    /// Starts a one-shot timing cycle on the legacy port
    fn trigger(&mut self);
    fn cooked_read(&mut self) -> DeviceResult<CookedReading>;
    fn open(&mut self, mode: GameportMode) -> DeviceResult<()>;
    fn close(&mut self) {}
}

/// A registered (or to be registered) gameport
pub struct Gameport {
    pub name: String,
    /// Physical path, e.g. `pci00:0d.0/gameport0`
    pub phys: String,
    pub id: InputId,
    /// Noise tolerance for axis readings
    pub fuzz: i32,
    /// Legacy port speed in kHz, measured on registration
    pub speed: u32,
    ops: Box<dyn GameportOps>,
}

impl Gameport {
    pub fn new(name: String, phys: String, id: InputId, ops: Box<dyn GameportOps>) -> Self {
        Self {
            name,
            phys,
            id,
            fuzz: 0,
            speed: 0,
            ops,
        }
    }

    pub fn with_fuzz(mut self, fuzz: i32) -> Self {
        self.fuzz = fuzz;
        self
    }

    pub fn read(&mut self) -> u8 {
        self.ops.read()
    }

    pub fn trigger(&mut self) {
        self.ops.trigger()
    }

    pub fn cooked_read(&mut self) -> DeviceResult<CookedReading> {
        self.ops.cooked_read()
    }

    pub fn open(&mut self, mode: GameportMode) -> DeviceResult<()> {
        self.ops.open(mode)
    }

    pub fn close(&mut self) {
        self.ops.close()
    }

    /// Measures how many legacy port reads fit in a millisecond
    ///
    /// Takes the fastest of several rounds, so an interrupt in the middle of one doesn't skew the
    /// result.
    fn measure_speed(&mut self, timer: &dyn Timer) -> u32 {
        if self.open(GameportMode::Raw).is_err() {
            return 0;
        }
        let mut fastest = u64::MAX;
        for _ in 0..SPEED_ROUNDS {
            let start = timer.now();
            for _ in 0..SPEED_READS {
                self.read();
            }
            let end = timer.now();
            fastest = fastest.min(end.since(start));
        }
        self.close();
        let khz = SPEED_READS * timer.frequency() / (1000 * fastest.max(1));
        u32::try_from(khz).unwrap_or(u32::MAX)
    }
}

impl core::fmt::Debug for Gameport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Gameport")
            .field("name", &self.name)
            .field("phys", &self.phys)
            .field("id", &self.id)
            .field("fuzz", &self.fuzz)
            .field("speed", &self.speed)
            .finish_non_exhaustive()
    }
}

pub type GameportId = usize;

/// All registered gameports
pub struct GameportRegistry {
    timer: Arc<dyn Timer>,
    id_gen: AtomicUsize,
    ports: Mutex<BTreeMap<GameportId, Gameport>>,
}

impl GameportRegistry {
    pub fn new(timer: Arc<dyn Timer>) -> Self {
        Self {
            timer,
            id_gen: AtomicUsize::new(0),
            ports: Mutex::new(BTreeMap::new()),
        }
    }

    /// Registers a port, measuring its speed
    ///
    /// Each physical path can only be registered once; a duplicate is refused with
    /// [`DeviceError::Busy`] and dropped.
    pub fn register_port(&self, mut port: Gameport) -> DeviceResult<GameportId> {
        if Self::is_taken(&self.ports.lock(), &port.phys) {
            return Err(DeviceError::Busy);
        }
        port.speed = port.measure_speed(&*self.timer);

        let mut ports = self.ports.lock();
        // The path can get taken while the port is being measured
        if Self::is_taken(&ports, &port.phys) {
            drop(ports);
            return Err(DeviceError::Busy);
        }
        let id = self.id_gen.fetch_add(1, Ordering::Relaxed);
        log::debug!("gameport{}: {} at {}, {} kHz", id, port.name, port.phys, port.speed);
        ports.insert(id, port);
        Ok(id)
    }

    fn is_taken(ports: &BTreeMap<GameportId, Gameport>, phys: &str) -> bool {
        let taken = ports.values().any(|p| p.phys == phys);
        if taken {
            log::warn!("gameport: {} is already registered", phys);
        }
        taken
    }

    /// Unregisters a port, handing it back to the caller
    pub fn unregister_port(&self, id: GameportId) -> DeviceResult<Gameport> {
        let port = self.ports.lock().remove(&id).ok_or(DeviceError::NotFound)?;
        log::debug!("gameport{}: unregistered {}", id, port.phys);
        Ok(port)
    }

    /// Runs `f` on a registered port
    pub fn with_port<R>(&self, id: GameportId, f: impl FnOnce(&mut Gameport) -> R) -> Option<R> {
        self.ports.lock().get_mut(&id).map(f)
    }

    pub fn speed(&self, id: GameportId) -> Option<u32> {
        self.with_port(id, |port| port.speed)
    }

    pub fn len(&self) -> usize {
        self.ports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl core::fmt::Debug for GameportRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GameportRegistry")
            .field("ports", &*self.ports.lock())
            .finish_non_exhaustive()
    }
}

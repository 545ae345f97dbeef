//! The builtin drivers for the Hadron kernel

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use hadron_device::{DeviceResult, DriverContext, pci::PCIBus, vt::VtSubsystem};

pub mod config {
    //! Constants generated from the kernel configuration
    include!(concat!(env!("OUT_DIR"), "/config.rs"));
}

pub mod input;
pub mod video;

/// A special symbol that is used so that the linker actually looks into the .rlib
/// for the object files, to resolve this symbol. Otherwise this crate won't be linked
/// (because it is not designed to be used and exposed to rust as a crate).
#[doc(hidden)]
#[used]
#[unsafe(export_name = "INCLUDE_DRV_DRIVERS")]
pub static __HIDDEN: u8 = 0;

/// Brings up the builtin drivers
///
/// The dummy console is bound first, so there is a console before anything else can fail. A
/// gameport driver without hardware is not an error.
pub fn init(bus: &mut PCIBus, ctx: &DriverContext, vt: &VtSubsystem) -> DeviceResult<()> {
    hadron_base::util::timer::set_timer(ctx.timer.clone());
    hadron_base::util::logging::init(config::LOG_LEVEL);
    if config::DEBUG {
        log::debug!("drivers: debug build");
    }

    video::dummycon::dummycon_init(vt)?;
    match input::pcigame::init(bus, ctx) {
        Ok(bound) => log::debug!("drivers: pcigame bound to {} device(s)", bound),
        Err(e) => log::debug!("drivers: pcigame not loaded: {}", e),
    }
    Ok(())
}

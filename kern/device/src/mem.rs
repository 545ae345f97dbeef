use alloc::boxed::Box;
use core::{alloc::Layout, mem::MaybeUninit};

use crate::{DeviceError, DeviceResult};

/// Allocates room for a `T` on the heap, reporting allocation failure instead of aborting.
///
/// Lets a driver allocate its per-device state before acquiring the resources that go in it.
pub fn try_box_uninit<T>() -> DeviceResult<Box<MaybeUninit<T>>> {
    let layout = Layout::new::<T>();
    if layout.size() == 0 {
        return Ok(Box::new(MaybeUninit::uninit()));
    }
    // SAFETY: the layout has a non-zero size
    let ptr = unsafe { alloc::alloc::alloc(layout) }.cast::<MaybeUninit<T>>();
    if ptr.is_null() {
        log::warn!("mem: failed to allocate {} bytes", layout.size());
        return Err(DeviceError::OutOfMemory);
    }
    // SAFETY: the pointer was just allocated with the layout of `T`, which `MaybeUninit<T>`
    // shares, and ownership of the allocation is handed to the box
    Ok(unsafe { Box::from_raw(ptr) })
}

/// Moves `value` to the heap, reporting allocation failure instead of aborting.
///
/// Drivers allocate their per-device state with this, so a failed allocation fails the probe
/// rather than taking the whole kernel down.
pub fn try_box<T>(value: T) -> DeviceResult<Box<T>> {
    let mut slot = try_box_uninit::<T>()?;
    slot.write(value);
    // SAFETY: just initialised
    Ok(unsafe { slot.assume_init() })
}

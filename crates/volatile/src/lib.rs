//! Volatile memory primitives
//!
//! Used for memory mapped device registers, where every access has a side effect and must not
//! be merged, reordered or elided by the compiler.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod ptr;
pub mod region;

pub use ptr::VolatilePtr;
pub use region::VolatileRegion;

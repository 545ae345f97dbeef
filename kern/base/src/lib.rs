//! Hadron Kernel base
//!
//! The pieces of the kernel core that every other crate leans on: the kernel logger, timekeeping
//! and version information.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod util;

//! Console and display drivers

pub mod dummycon;

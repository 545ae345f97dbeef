//! Input device drivers

pub mod pcigame;

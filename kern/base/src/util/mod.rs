pub mod logging;
pub mod timer;
pub mod version;

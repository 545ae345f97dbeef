use alloc::{
    boxed::Box,
    collections::VecDeque,
    string::String,
    vec::Vec,
};
use core::fmt::Write;
use log::{LevelFilter, Log};
use spin::{Mutex, Once};

use super::timer::time_since_boot;

/// An output the kernel log is mirrored to (serial port, console, ...)
pub trait Writer: Write + Send + Sync {}

impl<T> Writer for T where T: Write + Send + Sync {}

/// The main writer for the kernel, which can be used for logging.
pub struct KernelWriter {
    outputs: Mutex<Vec<Box<dyn Writer>>>,
}

impl KernelWriter {
    pub const fn empty() -> Self {
        Self {
            outputs: Mutex::new(Vec::new()),
        }
    }

    pub fn add_output(&self, output: Box<dyn Writer>) {
        self.outputs.lock().push(output);
    }

    pub fn write_str(&self, s: &str) -> core::fmt::Result {
        let mut outputs = self.outputs.lock();
        for output in outputs.iter_mut() {
            output.write_str(s)?;
        }
        Ok(())
    }
}

/// The kernel message buffer
///
/// Keeps the last [`LogBuffer::CAPACITY`] lines around, so they can be replayed once a real
/// console shows up.
pub struct LogBuffer {
    lines: Mutex<VecDeque<String>>,
}

impl LogBuffer {
    pub const CAPACITY: usize = 256;

    pub const fn new() -> Self {
        Self {
            lines: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, line: String) {
        let mut lines = self.lines.lock();
        if lines.len() == Self::CAPACITY {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

pub struct KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = alloc::format!(
            "[{:.5}] {} {}",
            time_since_boot().as_secs_f64(),
            record.level(),
            record.args()
        );
        let _ = WRITER.write_str(&line);
        let _ = WRITER.write_str("\n");
        DMESG.push(line);
    }

    fn flush(&self) {}
}

pub static LOGGER: KernelLogger = KernelLogger;
pub static WRITER: KernelWriter = KernelWriter::empty();
pub static DMESG: LogBuffer = LogBuffer::new();

static INIT: Once<()> = Once::new();

/// Installs the kernel logger
///
/// Only the first call installs the logger, later calls just change the level.
pub fn init(level: LevelFilter) {
    INIT.call_once(|| {
        // Fails only if another logger got installed first, which then keeps the output
        let _ = log::set_logger(&LOGGER);
    });
    log::set_max_level(level);
}

/// Returns a copy of the kernel message buffer
pub fn dmesg() -> Vec<String> {
    DMESG.snapshot()
}

/// Returns true if any line in the kernel message buffer contains `needle`
pub fn dmesg_contains(needle: &str) -> bool {
    DMESG.lines.lock().iter().any(|line| line.contains(needle))
}

impl core::fmt::Debug for KernelWriter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KernelWriter")
            .field("outputs", &self.outputs.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_drops_oldest_lines() {
        let buffer = LogBuffer::new();
        for i in 0..LogBuffer::CAPACITY + 2 {
            buffer.push(alloc::format!("line {}", i));
        }
        let lines = buffer.snapshot();
        assert_eq!(lines.len(), LogBuffer::CAPACITY);
        assert_eq!(lines[0], "line 2");
    }

    #[test]
    fn logged_lines_reach_dmesg() {
        init(LevelFilter::Info);
        log::info!("logging test {}", 42);
        log::debug!("this one is filtered");
        assert!(dmesg_contains("INFO logging test 42"));
        assert!(!dmesg_contains("this one is filtered"));
    }
}

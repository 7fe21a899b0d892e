use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU8, Ordering};
use lazy_static::lazy_static;
use spin::Mutex;

/// Number of lines the serial log keeps before dropping the oldest.
pub const SERIAL_CAPACITY: usize = 512;

/// Severity of a log line. Lines below the configured level are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Debug => "[DEBUG] ",
            Level::Info => "[INFO] ",
            Level::Warn => "[WARN] ",
            Level::Error => "[ERROR] ",
        }
    }
}

static MIN_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

/// In-memory serial line sink. The simulated machine has no UART, so the
/// kernel log lands here and the embedder may mirror it through `echo`.
pub struct SerialLog {
    lines: VecDeque<String>,
    partial: String,
    echo: Option<fn(&str)>,
}

impl SerialLog {
    pub fn new() -> Self {
        SerialLog {
            lines: VecDeque::new(),
            partial: String::new(),
            echo: None,
        }
    }

    fn finish_line(&mut self) {
        let line = core::mem::take(&mut self.partial);
        if let Some(echo) = self.echo {
            echo(&line);
        }
        if self.lines.len() >= SERIAL_CAPACITY {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }
}

impl core::fmt::Write for SerialLog {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for c in s.chars() {
            if c == '\n' {
                self.finish_line();
            } else {
                self.partial.push(c);
            }
        }
        Ok(())
    }
}

lazy_static! {
    pub static ref SERIAL1: Mutex<SerialLog> = Mutex::new(SerialLog::new());
}

/// Set the minimum level that reaches the log.
pub fn set_level(level: Level) {
    MIN_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn enabled(level: Level) -> bool {
    level as u8 >= MIN_LEVEL.load(Ordering::Relaxed)
}

/// Mirror every finished line to `echo` (e.g. stdout in a host binary).
pub fn set_echo(echo: Option<fn(&str)>) {
    SERIAL1.lock().echo = echo;
}

/// Take every buffered line out of the log.
pub fn drain() -> Vec<String> {
    SERIAL1.lock().lines.drain(..).collect()
}

#[doc(hidden)]
pub fn _log(level: Level, args: ::core::fmt::Arguments) {
    use core::fmt::Write;
    if !enabled(level) {
        return;
    }
    let mut serial = SERIAL1.lock();
    // SerialLog::write_str never fails
    let _ = serial.write_str(level.tag());
    let _ = serial.write_fmt(args);
    let _ = serial.write_str("\n");
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::serial::_log($crate::serial::Level::Debug, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::serial::_log($crate::serial::Level::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::serial::_log($crate::serial::Level::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::serial::_log($crate::serial::Level::Error, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn test_lines_are_split_and_tagged() {
        let mut log = SerialLog::new();
        use core::fmt::Write;
        let _ = log.write_str("[INFO] one\n[WARN] two\n");
        let lines: Vec<_> = log.lines.iter().cloned().collect();
        assert_eq!(lines, ["[INFO] one", "[WARN] two"]);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut log = SerialLog::new();
        use core::fmt::Write;
        for i in 0..SERIAL_CAPACITY + 3 {
            let _ = log.write_str(&format!("{}\n", i));
        }
        assert_eq!(log.lines.len(), SERIAL_CAPACITY);
        assert_eq!(log.lines.front().map(String::as_str), Some("3"));
    }

    #[test]
    fn test_level_order() {
        assert!(Level::Error > Level::Warn);
        assert!(Level::Info > Level::Debug);
    }
}

use anyhow::Result;
use chrono::Local;
use log::{Level, LevelFilter, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

// Logging setup and small console helpers for the binary.

const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");
const LIB_TARGET: &str = "verichat";

enum LogTarget {
    File(Mutex<File>),
    // stderr keeps the chat console on stdout readable
    Stderr,
}

/// Line logger for the console binary.
/// The HTTP stack (reqwest, hyper, rustls) only gets through at warn and above.
pub struct ConsoleLogger {
    target: LogTarget,
}

impl ConsoleLogger {
    pub fn new(log_file_path: Option<&str>) -> Result<Self> {
        let target = match log_file_path {
            Some(path) => LogTarget::File(Mutex::new(
                OpenOptions::new().create(true).append(true).open(path)?,
            )),
            None => LogTarget::Stderr,
        };
        Ok(ConsoleLogger { target })
    }
}

fn is_own(target: &str) -> bool {
    [OWN_TARGET, LIB_TARGET]
        .iter()
        .any(|own| target == *own || target.starts_with(&format!("{}::", own)))
}

fn admits(target: &str, level: Level, max: LevelFilter) -> bool {
    level <= max && (is_own(target) || level <= Level::Warn)
}

fn format_record(record: &Record) -> String {
    format!(
        "[{}] {:<5} [{}:{}] {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        record.level(),
        record.module_path().unwrap_or(record.target()),
        record.line().unwrap_or(0),
        record.args()
    )
}

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        admits(metadata.target(), metadata.level(), log::max_level())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_record(record);
        match &self.target {
            LogTarget::File(file) => {
                if let Ok(mut file) = file.lock() {
                    let _ = file.write_all(line.as_bytes());
                }
            }
            LogTarget::Stderr => eprint!("{}", line),
        }
    }

    fn flush(&self) {
        match &self.target {
            LogTarget::File(file) => {
                if let Ok(mut file) = file.lock() {
                    let _ = file.flush();
                }
            }
            LogTarget::Stderr => {
                let _ = std::io::stderr().flush();
            }
        }
    }
}

/// Read a line of input from stdin, trimming whitespace
pub fn read_line() -> Result<String> {
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

pub fn setup_logging(log_file: Option<&str>, level: LevelFilter) -> Result<()> {
    log::set_boxed_logger(Box::new(ConsoleLogger::new(log_file)?))
        .map(|()| log::set_max_level(level))?;

    log::info!(
        "{} {} logging at {} to {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        level,
        log_file.unwrap_or("stderr")
    );
    Ok(())
}

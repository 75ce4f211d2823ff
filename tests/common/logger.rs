//! Phase-tagged test output.
//!
//! ```rust,ignore
//! let log = TestLogger::new("switch_then_reset");
//! log.phase("setup");
//! log.info("wrote credentials");
//! log.finish_ok();
//! ```
//!
//! Output goes to stderr, which the test harness only shows for failing
//! tests. Set `TEST_LOG_QUIET=1` to silence it entirely.
#![allow(dead_code)]

use std::fmt::Display;
use std::sync::Mutex;
use std::time::Instant;

use chrono::Utc;

pub struct TestLogger {
    name: String,
    started: Instant,
    phase: Mutex<String>,
    quiet: bool,
}

impl TestLogger {
    #[must_use]
    pub fn new(name: &str) -> Self {
        let logger = Self {
            name: name.to_string(),
            started: Instant::now(),
            phase: Mutex::new("init".to_string()),
            quiet: std::env::var_os("TEST_LOG_QUIET").is_some(),
        };
        logger.emit("INFO", "start");
        logger
    }

    pub fn phase(&self, phase: &str) {
        if let Ok(mut current) = self.phase.lock() {
            *current = phase.to_string();
        }
        self.emit("INFO", format_args!("phase {phase}"));
    }

    pub fn info(&self, message: impl Display) {
        self.emit("INFO", message);
    }

    pub fn debug(&self, message: impl Display) {
        self.emit("DEBUG", message);
    }

    pub fn finish_ok(&self) {
        self.emit(
            "INFO",
            format_args!("ok in {} ms", self.started.elapsed().as_millis()),
        );
    }

    fn emit(&self, level: &str, message: impl Display) {
        if self.quiet {
            return;
        }
        let phase = self
            .phase
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default();
        eprintln!(
            "{} {level:<5} [{}:{phase}] {message}",
            Utc::now().format("%H:%M:%S%.3f"),
            self.name
        );
    }
}

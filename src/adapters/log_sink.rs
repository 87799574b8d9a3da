//! Serial-console log sink for the host simulation.
//!
//! On target the vendor UART logger backs the `log` facade.  On the host
//! this adapter stands in for it, writing one line per record to stderr
//! with the simulated uptime the runner last reported.

use core::sync::atomic::{AtomicU64, Ordering};
use std::io::Write;

use log::{LevelFilter, Log, Metadata, Record};

/// Simulated milliseconds since boot, stamped on every line.
static UPTIME_MS: AtomicU64 = AtomicU64::new(0);

struct ConsoleSink;

static SINK: ConsoleSink = ConsoleSink;

impl Log for ConsoleSink {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let ms = UPTIME_MS.load(Ordering::Relaxed);
        let mut err = std::io::stderr().lock();
        let _ = writeln!(
            err,
            "[{:>6}.{:03}] {:<5} {}",
            ms / 1000,
            ms % 1000,
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Install the sink as the global logger.  Fails if a logger is already
/// installed.
pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    log::set_logger(&SINK)?;
    log::set_max_level(level);
    Ok(())
}

/// Record the current simulated uptime for subsequent log lines.
pub fn set_uptime_ms(ms: u64) {
    UPTIME_MS.store(ms, Ordering::Relaxed);
}

//! # ITM Logger
//!
//! Backs the `log` facade with stimulus port 0 of the Instrumentation Trace
//! Macrocell, so records reach the host through SWO without a UART.
//! Records above [`LOG_LEVEL`] are filtered out before formatting.

use core::cell::RefCell;

use cortex_m::itm;
use cortex_m::peripheral::ITM;
use log::{Log, Metadata, Record};

use crate::config::LOG_LEVEL;
use crate::error::ConfigError;
use crate::sync::{self, Mutex};

static PORT: Mutex<RefCell<Option<ITM>>> = Mutex::new(RefCell::new(None));

struct ItmLogger;

impl Log for ItmLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= LOG_LEVEL
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // One record at a time, so interrupt-side logs never interleave
        sync::critical_section(|cs| {
            if let Some(itm) = PORT.borrow_ref_mut(cs).as_mut() {
                itm::write_fmt(
                    &mut itm.stim[0],
                    format_args!("[{}] <{}> => {}\n", record.level(), record.target(), record.args()),
                );
            }
        });
    }

    fn flush(&self) {}
}

static LOGGER: ItmLogger = ItmLogger;

/// Install the logger. The debugger is expected to have enabled ITM and
/// the trace port; until it does, writes are dropped by the hardware.
pub fn init(itm: ITM) -> Result<(), ConfigError> {
    sync::critical_section(|cs| PORT.borrow_ref_mut(cs).replace(itm));
    log::set_logger(&LOGGER).map_err(|_| ConfigError::Diagnostic("logger already installed"))?;
    log::set_max_level(LOG_LEVEL);
    Ok(())
}

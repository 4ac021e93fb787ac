//! Telemetry report formatter
//!
//! Waits for a read request, copies the snapshot out under the data mutex,
//! and queues it for transmission in the active encoding.

use portable_atomic::{AtomicBool, Ordering};

use crate::app::config::SENSOR_COUNT;
use crate::app::platform::SerialPort;
use crate::app::Shared;
use crate::error::OsResult;
use crate::registry::{Registry, Runnable, Timeout};

/// Wire encoding of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputFormat {
    /// One raw two's complement byte per reading
    Byte,
    /// Four ASCII characters per reading: sign and three digits
    Char,
}

/// Process-wide output format, BYTE until toggled
pub struct FormatFlag {
    is_char: AtomicBool,
}

impl FormatFlag {
    pub const fn new() -> Self {
        FormatFlag {
            is_char: AtomicBool::new(false),
        }
    }

    pub fn get(&self) -> OutputFormat {
        if self.is_char.load(Ordering::Acquire) {
            OutputFormat::Char
        } else {
            OutputFormat::Byte
        }
    }

    /// Flip the format; returns the new one
    pub fn toggle(&self) -> OutputFormat {
        if self.is_char.fetch_xor(true, Ordering::AcqRel) {
            OutputFormat::Byte
        } else {
            OutputFormat::Char
        }
    }
}

impl Default for FormatFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-width ASCII token for one reading, e.g. `+005` or `-128`
pub fn encode_char(value: i8) -> [u8; 4] {
    let sign = if value < 0 { b'-' } else { b'+' };
    let abs = value.unsigned_abs();
    [sign, b'0' + abs / 100, b'0' + abs / 10 % 10, b'0' + abs % 10]
}

/// Thread answering read requests
pub struct TelemetryTask<R: Registry + 'static, P: SerialPort + 'static> {
    shared: &'static Shared<R>,
    serial: &'static P,
}

impl<R: Registry, P: SerialPort> TelemetryTask<R, P> {
    pub const fn new(shared: &'static Shared<R>, serial: &'static P) -> Self {
        TelemetryTask { shared, serial }
    }

    /// Wait for one request and emit a report
    ///
    /// Returns the number of bytes the transmit queue accepted. Bytes that
    /// do not fit are dropped.
    pub fn serve_once(&self, timeout: Timeout) -> OsResult<usize> {
        let shared = self.shared;
        let mut request = [0u8; 1];
        shared.registry.queue_receive(shared.resources.request, &mut request, timeout)?;

        let readings = shared.snapshot.read(Timeout::Forever, |data| *data)?;

        let format = shared.format.get();
        let queued = match format {
            OutputFormat::Byte => self.emit(readings.iter().map(|&r| r as u8)),
            OutputFormat::Char => self.emit(readings.iter().flat_map(|&r| encode_char(r))),
        };
        if queued < expected_len(format) {
            crate::warn!("report truncated, {} bytes queued", queued);
        }

        self.serial.start_tx();
        Ok(queued)
    }

    fn emit(&self, bytes: impl Iterator<Item = u8>) -> usize {
        let shared = self.shared;
        let mut queued = 0;
        for byte in bytes {
            if shared
                .registry
                .queue_send(shared.resources.tx, &[byte], Timeout::Poll)
                .is_ok()
            {
                queued += 1;
            }
        }
        queued
    }
}

fn expected_len(format: OutputFormat) -> usize {
    match format {
        OutputFormat::Byte => SENSOR_COUNT,
        OutputFormat::Char => SENSOR_COUNT * 4,
    }
}

impl<R: Registry, P: SerialPort> Runnable for TelemetryTask<R, P> {
    fn run(&self) {
        loop {
            match self.serve_once(Timeout::Forever) {
                Ok(_queued) => {
                    crate::debug!("report queued, {} bytes", _queued);
                }
                Err(_err) => {
                    crate::error!("telemetry request failed: {}", _err);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_char() {
        assert_eq!(&encode_char(5), b"+005");
        assert_eq!(&encode_char(-3), b"-003");
        assert_eq!(&encode_char(0), b"+000");
        assert_eq!(&encode_char(99), b"+099");
        assert_eq!(&encode_char(127), b"+127");
        assert_eq!(&encode_char(-128), b"-128");
    }

    #[test]
    fn test_toggle_pairs_restore() {
        let flag = FormatFlag::new();
        assert_eq!(flag.get(), OutputFormat::Byte);
        assert_eq!(flag.toggle(), OutputFormat::Char);
        assert_eq!(flag.get(), OutputFormat::Char);
        assert_eq!(flag.toggle(), OutputFormat::Byte);
        assert_eq!(flag.get(), OutputFormat::Byte);
    }
}

//! Board collaborators the pipeline depends on

/// Source of sensor readings
pub trait SensorBank: Sync {
    /// Current reading of sensor `index`
    fn read_sensor(&self, index: u8) -> i8;
}

/// Transmit side of the serial link
pub trait SerialPort: Sync {
    /// Start transmitting if the transmitter is idle
    ///
    /// Called after bytes were queued; the transmit-complete interrupt then
    /// keeps draining through [`ByteTransport::on_tx_byte_consumed`].
    ///
    /// [`ByteTransport::on_tx_byte_consumed`]: crate::app::ByteTransport::on_tx_byte_consumed
    fn start_tx(&self);
}

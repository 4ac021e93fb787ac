//! Interrupt side of the serial link
//!
//! The UART receive and transmit-complete interrupts only ever touch the two
//! byte queues, with zero-wait calls.

use crate::registry::{QueueHandle, Registry, Timeout};

/// Hooks for the UART interrupt handler
pub struct ByteTransport<R: Registry + 'static> {
    registry: &'static R,
    rx: QueueHandle,
    tx: QueueHandle,
}

impl<R: Registry> Clone for ByteTransport<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: Registry> Copy for ByteTransport<R> {}

impl<R: Registry> ByteTransport<R> {
    pub const fn new(registry: &'static R, rx: QueueHandle, tx: QueueHandle) -> Self {
        ByteTransport { registry, rx, tx }
    }

    /// A byte arrived; returns false if the receive queue dropped it
    pub fn on_rx_byte_ready(&self, byte: u8) -> bool {
        let queued = self.registry.queue_send(self.rx, &[byte], Timeout::Poll).is_ok();
        if !queued {
            crate::trace!("rx byte dropped");
        }
        queued
    }

    /// The previous byte went out; returns the next one to send, if any
    ///
    /// `None` leaves the transmitter idle until [`SerialPort::start_tx`].
    ///
    /// [`SerialPort::start_tx`]: crate::app::SerialPort::start_tx
    pub fn on_tx_byte_consumed(&self) -> Option<u8> {
        let mut byte = [0u8; 1];
        self.registry
            .queue_receive(self.tx, &mut byte, Timeout::Poll)
            .ok()
            .map(|()| byte[0])
    }
}

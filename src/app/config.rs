//! Pipeline tunables

use crate::types::OsPrio;

/// Readings per snapshot
pub const SENSOR_COUNT: usize = 256;

/// Runtime configuration of the telemetry pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PipelineConfig {
    /// Sampling timer period
    pub sample_period_ms: u32,
    /// Receive queue depth in bytes
    pub rx_capacity: usize,
    /// Transmit queue depth in bytes
    pub tx_capacity: usize,
    pub command_prio: OsPrio,
    /// Command thread stack, in words
    pub command_stack: usize,
    pub telemetry_prio: OsPrio,
    /// Telemetry thread stack, in words
    pub telemetry_stack: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            sample_period_ms: 1000,
            rx_capacity: 10,
            tx_capacity: 1024,
            command_prio: 4,
            command_stack: 256,
            telemetry_prio: 4,
            telemetry_stack: 256,
        }
    }
}

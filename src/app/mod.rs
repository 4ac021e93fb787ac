//! Sensor telemetry pipeline
//!
//! ```text
//! timer ──> SensorSampler ──(data mutex)──> snapshot
//! UART rx IRQ ──> rx queue ──> CommandTask ──> request queue ──> TelemetryTask
//! TelemetryTask ──(data mutex)──> snapshot, ──> tx queue ──> UART tx IRQ
//! ```
//!
//! All of it is written against [`Registry`] and runs on either backend.
//! Construction is two-step so every part can live in a `static`: first
//! [`Shared`] allocates the queues and the mutex, then [`Pipeline`] wires
//! the tasks to it and [`Pipeline::spawn`] hands them to the registry.

pub mod command;
pub mod config;
pub mod platform;
pub mod sampler;
pub mod snapshot;
pub mod telemetry;
pub mod transport;

pub use command::{Command, CommandRecognizer, CommandTask, MatchState};
pub use config::{PipelineConfig, SENSOR_COUNT};
pub use platform::{SensorBank, SerialPort};
pub use sampler::SensorSampler;
pub use snapshot::SharedSnapshot;
pub use telemetry::{encode_char, FormatFlag, OutputFormat, TelemetryTask};
pub use transport::ByteTransport;

use crate::error::OsResult;
use crate::registry::{MutexHandle, QueueHandle, Registry, ThreadHandle, TimerHandle};

/// Registry objects the pipeline allocates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resources {
    /// UART bytes in, one byte per item
    pub rx: QueueHandle,
    /// UART bytes out, one byte per item
    pub tx: QueueHandle,
    /// Single-slot read request signal
    pub request: QueueHandle,
    /// Guards the snapshot
    pub data: MutexHandle,
}

impl Resources {
    pub fn allocate<R: Registry>(registry: &R, config: &PipelineConfig) -> OsResult<Self> {
        Ok(Resources {
            rx: registry.allocate_queue(config.rx_capacity, 1)?,
            tx: registry.allocate_queue(config.tx_capacity, 1)?,
            request: registry.allocate_queue(1, 1)?,
            data: registry.allocate_mutex()?,
        })
    }
}

/// State shared by the pipeline's tasks and interrupt hooks
pub struct Shared<R: Registry + 'static> {
    pub registry: &'static R,
    pub resources: Resources,
    pub snapshot: SharedSnapshot<R>,
    pub format: FormatFlag,
    pub config: PipelineConfig,
}

impl<R: Registry> Shared<R> {
    pub fn new(registry: &'static R, config: PipelineConfig) -> OsResult<Self> {
        let resources = Resources::allocate(registry, &config)?;
        crate::debug!("pipeline resources allocated");

        Ok(Shared {
            registry,
            resources,
            snapshot: SharedSnapshot::new(registry, resources.data),
            format: FormatFlag::new(),
            config,
        })
    }

    /// Hooks for the UART interrupt handler
    pub fn transport(&self) -> ByteTransport<R> {
        ByteTransport::new(self.registry, self.resources.rx, self.resources.tx)
    }
}

/// Handles of everything [`Pipeline::spawn`] allocated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spawned {
    pub sampler: TimerHandle,
    pub command: ThreadHandle,
    pub telemetry: ThreadHandle,
}

/// The pipeline's timer callback and thread bodies
pub struct Pipeline<R, S, P>
where
    R: Registry + 'static,
    S: SensorBank + 'static,
    P: SerialPort + 'static,
{
    shared: &'static Shared<R>,
    sampler: SensorSampler<R, S>,
    command: CommandTask<R>,
    telemetry: TelemetryTask<R, P>,
}

impl<R, S, P> Pipeline<R, S, P>
where
    R: Registry + 'static,
    S: SensorBank + 'static,
    P: SerialPort + 'static,
{
    pub const fn new(shared: &'static Shared<R>, sensors: &'static S, serial: &'static P) -> Self {
        Pipeline {
            shared,
            sampler: SensorSampler::new(shared, sensors),
            command: CommandTask::new(shared),
            telemetry: TelemetryTask::new(shared, serial),
        }
    }

    pub fn sampler(&self) -> &SensorSampler<R, S> {
        &self.sampler
    }

    pub fn command(&self) -> &CommandTask<R> {
        &self.command
    }

    pub fn telemetry(&self) -> &TelemetryTask<R, P> {
        &self.telemetry
    }

    /// Register the sampling timer and both threads with the registry
    ///
    /// The timer is started right away; the threads run once the scheduler
    /// starts.
    pub fn spawn(&'static self) -> OsResult<Spawned> {
        let registry = self.shared.registry;
        let config = &self.shared.config;

        let sampler = registry.allocate_timer(true, &self.sampler)?;
        registry.start_timer(sampler, config.sample_period_ms)?;

        let command =
            registry.allocate_thread(&self.command, config.command_prio, config.command_stack)?;
        let telemetry = registry.allocate_thread(
            &self.telemetry,
            config.telemetry_prio,
            config.telemetry_stack,
        )?;

        crate::info!("pipeline spawned, sampling every {} ms", config.sample_period_ms);
        Ok(Spawned {
            sampler,
            command,
            telemetry,
        })
    }
}

//! Compile-time configuration
//!
//! These constants fix the registry capacities and the resource limits of the
//! kernel backend. Capacities are part of the registry contract and never grow
//! at run time.

/// Maximum number of application threads a registry can hold
pub const CFG_THREADS_MAX: usize = 8;

/// Maximum number of software timers
pub const CFG_TIMERS_MAX: usize = 4;

/// Maximum number of message queues
pub const CFG_QUEUES_MAX: usize = 8;

/// Maximum number of mutexes
pub const CFG_MUTEX_MAX: usize = 2;

/// Maximum number of priority levels
pub const CFG_PRIO_MAX: usize = 32;

/// Idle task priority
pub const CFG_PRIO_IDLE: u8 = (CFG_PRIO_MAX - 1) as u8;

/// System tick rate in Hz
pub const CFG_TICK_RATE_HZ: u32 = 1000;

/// Core clock feeding SysTick
pub const CFG_CPU_CLOCK_HZ: u32 = 16_000_000;

/// Minimum task stack size in words
pub const CFG_STK_SIZE_MIN: usize = 64;

/// Words available for application thread stacks
pub const CFG_STK_POOL_WORDS: usize = 4096;

/// Idle task stack size in words
pub const CFG_IDLE_STK_SIZE: usize = 128;

/// Bytes available for queue ring buffers
pub const CFG_Q_POOL_BYTES: usize = 2048;

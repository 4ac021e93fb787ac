//! Error types for the registry and the kernel backend
//!
//! Uses Rust's Result pattern instead of C-style status codes. Codes follow
//! the μC/OS-III numbering so they stay recognizable in a defmt log.

/// RTOS error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum OsError {
    // ============ Capacity errors ============
    /// Thread table is full
    TaskNoMoreTcb = 29008,
    /// Timer table is full
    TmrNoMore = 29509,
    /// Queue table is full
    QNoMore = 26005,
    /// Mutex table is full
    MutexNoMore = 22405,
    /// Stack pool cannot satisfy the request
    StkPoolEmpty = 28211,
    /// Queue storage pool cannot satisfy the request
    QPoolEmpty = 26006,

    // ============ Argument errors ============
    /// Handle does not name an allocated object
    ObjInvalid = 24005,
    /// Invalid stack size
    StkSizeInvalid = 28208,
    /// Invalid priority
    PrioInvalid = 25203,
    /// Item length differs from the queue's item size
    MsgSizeInvalid = 26007,
    /// Queue capacity of zero
    QSizeInvalid = 26008,
    /// Invalid timer period
    TmrInvalidPeriod = 29504,

    // ============ Context errors ============
    /// Cannot block from ISR or timer callback
    PendIsr = 25006,
    /// Caller does not hold the mutex
    MutexNotOwner = 22401,

    // ============ OS state errors ============
    /// OS is not running
    OsNotRunning = 24201,
    /// OS is already running
    OsRunning = 24202,
    /// No application task created
    OsNoAppTask = 24204,

    // ============ Timeout ============
    /// Operation timed out, or a zero-wait operation could not complete
    Timeout = 29401,
}

/// Result type alias for RTOS operations
pub type OsResult<T> = Result<T, OsError>;

impl OsError {
    /// Numeric code of the error
    #[inline]
    pub fn code(self) -> u16 {
        self as u16
    }

    /// True for the allocation failures caused by a full table or pool
    #[inline]
    pub fn is_capacity(self) -> bool {
        matches!(
            self,
            OsError::TaskNoMoreTcb
                | OsError::TmrNoMore
                | OsError::QNoMore
                | OsError::MutexNoMore
                | OsError::StkPoolEmpty
                | OsError::QPoolEmpty
        )
    }
}

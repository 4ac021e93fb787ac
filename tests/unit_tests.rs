//! Unit tests for the kernel building blocks and the registry contract
//!
//! These tests run on the host (not embedded target). The registry contract
//! is checked against both backends; the kernel backend is driven through
//! its zero-wait paths, which need no running scheduler.

#[cfg(test)]
mod prio_tests {
    use telemetry::config::CFG_PRIO_IDLE;
    use telemetry::prio::ReadyMask;

    #[test]
    fn test_empty_mask_selects_idle() {
        let mask = ReadyMask::new();
        assert!(mask.is_empty());
        assert_eq!(mask.highest(), CFG_PRIO_IDLE);
    }

    #[test]
    fn test_multiple_priorities() {
        let mut mask = ReadyMask::new();

        for prio in [20, 5, 10, 0, 15] {
            mask.insert(prio);
        }

        for expected in [0, 5, 10, 15, 20] {
            assert_eq!(mask.highest(), expected);
            mask.remove(expected);
        }
        assert!(mask.is_empty());
    }

    #[test]
    fn test_idle_priority_is_lowest() {
        let mut mask = ReadyMask::new();
        mask.insert(CFG_PRIO_IDLE);
        mask.insert(4);
        assert_eq!(mask.highest(), 4);
        assert!(mask.contains(CFG_PRIO_IDLE));
    }
}

#[cfg(test)]
mod error_tests {
    use telemetry::error::OsError;

    #[test]
    fn test_error_codes() {
        assert_eq!(OsError::Timeout.code(), 29401);
        assert_eq!(OsError::PendIsr.code(), 25006);
        assert_ne!(OsError::QNoMore, OsError::MutexNoMore);
    }

    #[test]
    fn test_capacity_classification() {
        assert!(OsError::TaskNoMoreTcb.is_capacity());
        assert!(OsError::QPoolEmpty.is_capacity());
        assert!(!OsError::Timeout.is_capacity());
        assert!(!OsError::MsgSizeInvalid.is_capacity());
    }
}

#[cfg(test)]
mod config_tests {
    use telemetry::app::PipelineConfig;
    use telemetry::config::*;

    #[test]
    fn test_registry_capacities() {
        assert_eq!(CFG_THREADS_MAX, 8);
        assert_eq!(CFG_TIMERS_MAX, 4);
        assert_eq!(CFG_QUEUES_MAX, 8);
        assert_eq!(CFG_MUTEX_MAX, 2);
    }

    #[test]
    fn test_default_pipeline_fits_pools() {
        let config = PipelineConfig::default();
        assert_eq!(config.sample_period_ms, 1000);
        assert_eq!(config.rx_capacity, 10);
        assert_eq!(config.tx_capacity, 1024);

        assert!(config.rx_capacity + config.tx_capacity + 1 <= CFG_Q_POOL_BYTES);
        assert!(config.command_stack + config.telemetry_stack <= CFG_STK_POOL_WORDS);
        assert!(config.command_stack >= CFG_STK_SIZE_MIN);
        assert!(config.telemetry_prio < CFG_PRIO_IDLE);
    }
}

#[cfg(test)]
mod registry_tests {
    use telemetry::config::*;
    use telemetry::error::OsError;
    use telemetry::registry::{
        HostedRegistry, Registry, Runnable, Timeout, TimerHandler, UcosRegistry,
    };

    struct Noop;

    impl Runnable for Noop {
        fn run(&self) {}
    }

    impl TimerHandler for Noop {
        fn on_expiry(&self) {}
    }

    static NOOP: Noop = Noop;

    fn check_queue_fifo<R: Registry>(registry: &R) {
        let queue = registry.allocate_queue(4, 2).unwrap();
        let mut out = [0u8; 2];

        for n in 0..4u8 {
            registry.queue_send(queue, &[n, n + 10], Timeout::Poll).unwrap();
        }
        assert_eq!(registry.queue_send(queue, &[9, 9], Timeout::Poll), Err(OsError::Timeout));

        for n in 0..4u8 {
            registry.queue_receive(queue, &mut out, Timeout::Poll).unwrap();
            assert_eq!(out, [n, n + 10]);
        }
        assert_eq!(
            registry.queue_receive(queue, &mut out, Timeout::Poll),
            Err(OsError::Timeout)
        );
    }

    fn check_item_size<R: Registry>(registry: &R) {
        let queue = registry.allocate_queue(2, 1).unwrap();
        assert_eq!(
            registry.queue_send(queue, &[1, 2], Timeout::Poll),
            Err(OsError::MsgSizeInvalid)
        );
        let mut out = [0u8; 4];
        assert_eq!(
            registry.queue_receive(queue, &mut out, Timeout::Poll),
            Err(OsError::MsgSizeInvalid)
        );
    }

    fn check_mutex<R: Registry>(registry: &R) {
        let mutex = registry.allocate_mutex().unwrap();

        registry.mutex_try_acquire(mutex).unwrap();
        assert_eq!(registry.mutex_try_acquire(mutex), Err(OsError::Timeout));
        registry.mutex_release(mutex).unwrap();
        assert_eq!(registry.mutex_release(mutex), Err(OsError::MutexNotOwner));

        // Uncontended blocking acquire succeeds without a running scheduler
        registry.mutex_acquire(mutex, Timeout::Forever).unwrap();
        assert_eq!(
            registry.mutex_acquire(mutex, Timeout::Forever),
            Err(OsError::OsNotRunning)
        );
        registry.mutex_release(mutex).unwrap();
    }

    fn check_capacity<R: Registry>(registry: &R) {
        let threads: Vec<_> = (0..CFG_THREADS_MAX)
            .map(|_| registry.allocate_thread(&NOOP, 3, CFG_STK_SIZE_MIN).unwrap())
            .collect();
        assert_eq!(
            registry.allocate_thread(&NOOP, 3, CFG_STK_SIZE_MIN),
            Err(OsError::TaskNoMoreTcb)
        );

        let timers: Vec<_> = (0..CFG_TIMERS_MAX)
            .map(|_| registry.allocate_timer(false, &NOOP).unwrap())
            .collect();
        assert_eq!(registry.allocate_timer(false, &NOOP), Err(OsError::TmrNoMore));

        let queues: Vec<_> = (0..CFG_QUEUES_MAX)
            .map(|_| registry.allocate_queue(1, 1).unwrap())
            .collect();
        assert_eq!(registry.allocate_queue(1, 1), Err(OsError::QNoMore));

        let mutexes: Vec<_> = (0..CFG_MUTEX_MAX)
            .map(|_| registry.allocate_mutex().unwrap())
            .collect();
        assert_eq!(registry.allocate_mutex(), Err(OsError::MutexNoMore));

        // Handle 0 is a real object and earlier handles are untouched
        for (index, handle) in threads.iter().enumerate() {
            assert_eq!(handle.index(), index);
        }
        assert_eq!(timers[0].index(), 0);
        registry.start_timer(timers[0], 10).unwrap();

        let mut out = [0u8; 1];
        for (n, &queue) in queues.iter().enumerate() {
            registry.queue_send(queue, &[n as u8], Timeout::Poll).unwrap();
        }
        for (n, &queue) in queues.iter().enumerate() {
            registry.queue_receive(queue, &mut out, Timeout::Poll).unwrap();
            assert_eq!(out[0], n as u8);
        }

        registry.mutex_try_acquire(mutexes[0]).unwrap();
        registry.mutex_try_acquire(mutexes[1]).unwrap();
        registry.mutex_release(mutexes[0]).unwrap();
        registry.mutex_release(mutexes[1]).unwrap();
    }

    fn check_foreign_handle<R: Registry>(small: &R, large: &R) {
        let _ = small.allocate_queue(1, 1).unwrap();
        for _ in 0..2 {
            large.allocate_queue(1, 1).unwrap();
        }
        let foreign = large.allocate_queue(1, 1).unwrap();

        assert_eq!(small.queue_send(foreign, &[1], Timeout::Poll), Err(OsError::ObjInvalid));
    }

    #[test]
    fn test_queue_fifo() {
        check_queue_fifo(&UcosRegistry::new());
        check_queue_fifo(&HostedRegistry::new());
    }

    #[test]
    fn test_item_size_rejected() {
        check_item_size(&UcosRegistry::new());
        check_item_size(&HostedRegistry::new());
    }

    #[test]
    fn test_mutex_ownership() {
        check_mutex(&UcosRegistry::new());
        check_mutex(&HostedRegistry::new());
    }

    #[test]
    fn test_capacity_boundary() {
        check_capacity(&UcosRegistry::new());
        check_capacity(&HostedRegistry::new());
    }

    #[test]
    fn test_foreign_handle() {
        check_foreign_handle(&UcosRegistry::new(), &UcosRegistry::new());
        check_foreign_handle(&HostedRegistry::new(), &HostedRegistry::new());
    }

    #[test]
    fn test_argument_validation() {
        fn check<R: Registry>(registry: &R) {
            assert_eq!(registry.allocate_queue(0, 1), Err(OsError::QSizeInvalid));
            assert_eq!(registry.allocate_queue(1, 0), Err(OsError::QSizeInvalid));
            assert_eq!(
                registry.allocate_queue(CFG_Q_POOL_BYTES + 1, 1),
                Err(OsError::QPoolEmpty)
            );
            assert_eq!(
                registry.allocate_thread(&NOOP, CFG_PRIO_IDLE, CFG_STK_SIZE_MIN),
                Err(OsError::PrioInvalid)
            );
            assert_eq!(
                registry.allocate_thread(&NOOP, 1, CFG_STK_POOL_WORDS + 2),
                Err(OsError::StkPoolEmpty)
            );

            let timer = registry.allocate_timer(true, &NOOP).unwrap();
            assert_eq!(registry.start_timer(timer, 0), Err(OsError::TmrInvalidPeriod));
        }

        check(&UcosRegistry::new());
        check(&HostedRegistry::new());
    }

    #[test]
    fn test_hosted_allocation_after_start() {
        let registry = HostedRegistry::new();
        registry.launch().unwrap();

        assert_eq!(registry.allocate_queue(1, 1), Err(OsError::OsRunning));
        assert_eq!(registry.allocate_mutex(), Err(OsError::OsRunning));
        assert_eq!(registry.launch(), Err(OsError::OsRunning));
    }
}

//! Panic and fault handling for target builds

#[cfg(all(feature = "defmt", target_arch = "arm"))]
use {defmt_rtt as _, panic_probe as _};

#[cfg(all(feature = "defmt", target_arch = "arm"))]
#[defmt::panic_handler]
fn defmt_panic() -> ! {
    cortex_m::asm::udf()
}

#[cfg(all(not(feature = "defmt"), not(feature = "std"), target_arch = "arm"))]
#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    loop {
        cortex_m::asm::udf();
    }
}

// A fault inside a pipeline thread takes the whole node down; nothing restarts it
#[cfg(all(target_arch = "arm", not(feature = "std")))]
#[cortex_m_rt::exception]
#[allow(unused_variables)]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    crate::error!("hard fault at pc={=u32:#x}", ef.pc());
    loop {
        cortex_m::asm::udf();
    }
}

// Log lines carry the kernel tick (milliseconds at the default tick rate)
#[cfg(all(feature = "defmt", target_arch = "arm"))]
defmt::timestamp!("{=u32}", crate::kernel::KERNEL.tick_get());

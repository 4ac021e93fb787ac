//! Telemetry node on STM32F401 (NUCLEO-F401RE)
//!
//! USART2 on PA2/PA3 (the ST-Link virtual COM port) at 115200 8N1. Send
//! `read\n` for a report and `toggle\n` to switch between raw bytes and
//! `+005` style text.
//!
//! Build with `--no-default-features --features firmware`.

#![no_std]
#![no_main]

use core::cell::Cell;

use cortex_m_rt::entry;
use critical_section::Mutex;
use portable_atomic::{AtomicU32, Ordering};
use stm32_metapac as pac;

use telemetry::app::{ByteTransport, Pipeline, PipelineConfig, SensorBank, SerialPort, Shared};
use telemetry::config::CFG_CPU_CLOCK_HZ;
use telemetry::registry::{Registry, UcosRegistry};

const BAUD_RATE: u32 = 115_200;

static REGISTRY: UcosRegistry = UcosRegistry::new();

/// Hooks used by the USART2 interrupt
static TRANSPORT: Mutex<Cell<Option<ByteTransport<UcosRegistry>>>> = Mutex::new(Cell::new(None));

// ============ Board ============

/// Synthetic sensors: a slow ramp offset per channel
struct RampSensors {
    cycle: AtomicU32,
}

impl SensorBank for RampSensors {
    fn read_sensor(&self, index: u8) -> i8 {
        let cycle = if index == 0 {
            self.cycle.fetch_add(1, Ordering::Relaxed)
        } else {
            self.cycle.load(Ordering::Relaxed)
        };
        ((cycle + index as u32) % 200) as i8 - 100
    }
}

struct Usart2;

impl SerialPort for Usart2 {
    fn start_tx(&self) {
        // TXE is set while idle, so this raises the interrupt immediately
        pac::USART2.cr1().modify(|w| w.set_txeie(true));
    }
}

static SENSORS: RampSensors = RampSensors {
    cycle: AtomicU32::new(0),
};
static SERIAL: Usart2 = Usart2;

/// Bring up GPIOA and USART2 on the reset clock tree (HSI, 16 MHz)
fn platform_init() {
    pac::RCC.ahb1enr().modify(|w| w.set_gpioaen(true));
    pac::RCC.apb1enr().modify(|w| w.set_usart2en(true));

    pac::GPIOA.moder().modify(|w| {
        w.set_moder(2, pac::gpio::vals::Moder::ALTERNATE);
        w.set_moder(3, pac::gpio::vals::Moder::ALTERNATE);
    });
    pac::GPIOA.afr(0).modify(|w| {
        w.set_afr(2, 7);
        w.set_afr(3, 7);
    });

    let div = (CFG_CPU_CLOCK_HZ + BAUD_RATE / 2) / BAUD_RATE;
    pac::USART2.brr().write(|w| w.0 = div);
    pac::USART2.cr1().write(|w| {
        w.set_ue(true);
        w.set_te(true);
        w.set_re(true);
        w.set_rxneie(true);
    });
}

// ============ Interrupts ============

#[no_mangle]
extern "C" fn USART2() {
    let Some(transport) = critical_section::with(|cs| TRANSPORT.borrow(cs).get()) else {
        return;
    };

    let usart = pac::USART2;
    let sr = usart.sr().read();

    if sr.rxne() {
        let byte = usart.dr().read().dr() as u8;
        transport.on_rx_byte_ready(byte);
    }

    if sr.txe() && usart.cr1().read().txeie() {
        match transport.on_tx_byte_consumed() {
            Some(byte) => usart.dr().write(|w| w.set_dr(byte as u16)),
            None => usart.cr1().modify(|w| w.set_txeie(false)),
        }
    }
}

// ============ Main ============

#[entry]
fn main() -> ! {
    platform_init();

    let config = PipelineConfig::default();
    let shared = Shared::new(&REGISTRY, config).expect("pipeline resources");
    let shared: &'static Shared<UcosRegistry> =
        cortex_m::singleton!(: Shared<UcosRegistry> = shared).expect("shared state");

    critical_section::with(|cs| TRANSPORT.borrow(cs).set(Some(shared.transport())));

    let pipeline: &'static Pipeline<UcosRegistry, RampSensors, Usart2> = cortex_m::singleton!(
        : Pipeline<UcosRegistry, RampSensors, Usart2> = Pipeline::new(shared, &SENSORS, &SERIAL)
    )
    .expect("pipeline");
    pipeline.spawn().expect("pipeline threads");

    unsafe { cortex_m::peripheral::NVIC::unmask(pac::Interrupt::USART2) };

    telemetry::info!("telemetry node up, {} baud", BAUD_RATE);
    REGISTRY.start_scheduler()
}

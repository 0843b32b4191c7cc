use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Output, Speed};
use embassy_stm32::usart::{Config as UartConfig, Uart};
use embassy_sync::channel::Channel;
use interconnect_core::control::{InterconnectConfig, InterconnectController};
use interconnect_core::repl::CommandExecutor;
use interconnect_core::routing::OutputLine;
use portable_atomic::AtomicBool;
use static_cell::StaticCell;

use crate::board::{self, AdcProbes, BoardPins};
use crate::console::{FrameQueue, LineQueue, ReplyQueue};
use crate::telemetry::FirmwareInstant;
use crate::usb::UsbDeviceStorage;

mod console_task;
mod interconnect_task;
mod usb_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) type FirmwareExecutor =
    CommandExecutor<AdcProbes, BoardPins<'static>, FirmwareInstant>;

/// Bytes received from the host on the console interface.
pub(super) static CONSOLE_RX_QUEUE: FrameQueue = Channel::new();
/// Bytes queued for the host on the console interface.
pub(super) static CONSOLE_TX_QUEUE: FrameQueue = Channel::new();
pub(super) static CONSOLE_LINES: LineQueue = Channel::new();
pub(super) static CONSOLE_REPLIES: ReplyQueue = Channel::new();
/// Set while the host holds DTR on the console port.
pub(super) static CONSOLE_ATTACHED: AtomicBool = AtomicBool::new(false);
pub(super) static USB_STORAGE: StaticCell<UsbDeviceStorage> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let hal::Peripherals {
        ADC1,
        PA6,
        PA7,
        PA9,
        PA10,
        PA11,
        PA12,
        PB4,
        PB5,
        PB6,
        PB7,
        PB10,
        PB12,
        PB13,
        USART1,
        USB,
        ..
    } = hal::init(hal::Config::default());

    // Driven to their safe levels before anything else runs; order follows
    // `OutputLine::as_index`.
    let outputs = [
        Output::new(PB10, board::safe_level(OutputLine::UartLevelShifterDisable), Speed::Low),
        Output::new(PB12, board::safe_level(OutputLine::UartTxDir), Speed::Low),
        Output::new(PB13, board::safe_level(OutputLine::UartTxDirN), Speed::Low),
        Output::new(PB4, board::safe_level(OutputLine::TypeCOutputEnableN), Speed::Low),
        Output::new(PB6, board::safe_level(OutputLine::RelayA), Speed::Low),
        Output::new(PB7, board::safe_level(OutputLine::RelayB), Speed::Low),
        Output::new(PB5, board::safe_level(OutputLine::TypeCSelectB), Speed::Low),
    ];
    let usart = Uart::new_blocking(USART1, PA10, PA9, UartConfig::default())
        .expect("USART1 configuration");
    let pins = BoardPins::new(outputs, usart);
    let probes = AdcProbes::new(ADC1, PA6, PA7);

    let config = InterconnectConfig::DEFAULT;
    let controller = InterconnectController::new(probes, pins, config);
    defmt::info!(
        "interconnect: ready, tick={}ms debounce={}",
        config.tick_period.as_millis(),
        config.debounce_threshold
    );

    spawner
        .spawn(interconnect_task::run(CommandExecutor::new(controller)))
        .expect("failed to spawn interconnect task");

    spawner
        .spawn(usb_task::run(USB, PA12, PA11))
        .expect("failed to spawn USB task");

    spawner
        .spawn(console_task::run())
        .expect("failed to spawn console task");

    core::future::pending::<()>().await;
}

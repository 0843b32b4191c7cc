//! STM32G0B1 board wiring for the SBU interconnect.
//!
//! | Signal            | Pin  | Notes                                   |
//! |-------------------|------|-----------------------------------------|
//! | SBU1 probe        | PA6  | ADC1 IN6                                |
//! | SBU2 probe        | PA7  | ADC1 IN7                                |
//! | USART1 TX / RX    | PA9 / PA10 | AF1, swapped in software for flip |
//! | `UART_LVL_DIS`    | PB10 | high disables the level shifter         |
//! | `UART_TX_DIR`     | PB12 | shifter direction, forward orientation  |
//! | `UART_TX_DIR_N`   | PB13 | complement of `UART_TX_DIR`             |
//! | `TYPEC_OE_N`      | PB4  | high disables the Type-C mux output     |
//! | `SEL_RELAY_A`     | PB6  |                                         |
//! | `SEL_RELAY_B`     | PB7  |                                         |
//! | `TYPEC_SEL_B`     | PB5  | selects path B on the mux               |

mod probes;

pub use probes::AdcProbes;

use embassy_stm32::gpio::{self, Output};
use embassy_stm32::mode::Blocking;
use embassy_stm32::pac;
use embassy_stm32::pac::gpio::vals::Moder;
use embassy_stm32::usart::Uart;
use embassy_time::{Duration, block_for};
use interconnect_core::routing::{
    InterconnectPins, Level, OUTPUT_LINE_COUNT, OutputLine, PinMode, UartPin, output_line,
};

/// Pause between breaking a path and making the new one.
const SETTLE_DELAY: Duration = Duration::from_millis(10);

const USART1_TX_PIN: usize = 9;
const USART1_RX_PIN: usize = 10;

/// GPIO level a line is driven to at reset, before any route is applied.
pub fn safe_level(line: OutputLine) -> gpio::Level {
    gpio_level(output_line(line).safe_level)
}

fn gpio_level(level: Level) -> gpio::Level {
    match level {
        Level::High => gpio::Level::High,
        Level::Low => gpio::Level::Low,
    }
}

/// Routing outputs plus direct register access to USART1.
///
/// `outputs` is indexed by [`OutputLine::as_index`]. The USART driver is held
/// so its clock and alternate-function setup stay in place while the route
/// sequences toggle `UE`, `SWAP` and the pin modes underneath it.
pub struct BoardPins<'d> {
    outputs: [Output<'d>; OUTPUT_LINE_COUNT],
    _usart: Uart<'d, Blocking>,
}

impl<'d> BoardPins<'d> {
    pub fn new(outputs: [Output<'d>; OUTPUT_LINE_COUNT], usart: Uart<'d, Blocking>) -> Self {
        Self {
            outputs,
            _usart: usart,
        }
    }
}

impl InterconnectPins for BoardPins<'_> {
    fn set_level(&mut self, line: OutputLine, level: Level) {
        self.outputs[line.as_index()].set_level(gpio_level(level));
    }

    fn set_pin_mode(&mut self, pin: UartPin, mode: PinMode) {
        let index = match pin {
            UartPin::Tx => USART1_TX_PIN,
            UartPin::Rx => USART1_RX_PIN,
        };
        let moder = match mode {
            PinMode::Input => Moder::INPUT,
            PinMode::Alternate => Moder::ALTERNATE,
        };
        pac::GPIOA.moder().modify(|w| w.set_moder(index, moder));
    }

    fn set_uart_enabled(&mut self, enabled: bool) {
        pac::USART1.cr1().modify(|w| w.set_ue(enabled));
    }

    fn set_uart_swap(&mut self, swapped: bool) {
        pac::USART1.cr2().modify(|w| w.set_swap(swapped));
    }

    fn settle(&mut self) {
        block_for(SETTLE_DELAY);
    }
}

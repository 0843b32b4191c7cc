//! UART path sequencing.
//!
//! The level shifter is forced off before anything else moves, and only turned
//! back on after the direction pair, pin function and USART swap bit agree on
//! the new route.

use super::{InterconnectPins, Level, OutputLine, PinMode, UartPin, UartRoute};

/// Direction pair and pin function programmed for each route.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UartPlan {
    /// High when SBU1 carries host TX. Off rests in the swapped position.
    pub forward: bool,
    pub pin_mode: PinMode,
    pub shifter_enabled: bool,
}

impl UartPlan {
    #[must_use]
    pub const fn for_route(route: UartRoute) -> Self {
        match route {
            UartRoute::Off => Self {
                forward: false,
                pin_mode: PinMode::Input,
                shifter_enabled: false,
            },
            UartRoute::Forward => Self {
                forward: true,
                pin_mode: PinMode::Alternate,
                shifter_enabled: true,
            },
            UartRoute::Flipped => Self {
                forward: false,
                pin_mode: PinMode::Alternate,
                shifter_enabled: true,
            },
        }
    }

    /// USART swap bit matching the direction pair.
    #[must_use]
    pub const fn swapped(&self) -> bool {
        !self.forward
    }
}

/// Runs the break-before-make sequence for `target`.
pub fn sequence<P>(pins: &mut P, target: UartRoute)
where
    P: InterconnectPins + ?Sized,
{
    let plan = UartPlan::for_route(target);

    pins.set_level(OutputLine::UartLevelShifterDisable, Level::High);

    pins.set_level(OutputLine::UartTxDir, Level::from_bool(plan.forward));
    pins.set_level(OutputLine::UartTxDirN, Level::from_bool(!plan.forward));
    pins.set_pin_mode(UartPin::Tx, plan.pin_mode);
    pins.set_pin_mode(UartPin::Rx, plan.pin_mode);

    // SWAP is only writable with UE cleared.
    pins.set_uart_enabled(false);
    pins.set_uart_swap(plan.swapped());
    pins.set_uart_enabled(true);

    pins.settle();
    pins.set_level(
        OutputLine::UartLevelShifterDisable,
        Level::from_bool(!plan.shifter_enabled),
    );
}

#[cfg(test)]
mod tests {
    use heapless::Vec;

    use super::*;

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    enum Write {
        Level(OutputLine, Level),
        Mode(UartPin, PinMode),
        Enabled(bool),
        Swap(bool),
        Settle,
    }

    #[derive(Default)]
    struct Recorder {
        writes: Vec<Write, 16>,
    }

    impl Recorder {
        fn push(&mut self, write: Write) {
            self.writes.push(write).expect("recorder full");
        }
    }

    impl InterconnectPins for Recorder {
        fn set_level(&mut self, line: OutputLine, level: Level) {
            self.push(Write::Level(line, level));
        }

        fn set_pin_mode(&mut self, pin: UartPin, mode: PinMode) {
            self.push(Write::Mode(pin, mode));
        }

        fn set_uart_enabled(&mut self, enabled: bool) {
            self.push(Write::Enabled(enabled));
        }

        fn set_uart_swap(&mut self, swapped: bool) {
            self.push(Write::Swap(swapped));
        }

        fn settle(&mut self) {
            self.push(Write::Settle);
        }
    }

    #[test]
    fn forward_sequence_matches_hardware_order() {
        let mut pins = Recorder::default();
        sequence(&mut pins, UartRoute::Forward);

        let expected = [
            Write::Level(OutputLine::UartLevelShifterDisable, Level::High),
            Write::Level(OutputLine::UartTxDir, Level::High),
            Write::Level(OutputLine::UartTxDirN, Level::Low),
            Write::Mode(UartPin::Tx, PinMode::Alternate),
            Write::Mode(UartPin::Rx, PinMode::Alternate),
            Write::Enabled(false),
            Write::Swap(false),
            Write::Enabled(true),
            Write::Settle,
            Write::Level(OutputLine::UartLevelShifterDisable, Level::Low),
        ];
        assert_eq!(pins.writes.as_slice(), &expected);
    }

    #[test]
    fn off_tristates_and_leaves_shifter_disabled() {
        let mut pins = Recorder::default();
        sequence(&mut pins, UartRoute::Off);

        assert!(pins.writes.contains(&Write::Mode(UartPin::Tx, PinMode::Input)));
        assert!(pins.writes.contains(&Write::Swap(true)));
        assert_eq!(
            pins.writes.last(),
            Some(&Write::Level(OutputLine::UartLevelShifterDisable, Level::High))
        );
    }

    #[test]
    fn flipped_programs_swap() {
        let mut pins = Recorder::default();
        sequence(&mut pins, UartRoute::Flipped);

        assert!(pins.writes.contains(&Write::Level(OutputLine::UartTxDir, Level::Low)));
        assert!(pins.writes.contains(&Write::Swap(true)));
        assert_eq!(
            pins.writes.last(),
            Some(&Write::Level(OutputLine::UartLevelShifterDisable, Level::Low))
        );
    }
}

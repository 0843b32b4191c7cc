//! Type-C mux sequencing: disconnect, release both relays, then reconnect.

use super::{InterconnectPins, Level, MuxRoute, OutputLine};

/// Runs the break-before-make sequence for `target`.
pub fn sequence<P>(pins: &mut P, target: MuxRoute)
where
    P: InterconnectPins + ?Sized,
{
    let path_b = matches!(target, MuxRoute::PathB);

    pins.set_level(OutputLine::TypeCOutputEnableN, Level::High);
    pins.set_level(OutputLine::RelayA, Level::Low);
    pins.set_level(OutputLine::RelayB, Level::Low);

    pins.settle();
    match target {
        MuxRoute::Off => {}
        MuxRoute::PathA => pins.set_level(OutputLine::RelayA, Level::High),
        MuxRoute::PathB => pins.set_level(OutputLine::RelayB, Level::High),
    }

    pins.set_level(OutputLine::TypeCSelectB, Level::from_bool(path_b));
    pins.set_level(
        OutputLine::TypeCOutputEnableN,
        Level::from_bool(!target.is_enabled()),
    );
}

#[cfg(test)]
mod tests {
    use heapless::Vec;

    use super::*;
    use crate::routing::{PinMode, UartPin};

    #[derive(Default)]
    struct LevelLog {
        writes: Vec<(OutputLine, Level), 16>,
        settled_at: Option<usize>,
    }

    impl InterconnectPins for LevelLog {
        fn set_level(&mut self, line: OutputLine, level: Level) {
            self.writes.push((line, level)).expect("log full");
        }

        fn set_pin_mode(&mut self, _: UartPin, _: PinMode) {
            panic!("mux sequence must not touch UART pins");
        }

        fn set_uart_enabled(&mut self, _: bool) {
            panic!("mux sequence must not touch the USART");
        }

        fn set_uart_swap(&mut self, _: bool) {
            panic!("mux sequence must not touch the USART");
        }

        fn settle(&mut self) {
            self.settled_at = Some(self.writes.len());
        }
    }

    #[test]
    fn path_b_releases_before_asserting() {
        let mut pins = LevelLog::default();
        sequence(&mut pins, MuxRoute::PathB);

        let expected = [
            (OutputLine::TypeCOutputEnableN, Level::High),
            (OutputLine::RelayA, Level::Low),
            (OutputLine::RelayB, Level::Low),
            (OutputLine::RelayB, Level::High),
            (OutputLine::TypeCSelectB, Level::High),
            (OutputLine::TypeCOutputEnableN, Level::Low),
        ];
        assert_eq!(pins.writes.as_slice(), &expected);
        assert_eq!(pins.settled_at, Some(3));
    }

    #[test]
    fn off_leaves_output_disabled() {
        let mut pins = LevelLog::default();
        sequence(&mut pins, MuxRoute::Off);

        assert!(!pins.writes.contains(&(OutputLine::RelayA, Level::High)));
        assert!(!pins.writes.contains(&(OutputLine::RelayB, Level::High)));
        assert_eq!(
            pins.writes.last(),
            Some(&(OutputLine::TypeCOutputEnableN, Level::High))
        );
    }

    #[test]
    fn path_a_selects_low() {
        let mut pins = LevelLog::default();
        sequence(&mut pins, MuxRoute::PathA);

        assert!(pins.writes.contains(&(OutputLine::RelayA, Level::High)));
        assert!(pins.writes.contains(&(OutputLine::TypeCSelectB, Level::Low)));
    }
}

//! Route model and break-before-make configurator for the SBU UART and Type-C mux.
//!
//! Both physical paths are reprogrammed through the [`InterconnectPins`]
//! abstraction so the firmware can drive GPIO and USART registers while host
//! tests record every write. The sequencing itself lives in [`uart`] and
//! [`mux`]; this module owns the shared vocabulary and the configurator that
//! tracks the current routes.

use core::fmt;

pub mod mux;
pub mod uart;

use crate::probe::Orientation;

/// Commanded or detected configuration of the SBU UART path.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartRoute {
    /// Level shifter disabled, TX/RX tri-stated.
    #[default]
    Off,
    /// SBU1 carries host TX, SBU2 carries host RX.
    Forward,
    /// Swapped pin assignment for a reversed plug.
    Flipped,
}

impl UartRoute {
    /// Deterministic index used by telemetry encoding.
    pub const fn as_index(self) -> u16 {
        match self {
            UartRoute::Off => 0,
            UartRoute::Forward => 1,
            UartRoute::Flipped => 2,
        }
    }

    pub const fn from_index(index: u16) -> Option<Self> {
        match index {
            0 => Some(UartRoute::Off),
            1 => Some(UartRoute::Forward),
            2 => Some(UartRoute::Flipped),
            _ => None,
        }
    }

    /// Console label (`off`, `on`, `flip`).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            UartRoute::Off => "off",
            UartRoute::Forward => "on",
            UartRoute::Flipped => "flip",
        }
    }

    #[must_use]
    pub const fn is_enabled(self) -> bool {
        !matches!(self, UartRoute::Off)
    }

    /// Route that matches a detected plug orientation.
    #[must_use]
    pub const fn from_orientation(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Unplugged => UartRoute::Off,
            Orientation::Forward => UartRoute::Forward,
            Orientation::Flipped => UartRoute::Flipped,
        }
    }
}

impl fmt::Display for UartRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Commanded state of the Type-C data mux. Never autodetected.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MuxRoute {
    #[default]
    Off,
    PathA,
    PathB,
}

impl MuxRoute {
    pub const fn as_index(self) -> u16 {
        match self {
            MuxRoute::Off => 0,
            MuxRoute::PathA => 1,
            MuxRoute::PathB => 2,
        }
    }

    pub const fn from_index(index: u16) -> Option<Self> {
        match index {
            0 => Some(MuxRoute::Off),
            1 => Some(MuxRoute::PathA),
            2 => Some(MuxRoute::PathB),
            _ => None,
        }
    }

    /// Console label (`off`, `A`, `B`).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            MuxRoute::Off => "off",
            MuxRoute::PathA => "A",
            MuxRoute::PathB => "B",
        }
    }

    #[must_use]
    pub const fn is_enabled(self) -> bool {
        !matches!(self, MuxRoute::Off)
    }
}

impl fmt::Display for MuxRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether the control loop may change the UART route on its own.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DetectMode {
    Auto,
    #[default]
    Manual,
}

impl DetectMode {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            DetectMode::Auto => "auto",
            DetectMode::Manual => "manual",
        }
    }
}

impl fmt::Display for DetectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Electrical level written to an output line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

impl Level {
    #[must_use]
    pub const fn from_bool(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }

    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        Level::from_bool(high)
    }
}

/// Push-pull control lines owned by the configurator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputLine {
    /// UART level shifter disable (high = shifter off).
    UartLevelShifterDisable,
    /// Level shifter direction, high for the forward orientation.
    UartTxDir,
    /// Complement of [`OutputLine::UartTxDir`].
    UartTxDirN,
    /// Type-C mux output enable (active low).
    TypeCOutputEnableN,
    RelayA,
    RelayB,
    /// Type-C path select, high for path B.
    TypeCSelectB,
}

impl OutputLine {
    /// Deterministic index for lookups into [`OUTPUT_LINES`].
    pub const fn as_index(self) -> usize {
        match self {
            OutputLine::UartLevelShifterDisable => 0,
            OutputLine::UartTxDir => 1,
            OutputLine::UartTxDirN => 2,
            OutputLine::TypeCOutputEnableN => 3,
            OutputLine::RelayA => 4,
            OutputLine::RelayB => 5,
            OutputLine::TypeCSelectB => 6,
        }
    }

    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(OutputLine::UartLevelShifterDisable),
            1 => Some(OutputLine::UartTxDir),
            2 => Some(OutputLine::UartTxDirN),
            3 => Some(OutputLine::TypeCOutputEnableN),
            4 => Some(OutputLine::RelayA),
            5 => Some(OutputLine::RelayB),
            6 => Some(OutputLine::TypeCSelectB),
            _ => None,
        }
    }

    /// Schematic net name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        OUTPUT_LINES[self.as_index()].name
    }
}

/// Number of configurator-owned output lines.
pub const OUTPUT_LINE_COUNT: usize = 7;

/// Metadata describing a control line and its safe (disconnected) level.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OutputLineSpec {
    pub line: OutputLine,
    pub name: &'static str,
    pub safe_level: Level,
}

impl OutputLineSpec {
    pub const fn new(line: OutputLine, name: &'static str, safe_level: Level) -> Self {
        Self {
            line,
            name,
            safe_level,
        }
    }
}

/// Compile-time catalog of every output line.
pub const OUTPUT_LINES: [OutputLineSpec; OUTPUT_LINE_COUNT] = [
    OutputLineSpec::new(OutputLine::UartLevelShifterDisable, "ST_UART_LVL_DIS", Level::High),
    OutputLineSpec::new(OutputLine::UartTxDir, "ST_UART_TX_DIR", Level::Low),
    OutputLineSpec::new(OutputLine::UartTxDirN, "ST_UART_TX_DIR_N", Level::High),
    OutputLineSpec::new(OutputLine::TypeCOutputEnableN, "USB_C_OE_N", Level::High),
    OutputLineSpec::new(OutputLine::RelayA, "SEL_RELAY_A", Level::Low),
    OutputLineSpec::new(OutputLine::RelayB, "SEL_RELAY_B", Level::Low),
    OutputLineSpec::new(OutputLine::TypeCSelectB, "USB_C_SEL_B", Level::Low),
];

/// Retrieve output line metadata by identifier.
pub const fn output_line(line: OutputLine) -> OutputLineSpec {
    OUTPUT_LINES[line.as_index()]
}

/// MCU pins shared with the USART peripheral.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartPin {
    Tx,
    Rx,
}

/// Pin function for the UART pins.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    /// High impedance input.
    Input,
    /// Routed to the USART alternate function.
    Alternate,
}

/// Abstraction over the GPIO and USART controls that shape the physical paths.
pub trait InterconnectPins {
    /// Drives an output line to `level`.
    fn set_level(&mut self, line: OutputLine, level: Level);

    /// Switches a UART pin between tri-state input and the USART function.
    fn set_pin_mode(&mut self, pin: UartPin, mode: PinMode);

    /// Enables or disables the USART peripheral.
    fn set_uart_enabled(&mut self, enabled: bool);

    /// Programs the USART TX/RX swap bit. Only valid while the peripheral is disabled.
    fn set_uart_swap(&mut self, swapped: bool);

    /// Blocks for the settle interval between break and make.
    fn settle(&mut self) {}
}

impl<T> InterconnectPins for &mut T
where
    T: InterconnectPins + ?Sized,
{
    fn set_level(&mut self, line: OutputLine, level: Level) {
        (**self).set_level(line, level);
    }

    fn set_pin_mode(&mut self, pin: UartPin, mode: PinMode) {
        (**self).set_pin_mode(pin, mode);
    }

    fn set_uart_enabled(&mut self, enabled: bool) {
        (**self).set_uart_enabled(enabled);
    }

    fn set_uart_swap(&mut self, swapped: bool) {
        (**self).set_uart_swap(swapped);
    }

    fn settle(&mut self) {
        (**self).settle();
    }
}

/// Pin driver that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopPins;

impl NoopPins {
    pub const fn new() -> Self {
        Self
    }
}

impl InterconnectPins for NoopPins {
    fn set_level(&mut self, _: OutputLine, _: Level) {}

    fn set_pin_mode(&mut self, _: UartPin, _: PinMode) {}

    fn set_uart_enabled(&mut self, _: bool) {}

    fn set_uart_swap(&mut self, _: bool) {}
}

/// Owns the pin driver and the current route of both physical paths.
///
/// Construction drives both paths to [`UartRoute::Off`] and [`MuxRoute::Off`]
/// so the recorded routes always match the hardware.
pub struct InterconnectConfigurator<P> {
    pins: P,
    uart: UartRoute,
    mux: MuxRoute,
}

impl<P> InterconnectConfigurator<P>
where
    P: InterconnectPins,
{
    pub fn new(pins: P) -> Self {
        let mut configurator = Self {
            pins,
            uart: UartRoute::Off,
            mux: MuxRoute::Off,
        };
        configurator.apply_uart_route(UartRoute::Off);
        configurator.apply_mux_route(MuxRoute::Off);
        configurator
    }

    /// Reprograms the UART path. Re-applying the current route repeats the full sequence.
    pub fn apply_uart_route(&mut self, target: UartRoute) {
        uart::sequence(&mut self.pins, target);
        self.uart = target;
    }

    /// Reprograms the Type-C mux path.
    pub fn apply_mux_route(&mut self, target: MuxRoute) {
        mux::sequence(&mut self.pins, target);
        self.mux = target;
    }

    #[must_use]
    pub const fn uart_route(&self) -> UartRoute {
        self.uart
    }

    #[must_use]
    pub const fn mux_route(&self) -> MuxRoute {
        self.mux
    }

    pub fn pins(&self) -> &P {
        &self.pins
    }

    pub fn pins_mut(&mut self) -> &mut P {
        &mut self.pins
    }
}

//! Periodic control loop tying the probes, debounce gate and configurator together.
//!
//! The controller is a plain owned value. Firmware confines it to a single
//! task; host tooling drives it directly. Each [`InterconnectController::tick`]
//! samples the SBU pair (unless detection is manual), feeds the debounce gate,
//! and applies the committed route. Operator requests bypass the gate.

use core::time::Duration;

use crate::debounce::{DEFAULT_DEBOUNCE_THRESHOLD, DebounceGate, Observation};
use crate::probe::{AnalogSampler, ProbeSample};
use crate::routing::{DetectMode, InterconnectConfigurator, InterconnectPins, MuxRoute, UartRoute};
use crate::telemetry::{TelemetryInstant, TelemetryRecorder};

/// Tunables for the control loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InterconnectConfig {
    /// Period between ticks.
    pub tick_period: Duration,
    /// Agreeing observations tolerated before a commit (commit on `threshold + 1`).
    pub debounce_threshold: u8,
}

impl InterconnectConfig {
    pub const DEFAULT: Self = Self {
        tick_period: Duration::from_millis(250),
        debounce_threshold: DEFAULT_DEBOUNCE_THRESHOLD,
    };

    /// Time a steady probe condition must persist before the loop acts on it.
    #[must_use]
    pub fn debounce_window(&self) -> Duration {
        self.tick_period * (u32::from(self.debounce_threshold) + 1)
    }
}

impl Default for InterconnectConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Loop state derived from the detect mode and current UART route.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoopState {
    /// Auto mode, UART off, looking for an idle-high line.
    Searching,
    /// Auto mode, UART connected, watching for the link to disappear.
    Monitoring,
    /// Detection disabled; ticks do nothing.
    Manual,
}

/// Operator request for the UART path.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartRequest {
    Off,
    On,
    Flip,
    Auto,
}

impl UartRequest {
    /// Route applied immediately when the request is handled.
    #[must_use]
    pub const fn immediate_route(self) -> UartRoute {
        match self {
            UartRequest::Off | UartRequest::Auto => UartRoute::Off,
            UartRequest::On => UartRoute::Forward,
            UartRequest::Flip => UartRoute::Flipped,
        }
    }
}

/// Operator request routed to the controller. `None` arguments only query.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterconnectRequest {
    Uart(Option<UartRequest>),
    Mux(Option<MuxRoute>),
    Status,
}

/// Automatic transition performed by a tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    AutoEnabled(UartRoute),
    AutoDisabled,
}

/// Snapshot reported by the `uart`, `mux` and `status` commands.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterconnectStatus {
    pub uart: UartRoute,
    pub mode: DetectMode,
    pub mux: MuxRoute,
    pub last_sample: Option<ProbeSample>,
    pub debounce_count: u16,
    pub debounce_commit_after: u16,
}

/// Orientation autodetect and routing controller.
pub struct InterconnectController<S, P> {
    sampler: S,
    configurator: InterconnectConfigurator<P>,
    mode: DetectMode,
    gate: DebounceGate<UartRoute>,
    last_sample: Option<ProbeSample>,
    config: InterconnectConfig,
}

impl<S, P> InterconnectController<S, P>
where
    S: AnalogSampler,
    P: InterconnectPins,
{
    /// Drives both paths off and starts in manual mode.
    pub fn new(sampler: S, pins: P, config: InterconnectConfig) -> Self {
        Self {
            sampler,
            configurator: InterconnectConfigurator::new(pins),
            mode: DetectMode::Manual,
            gate: DebounceGate::new(config.debounce_threshold),
            last_sample: None,
            config,
        }
    }

    /// Runs one control-loop iteration.
    pub fn tick<TInstant, const N: usize>(
        &mut self,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, N>,
    ) -> Option<Transition>
    where
        TInstant: TelemetryInstant,
    {
        let state = self.state();
        if state == LoopState::Manual {
            return None;
        }

        let sample = ProbeSample::capture(&mut self.sampler);
        self.last_sample = Some(sample);

        let observation = match state {
            LoopState::Searching => match UartRoute::from_orientation(sample.orientation()) {
                UartRoute::Off => Observation::Steady,
                detected => Observation::Change(detected),
            },
            LoopState::Monitoring => {
                if sample.still_present() {
                    Observation::Steady
                } else {
                    Observation::Change(UartRoute::Off)
                }
            }
            LoopState::Manual => return None,
        };

        let committed = self.gate.observe(observation)?;
        self.configurator.apply_uart_route(committed);
        if committed.is_enabled() {
            telemetry.record_auto_enable(committed, sample, now);
            Some(Transition::AutoEnabled(committed))
        } else {
            telemetry.record_auto_disable(sample, now);
            Some(Transition::AutoDisabled)
        }
    }

    /// Applies an operator request and returns the resulting status.
    pub fn handle<TInstant, const N: usize>(
        &mut self,
        request: InterconnectRequest,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, N>,
    ) -> InterconnectStatus
    where
        TInstant: TelemetryInstant,
    {
        match request {
            InterconnectRequest::Uart(Some(request)) => self.request_uart(request, now, telemetry),
            InterconnectRequest::Mux(Some(route)) => self.request_mux(route, now, telemetry),
            InterconnectRequest::Uart(None)
            | InterconnectRequest::Mux(None)
            | InterconnectRequest::Status => self.status(),
        }
    }

    /// Handles an operator UART request and returns the resulting status.
    pub fn request_uart<TInstant, const N: usize>(
        &mut self,
        request: UartRequest,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, N>,
    ) -> InterconnectStatus
    where
        TInstant: TelemetryInstant,
    {
        let previous = self.configurator.uart_route();
        let next = request.immediate_route();
        let autodetect = request == UartRequest::Auto;

        self.mode = if autodetect {
            DetectMode::Auto
        } else {
            DetectMode::Manual
        };
        self.gate.reset();
        self.configurator.apply_uart_route(next);
        telemetry.record_uart_command(previous, next, autodetect, now);

        self.status()
    }

    /// Handles an operator mux request and returns the resulting status.
    pub fn request_mux<TInstant, const N: usize>(
        &mut self,
        route: MuxRoute,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, N>,
    ) -> InterconnectStatus
    where
        TInstant: TelemetryInstant,
    {
        let previous = self.configurator.mux_route();
        self.configurator.apply_mux_route(route);
        telemetry.record_mux_command(previous, route, now);

        self.status()
    }

    #[must_use]
    pub fn state(&self) -> LoopState {
        match (self.mode, self.configurator.uart_route()) {
            (DetectMode::Manual, _) => LoopState::Manual,
            (DetectMode::Auto, UartRoute::Off) => LoopState::Searching,
            (DetectMode::Auto, _) => LoopState::Monitoring,
        }
    }

    #[must_use]
    pub fn status(&self) -> InterconnectStatus {
        InterconnectStatus {
            uart: self.configurator.uart_route(),
            mode: self.mode,
            mux: self.configurator.mux_route(),
            last_sample: self.last_sample,
            debounce_count: self.gate.count(),
            debounce_commit_after: self.gate.commit_after(),
        }
    }

    #[must_use]
    pub const fn mode(&self) -> DetectMode {
        self.mode
    }

    #[must_use]
    pub const fn config(&self) -> &InterconnectConfig {
        &self.config
    }

    pub fn sampler_mut(&mut self) -> &mut S {
        &mut self.sampler
    }

    pub fn pins(&self) -> &P {
        self.configurator.pins()
    }

    pub fn pins_mut(&mut self) -> &mut P {
        self.configurator.pins_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{Millivolts, ProbeChannel};
    use crate::routing::NoopPins;
    use crate::telemetry::TelemetryEventKind;

    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    struct MicrosInstant(u64);

    impl TelemetryInstant for MicrosInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_micros(self.0.saturating_sub(earlier.0))
        }
    }

    #[derive(Default)]
    struct SbuPair {
        sample: ProbeSample,
        reads: u32,
    }

    impl AnalogSampler for SbuPair {
        fn read_channel(&mut self, channel: ProbeChannel) -> Millivolts {
            self.reads += 1;
            self.sample.get(channel)
        }
    }

    fn controller() -> InterconnectController<SbuPair, NoopPins> {
        InterconnectController::new(
            SbuPair::default(),
            NoopPins::new(),
            InterconnectConfig::DEFAULT,
        )
    }

    #[test]
    fn boots_manual_and_off() {
        let controller = controller();
        let status = controller.status();
        assert_eq!(status.uart, UartRoute::Off);
        assert_eq!(status.mux, MuxRoute::Off);
        assert_eq!(status.mode, DetectMode::Manual);
        assert_eq!(controller.state(), LoopState::Manual);
    }

    #[test]
    fn manual_ticks_never_sample() {
        let mut controller = controller();
        let mut telemetry = TelemetryRecorder::<MicrosInstant>::new();
        controller.sampler_mut().sample = ProbeSample::new(0, 1_800);

        for tick in 0..20 {
            assert_eq!(controller.tick(MicrosInstant(tick), &mut telemetry), None);
        }
        assert_eq!(controller.sampler_mut().reads, 0);
        assert!(telemetry.is_empty());
    }

    #[test]
    fn auto_request_resets_progress_and_applies_off() {
        let mut controller = controller();
        let mut telemetry = TelemetryRecorder::<MicrosInstant>::new();
        controller.request_uart(UartRequest::Flip, MicrosInstant(0), &mut telemetry);

        let status = controller.request_uart(UartRequest::Auto, MicrosInstant(1), &mut telemetry);
        assert_eq!(status.uart, UartRoute::Off);
        assert_eq!(status.mode, DetectMode::Auto);
        assert_eq!(status.debounce_count, 0);
        assert_eq!(controller.state(), LoopState::Searching);
        assert_eq!(
            telemetry.latest().map(|record| record.event),
            Some(TelemetryEventKind::AutodetectArmed)
        );
    }

    #[test]
    fn searching_commits_flipped_after_window() {
        let mut controller = controller();
        let mut telemetry = TelemetryRecorder::<MicrosInstant>::new();
        controller.request_uart(UartRequest::Auto, MicrosInstant(0), &mut telemetry);
        controller.sampler_mut().sample = ProbeSample::new(1_750, 90);

        for tick in 1..=4 {
            assert_eq!(controller.tick(MicrosInstant(tick), &mut telemetry), None);
            assert_eq!(controller.status().debounce_count, u16::try_from(tick).unwrap());
        }
        assert_eq!(
            controller.tick(MicrosInstant(5), &mut telemetry),
            Some(Transition::AutoEnabled(UartRoute::Flipped))
        );
        assert_eq!(controller.state(), LoopState::Monitoring);
        assert_eq!(controller.status().last_sample, Some(ProbeSample::new(1_750, 90)));
    }

    #[test]
    fn debounce_window_scales_with_threshold() {
        assert_eq!(
            InterconnectConfig::DEFAULT.debounce_window(),
            Duration::from_millis(1_250)
        );
        let quick = InterconnectConfig {
            tick_period: Duration::from_millis(10),
            debounce_threshold: 1,
        };
        assert_eq!(quick.debounce_window(), Duration::from_millis(20));
    }

    #[test]
    fn queries_do_not_touch_state_or_telemetry() {
        let mut controller = controller();
        let mut telemetry = TelemetryRecorder::<MicrosInstant>::new();
        let before = controller.status();

        for request in [
            InterconnectRequest::Uart(None),
            InterconnectRequest::Mux(None),
            InterconnectRequest::Status,
        ] {
            assert_eq!(
                controller.handle(request, MicrosInstant(0), &mut telemetry),
                before
            );
        }
        assert!(telemetry.is_empty());
    }

    #[test]
    fn mux_request_leaves_uart_untouched() {
        let mut controller = controller();
        let mut telemetry = TelemetryRecorder::<MicrosInstant>::new();
        controller.request_uart(UartRequest::On, MicrosInstant(0), &mut telemetry);

        let status = controller.request_mux(MuxRoute::PathA, MicrosInstant(1), &mut telemetry);
        assert_eq!(status.mux, MuxRoute::PathA);
        assert_eq!(status.uart, UartRoute::Forward);
        assert_eq!(status.mode, DetectMode::Manual);
    }
}

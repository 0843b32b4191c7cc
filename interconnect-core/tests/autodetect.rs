use core::time::Duration;

use heapless::Vec as HeaplessVec;
use interconnect_core::control::{
    InterconnectConfig, InterconnectController, LoopState, Transition, UartRequest,
};
use interconnect_core::probe::{AnalogSampler, Millivolts, ProbeChannel, ProbeSample};
use interconnect_core::routing::{DetectMode, NoopPins, UartRoute};
use interconnect_core::telemetry::{
    TelemetryEventKind, TelemetryInstant, TelemetryPayload, TelemetryRecorder,
};

const TICK_MICROS: u64 = 250_000;

const FORWARD: ProbeSample = ProbeSample::new(40, 1_780);
const FLIPPED: ProbeSample = ProbeSample::new(1_820, 12);
const IDLE: ProbeSample = ProbeSample::new(1_700, 1_750);
const FLOATING: ProbeSample = ProbeSample::new(900, 950);

#[test]
fn forward_cable_enables_after_five_ticks() {
    let mut rig = Rig::armed();
    rig.script(&[FORWARD; 5]);

    for tick in 1..=4 {
        assert_eq!(rig.tick(), None, "tick {tick} should only accumulate");
        assert_eq!(rig.controller.status().uart, UartRoute::Off);
    }
    assert_eq!(
        rig.tick(),
        Some(Transition::AutoEnabled(UartRoute::Forward))
    );

    let status = rig.controller.status();
    assert_eq!(status.uart, UartRoute::Forward);
    assert_eq!(status.mode, DetectMode::Auto);
    assert_eq!(status.debounce_count, 0);
    assert_eq!(rig.controller.state(), LoopState::Monitoring);

    let record = rig.telemetry.latest().expect("commit should be recorded");
    assert_eq!(record.event, TelemetryEventKind::UartAutoEnabled(UartRoute::Forward));
    match record.details {
        TelemetryPayload::Probe(probe) => assert_eq!(probe.sample, FORWARD),
        other => panic!("expected probe payload, got {other:?}"),
    }
}

#[test]
fn flipped_cable_enables_flipped_route() {
    let mut rig = Rig::armed();
    rig.script(&[FLIPPED; 5]);

    let transitions = rig.run(5);
    assert_eq!(
        transitions.as_slice(),
        &[Transition::AutoEnabled(UartRoute::Flipped)]
    );
    assert_eq!(rig.controller.status().uart, UartRoute::Flipped);
}

#[test]
fn lost_presence_disables_after_five_ticks() {
    let mut rig = Rig::armed();
    rig.script(&[FORWARD; 5]);
    rig.run(5);
    assert_eq!(rig.controller.state(), LoopState::Monitoring);

    rig.script(&[IDLE, IDLE, FLOATING, FLOATING, FLOATING, FLOATING]);
    assert_eq!(rig.run(2).len(), 0, "idle-high on both lines keeps the link");
    for _ in 0..4 {
        assert_eq!(rig.tick(), None);
    }
    assert_eq!(rig.controller.status().uart, UartRoute::Forward);

    rig.script(&[FLOATING]);
    assert_eq!(rig.tick(), Some(Transition::AutoDisabled));
    assert_eq!(rig.controller.status().uart, UartRoute::Off);
    assert_eq!(rig.controller.status().mode, DetectMode::Auto);
    assert_eq!(rig.controller.state(), LoopState::Searching);
    assert_eq!(
        rig.telemetry.latest().map(|record| record.event),
        Some(TelemetryEventKind::UartAutoDisabled)
    );
}

#[test]
fn dissenting_sample_restarts_the_window() {
    let mut rig = Rig::armed();
    rig.script(&[FORWARD, FORWARD, FORWARD, FORWARD, FLOATING]);
    assert!(rig.run(5).is_empty());
    assert_eq!(rig.controller.status().debounce_count, 0);

    rig.script(&[FORWARD; 4]);
    assert!(rig.run(4).is_empty());
    assert_eq!(rig.controller.status().debounce_count, 4);

    rig.script(&[FORWARD]);
    assert_eq!(
        rig.tick(),
        Some(Transition::AutoEnabled(UartRoute::Forward))
    );
}

#[test]
fn orientation_change_mid_window_restarts_count() {
    let mut rig = Rig::armed();
    rig.script(&[FORWARD, FORWARD, FORWARD, FLIPPED]);
    assert!(rig.run(4).is_empty());
    assert_eq!(rig.controller.status().debounce_count, 1);

    rig.script(&[FLIPPED; 4]);
    assert_eq!(
        rig.run(4).as_slice(),
        &[Transition::AutoEnabled(UartRoute::Flipped)]
    );
}

#[test]
fn manual_mode_ignores_a_connected_cable() {
    let mut rig = Rig::new();
    rig.script(&[FORWARD; 20]);

    assert!(rig.run(20).is_empty());
    assert_eq!(rig.controller.status().uart, UartRoute::Off);
    assert_eq!(rig.controller.status().last_sample, None);
    assert!(rig.telemetry.is_empty());
}

#[test]
fn shorter_threshold_commits_sooner() {
    let config = InterconnectConfig {
        tick_period: Duration::from_millis(10),
        debounce_threshold: 1,
    };
    let mut rig = Rig::with_config(config);
    rig.arm();
    rig.script(&[FLIPPED; 2]);

    assert_eq!(rig.tick(), None);
    assert_eq!(
        rig.tick(),
        Some(Transition::AutoEnabled(UartRoute::Flipped))
    );
}

struct Rig {
    controller: InterconnectController<ScriptedSampler, NoopPins>,
    telemetry: TelemetryRecorder<MockInstant>,
    now: MockInstant,
}

impl Rig {
    fn new() -> Self {
        Self::with_config(InterconnectConfig::DEFAULT)
    }

    fn with_config(config: InterconnectConfig) -> Self {
        Self {
            controller: InterconnectController::new(
                ScriptedSampler::default(),
                NoopPins::new(),
                config,
            ),
            telemetry: TelemetryRecorder::new(),
            now: MockInstant::micros(0),
        }
    }

    fn armed() -> Self {
        let mut rig = Self::new();
        rig.arm();
        rig
    }

    fn arm(&mut self) {
        let status = self
            .controller
            .request_uart(UartRequest::Auto, self.now, &mut self.telemetry);
        assert_eq!(status.uart, UartRoute::Off);
        assert_eq!(self.controller.state(), LoopState::Searching);
    }

    fn script(&mut self, samples: &[ProbeSample]) {
        let sampler = self.controller.sampler_mut();
        sampler.queue.clear();
        sampler
            .queue
            .extend_from_slice(samples)
            .expect("script fits the sampler queue");
        sampler.cursor = 0;
    }

    fn tick(&mut self) -> Option<Transition> {
        self.now = self.now + TICK_MICROS;
        self.controller.tick(self.now, &mut self.telemetry)
    }

    fn run(&mut self, ticks: usize) -> HeaplessVec<Transition, 8> {
        let mut transitions = HeaplessVec::new();
        for _ in 0..ticks {
            if let Some(transition) = self.tick() {
                transitions
                    .push(transition)
                    .expect("transition log has room");
            }
        }
        transitions
    }
}

/// Replays queued samples, holding the last one once the script runs out.
#[derive(Default)]
struct ScriptedSampler {
    queue: HeaplessVec<ProbeSample, 32>,
    cursor: usize,
}

impl ScriptedSampler {
    fn current(&self) -> ProbeSample {
        self.queue
            .get(self.cursor)
            .or_else(|| self.queue.last())
            .copied()
            .unwrap_or_default()
    }
}

impl AnalogSampler for ScriptedSampler {
    fn read_channel(&mut self, channel: ProbeChannel) -> Millivolts {
        let value = self.current().get(channel);
        if channel == ProbeChannel::Sbu2 {
            self.cursor += 1;
        }
        value
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct MockInstant(u64);

impl MockInstant {
    const fn micros(value: u64) -> Self {
        Self(value)
    }
}

impl core::ops::Add<u64> for MockInstant {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0.saturating_add(rhs))
    }
}

impl TelemetryInstant for MockInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

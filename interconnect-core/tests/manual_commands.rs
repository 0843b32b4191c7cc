use core::fmt::Write as _;
use core::time::Duration;

use heapless::String;
use interconnect_core::control::{InterconnectConfig, InterconnectController, LoopState};
use interconnect_core::probe::{AnalogSampler, Millivolts, ProbeChannel, ProbeSample};
use interconnect_core::repl::commands::{CommandError, CommandExecutor, CommandOutcome};
use interconnect_core::routing::{DetectMode, MuxRoute, NoopPins, UartRoute};
use interconnect_core::telemetry::{TelemetryEventKind, TelemetryInstant};

type Executor = CommandExecutor<FixedProbes, NoopPins, MockInstant>;

#[test]
fn uart_off_mid_debounce_cancels_autodetect() {
    let mut executor = build_executor(ProbeSample::new(30, 1_800));
    run(&mut executor, "uart auto", 0);

    for tick in 1..=3 {
        assert_eq!(executor.tick(MockInstant::millis(tick * 250)), None);
    }
    assert_eq!(executor.controller().status().debounce_count, 3);

    let reply = run(&mut executor, "uart off", 1_000);
    assert_eq!(reply.as_str(), "UART mux is: off, setting: manual\n");
    assert_eq!(executor.controller().state(), LoopState::Manual);
    assert_eq!(executor.controller().status().debounce_count, 0);

    for tick in 5..=20 {
        assert_eq!(executor.tick(MockInstant::millis(tick * 250)), None);
    }
    assert_eq!(executor.controller().status().uart, UartRoute::Off);
}

#[test]
fn manual_routes_report_console_strings() {
    let mut executor = build_executor(ProbeSample::default());

    let cases = [
        ("uart on", "UART mux is: on, setting: manual\n"),
        ("uart flip", "UART mux is: flip, setting: manual\n"),
        ("uart", "UART mux is: flip, setting: manual\n"),
        ("uart off", "UART mux is: off, setting: manual\n"),
        ("uart auto", "UART mux is: off, setting: auto\n"),
        ("mux a", "TYPE-C mux is A\n"),
        ("mux B", "TYPE-C mux is B\n"),
        ("mux", "TYPE-C mux is B\n"),
        ("mux off", "TYPE-C mux is off\n"),
    ];

    for (at, (line, expected)) in (0_u64..).zip(cases) {
        let reply = run(&mut executor, line, at);
        assert_eq!(reply.as_str(), expected, "reply to `{line}`");
    }
}

#[test]
fn invalid_parameter_leaves_routes_and_mode_unchanged() {
    let mut executor = build_executor(ProbeSample::default());
    run(&mut executor, "uart flip", 0);
    run(&mut executor, "mux a", 1);
    let before = executor.controller().status();
    let recorded = executor.telemetry().len();

    for line in [
        "uart sideways",
        "uart 2",
        "uart fl!p",
        "mux c",
        "MUX both",
        "mux a$",
    ] {
        let error = executor
            .execute(line, MockInstant::millis(2))
            .expect_err("argument should be rejected");
        assert!(
            matches!(error, CommandError::InvalidParameter { .. }),
            "`{line}` produced {error:?}"
        );

        let mut rendered: String<96> = String::new();
        write!(rendered, "{error}").expect("error fits");
        assert!(rendered.starts_with("Parameter 1 invalid"), "{rendered}");
    }

    assert_eq!(executor.controller().status(), before);
    assert_eq!(executor.controller().mode(), DetectMode::Manual);
    assert_eq!(executor.telemetry().len(), recorded);
}

#[test]
fn manual_override_replaces_an_auto_connection() {
    let mut executor = build_executor(ProbeSample::new(1_750, 20));
    run(&mut executor, "uart auto", 0);
    for tick in 1..=5 {
        executor.tick(MockInstant::millis(tick * 250));
    }
    assert_eq!(executor.controller().status().uart, UartRoute::Flipped);

    let reply = run(&mut executor, "uart on", 1_500);
    assert_eq!(reply.as_str(), "UART mux is: on, setting: manual\n");
    assert_eq!(
        executor.telemetry().latest().map(|record| record.event),
        Some(TelemetryEventKind::UartCommanded(UartRoute::Forward))
    );
}

#[test]
fn mux_commands_never_touch_the_uart_path() {
    let mut executor = build_executor(ProbeSample::default());
    run(&mut executor, "uart on", 0);

    for (at, line) in (1_u64..).zip(["mux a", "mux b", "mux off"]) {
        run(&mut executor, line, at);
        assert_eq!(executor.controller().status().uart, UartRoute::Forward);
    }
    assert_eq!(executor.controller().status().mux, MuxRoute::Off);
}

#[test]
fn status_reports_last_probe_reading() {
    let mut executor = build_executor(ProbeSample::new(5, 1_650));
    run(&mut executor, "uart auto", 0);
    executor.tick(MockInstant::millis(250));
    executor.tick(MockInstant::millis(500));

    let reply = run(&mut executor, "status", 600);
    assert_eq!(
        reply.as_str(),
        "UART mux is: off, setting: auto\nTYPE-C mux is off\nprobes sbu1=5mV sbu2=1650mV debounce=2/5\n"
    );
}

fn build_executor(sample: ProbeSample) -> Executor {
    CommandExecutor::new(InterconnectController::new(
        FixedProbes(sample),
        NoopPins::new(),
        InterconnectConfig::DEFAULT,
    ))
}

fn run(executor: &mut Executor, line: &str, at_millis: u64) -> String<256> {
    let outcome: CommandOutcome = executor
        .execute(line, MockInstant::millis(at_millis))
        .expect("command should succeed");
    let mut reply = String::new();
    outcome.write_to(&mut reply).expect("reply fits");
    reply
}

struct FixedProbes(ProbeSample);

impl AnalogSampler for FixedProbes {
    fn read_channel(&mut self, channel: ProbeChannel) -> Millivolts {
        self.0.get(channel)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct MockInstant(u64);

impl MockInstant {
    const fn millis(value: u64) -> Self {
        Self(value * 1_000)
    }
}

impl TelemetryInstant for MockInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

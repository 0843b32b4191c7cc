use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use interconnect_core::control::{InterconnectConfig, InterconnectController, Transition};
use interconnect_core::probe::{AnalogSampler, Millivolts, ProbeChannel, ProbeSample};
use interconnect_core::repl::commands::{CommandError, CommandExecutor, CommandOutcome, HelpTopic};
use interconnect_core::repl::completion::{CompletionEngine, Replacement};
use interconnect_core::repl::grammar::{self, Token, TokenKind};
use interconnect_core::routing::{InterconnectPins, Level, OutputLine, PinMode, UartPin};
use interconnect_core::telemetry::{
    EventId, TelemetryInstant, TelemetryPayload, TelemetryRecord,
};

/// Console commands that only exist in the emulator.
pub const SIMULATOR_TOPICS: &[(&str, &str)] = &[
    (
        "probe",
        "probe <sbu1-mV> <sbu2-mV>      - pin both SBU probe readings",
    ),
    (
        "plug",
        "plug <forward|flipped|none>    - attach or remove the simulated cable",
    ),
    (
        "tick",
        "tick [count]                   - advance the control loop (default 1)",
    ),
    (
        "events",
        "events                         - dump the telemetry ring",
    ),
];

const MAX_TICKS_PER_COMMAND: u32 = 10_000;

/// Probe readings for an idle-low line and an idle-high UART line.
const LINE_LOW_MV: Millivolts = 40;
const LINE_IDLE_MV: Millivolts = 1_780;

#[derive(Debug)]
pub enum CompletionResponse {
    NoMatches,
    Applied { replacement: Replacement },
    Suggestions { options: Vec<&'static str> },
}

/// Virtual monotonic clock advanced by `tick`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct SimInstant(Duration);

impl SimInstant {
    pub fn offset(self) -> Duration {
        self.0
    }

    fn advance(self, by: Duration) -> Self {
        Self(self.0.saturating_add(by))
    }
}

impl TelemetryInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

/// Orientation of the simulated debug cable.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Cable {
    Forward,
    Flipped,
}

impl Cable {
    fn from_tag(tag: &str) -> Result<Option<Self>, String> {
        if tag.eq_ignore_ascii_case("forward") {
            Ok(Some(Self::Forward))
        } else if tag.eq_ignore_ascii_case("flipped") {
            Ok(Some(Self::Flipped))
        } else if tag.eq_ignore_ascii_case("none") {
            Ok(None)
        } else {
            Err(format!("unknown cable orientation `{tag}`"))
        }
    }
}

/// SBU pair driven either by a simulated cable or by pinned readings.
///
/// With the cable attached and the UART live, both lines idle high because
/// the level shifter now drives our side of the link.
#[derive(Debug, Default)]
pub struct SimulatedSbu {
    cable: Option<Cable>,
    pinned: Option<ProbeSample>,
    link_live: bool,
}

impl SimulatedSbu {
    fn reading(&self) -> ProbeSample {
        if let Some(sample) = self.pinned {
            return sample;
        }

        match (self.cable, self.link_live) {
            (None, _) => ProbeSample::new(0, 0),
            (Some(_), true) => ProbeSample::new(LINE_IDLE_MV, LINE_IDLE_MV),
            (Some(Cable::Forward), false) => ProbeSample::new(LINE_LOW_MV, LINE_IDLE_MV),
            (Some(Cable::Flipped), false) => ProbeSample::new(LINE_IDLE_MV, LINE_LOW_MV),
        }
    }
}

impl AnalogSampler for SimulatedSbu {
    fn read_channel(&mut self, channel: ProbeChannel) -> Millivolts {
        self.reading().get(channel)
    }
}

/// One write the configurator issued to the simulated board.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PinEvent {
    Level(OutputLine, Level),
    Mode(UartPin, PinMode),
    UartEnabled(bool),
    UartSwap(bool),
    Settle,
}

impl PinEvent {
    fn describe(self) -> String {
        match self {
            PinEvent::Level(line, level) => {
                format!("{}={}", line.name(), u8::from(level.is_high()))
            }
            PinEvent::Mode(pin, mode) => format!("{pin:?}={mode:?}").to_ascii_uppercase(),
            PinEvent::UartEnabled(enabled) => format!("USART1.UE={}", u8::from(enabled)),
            PinEvent::UartSwap(swapped) => format!("USART1.SWAP={}", u8::from(swapped)),
            PinEvent::Settle => "settle".to_string(),
        }
    }
}

/// Pin driver that records every write for the transcript.
#[derive(Debug, Default)]
pub struct RecordingPins {
    events: Vec<PinEvent>,
}

impl RecordingPins {
    fn drain(&mut self) -> Vec<PinEvent> {
        std::mem::take(&mut self.events)
    }
}

impl InterconnectPins for RecordingPins {
    fn set_level(&mut self, line: OutputLine, level: Level) {
        self.events.push(PinEvent::Level(line, level));
    }

    fn set_pin_mode(&mut self, pin: UartPin, mode: PinMode) {
        self.events.push(PinEvent::Mode(pin, mode));
    }

    fn set_uart_enabled(&mut self, enabled: bool) {
        self.events.push(PinEvent::UartEnabled(enabled));
    }

    fn set_uart_swap(&mut self, swapped: bool) {
        self.events.push(PinEvent::UartSwap(swapped));
    }

    fn settle(&mut self) {
        self.events.push(PinEvent::Settle);
    }
}

/// Commands handled by the emulator before the shared console grammar.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum SimCommand {
    Probe(ProbeSample),
    Plug(Option<Cable>),
    Tick(u32),
    Events,
}

pub struct Session {
    executor: CommandExecutor<SimulatedSbu, RecordingPins, SimInstant>,
    transcript: TranscriptLogger,
    now: SimInstant,
    mirrored: EventId,
    completion: CompletionEngine,
}

impl Session {
    pub fn new(transcript_path: &Path, config: InterconnectConfig) -> io::Result<Self> {
        let transcript = TranscriptLogger::new(transcript_path, &config)?;
        let controller =
            InterconnectController::new(SimulatedSbu::default(), RecordingPins::default(), config);

        let mut session = Self {
            executor: CommandExecutor::new(controller),
            transcript,
            now: SimInstant::default(),
            mirrored: 0,
            completion: CompletionEngine::new(),
        };
        session.flush_activity()?;
        Ok(session)
    }

    pub fn now(&self) -> SimInstant {
        self.now
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        self.transcript
            .append_line(self.now, TranscriptRole::Host, trimmed)?;

        let lines = match parse_sim_command(trimmed) {
            Some(Ok(command)) => self.run_sim_command(command),
            Some(Err(message)) => vec![format!("ERR {message}")],
            None => self.run_console_command(trimmed),
        };

        self.record_output(&lines)?;
        self.flush_activity()?;
        Ok(lines)
    }

    pub fn handle_completion(
        &mut self,
        buffer: &str,
        cursor: usize,
    ) -> io::Result<CompletionResponse> {
        let cursor = cursor.min(buffer.len());
        let (prefix, suffix) = buffer.split_at(cursor);
        self.transcript
            .log_completion_request(self.now, prefix, suffix, cursor)?;

        let result = self.completion.complete(buffer, cursor);
        if result.options.is_empty() {
            self.transcript.log_completion_none(self.now)?;
            return Ok(CompletionResponse::NoMatches);
        }

        let options: Vec<&'static str> = result.options.iter().copied().collect();
        if let [candidate] = options.as_slice() {
            self.transcript
                .log_completion_applied(self.now, candidate, result.replacement.as_ref())?;
            return Ok(match result.replacement {
                Some(replacement) => CompletionResponse::Applied { replacement },
                None => CompletionResponse::NoMatches,
            });
        }

        self.transcript.log_completion_options(self.now, &options)?;
        Ok(CompletionResponse::Suggestions { options })
    }

    fn run_console_command(&mut self, line: &str) -> Vec<String> {
        match self.executor.execute(line, self.now) {
            Ok(outcome) => {
                let mut lines = render(&outcome);
                if outcome == CommandOutcome::Help(HelpTopic::All) {
                    lines.extend(SIMULATOR_TOPICS.iter().map(|(_, usage)| (*usage).to_string()));
                }
                lines
            }
            Err(CommandError::UnknownTopic(topic)) => SIMULATOR_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(topic))
                .map_or_else(
                    || vec![format!("ERR no help for `{topic}`")],
                    |(_, usage)| vec![(*usage).to_string()],
                ),
            Err(error @ CommandError::InvalidParameter { .. }) => vec![error.to_string()],
            Err(CommandError::Parse(error)) => vec![format!("ERR syntax {error}")],
        }
    }

    fn run_sim_command(&mut self, command: SimCommand) -> Vec<String> {
        match command {
            SimCommand::Probe(sample) => {
                self.executor.controller_mut().sampler_mut().pinned = Some(sample);
                vec![format!(
                    "probes pinned sbu1={}mV sbu2={}mV",
                    sample.sbu1, sample.sbu2
                )]
            }
            SimCommand::Plug(cable) => {
                let sampler = self.executor.controller_mut().sampler_mut();
                sampler.pinned = None;
                sampler.cable = cable;
                match cable {
                    Some(cable) => vec![format!("cable attached ({cable:?})").to_lowercase()],
                    None => vec!["cable removed".to_string()],
                }
            }
            SimCommand::Tick(count) => self.run_ticks(count),
            SimCommand::Events => self
                .executor
                .telemetry()
                .oldest_first()
                .map(describe_record)
                .collect(),
        }
    }

    fn run_ticks(&mut self, count: u32) -> Vec<String> {
        let period = self.executor.controller().config().tick_period;
        let mut lines = Vec::new();

        for _ in 0..count {
            self.now = self.now.advance(period);
            let live = self.executor.controller().status().uart.is_enabled();
            self.executor.controller_mut().sampler_mut().link_live = live;

            match self.executor.tick(self.now) {
                Some(Transition::AutoEnabled(_)) => lines.push("UART autoenable".to_string()),
                Some(Transition::AutoDisabled) => lines.push("UART autodisable".to_string()),
                None => {}
            }
        }

        let status = self.executor.controller().status();
        lines.push(format!(
            "t=+{}ms uart={} debounce={}/{}",
            self.now.offset().as_millis(),
            status.uart,
            status.debounce_count,
            status.debounce_commit_after
        ));
        lines
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(self.now, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }

    /// Copies pin writes and new telemetry records into the transcript.
    fn flush_activity(&mut self) -> io::Result<()> {
        let writes = self.executor.controller_mut().pins_mut().drain();
        if !writes.is_empty() {
            let joined = writes
                .into_iter()
                .map(PinEvent::describe)
                .collect::<Vec<_>>()
                .join(" ");
            self.transcript
                .append_line(self.now, TranscriptRole::Pins, &joined)?;
        }

        let telemetry = self.executor.telemetry();
        let fresh: Vec<String> = telemetry.since(self.mirrored).map(describe_record).collect();
        self.mirrored = telemetry.next_event_id();
        for line in fresh {
            self.transcript
                .append_line(self.now, TranscriptRole::Event, &line)?;
        }
        Ok(())
    }
}

fn render(outcome: &CommandOutcome) -> Vec<String> {
    let mut text = String::new();
    if outcome.write_to(&mut text).is_err() {
        return vec!["ERR response formatting failed".to_string()];
    }
    text.lines().map(str::to_string).collect()
}

fn describe_record(record: &TelemetryRecord<SimInstant>) -> String {
    let mut line = format!(
        "#{} +{}ms {}",
        record.id,
        record.timestamp.offset().as_millis(),
        record.event
    );
    let (detail, elapsed) = match record.details {
        TelemetryPayload::None => (None, None),
        TelemetryPayload::Probe(probe) => (
            Some(format!(
                "sbu1={}mV sbu2={}mV",
                probe.sample.sbu1, probe.sample.sbu2
            )),
            probe.elapsed_since_previous,
        ),
        TelemetryPayload::Uart(change) => (
            Some(format!("{} -> {}", change.previous, change.next)),
            change.elapsed_since_previous,
        ),
        TelemetryPayload::Mux(change) => (
            Some(format!("{} -> {}", change.previous, change.next)),
            change.elapsed_since_previous,
        ),
    };
    if let Some(detail) = detail {
        line.push(' ');
        line.push_str(&detail);
    }
    if let Some(elapsed) = elapsed {
        line.push_str(&format!(" (+{}ms since previous)", elapsed.as_millis()));
    }
    line
}

fn parse_sim_command(line: &str) -> Option<Result<SimCommand, String>> {
    let tokens = grammar::lex(line).ok()?;
    let mut words = tokens.iter().filter(|token| token.kind != TokenKind::Eol);
    let head = words.next().filter(|token| token.kind == TokenKind::Ident)?;
    let args: Vec<&Token<'_>> = words.collect();

    let command = if head.lexeme.eq_ignore_ascii_case("probe") {
        parse_probe(&args)
    } else if head.lexeme.eq_ignore_ascii_case("plug") {
        match args.as_slice() {
            [tag] if tag.kind == TokenKind::Ident => {
                Cable::from_tag(tag.lexeme).map(SimCommand::Plug)
            }
            _ => Err("usage: plug <forward|flipped|none>".to_string()),
        }
    } else if head.lexeme.eq_ignore_ascii_case("tick") {
        parse_tick(&args)
    } else if head.lexeme.eq_ignore_ascii_case("events") {
        if args.is_empty() {
            Ok(SimCommand::Events)
        } else {
            Err("usage: events".to_string())
        }
    } else {
        return None;
    };

    Some(command)
}

fn parse_probe(args: &[&Token<'_>]) -> Result<SimCommand, String> {
    let [sbu1, sbu2] = args else {
        return Err("usage: probe <sbu1-mV> <sbu2-mV>".to_string());
    };
    Ok(SimCommand::Probe(ProbeSample::new(
        parse_integer(sbu1)?,
        parse_integer(sbu2)?,
    )))
}

fn parse_tick(args: &[&Token<'_>]) -> Result<SimCommand, String> {
    let count = match args {
        [] => 1,
        [count] => parse_integer::<u32>(count)?,
        _ => return Err("usage: tick [count]".to_string()),
    };
    if count == 0 || count > MAX_TICKS_PER_COMMAND {
        return Err(format!("tick count must be 1..={MAX_TICKS_PER_COMMAND}"));
    }
    Ok(SimCommand::Tick(count))
}

fn parse_integer<T: std::str::FromStr>(token: &Token<'_>) -> Result<T, String> {
    if token.kind != TokenKind::Integer {
        return Err(format!("expected a number, found `{}`", token.lexeme));
    }
    token
        .lexeme
        .parse()
        .map_err(|_| format!("number `{}` out of range", token.lexeme))
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path, config: &InterconnectConfig) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(config)?;
        Ok(logger)
    }

    fn write_header(&mut self, config: &InterconnectConfig) -> io::Result<()> {
        writeln!(self.writer, "# SBU interconnect emulator transcript")?;
        writeln!(
            self.writer,
            "# tick={}ms debounce-threshold={} window={}ms",
            config.tick_period.as_millis(),
            config.debounce_threshold,
            config.debounce_window().as_millis()
        )?;
        writeln!(self.writer, "# Timestamps are simulated milliseconds")?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, at: SimInstant, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            at.offset().as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }

    fn log_completion_request(
        &mut self,
        at: SimInstant,
        prefix: &str,
        suffix: &str,
        cursor: usize,
    ) -> io::Result<()> {
        let message = format!("[TAB] prefix={prefix:?} suffix={suffix:?} cursor={cursor}");
        self.append_line(at, TranscriptRole::Host, &message)
    }

    fn log_completion_none(&mut self, at: SimInstant) -> io::Result<()> {
        self.append_line(at, TranscriptRole::Emulator, "completion: no matches")
    }

    fn log_completion_applied(
        &mut self,
        at: SimInstant,
        candidate: &str,
        replacement: Option<&Replacement>,
    ) -> io::Result<()> {
        let message = match replacement {
            Some(rep) => format!(
                "completion applied: {candidate} (range={}..{})",
                rep.start, rep.end
            ),
            None => format!("completion candidate: {candidate} (no replacement applied)"),
        };
        self.append_line(at, TranscriptRole::Emulator, &message)
    }

    fn log_completion_options(
        &mut self,
        at: SimInstant,
        options: &[&'static str],
    ) -> io::Result<()> {
        let summary = format!("completion options ({})", options.len());
        self.append_line(at, TranscriptRole::Emulator, &summary)?;
        for option in options {
            self.append_line(at, TranscriptRole::Emulator, &format!("  {option}"))?;
        }
        Ok(())
    }
}

enum TranscriptRole {
    Host,
    Emulator,
    Pins,
    Event,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
            TranscriptRole::Pins => "PINS ",
            TranscriptRole::Event => "EVT  ",
        }
    }
}

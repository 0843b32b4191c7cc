//! Console command dispatcher.
//!
//! [`CommandExecutor`] owns the controller and its telemetry ring, parses a
//! console line, applies the request and hands back a [`CommandOutcome`] that
//! renders the same text the board prints. It stays `no_std` so firmware and
//! emulator share it.

use core::fmt;

use crate::control::{
    InterconnectController, InterconnectRequest, InterconnectStatus, Transition,
};
use crate::probe::AnalogSampler;
use crate::routing::InterconnectPins;
use crate::telemetry::{TELEMETRY_RING_CAPACITY, TelemetryInstant, TelemetryRecorder};

use super::catalog::{self, CommandSpec};
use super::grammar::{self, Command, GrammarErrorKind, ParseError};
use super::status::StatusFormatter;

/// Command execution successes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// `uart [..]`: the resulting UART route and detect mode.
    Uart(InterconnectStatus),
    /// `mux [..]`: the resulting Type-C mux route.
    Mux(InterconnectStatus),
    Status(InterconnectStatus),
    Help(HelpTopic),
}

/// What `help` should describe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HelpTopic {
    All,
    Command(&'static CommandSpec),
}

impl CommandOutcome {
    /// Writes the console response, one `\n`-terminated line at a time.
    pub fn write_to<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        match self {
            CommandOutcome::Uart(status) => {
                StatusFormatter::new(status).write_uart_line(writer)?;
                writer.write_char('\n')
            }
            CommandOutcome::Mux(status) => {
                StatusFormatter::new(status).write_mux_line(writer)?;
                writer.write_char('\n')
            }
            CommandOutcome::Status(status) => {
                let formatter = StatusFormatter::new(status);
                formatter.write_uart_line(writer)?;
                writer.write_char('\n')?;
                formatter.write_mux_line(writer)?;
                writer.write_char('\n')?;
                formatter.write_probe_line(writer)?;
                writer.write_char('\n')
            }
            CommandOutcome::Help(HelpTopic::All) => {
                for spec in catalog::commands() {
                    write_usage(writer, spec)?;
                }
                Ok(())
            }
            CommandOutcome::Help(HelpTopic::Command(spec)) => {
                write_usage(writer, spec)?;
                writeln!(writer, "  {}", spec.summary)
            }
        }
    }
}

fn write_usage<W: fmt::Write>(writer: &mut W, spec: &CommandSpec) -> fmt::Result {
    if spec.usage.is_empty() {
        writeln!(writer, "{}", spec.name)
    } else {
        writeln!(writer, "{} {}", spec.name, spec.usage)
    }
}

/// Errors surfaced while executing a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError<'a> {
    /// Line did not parse as any command.
    Parse(ParseError<'a>),
    /// Known command, unknown argument. State is left unchanged.
    InvalidParameter { command: &'static str },
    /// `help` named a command that does not exist.
    UnknownTopic(&'a str),
}

impl<'a> From<ParseError<'a>> for CommandError<'a> {
    fn from(error: ParseError<'a>) -> Self {
        match error {
            ParseError::Grammar(grammar::GrammarError {
                kind: GrammarErrorKind::InvalidArgument { command, .. },
            }) => CommandError::InvalidParameter { command },
            other => CommandError::Parse(other),
        }
    }
}

impl fmt::Display for CommandError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(error) => write!(f, "parse error: {error}"),
            CommandError::InvalidParameter { command } => {
                let usage = catalog::find(command).map_or("", |spec| spec.usage);
                write!(f, "Parameter 1 invalid (usage: {command} {usage})")
            }
            CommandError::UnknownTopic(topic) => write!(f, "no help for `{topic}`"),
        }
    }
}

/// Parses console lines and applies them to the owned controller.
pub struct CommandExecutor<S, P, TInstant, const N: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    controller: InterconnectController<S, P>,
    telemetry: TelemetryRecorder<TInstant, N>,
}

impl<S, P, TInstant, const N: usize> CommandExecutor<S, P, TInstant, N>
where
    S: AnalogSampler,
    P: InterconnectPins,
    TInstant: TelemetryInstant,
{
    /// Creates a new executor around the provided controller.
    pub const fn new(controller: InterconnectController<S, P>) -> Self {
        Self {
            controller,
            telemetry: TelemetryRecorder::new(),
        }
    }

    pub fn controller(&self) -> &InterconnectController<S, P> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut InterconnectController<S, P> {
        &mut self.controller
    }

    pub fn telemetry(&self) -> &TelemetryRecorder<TInstant, N> {
        &self.telemetry
    }

    /// Runs one control-loop tick, recording any automatic transition.
    pub fn tick(&mut self, now: TInstant) -> Option<Transition> {
        self.controller.tick(now, &mut self.telemetry)
    }

    /// Parses and executes a console line.
    pub fn execute<'a>(
        &mut self,
        line: &'a str,
        now: TInstant,
    ) -> Result<CommandOutcome, CommandError<'a>> {
        let command = grammar::parse(line)?;
        self.dispatch(command, now)
    }

    fn dispatch<'a>(
        &mut self,
        command: Command<'a>,
        now: TInstant,
    ) -> Result<CommandOutcome, CommandError<'a>> {
        let request = match command {
            Command::Uart(request) => InterconnectRequest::Uart(request),
            Command::Mux(route) => InterconnectRequest::Mux(route),
            Command::Status => InterconnectRequest::Status,
            Command::Help(help) => return resolve_help(help.topic).map(CommandOutcome::Help),
        };

        let status = self.controller.handle(request, now, &mut self.telemetry);
        Ok(match request {
            InterconnectRequest::Uart(_) => CommandOutcome::Uart(status),
            InterconnectRequest::Mux(_) => CommandOutcome::Mux(status),
            InterconnectRequest::Status => CommandOutcome::Status(status),
        })
    }
}

fn resolve_help(topic: Option<&str>) -> Result<HelpTopic, CommandError<'_>> {
    match topic {
        None => Ok(HelpTopic::All),
        Some(name) => catalog::find(name)
            .map(HelpTopic::Command)
            .ok_or(CommandError::UnknownTopic(name)),
    }
}

//! Text rendering for controller state.
//!
//! Firmware and emulator both print through [`StatusFormatter`], so the
//! console lines stay identical across front-ends.

use core::fmt;

use crate::control::InterconnectStatus;

/// Renders an [`InterconnectStatus`] into console lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    status: &'a InterconnectStatus,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(status: &'a InterconnectStatus) -> Self {
        Self { status }
    }

    /// Writes `UART mux is: <off|on|flip>, setting: <manual|auto>`.
    pub fn write_uart_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(
            writer,
            "UART mux is: {}, setting: {}",
            self.status.uart, self.status.mode
        )
    }

    /// Writes `TYPE-C mux is <off|A|B>`.
    pub fn write_mux_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(writer, "TYPE-C mux is {}", self.status.mux)
    }

    /// Writes the probe line (e.g. `probes sbu1=40mV sbu2=1790mV debounce=2/5`).
    pub fn write_probe_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("probes")?;
        match self.status.last_sample {
            Some(sample) => write!(writer, " sbu1={}mV sbu2={}mV", sample.sbu1, sample.sbu2)?,
            None => writer.write_str(" sbu1=unknown sbu2=unknown")?,
        }
        write!(
            writer,
            " debounce={}/{}",
            self.status.debounce_count, self.status.debounce_commit_after
        )
    }
}

#[cfg(test)]
mod tests {
    use heapless::String;

    use super::*;
    use crate::probe::ProbeSample;
    use crate::routing::{DetectMode, MuxRoute, UartRoute};

    fn status() -> InterconnectStatus {
        InterconnectStatus {
            uart: UartRoute::Flipped,
            mode: DetectMode::Auto,
            mux: MuxRoute::PathB,
            last_sample: None,
            debounce_count: 0,
            debounce_commit_after: 5,
        }
    }

    #[test]
    fn renders_route_lines() {
        let status = status();
        let formatter = StatusFormatter::new(&status);

        let mut line: String<64> = String::new();
        formatter.write_uart_line(&mut line).expect("fits");
        assert_eq!(line.as_str(), "UART mux is: flip, setting: auto");

        line.clear();
        formatter.write_mux_line(&mut line).expect("fits");
        assert_eq!(line.as_str(), "TYPE-C mux is B");
    }

    #[test]
    fn renders_probe_line() {
        let mut status = status();
        let mut line: String<64> = String::new();
        StatusFormatter::new(&status)
            .write_probe_line(&mut line)
            .expect("fits");
        assert_eq!(line.as_str(), "probes sbu1=unknown sbu2=unknown debounce=0/5");

        status.last_sample = Some(ProbeSample::new(40, 1_790));
        status.debounce_count = 2;
        line.clear();
        StatusFormatter::new(&status)
            .write_probe_line(&mut line)
            .expect("fits");
        assert_eq!(line.as_str(), "probes sbu1=40mV sbu2=1790mV debounce=2/5");
    }
}

//! Firmware side of the telemetry ring: the monotonic instant type and the
//! mirror that forwards fresh records to defmt (or stdout on host builds).

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::time::Duration;

use embassy_time::Instant;
use interconnect_core::telemetry::{
    EventId, TelemetryEventKind, TelemetryInstant, TelemetryPayload, TelemetryRecord,
    TelemetryRecorder,
};

/// [`embassy_time::Instant`] adapted for the shared telemetry recorder.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub const fn from_micros(micros: u64) -> Self {
        Self(Instant::from_micros(micros))
    }

    pub const fn as_micros(self) -> u64 {
        self.0.as_micros()
    }
}

impl TelemetryInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_duration_since(earlier.0).as_micros())
    }
}

/// Logs every record newer than `cursor` and returns the next cursor.
pub fn mirror<const N: usize>(
    recorder: &TelemetryRecorder<FirmwareInstant, N>,
    cursor: EventId,
) -> EventId {
    for record in recorder.since(cursor) {
        log_record(record);
    }
    recorder.next_event_id()
}

fn log_record(record: &TelemetryRecord<FirmwareInstant>) {
    let at = record.timestamp.as_micros();
    let since_previous = match record.details {
        TelemetryPayload::Probe(probe) => probe
            .elapsed_since_previous
            .and_then(|elapsed| u64::try_from(elapsed.as_micros()).ok()),
        _ => None,
    };

    match record.event {
        TelemetryEventKind::UartAutoEnabled(route) => {
            emit_log("UART autoenable", route.label(), at, since_previous);
        }
        TelemetryEventKind::UartAutoDisabled => {
            emit_log("UART autodisable", "off", at, since_previous);
        }
        TelemetryEventKind::UartCommanded(route) => emit_log("uart", route.label(), at, None),
        TelemetryEventKind::AutodetectArmed => emit_log("uart", "auto", at, None),
        TelemetryEventKind::MuxCommanded(route) => emit_log("mux", route.label(), at, None),
        TelemetryEventKind::Custom(code) => emit_custom(code, at),
    }
}

#[cfg(target_os = "none")]
fn emit_log(event: &'static str, route: &'static str, timestamp_us: u64, delta_us: Option<u64>) {
    if let Some(delta) = delta_us {
        defmt::info!("{} ({}) t={}us Δ={}us", event, route, timestamp_us, delta);
    } else {
        defmt::info!("{} ({}) t={}us", event, route, timestamp_us);
    }
}

#[cfg(not(target_os = "none"))]
fn emit_log(event: &'static str, route: &'static str, timestamp_us: u64, delta_us: Option<u64>) {
    if let Some(delta) = delta_us {
        println!("{event} ({route}) t={timestamp_us}us Δ={delta}us");
    } else {
        println!("{event} ({route}) t={timestamp_us}us");
    }
}

#[cfg(target_os = "none")]
fn emit_custom(code: u16, timestamp_us: u64) {
    defmt::info!("telemetry:custom {=u16:#06x} t={}us", code, timestamp_us);
}

#[cfg(not(target_os = "none"))]
fn emit_custom(code: u16, timestamp_us: u64) {
    println!("telemetry:custom {code:#06x} t={timestamp_us}us");
}

//! Telemetry event catalog and ring buffer shared by firmware and host targets.
//!
//! Every route transition the controller performs is captured here with the
//! probe sample or the route pair that caused it. Events encode to compact
//! numeric codes so they can be mirrored over diagnostics channels, and the
//! recorder stays `no_std` by storing records in a fixed-size
//! [`HistoryBuf`].

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::probe::ProbeSample;
use crate::routing::{MuxRoute, UartRoute};

/// Identifier used when tracking emitted telemetry events.
pub type EventId = u32;

/// Discriminated telemetry events shared across all controller targets.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryEventKind {
    /// Autodetect committed a connected route.
    UartAutoEnabled(UartRoute),
    /// Autodetect lost the idle-high link and turned the UART off.
    UartAutoDisabled,
    /// Operator forced a UART route.
    UartCommanded(UartRoute),
    /// Operator (re-)armed autodetect.
    AutodetectArmed,
    /// Operator changed the Type-C mux.
    MuxCommanded(MuxRoute),
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::UartAutoEnabled(route) => write!(f, "uart-autoenable {route}"),
            TelemetryEventKind::UartAutoDisabled => f.write_str("uart-autodisable"),
            TelemetryEventKind::UartCommanded(route) => write!(f, "uart-commanded {route}"),
            TelemetryEventKind::AutodetectArmed => f.write_str("autodetect-armed"),
            TelemetryEventKind::MuxCommanded(route) => write!(f, "mux-commanded {route}"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const UART_AUTO_ENABLE_BASE: u16 = 0x0000;
    const UART_AUTO_DISABLE_CODE: u16 = 0x0004;
    const AUTODETECT_ARMED_CODE: u16 = 0x0005;
    const UART_COMMANDED_BASE: u16 = 0x0010;
    const MUX_COMMANDED_BASE: u16 = 0x0014;
    const ROUTE_SPAN: u16 = 4;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::UartAutoEnabled(route) => {
                Self::UART_AUTO_ENABLE_BASE + route.as_index()
            }
            TelemetryEventKind::UartAutoDisabled => Self::UART_AUTO_DISABLE_CODE,
            TelemetryEventKind::UartCommanded(route) => {
                Self::UART_COMMANDED_BASE + route.as_index()
            }
            TelemetryEventKind::AutodetectArmed => Self::AUTODETECT_ARMED_CODE,
            TelemetryEventKind::MuxCommanded(route) => Self::MUX_COMMANDED_BASE + route.as_index(),
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant into a telemetry event, falling back to [`Custom`].
    ///
    /// [`Custom`]: TelemetryEventKind::Custom
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::UART_AUTO_DISABLE_CODE => TelemetryEventKind::UartAutoDisabled,
            Self::AUTODETECT_ARMED_CODE => TelemetryEventKind::AutodetectArmed,
            value if Self::in_span(value, Self::UART_AUTO_ENABLE_BASE) => {
                UartRoute::from_index(value - Self::UART_AUTO_ENABLE_BASE)
                    .map_or(TelemetryEventKind::Custom(value), |route| {
                        TelemetryEventKind::UartAutoEnabled(route)
                    })
            }
            value if Self::in_span(value, Self::UART_COMMANDED_BASE) => {
                UartRoute::from_index(value - Self::UART_COMMANDED_BASE)
                    .map_or(TelemetryEventKind::Custom(value), |route| {
                        TelemetryEventKind::UartCommanded(route)
                    })
            }
            value if Self::in_span(value, Self::MUX_COMMANDED_BASE) => {
                MuxRoute::from_index(value - Self::MUX_COMMANDED_BASE)
                    .map_or(TelemetryEventKind::Custom(value), |route| {
                        TelemetryEventKind::MuxCommanded(route)
                    })
            }
            other => TelemetryEventKind::Custom(other),
        }
    }

    const fn in_span(value: u16, base: u16) -> bool {
        value >= base && value < base + Self::ROUTE_SPAN
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    /// Probe sample that completed the debounce window.
    Probe(ProbeTelemetry),
    /// Route pair for an operator-initiated UART change.
    Uart(RouteChange<UartRoute>),
    /// Route pair for an operator-initiated mux change.
    Mux(RouteChange<MuxRoute>),
}

impl TelemetryPayload {
    /// Convenience constructor when no payload data is needed.
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

/// Sample that triggered an automatic transition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProbeTelemetry {
    pub sample: ProbeSample,
    pub elapsed_since_previous: Option<Duration>,
}

/// Previous and next route of a commanded change.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RouteChange<R> {
    pub previous: R,
    pub next: R,
    pub elapsed_since_previous: Option<Duration>,
}

impl<R> RouteChange<R>
where
    R: Copy + Eq,
{
    /// Returns `true` when the command re-applied the route already in place.
    #[must_use]
    pub fn is_reapply(&self) -> bool {
        self.previous == self.next
    }
}

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    last_transition_at: Option<TInstant>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_transition_at: None,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records with an id at or after `first`, oldest first.
    pub fn since(&self, first: EventId) -> impl Iterator<Item = &TelemetryRecord<TInstant>> {
        self.ring
            .oldest_ordered()
            .filter(move |record| record.id >= first)
    }

    /// Identifier the next recorded event will receive.
    #[must_use]
    pub const fn next_event_id(&self) -> EventId {
        self.next_event_id
    }

    /// Records an autodetect commit to a connected route.
    pub fn record_auto_enable(
        &mut self,
        route: UartRoute,
        sample: ProbeSample,
        timestamp: TInstant,
    ) -> EventId {
        let payload = TelemetryPayload::Probe(ProbeTelemetry {
            sample,
            elapsed_since_previous: self.mark_transition(timestamp),
        });
        self.record(TelemetryEventKind::UartAutoEnabled(route), payload, timestamp)
    }

    /// Records an autodetect commit back to [`UartRoute::Off`].
    pub fn record_auto_disable(&mut self, sample: ProbeSample, timestamp: TInstant) -> EventId {
        let payload = TelemetryPayload::Probe(ProbeTelemetry {
            sample,
            elapsed_since_previous: self.mark_transition(timestamp),
        });
        self.record(TelemetryEventKind::UartAutoDisabled, payload, timestamp)
    }

    /// Records an operator UART request. Arming autodetect reports `next == Off`.
    pub fn record_uart_command(
        &mut self,
        previous: UartRoute,
        next: UartRoute,
        autodetect: bool,
        timestamp: TInstant,
    ) -> EventId {
        let payload = TelemetryPayload::Uart(RouteChange {
            previous,
            next,
            elapsed_since_previous: self.mark_transition(timestamp),
        });
        let event = if autodetect {
            TelemetryEventKind::AutodetectArmed
        } else {
            TelemetryEventKind::UartCommanded(next)
        };
        self.record(event, payload, timestamp)
    }

    /// Records an operator mux request.
    pub fn record_mux_command(
        &mut self,
        previous: MuxRoute,
        next: MuxRoute,
        timestamp: TInstant,
    ) -> EventId {
        let payload = TelemetryPayload::Mux(RouteChange {
            previous,
            next,
            elapsed_since_previous: self.mark_transition(timestamp),
        });
        self.record(TelemetryEventKind::MuxCommanded(next), payload, timestamp)
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }

    fn mark_transition(&mut self, timestamp: TInstant) -> Option<Duration> {
        let elapsed = self
            .last_transition_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_transition_at = Some(timestamp);
        elapsed
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

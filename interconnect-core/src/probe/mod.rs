//! SBU probe sampling and line classification.
//!
//! The board samples both SBU conductors through the MCU ADC. A debug UART
//! idles high at 1.8 V on its transmit line, so the pair of readings tells us
//! whether a cable is attached and which way round it was plugged. Everything
//! here is pure and `no_std`; the firmware and emulator only supply an
//! [`AnalogSampler`].

/// Calibrated probe reading in millivolts.
pub type Millivolts = u16;

/// Identifier for the two SBU probe lines.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProbeChannel {
    Sbu1,
    Sbu2,
}

impl ProbeChannel {
    /// Deterministic index for lookups into [`PROBE_CHANNELS`].
    pub const fn as_index(self) -> usize {
        match self {
            ProbeChannel::Sbu1 => 0,
            ProbeChannel::Sbu2 => 1,
        }
    }
}

/// ADC scaling for a probe channel (`raw * full_scale_mv / counts`).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ProbeChannelSpec {
    pub channel: ProbeChannel,
    pub name: &'static str,
    pub full_scale_mv: u32,
    pub counts: u32,
}

impl ProbeChannelSpec {
    pub const fn new(
        channel: ProbeChannel,
        name: &'static str,
        full_scale_mv: u32,
        counts: u32,
    ) -> Self {
        Self {
            channel,
            name,
            full_scale_mv,
            counts,
        }
    }

    /// Converts a raw ADC count into calibrated millivolts, saturating at `u16::MAX`.
    #[must_use]
    pub const fn raw_to_millivolts(&self, raw: u16) -> Millivolts {
        let scaled = (raw as u32 * self.full_scale_mv) / self.counts;
        if scaled > u16::MAX as u32 {
            u16::MAX
        } else {
            scaled as u16
        }
    }
}

/// 3.3 V reference over a 12-bit conversion.
pub const PROBE_FULL_SCALE_MV: u32 = 3_300;
/// Number of codes produced by the 12-bit ADC.
pub const PROBE_ADC_COUNTS: u32 = 4_096;

/// Compile-time catalog of both probe channels.
pub const PROBE_CHANNELS: [ProbeChannelSpec; 2] = [
    ProbeChannelSpec::new(
        ProbeChannel::Sbu1,
        "SBU1",
        PROBE_FULL_SCALE_MV,
        PROBE_ADC_COUNTS,
    ),
    ProbeChannelSpec::new(
        ProbeChannel::Sbu2,
        "SBU2",
        PROBE_FULL_SCALE_MV,
        PROBE_ADC_COUNTS,
    ),
];

/// Retrieve probe metadata by channel.
pub const fn probe_spec(channel: ProbeChannel) -> ProbeChannelSpec {
    PROBE_CHANNELS[channel.as_index()]
}

/// Source of calibrated probe readings.
pub trait AnalogSampler {
    /// Performs a blocking conversion of `channel` and returns millivolts.
    fn read_channel(&mut self, channel: ProbeChannel) -> Millivolts;
}

/// Closed millivolt interval.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct VoltageBand {
    pub min: Millivolts,
    pub max: Millivolts,
}

impl VoltageBand {
    pub const fn new(min: Millivolts, max: Millivolts) -> Self {
        Self { min, max }
    }

    /// Returns `true` when `value` lies inside the band (both ends inclusive).
    #[must_use]
    pub const fn contains(&self, value: Millivolts) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Line driven low or floating low: [0, 150) mV.
pub const LOW_BAND: VoltageBand = VoltageBand::new(0, 149);
/// 1.8 V UART idle-high window: [1600, 1900] mV.
pub const IDLE_BAND: VoltageBand = VoltageBand::new(1_600, 1_900);

/// Band a single probe reading falls into.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineLevel {
    Low,
    IdleHigh,
    Undefined,
}

impl LineLevel {
    #[must_use]
    pub const fn of(value: Millivolts) -> Self {
        if LOW_BAND.contains(value) {
            LineLevel::Low
        } else if IDLE_BAND.contains(value) {
            LineLevel::IdleHigh
        } else {
            LineLevel::Undefined
        }
    }
}

/// Candidate cable orientation derived from one probe sample.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Orientation {
    Unplugged,
    Forward,
    Flipped,
}

/// Classifies the cable orientation from the two SBU readings.
///
/// Forward means SBU2 idles high (the DUT transmit line) while SBU1 sits low;
/// Flipped is the mirror image. Any other combination, including readings in
/// neither band, reports [`Orientation::Unplugged`]. The UART path must be off
/// while sampling or our own drivers skew the result.
#[must_use]
pub const fn classify_orientation(sbu1: Millivolts, sbu2: Millivolts) -> Orientation {
    match (LineLevel::of(sbu1), LineLevel::of(sbu2)) {
        (LineLevel::Low, LineLevel::IdleHigh) => Orientation::Forward,
        (LineLevel::IdleHigh, LineLevel::Low) => Orientation::Flipped,
        _ => Orientation::Unplugged,
    }
}

/// Returns `true` while an attached UART keeps both lines idling high.
#[must_use]
pub const fn link_still_present(sbu1: Millivolts, sbu2: Millivolts) -> bool {
    matches!(
        (LineLevel::of(sbu1), LineLevel::of(sbu2)),
        (LineLevel::IdleHigh, LineLevel::IdleHigh)
    )
}

/// Both probe readings captured on the same tick.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProbeSample {
    pub sbu1: Millivolts,
    pub sbu2: Millivolts,
}

impl ProbeSample {
    #[must_use]
    pub const fn new(sbu1: Millivolts, sbu2: Millivolts) -> Self {
        Self { sbu1, sbu2 }
    }

    /// Reads SBU1 then SBU2 from the sampler.
    pub fn capture<S: AnalogSampler>(sampler: &mut S) -> Self {
        let sbu1 = sampler.read_channel(ProbeChannel::Sbu1);
        let sbu2 = sampler.read_channel(ProbeChannel::Sbu2);
        Self { sbu1, sbu2 }
    }

    #[must_use]
    pub const fn orientation(&self) -> Orientation {
        classify_orientation(self.sbu1, self.sbu2)
    }

    #[must_use]
    pub const fn still_present(&self) -> bool {
        link_still_present(self.sbu1, self.sbu2)
    }

    /// Returns the reading for `channel`.
    #[must_use]
    pub const fn get(&self, channel: ProbeChannel) -> Millivolts {
        match channel {
            ProbeChannel::Sbu1 => self.sbu1,
            ProbeChannel::Sbu2 => self.sbu2,
        }
    }
}

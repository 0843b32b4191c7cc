use embassy_stm32::adc::{Adc, AdcChannel, AnyAdcChannel, SampleTime};
use embassy_stm32::peripherals::{ADC1, PA6, PA7};
use embassy_stm32::Peri;
use interconnect_core::probe::{AnalogSampler, Millivolts, ProbeChannel, probe_spec};

/// SBU1/SBU2 sense lines read through ADC1.
pub struct AdcProbes {
    adc: Adc<'static, ADC1>,
    sbu1: AnyAdcChannel<ADC1>,
    sbu2: AnyAdcChannel<ADC1>,
}

impl AdcProbes {
    pub fn new(
        adc: Peri<'static, ADC1>,
        sbu1: Peri<'static, PA6>,
        sbu2: Peri<'static, PA7>,
    ) -> Self {
        let mut adc = Adc::new(adc);
        // The SBU dividers are high impedance; use the longest sample window.
        adc.set_sample_time(SampleTime::CYCLES160_5);
        Self {
            adc,
            sbu1: sbu1.degrade_adc(),
            sbu2: sbu2.degrade_adc(),
        }
    }
}

impl AnalogSampler for AdcProbes {
    fn read_channel(&mut self, channel: ProbeChannel) -> Millivolts {
        let raw = match channel {
            ProbeChannel::Sbu1 => self.adc.blocking_read(&mut self.sbu1),
            ProbeChannel::Sbu2 => self.adc.blocking_read(&mut self.sbu2),
        };
        probe_spec(channel).raw_to_millivolts(raw)
    }
}

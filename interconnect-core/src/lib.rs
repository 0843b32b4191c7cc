#![no_std]

// Shared logic for the SBU interconnect controller.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Hardware access flows through the `AnalogSampler` and
// `InterconnectPins` traits so the same control loop runs on the board and in
// the emulator.

pub mod control;
pub mod debounce;
pub mod probe;
pub mod repl;
pub mod routing;
pub mod telemetry;

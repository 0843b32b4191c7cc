//! Operator console shared by firmware and host tooling.
//!
//! [`grammar`] lexes and parses a line against the [`catalog`],
//! [`commands`] applies the result to the controller, [`status`] renders the
//! console text, and [`completion`] offers tab completion from the same
//! catalog.

pub mod catalog;
pub mod commands;
pub mod completion;
pub mod grammar;
pub mod status;

pub use commands::{CommandError, CommandExecutor, CommandOutcome, HelpTopic};

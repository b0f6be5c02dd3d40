//! Platform abstraction layer
//!
//! Translates browser events into game commands.

pub mod input;

pub use input::{Command, command_for_key};

//! Command line interface: argument parsing, telemetry setup, dispatch.

pub mod actions;
pub mod commands;
pub mod dispatch;
pub mod start;

pub use start::start;

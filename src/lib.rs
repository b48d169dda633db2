//! mbesim: MBE growth-recipe interpreter and simulator.
//!
//! Parses a plain-text recipe of shutter, setpoint and wait commands, then
//! replays it second by second against a model of the growth chamber,
//! recording a snapshot of every variable for each simulated second.

pub mod cli;
pub mod core;
pub mod history;

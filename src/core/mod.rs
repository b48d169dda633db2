//! Core simulation logic: types, parsing, the store, evaluation, ramping, execution.

pub mod config;
pub mod error;
pub mod executor;
pub mod expr;
pub mod parser;
pub mod ramp;
pub mod recipe;
pub mod resolver;
pub mod store;
pub mod types;

//! Surplus power manager: spreads available power over prioritized outputs.

/// Message-bus boundary, topics and adapters.
pub mod bus;
pub mod cli;
pub mod config;
pub mod control;
pub mod devices;
pub mod error;
pub mod io;
pub mod runtime;

pub use error::{Error, Result};

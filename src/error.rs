//! Error types shared across the crate.

use crate::bus::BusError;
use crate::config::ConfigError;

/// Every fallible library operation funnels into this type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A duty curve lookup was attempted on an output that has none.
    ///
    /// This is a contract violation, not a transient condition: callers are
    /// expected to check the output's duty mode first.
    #[error("output \"{id}\" has no duty curve configured")]
    NoDutyCurve { id: String },
    /// The bus collaborator rejected a request.
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

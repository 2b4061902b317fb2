//! Error type for the fatal paths of a sampling run.
//!
//! Per-field read failures never surface here; they degrade to sentinel
//! values inside the row.

use std::path::PathBuf;

/// Fatal sampling-run errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No RAPL domain exposing `energy_uj` was found under the powercap root.
    #[error("no RAPL energy domains found under {}", root.display())]
    NoEnergyDomains { root: PathBuf },

    /// The CSV output could not be created or written.
    #[error("failed to write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run summary could not be serialized or written.
    #[error("failed to write run summary {}: {message}", path.display())]
    Summary { path: PathBuf, message: String },

    /// Termination handlers could not be installed.
    #[error("failed to install termination handler: {0}")]
    SignalHandler(#[from] ctrlc::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

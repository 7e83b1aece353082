//! Setup-time errors of the harness.
//!
//! Run-time divergences are not errors: they are reported through
//! `driver::Mismatch` and `driver::Desync`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::clocked::ClockError;
use crate::emulator::EmuError;
use crate::image::ImageError;

#[derive(Debug, Error)]
pub enum CosimError {
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot open trace {}: {source}", path.display())]
    Trace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Emu(#[from] EmuError),

    #[error(transparent)]
    Clock(#[from] ClockError),
}

pub type Result<T, E = CosimError> = std::result::Result<T, E>;

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Shared models for the printdash dashboard backend.

pub mod api;
pub mod model;

mod util;

pub use model::{
    Axis, CombinedPayload, ParseCommandError, PrinterCommand, Scalar, Snapshot, SourceKey,
};
pub use util::now_ms;

//! Freshen - recent media discovery and transfer
//!
//! Asks one or more Emby-compatible media servers for recently added
//! episodes, then either refreshes their metadata in place or renames and
//! moves the files into a library, reporting one summary per run.

pub mod api;
pub mod config;
pub mod error;
pub mod jobs;
pub mod pipeline;
pub mod services;

pub use config::Config;
pub use error::{ErrorKind, PipelineError, PipelineResult};
pub use pipeline::{RunCoordinator, RunSummary, TriggerDispatcher};

//! Recent-item discovery and transfer pipeline
//!
//! Data flow for one run:
//! coordinator -> window query (per server) -> path mapping (per item)
//! -> recognition + transfer, or metadata refresh (per item) -> summary -> notification

pub mod coordinator;
pub mod executor;
pub mod path_map;
pub mod trigger;
pub mod types;
pub mod window;

pub use coordinator::{RunCoordinator, RunPhase, RunSettings, ServerHandle};
pub use executor::TransferExecutor;
pub use path_map::{PathMapRule, PathMapper, parse_rules, resolve};
pub use trigger::{ActionToken, TriggerDispatcher, TriggerError};
pub use types::{
    CatalogItem, OperationMode, RunSummary, ServerCapabilities, ServerTarget, TransferOutcome,
};
pub use window::{CatalogQuery, TimeWindow, WindowMode, WindowQuery, WindowResult};

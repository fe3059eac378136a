//! A small lifecycle driver: JSON configuration in, planned changes out,
//! resource operations applied against a local state file.

pub mod engine;
pub mod plan;
pub mod state;

pub use engine::{ApplySummary, DataResult, Engine, mask_sensitive, parse_address, read_data};
pub use plan::{Action, Block, Configuration, PlannedChange};
pub use state::{StateEntry, StateFile};

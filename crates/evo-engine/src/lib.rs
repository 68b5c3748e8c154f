//! The GA core: preferences, control surface, offspring production, the
//! running-list, on-disk snapshots, progress reporting, and the
//! single-threaded cooperative loop that ties them together.

pub mod control;
pub mod ga_loop;
pub mod mating;
pub mod preferences;
pub mod running_list;
pub mod snapshot;
pub mod stats;

pub use control::{Control, ControlEvent};
pub use ga_loop::GaLoop;
pub use mating::{produce_offspring, MatingConfig};
pub use preferences::Preferences;
pub use running_list::{RunningEntry, RunningList};
